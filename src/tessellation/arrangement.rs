use crate::tessellation::{
    FacetMarker, MarkedFace, Plc, TessellationError, TessellationOptions, Tessellator, TetMesh,
};
use crate::Real;
use log::debug;
use nalgebra::{Point3, Unit};
use std::collections::{BTreeMap, BTreeSet};
use xcut_geometry::polymesh::PolyMesh3d;
use xcut_geometry::{points_equal, tetrahedron_signed_volume, Plane, TOL7};

/// Local corner pairs of the edges of a tet10, in the order of its midside nodes.
const TET_EDGES: [[usize; 2]; 6] = [[0, 1], [1, 2], [0, 2], [0, 3], [2, 3], [1, 3]];
const TET_FACES: [[usize; 3]; 4] = [[1, 2, 3], [0, 3, 2], [0, 1, 3], [0, 2, 1]];

/// Tessellates an element by cutting it along planes.
///
/// The reference element is split along the plane of every interface triangle and along the
/// planes through every triangle edge perpendicular to the triangle. The resulting convex cells
/// are tetrahedralized consistently, so that every interface triangle is tiled by faces of the
/// output mesh. New vertices coinciding with PLC points are identified with them; all other new
/// vertices are Steiner points.
///
/// The output is a valid constrained tetrahedralization, but not a Delaunay one.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ArrangementTessellator {
    /// Tetrahedra with a smaller reference volume are discarded.
    pub min_volume: f64,
    /// Relative tolerance of the final check that the tetrahedra fill the element.
    pub volume_tolerance: f64,
}

impl Default for ArrangementTessellator {
    fn default() -> Self {
        Self {
            min_volume: 1e-14,
            volume_tolerance: 1e-6,
        }
    }
}

fn push_unique_plane<T: Real>(planes: &mut Vec<Plane<T>>, plane: Plane<T>, tolerance: T) {
    if !planes.iter().any(|p| p.coincides_with(&plane, tolerance)) {
        planes.push(plane);
    }
}

fn splitting_planes<T: Real>(plc: &Plc<T>, tolerance: T) -> Vec<Plane<T>> {
    let mut planes = Vec::new();
    for (triangle, _) in plc.interface_triangles() {
        let [a, b, c] = triangle.map(|i| plc.points[i]);
        let plane = match Plane::from_points(&a, &b, &c) {
            Some(plane) => plane,
            None => continue,
        };
        let normal = plane.normal().into_inner();
        push_unique_plane(&mut planes, plane, tolerance);
        for (p, q) in [(a, b), (b, c), (c, a)] {
            if let Some(edge_normal) = Unit::try_new((q - p).cross(&normal), T::default_epsilon()) {
                push_unique_plane(&mut planes, Plane::from_point_and_normal(p, edge_normal), tolerance);
            }
        }
    }
    planes
}

/// Whether `p` lies in the triangle `abc`, assuming it lies in its plane.
fn triangle_contains<T: Real>(triangle: &[Point3<T>; 3], p: &Point3<T>, tolerance: T) -> bool {
    let [a, b, c] = triangle;
    let n = (b - a).cross(&(c - a));
    let n_norm = n.norm();
    if n_norm <= T::zero() {
        return false;
    }
    [(a, b), (b, c), (c, a)].iter().all(|(u, v)| {
        let edge = *v - *u;
        edge.cross(&(p - *u)).dot(&n) / n_norm >= -tolerance * edge.norm()
    })
}

/// Identifies new vertices with PLC points and with each other, returning the merged point list
/// and the map from mesh vertex indices to merged indices.
fn merge_vertices<T: Real>(
    plc_points: &[Point3<T>],
    vertices: &[Point3<T>],
    referenced: &BTreeSet<usize>,
    tolerance: T,
) -> (Vec<Point3<T>>, BTreeMap<usize, usize>) {
    let num_input = plc_points.len();
    let mut points = plc_points.to_vec();
    let mut index_map = BTreeMap::new();
    for &v in referenced {
        if v < num_input {
            index_map.insert(v, v);
            continue;
        }
        let x = &vertices[v];
        let merged = match points.iter().position(|p| points_equal(p, x, tolerance)) {
            Some(idx) => idx,
            None => {
                points.push(*x);
                points.len() - 1
            }
        };
        index_map.insert(v, merged);
    }
    (points, index_map)
}

impl<T: Real> Tessellator<T> for ArrangementTessellator {
    fn tessellate(&self, plc: &Plc<T>, options: &TessellationOptions) -> Result<TetMesh<T>, TessellationError> {
        let tol = T::from_f64(TOL7).unwrap();
        let num_input_points = plc.points.len();
        for facet in &plc.facets {
            if let Some(idx) = facet.polygons.iter().flatten().find(|idx| **idx >= num_input_points) {
                return Err(TessellationError::InvalidPlc(format!(
                    "facet {:?} references point {}, but there are only {} points",
                    facet.marker, idx, num_input_points
                )));
            }
        }

        let boundary: Vec<(usize, Vec<usize>)> = plc
            .boundary_facets()
            .filter_map(|(idx, facet)| facet.polygons.first().map(|polygon| (idx, polygon.clone())))
            .collect();
        if boundary.len() < 4 {
            return Err(TessellationError::InvalidPlc(format!(
                "a closed domain needs at least 4 boundary facets, got {}",
                boundary.len()
            )));
        }
        let boundary_planes: Vec<(usize, Plane<T>)> = boundary
            .iter()
            .filter_map(|(idx, polygon)| {
                let [a, b, c] = [polygon.first()?, polygon.get(1)?, polygon.get(2)?].map(|i| plc.points[*i]);
                Plane::from_points(&a, &b, &c).map(|plane| (*idx, plane))
            })
            .collect();

        let faces = boundary.iter().map(|(_, polygon)| polygon.clone()).collect();
        let cells = vec![(0..boundary.len()).collect()];
        let mut mesh = PolyMesh3d::from_poly_data(plc.points.clone(), faces, cells);
        let expected_volume = mesh.compute_volume()?;

        let planes = splitting_planes(plc, tol);
        for plane in &planes {
            mesh = mesh.split_by_plane(plane, tol);
        }
        debug!(
            "Split element along {} planes into {} convex cells",
            planes.len(),
            mesh.num_cells()
        );

        let min_volume = T::from_f64(self.min_volume).unwrap();
        let raw_tets = mesh.tetrahedralize(min_volume)?;
        let referenced: BTreeSet<usize> = raw_tets.iter().flatten().copied().collect();
        let (mut points, index_map) = merge_vertices(&plc.points, mesh.vertices(), &referenced, tol);

        let mut tets: Vec<[usize; 4]> = Vec::with_capacity(raw_tets.len());
        let mut actual_volume = T::zero();
        for tet in raw_tets {
            let tet = tet.map(|v| index_map[&v]);
            let volume = tetrahedron_signed_volume(&tet.map(|v| points[v]));
            if volume > min_volume {
                actual_volume += volume;
                tets.push(tet);
            }
        }

        let volume_tol = T::from_f64(self.volume_tolerance).unwrap();
        if (actual_volume - expected_volume).abs() > volume_tol * expected_volume.abs().max(T::one()) {
            return Err(TessellationError::VolumeMismatch {
                expected: expected_volume.to_subset().unwrap_or(f64::NAN),
                actual: actual_volume.to_subset().unwrap_or(f64::NAN),
            });
        }

        let mut face_tets: BTreeMap<[usize; 3], Vec<usize>> = BTreeMap::new();
        for (tet_idx, tet) in tets.iter().enumerate() {
            for local in TET_FACES {
                let mut key = local.map(|i| tet[i]);
                key.sort_unstable();
                face_tets.entry(key).or_default().push(tet_idx);
            }
        }

        let interface_triangles: Vec<([Point3<T>; 3], usize)> = plc
            .interface_triangles()
            .map(|(triangle, marker)| (triangle.map(|i| plc.points[i]), marker))
            .collect();

        let mut marked_faces = Vec::new();
        for (key, adjacent) in face_tets {
            let corners = key.map(|v| points[v]);
            let centroid = Point3::from((corners[0].coords + corners[1].coords + corners[2].coords) / T::from_f64(3.0).unwrap());

            let interface = if options.detect_constrained_facets {
                interface_triangles.iter().find_map(|(triangle, marker)| {
                    let plane = Plane::from_points(&triangle[0], &triangle[1], &triangle[2])?;
                    let coplanar = corners.iter().all(|x| plane.signed_distance(x).abs() <= tol);
                    (coplanar && triangle_contains(triangle, &centroid, tol)).then(|| (plane, *marker))
                })
            } else {
                None
            };

            let (vertices, marker) = match interface {
                Some((plane, marker)) => {
                    let mut vertices = key;
                    let n = (corners[1] - corners[0]).cross(&(corners[2] - corners[0]));
                    if n.dot(plane.normal().as_ref()) < T::zero() {
                        vertices.swap(1, 2);
                    }
                    (vertices, FacetMarker::Interface(marker))
                }
                None if options.preserve_markers && adjacent.len() == 1 => {
                    let facet = boundary_planes
                        .iter()
                        .find(|(_, plane)| corners.iter().all(|x| plane.signed_distance(x).abs() <= tol));
                    match facet {
                        Some((facet_idx, _)) => (key, FacetMarker::Boundary(*facet_idx)),
                        None => continue,
                    }
                }
                None => continue,
            };

            marked_faces.push(MarkedFace {
                vertices: vertices.to_vec(),
                marker,
                adjacent_tets: if options.output_neighbors { adjacent } else { Vec::new() },
            });
        }

        let mut tet_connectivity: Vec<Vec<usize>> = tets.iter().map(|tet| tet.to_vec()).collect();
        let mut midside_nodes = BTreeMap::new();
        if options.quadratic {
            let mut midside = |a: usize, b: usize, points: &mut Vec<Point3<T>>| -> usize {
                let key = [a.min(b), a.max(b)];
                *midside_nodes.entry(key).or_insert_with(|| {
                    let midpoint = nalgebra::center(&points[a], &points[b]);
                    points.push(midpoint);
                    points.len() - 1
                })
            };
            for tet in &mut tet_connectivity {
                let corners = [tet[0], tet[1], tet[2], tet[3]];
                for [i, j] in TET_EDGES {
                    let node = midside(corners[i], corners[j], &mut points);
                    tet.push(node);
                }
            }
            for face in &mut marked_faces {
                let [a, b, c] = face.corners();
                for (p, q) in [(a, b), (b, c), (c, a)] {
                    let node = midside(p, q, &mut points);
                    face.vertices.push(node);
                }
            }
        }

        debug!(
            "Tessellated element into {} tetrahedra with {} Steiner points and {} marked faces",
            tet_connectivity.len(),
            points.len() - num_input_points - midside_nodes.len(),
            marked_faces.len()
        );

        Ok(TetMesh {
            points,
            num_input_points,
            tets: tet_connectivity,
            faces: marked_faces,
            midside_nodes,
            visited: BTreeSet::new(),
        })
    }
}
