//! Polyhedral meshes made of convex cells.
//!
//! The mesh is stored as a list of vertices, a list of polygonal faces (each a cyclic sequence
//! of vertex indices) and a list of cells (each a set of face indices). Faces are shared between
//! the cells they bound, which keeps every operation below conforming: a face is only ever split
//! once, and both neighboring cells pick up the same pieces.
use crate::{tetrahedron_signed_volume, LineSegment3d, Plane, PlaneSide};
use nalgebra::{Point3, RealField, Scalar};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "Point3<T>: Serialize"))]
#[serde(bound(deserialize = "Point3<T>: Deserialize<'de>"))]
pub struct PolyMesh3d<T: Scalar> {
    vertices: Vec<Point3<T>>,
    faces: Vec<Vec<usize>>,
    cells: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolyMeshError {
    /// A face has fewer than three vertices and cannot be triangulated.
    DegenerateFace(usize),
    /// A cell references a face that does not exist.
    InvalidFaceReference { cell: usize, face: usize },
}

impl Display for PolyMeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolyMeshError::DegenerateFace(face) => {
                write!(f, "Encountered face {} with less than 3 vertices, cannot triangulate.", face)
            }
            PolyMeshError::InvalidFaceReference { cell, face } => {
                write!(f, "Cell {} references face {}, which does not exist.", cell, face)
            }
        }
    }
}

impl Error for PolyMeshError {}

/// Outcome of splitting a single face by a plane.
#[derive(Debug, Clone, Copy)]
enum FaceSplit {
    Whole(usize),
    Split { positive: usize, negative: usize },
}

impl<T: Scalar> PolyMesh3d<T> {
    pub fn from_poly_data(vertices: Vec<Point3<T>>, faces: Vec<Vec<usize>>, cells: Vec<Vec<usize>>) -> Self {
        let num_vertices = vertices.len();
        let num_faces = faces.len();

        if faces.iter().flatten().any(|idx| *idx >= num_vertices) {
            panic!("Vertex index out of bounds in faces description.")
        }

        if cells.iter().flatten().any(|idx| *idx >= num_faces) {
            panic!("Face index out of bounds in cells description.")
        }

        Self { vertices, faces, cells }
    }

    pub fn vertices(&self) -> &[Point3<T>] {
        &self.vertices
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn get_face_connectivity(&self, index: usize) -> Option<&[usize]> {
        self.faces.get(index).map(Vec::as_slice)
    }

    pub fn get_cell_connectivity(&self, index: usize) -> Option<&[usize]> {
        self.cells.get(index).map(Vec::as_slice)
    }

    pub fn face_connectivity_iter(&self) -> impl '_ + Iterator<Item = &[usize]> {
        self.faces.iter().map(Vec::as_slice)
    }

    pub fn cell_connectivity_iter(&self) -> impl '_ + Iterator<Item = &[usize]> {
        self.cells.iter().map(Vec::as_slice)
    }

    /// The sorted, deduplicated vertex indices of a cell.
    pub fn cell_vertices(&self, cell_index: usize) -> Vec<usize> {
        let vertex_set: BTreeSet<usize> = self.cells[cell_index]
            .iter()
            .flat_map(|face_idx| self.faces[*face_idx].iter().copied())
            .collect();
        vertex_set.into_iter().collect()
    }
}

impl<T> PolyMesh3d<T>
where
    T: RealField + Copy,
{
    /// Splits every cell crossed by `plane` into its part on the positive and its part on the
    /// negative side of the plane.
    ///
    /// Vertices closer to the plane than `tolerance` are considered to lie on it; a cell is only
    /// split if it has vertices strictly on both sides. The two halves of a split cell share
    /// a new cap face lying in the plane.
    pub fn split_by_plane(&self, plane: &Plane<T>, tolerance: T) -> Self {
        let sides: Vec<PlaneSide> = self
            .vertices
            .iter()
            .map(|v| plane.side(v, tolerance))
            .collect();

        let mut vertices = self.vertices.clone();
        let mut crossings = BTreeMap::new();
        let mut crossing_vertex = |a: usize, b: usize, vertices: &mut Vec<Point3<T>>| -> usize {
            let key = [a.min(b), a.max(b)];
            *crossings.entry(key).or_insert_with(|| {
                let segment = LineSegment3d::from_end_points([vertices[key[0]], vertices[key[1]]]);
                vertices.push(segment.plane_crossing(plane));
                vertices.len() - 1
            })
        };

        let is_cut_edge = |a: usize, b: usize| {
            matches!(
                (sides[a], sides[b]),
                (PlaneSide::Positive, PlaneSide::Negative) | (PlaneSide::Negative, PlaneSide::Positive)
            )
        };

        let mut new_faces: Vec<Vec<usize>> = Vec::with_capacity(self.faces.len());
        let mut face_splits = Vec::with_capacity(self.faces.len());
        for face in &self.faces {
            let has_positive = face.iter().any(|v| sides[*v] == PlaneSide::Positive);
            let has_negative = face.iter().any(|v| sides[*v] == PlaneSide::Negative);

            if has_positive && has_negative {
                let mut positive = Vec::new();
                let mut negative = Vec::new();
                for (i, &a) in face.iter().enumerate() {
                    let b = face[(i + 1) % face.len()];
                    if sides[a] != PlaneSide::Negative {
                        positive.push(a);
                    }
                    if sides[a] != PlaneSide::Positive {
                        negative.push(a);
                    }
                    if is_cut_edge(a, b) {
                        let x = crossing_vertex(a, b, &mut vertices);
                        positive.push(x);
                        negative.push(x);
                    }
                }
                new_faces.push(positive);
                new_faces.push(negative);
                face_splits.push(FaceSplit::Split {
                    positive: new_faces.len() - 2,
                    negative: new_faces.len() - 1,
                });
            } else {
                new_faces.push(face.clone());
                face_splits.push(FaceSplit::Whole(new_faces.len() - 1));
            }
        }

        let mut new_cells = Vec::with_capacity(self.cells.len());
        for cell_faces in &self.cells {
            let cell_sides: Vec<PlaneSide> = cell_faces
                .iter()
                .flat_map(|f| self.faces[*f].iter().map(|v| sides[*v]))
                .collect();
            let cut = cell_sides.contains(&PlaneSide::Positive) && cell_sides.contains(&PlaneSide::Negative);

            if !cut {
                let faces = cell_faces
                    .iter()
                    .map(|f| match face_splits[*f] {
                        FaceSplit::Whole(idx) => idx,
                        // A face with vertices on both sides implies the cell is cut
                        FaceSplit::Split { positive, .. } => positive,
                    })
                    .collect();
                new_cells.push(faces);
                continue;
            }

            let mut positive_faces = Vec::new();
            let mut negative_faces = Vec::new();
            let mut cap_vertices = BTreeSet::new();
            for &f in cell_faces {
                let face = &self.faces[f];
                for (i, &a) in face.iter().enumerate() {
                    let b = face[(i + 1) % face.len()];
                    if sides[a] == PlaneSide::On {
                        cap_vertices.insert(a);
                    }
                    if is_cut_edge(a, b) {
                        cap_vertices.insert(crossing_vertex(a, b, &mut vertices));
                    }
                }

                match face_splits[f] {
                    FaceSplit::Split { positive, negative } => {
                        positive_faces.push(positive);
                        negative_faces.push(negative);
                    }
                    FaceSplit::Whole(idx) => {
                        if face.iter().any(|v| sides[*v] == PlaneSide::Positive) {
                            positive_faces.push(idx);
                        } else if face.iter().any(|v| sides[*v] == PlaneSide::Negative) {
                            negative_faces.push(idx);
                        }
                        // Faces entirely in the plane are replaced by the cap
                    }
                }
            }

            if cap_vertices.len() >= 3 {
                let cap = order_planar_polygon(&vertices, cap_vertices.into_iter().collect(), plane);
                new_faces.push(cap);
                let cap_idx = new_faces.len() - 1;
                positive_faces.push(cap_idx);
                negative_faces.push(cap_idx);
            }

            new_cells.push(positive_faces);
            new_cells.push(negative_faces);
        }

        Self::from_poly_data(vertices, new_faces, new_cells)
    }

    /// Decomposes every cell into tetrahedra.
    ///
    /// The procedure follows Max (2000), "Consistent Subdivision of Convex Polyhedra into
    /// Tetrahedra": each face is fanned from its vertex of least index, and each cell is
    /// coned from its vertex of least index to the triangles of the faces not incident to
    /// that vertex. Since the choice only depends on global vertex indices, neighboring cells
    /// triangulate their shared faces identically.
    ///
    /// Every returned tetrahedron is positively oriented. Tetrahedra with an absolute volume
    /// below `min_volume` are discarded.
    pub fn tetrahedralize(&self, min_volume: T) -> Result<Vec<[usize; 4]>, PolyMeshError> {
        let mut face_triangles = Vec::with_capacity(self.faces.len());
        for (face_idx, face) in self.faces.iter().enumerate() {
            face_triangles.push(fan_triangulate(face).ok_or(PolyMeshError::DegenerateFace(face_idx))?);
        }

        let mut tets = Vec::new();
        for (cell_idx, cell) in self.cells.iter().enumerate() {
            if let Some(&bad_face) = cell.iter().find(|f| **f >= self.faces.len()) {
                return Err(PolyMeshError::InvalidFaceReference {
                    cell: cell_idx,
                    face: bad_face,
                });
            }

            // Ignore empty cells
            let v = match cell.iter().flat_map(|f| self.faces[*f].iter()).min() {
                Some(v) => *v,
                None => continue,
            };

            for face_idx in cell {
                // Faces incident to the apex would produce flat tetrahedra
                if self.faces[*face_idx].contains(&v) {
                    continue;
                }
                for &[a, b, c] in &face_triangles[*face_idx] {
                    let mut tet = [a, b, c, v];
                    let volume = tetrahedron_signed_volume(&tet.map(|i| self.vertices[i]));
                    if volume.abs() < min_volume {
                        continue;
                    }
                    if volume < T::zero() {
                        tet.swap(0, 1);
                    }
                    tets.push(tet);
                }
            }
        }

        Ok(tets)
    }

    /// Total volume of all cells.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn compute_volume(&self) -> Result<T, PolyMeshError> {
        let tets = self.tetrahedralize(0.0)?;
        Ok(tets
            .iter()
            .map(|tet| tetrahedron_signed_volume(&tet.map(|i| self.vertices[i])))
            .fold(0.0, |acc, vol| acc + vol))
    }
}

/// Fan triangulation of a polygon from its vertex of least index.
fn fan_triangulate(face: &[usize]) -> Option<Vec<[usize; 3]>> {
    if face.len() < 3 {
        return None;
    }
    let (min_pos, _) = face.iter().enumerate().min_by_key(|(_, v)| **v)?;
    let n = face.len();
    Some(
        (0..n - 2)
            .map(|i| [face[min_pos], face[(min_pos + i + 1) % n], face[(min_pos + i + 2) % n]])
            .collect(),
    )
}

/// Orders vertices that lie in `plane` by angle around their centroid.
fn order_planar_polygon<T>(vertices: &[Point3<T>], mut indices: Vec<usize>, plane: &Plane<T>) -> Vec<usize>
where
    T: RealField + Copy,
{
    let n = T::from_usize(indices.len()).unwrap();
    let centroid = indices
        .iter()
        .fold(nalgebra::Vector3::zeros(), |acc, i| acc + vertices[*i].coords)
        / n;
    let [u, v] = plane.tangent_basis();
    let angle = |i: usize| {
        let d = vertices[i].coords - centroid;
        d.dot(&v).atan2(d.dot(&u))
    };
    indices.sort_by(|a, b| {
        angle(*a)
            .partial_cmp(&angle(*b))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    indices
}
