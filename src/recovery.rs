//! Recovery of the curved interface.
//!
//! The tessellation only resolves the linearized interface. Steiner points on interface faces
//! and the midside nodes of quadratic interface faces are moved back onto the cutter surface,
//! depending on where they lie: on the xfem element boundary, on a line shared by two cutter
//! elements, or inside a single cutter element.
use crate::construction::snap_to_facets;
use crate::element::{ElementGeometry, ElementShape, FacetSet};
use crate::mesh::MeshElement;
use crate::root_finding::{solve_recovery_normal, solve_recovery_plane};
use crate::tessellation::TetMesh;
use crate::transform::{current_to_element_local, current_to_surface_coordinates, TransformError};
use crate::Real;
use log::{debug, trace};
use nalgebra::{Point3, Vector3};
use std::collections::{BTreeMap, BTreeSet};
use xcut_geometry::{tetrahedron_signed_volume, TOL7};
use xcut_optimize::newton::NewtonSettings;

/// A cutter element intersecting the xfem element, addressed by its face marker.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryCutter<T: Real> {
    pub element: MeshElement,
    /// Geometry in the current configuration.
    pub geometry: ElementGeometry<T>,
}

/// How a point is moved onto the cutter surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryCase {
    /// The point lies on the xfem element boundary and stays on these facets.
    Boundary(FacetSet),
    /// The point lies on the line shared by two cutter elements; `line` is the local line index
    /// in the cutter element with marker `marker`.
    Edge { marker: usize, line: usize },
    /// The point lies inside a cutter element.
    Surface,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    pub recovered_points: usize,
    pub missed_points: usize,
}

/// An interface face incident to a recovered point, in physical coordinates.
#[derive(Debug, Copy, Clone)]
struct IncidentFace<T: Real> {
    marker: usize,
    normal: Vector3<T>,
}

/// Moves Steiner points of a cut xfem element onto the cutter surface.
#[derive(Debug, Clone)]
pub struct InterfaceRecovery<'a, T: Real> {
    pub xfem: &'a ElementGeometry<T>,
    /// Intersecting cutter elements, indexed by face marker.
    pub cutters: &'a [RecoveryCutter<T>],
    pub newton: NewtonSettings<T>,
    pub projection_iterations: usize,
}

impl<'a, T: Real> InterfaceRecovery<'a, T> {
    /// Recovers all points of interface faces that have not been visited yet.
    ///
    /// Corner Steiner points are recovered first. Afterwards midside nodes of a quadratic mesh are
    /// reset to the midpoints of their (possibly moved) corners, and those on interface faces are
    /// recovered as well. A lift that would invert one of the tetrahedra around the point is
    /// undone and counted as missed. Every processed point is marked as visited, whether or not
    /// its recovery succeeded, so repeated calls leave the mesh unchanged.
    pub fn recover(&self, mesh: &mut TetMesh<T>) -> Result<RecoveryStats, TransformError> {
        let mut stats = RecoveryStats::default();
        let midside: BTreeSet<usize> = mesh.midside_nodes.values().copied().collect();
        let mut incident_tets: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (tet_idx, tet) in mesh.tets.iter().enumerate() {
            for &v in tet {
                incident_tets.entry(v).or_default().push(tet_idx);
            }
        }
        let no_tets = Vec::new();

        let mut corner_faces: BTreeMap<usize, Vec<[usize; 3]>> = BTreeMap::new();
        let mut marker_of_face: BTreeMap<[usize; 3], usize> = BTreeMap::new();
        for (marker, face) in mesh.interface_faces() {
            let corners = face.corners();
            marker_of_face.insert(corners, marker);
            for &v in &corners {
                if mesh.is_steiner_point(v) && !midside.contains(&v) && !mesh.visited.contains(&v) {
                    corner_faces.entry(v).or_default().push(corners);
                }
            }
        }

        for (point, faces) in corner_faces {
            let incident = self.incident_faces(mesh, &faces, &marker_of_face);
            let xi = mesh.points[point].coords;
            let tets = incident_tets.get(&point).unwrap_or(&no_tets);
            match self.lift(&xi, &incident, None)? {
                Some(lifted) if move_if_valid(mesh, point, lifted, tets) => stats.recovered_points += 1,
                _ => {
                    debug!("Failed to recover Steiner point {} at {:?}", point, xi);
                    stats.missed_points += 1;
                }
            }
            mesh.visited.insert(point);
        }

        if mesh.is_quadratic() {
            for (&[a, b], &node) in &mesh.midside_nodes {
                if !mesh.visited.contains(&node) {
                    mesh.points[node] = nalgebra::center(&mesh.points[a], &mesh.points[b]);
                }
            }

            let mut edge_faces: BTreeMap<usize, ([usize; 2], Vec<[usize; 3]>)> = BTreeMap::new();
            for (_, face) in mesh.interface_faces() {
                let [a, b, c] = face.corners();
                for (k, (p, q)) in [(a, b), (b, c), (c, a)].into_iter().enumerate() {
                    let node = face.vertices[3 + k];
                    if !mesh.visited.contains(&node) {
                        edge_faces
                            .entry(node)
                            .or_insert_with(|| ([p, q], Vec::new()))
                            .1
                            .push(face.corners());
                    }
                }
            }

            for (node, (edge, faces)) in edge_faces {
                let incident = self.incident_faces(mesh, &faces, &marker_of_face);
                let xi = mesh.points[node].coords;
                let tets = incident_tets.get(&node).unwrap_or(&no_tets);
                let facets_of_edge = self
                    .facets_of(&mesh.points[edge[0]].coords)
                    .intersection(&self.facets_of(&mesh.points[edge[1]].coords));
                match self.lift(&xi, &incident, Some(facets_of_edge))? {
                    Some(lifted) if move_if_valid(mesh, node, lifted, tets) => stats.recovered_points += 1,
                    _ => {
                        debug!("Failed to recover midside node {} at {:?}", node, xi);
                        stats.missed_points += 1;
                    }
                }
            }

            mesh.visited.extend(midside.iter().copied());
        }

        trace!(
            "Recovered {} points, missed {}",
            stats.recovered_points,
            stats.missed_points
        );
        Ok(stats)
    }

    fn facets_of(&self, xi: &Vector3<T>) -> FacetSet {
        self.xfem
            .shape()
            .facets_containing(xi, T::from_f64(TOL7).unwrap())
    }

    fn incident_faces(
        &self,
        mesh: &TetMesh<T>,
        faces: &[[usize; 3]],
        marker_of_face: &BTreeMap<[usize; 3], usize>,
    ) -> Vec<IncidentFace<T>> {
        faces
            .iter()
            .filter_map(|corners| {
                let [a, b, c] = corners.map(|v| self.xfem.map_reference_coords(&mesh.points[v].coords));
                let normal = (b - a).cross(&(c - a)).try_normalize(T::default_epsilon())?;
                Some(IncidentFace {
                    marker: marker_of_face[corners],
                    normal,
                })
            })
            .collect()
    }

    /// Decides the recovery case of a point. For midside nodes, `edge_facets` are the xfem facets
    /// shared by the corners of the edge.
    pub fn decide_case(&self, xi: &Vector3<T>, markers: &BTreeSet<usize>, edge_facets: Option<FacetSet>) -> RecoveryCase {
        let facets = match edge_facets {
            Some(facets) => facets,
            None => self.facets_of(xi),
        };
        if !facets.is_empty() {
            return RecoveryCase::Boundary(facets);
        }
        for &first in markers {
            for &second in markers.range(first + 1..) {
                if let (Some(a), Some(b)) = (self.cutters.get(first), self.cutters.get(second)) {
                    if let Some(line) = a.element.common_line(&b.element) {
                        return RecoveryCase::Edge { marker: first, line };
                    }
                }
            }
        }
        RecoveryCase::Surface
    }

    /// Computes the recovered position of a point in xfem reference coordinates.
    fn lift(
        &self,
        xi: &Vector3<T>,
        incident: &[IncidentFace<T>],
        edge_facets: Option<FacetSet>,
    ) -> Result<Option<Vector3<T>>, TransformError> {
        let tol = T::from_f64(TOL7).unwrap();
        if incident.is_empty() {
            return Ok(None);
        }
        let markers: BTreeSet<usize> = incident.iter().map(|face| face.marker).collect();
        let normal = incident
            .iter()
            .fold(Vector3::zeros(), |acc, face| acc + face.normal)
            .try_normalize(T::default_epsilon())
            .unwrap_or(incident[0].normal);
        let x = self.xfem.map_reference_coords(xi);

        let case = self.decide_case(xi, &markers, edge_facets);
        let lifted = match case {
            RecoveryCase::Boundary(facets) => self.lift_boundary(&x, &normal, &facets, &markers),
            RecoveryCase::Edge { marker, line } => self
                .lift_edge(&x, &normal, marker, line)
                .or_else(|| self.lift_surface(&x, &normal, incident, &markers)),
            RecoveryCase::Surface => self.lift_surface(&x, &normal, incident, &markers),
        };
        let lifted = match lifted {
            Some(lifted) => lifted,
            None => return Ok(None),
        };

        let xi_new = match current_to_element_local(self.xfem, &lifted) {
            Ok(xi_new) => xi_new,
            Err(err) if err.is_fatal() => return Err(err),
            Err(_) => return Ok(None),
        };
        let shape = self.xfem.shape();
        if !shape.contains_reference_point(&xi_new, tol) {
            trace!("Recovered point {:?} left the xfem element", xi_new);
            return Ok(None);
        }
        // Points slightly outside are put back onto the facets they cross
        let mut facets = match case {
            RecoveryCase::Boundary(facets) => facets,
            _ => FacetSet::default(),
        };
        for (facet, (n, c)) in shape.reference_facet_planes::<T>().iter().enumerate() {
            if n.dot(&xi_new) > *c {
                facets.insert(facet);
            }
        }
        Ok(Some(snap_to_facets(shape, &xi_new, &facets)))
    }

    fn normal_solve(&self, cutter: &RecoveryCutter<T>, x: &Point3<T>, direction: &Vector3<T>) -> Option<Point3<T>> {
        let projection = current_to_surface_coordinates(&cutter.geometry, x, self.projection_iterations);
        let start = Vector3::new(projection.xi.x, projection.xi.y, T::zero());
        let h = cutter.geometry.diameter();
        solve_recovery_normal(&cutter.geometry, x, &(direction * h), &start, &self.newton).map(|root| root.point)
    }

    fn lift_surface(
        &self,
        x: &Point3<T>,
        normal: &Vector3<T>,
        incident: &[IncidentFace<T>],
        markers: &BTreeSet<usize>,
    ) -> Option<Point3<T>> {
        let cutters = || markers.iter().filter_map(|m| self.cutters.get(*m));
        cutters()
            .find_map(|cutter| self.normal_solve(cutter, x, normal))
            .or_else(|| {
                incident.iter().find_map(|face| {
                    let cutter = self.cutters.get(face.marker)?;
                    self.normal_solve(cutter, x, &face.normal)
                })
            })
    }

    fn lift_boundary(
        &self,
        x: &Point3<T>,
        normal: &Vector3<T>,
        facets: &FacetSet,
        markers: &BTreeSet<usize>,
    ) -> Option<Point3<T>> {
        // Search within the facet, perpendicular to the trace of the interface on the facet
        let facet = self.xfem.facet(*facets.as_slice().first()?);
        let projection = current_to_surface_coordinates(&facet, x, self.projection_iterations);
        let facet_normal = facet.surface_normal(&projection.xi)?;
        let trace = facet_normal.cross(normal);
        let direction = trace
            .cross(&facet_normal)
            .try_normalize(T::default_epsilon())
            .unwrap_or(*normal);
        markers
            .iter()
            .filter_map(|m| self.cutters.get(*m))
            .find_map(|cutter| self.normal_solve(cutter, x, &direction))
    }

    fn lift_edge(&self, x: &Point3<T>, normal: &Vector3<T>, marker: usize, line: usize) -> Option<Point3<T>> {
        let cutter = self.cutters.get(marker)?;
        let cutter_line = cutter.geometry.line(line);
        let h = cutter.geometry.diameter();
        let chord = cutter_line.vertices()[1] - cutter_line.vertices()[0];
        let n1 = chord.cross(normal).try_normalize(T::default_epsilon())? * h;
        let n2 = chord.cross(&n1).try_normalize(T::default_epsilon())? * h;
        let plane = ElementGeometry::quad([x + n1, x - n1, x - n1 + n2, x + n1 + n2]);
        let start = Vector3::new(T::zero(), -T::one(), T::zero());
        solve_recovery_plane(&plane, &cutter_line, &start, &self.newton).map(|root| root.point)
    }
}

/// Moves a mesh point unless this inverts one of the given tetrahedra.
///
/// Tet4 cells must keep a positive volume, tet10 cells a positive Jacobian determinant at all of
/// their nodes.
fn move_if_valid<T: Real>(mesh: &mut TetMesh<T>, point: usize, xi: Vector3<T>, tets: &[usize]) -> bool {
    let previous = mesh.points[point];
    mesh.points[point] = Point3::from(xi);
    let valid = tets.iter().all(|tet| is_positively_oriented(mesh, &mesh.tets[*tet]));
    if !valid {
        trace!("Moving point {} to {:?} inverts a tetrahedron", point, xi);
        mesh.points[point] = previous;
    }
    valid
}

fn is_positively_oriented<T: Real>(mesh: &TetMesh<T>, tet: &[usize]) -> bool {
    let vertices: Vec<Point3<T>> = tet.iter().map(|v| mesh.points[*v]).collect();
    if tetrahedron_signed_volume(&[vertices[0], vertices[1], vertices[2], vertices[3]]) <= T::zero() {
        return false;
    }
    if vertices.len() != 10 {
        return true;
    }
    match ElementGeometry::from_vertices(ElementShape::Tet10, vertices) {
        Ok(geometry) => ElementShape::Tet10
            .reference_nodes::<T>()
            .iter()
            .all(|xi| geometry.reference_jacobian(&xi.coords).determinant() > T::zero()),
        Err(_) => false,
    }
}
