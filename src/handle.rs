//! Queries on the result of an intersection pass.
use crate::cells::{BoundaryIntCell, DomainIntCell};
use crate::element::ElementGeometry;
use crate::intersection::{Diagnostics, IntersectionOutput};
use crate::mesh::{Discretization, MeshError};
use crate::transform::current_to_surface_coordinates;
use crate::Real;
use nalgebra::{distance, Point3, Vector3};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use xcut_geometry::TOL7;

/// Closest point of a cutter element to a physical point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NearestPoint<T: Real> {
    pub cutter_element_id: usize,
    /// Reference coordinates in the cutter element, third component zero.
    pub xi: Vector3<T>,
    /// The closest point in the current configuration.
    pub point: Point3<T>,
    /// Vector from the closest point to the query point.
    pub offset: Vector3<T>,
    /// Distance to the closest point, negative if the query point lies on the side the surface
    /// normal points away from.
    pub signed_distance: T,
}

/// Owns the cells of an intersection pass together with the xfem discretization they belong to.
#[derive(Debug, Clone)]
pub struct InterfaceHandle<T: Real> {
    xfem: Discretization<T>,
    output: IntersectionOutput<T>,
    projection_iterations: usize,
}

impl<T: Real> InterfaceHandle<T> {
    pub fn new(xfem: Discretization<T>, output: IntersectionOutput<T>) -> Self {
        Self {
            xfem,
            output,
            projection_iterations: 20,
        }
    }

    pub fn with_projection_iterations(self, projection_iterations: usize) -> Self {
        Self {
            projection_iterations,
            ..self
        }
    }

    pub fn xfem(&self) -> &Discretization<T> {
        &self.xfem
    }

    /// The cutter in its current configuration, as seen by this rank.
    pub fn cutter(&self) -> &Discretization<T> {
        &self.output.cutter
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.output.diagnostics
    }

    pub fn output(&self) -> &IntersectionOutput<T> {
        &self.output
    }

    pub fn element_intersected(&self, xfem_id: usize) -> bool {
        self.output.domain_cells.contains_key(&xfem_id)
    }

    /// Ids of all cut xfem elements.
    pub fn intersected_elements(&self) -> impl '_ + Iterator<Item = usize> {
        self.output.domain_cells.keys().copied()
    }

    /// The domain cells of an xfem element.
    ///
    /// An element that is not cut is covered by a single cell of its own shape spanning the whole
    /// reference element.
    pub fn domain_cells(&self, xfem_id: usize) -> Result<Cow<'_, [DomainIntCell<T>]>, MeshError> {
        match self.output.domain_cells.get(&xfem_id) {
            Some(cells) => Ok(Cow::Borrowed(cells.as_slice())),
            None => {
                let geometry = self.xfem.element_geometry(xfem_id)?;
                Ok(Cow::Owned(vec![DomainIntCell::whole_element(&geometry)]))
            }
        }
    }

    /// The boundary cells of an xfem element, empty if the element is not cut.
    pub fn boundary_cells(&self, xfem_id: usize) -> &[BoundaryIntCell<T>] {
        self.output
            .boundary_cells
            .get(&xfem_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether the domain and boundary cell maps name the same elements and every cut element
    /// has at least one boundary cell referring to a known cutter element.
    pub fn is_consistent(&self) -> bool {
        let domain: BTreeSet<_> = self.output.domain_cells.keys().collect();
        let boundary: BTreeSet<_> = self.output.boundary_cells.keys().collect();
        domain == boundary
            && self.output.boundary_cells.values().all(|cells| {
                !cells.is_empty()
                    && cells
                        .iter()
                        .all(|cell| self.output.cutter.element(cell.cutter_element_id).is_ok())
            })
    }

    /// Finds the closest point to `x` on a cutter element.
    ///
    /// If the projection onto the element's surface falls outside the element, the closest corner
    /// node is used instead.
    pub fn search_nearest_point_on_surface(
        &self,
        cutter_element_id: usize,
        x: &Point3<T>,
    ) -> Result<NearestPoint<T>, MeshError> {
        let geometry = self.output.cutter.element_geometry(cutter_element_id)?;
        Ok(nearest_point_on_element(
            cutter_element_id,
            &geometry,
            x,
            self.projection_iterations,
        ))
    }

    /// For every coupling condition, whether `x` lies on the negative side of the condition's
    /// cutter element closest to `x`.
    ///
    /// Conditions without elements on this rank are reported as `false`.
    pub fn position_within_condition(&self, x: &Point3<T>) -> Result<BTreeMap<String, bool>, MeshError> {
        let mut positions = BTreeMap::new();
        for condition in self.output.cutter.conditions() {
            let mut nearest: Option<NearestPoint<T>> = None;
            for &id in condition.elements() {
                let candidate = self.search_nearest_point_on_surface(id, x)?;
                let closer = nearest
                    .map(|current| candidate.signed_distance.abs() < current.signed_distance.abs())
                    .unwrap_or(true);
                if closer {
                    nearest = Some(candidate);
                }
            }
            let inside = nearest
                .map(|nearest| nearest.signed_distance < T::zero())
                .unwrap_or(false);
            positions.insert(condition.label().to_string(), inside);
        }
        Ok(positions)
    }
}

fn nearest_point_on_element<T: Real>(
    cutter_element_id: usize,
    geometry: &ElementGeometry<T>,
    x: &Point3<T>,
    projection_iterations: usize,
) -> NearestPoint<T> {
    let shape = geometry.shape();
    let projection = current_to_surface_coordinates(geometry, x, projection_iterations);
    let (xi, point) = if shape.contains_reference_point(&projection.xi, T::from_f64(TOL7).unwrap()) {
        (projection.xi, projection.point)
    } else {
        let reference_nodes = shape.reference_nodes::<T>();
        geometry
            .vertices()
            .iter()
            .zip(&reference_nodes)
            .take(shape.num_corner_nodes())
            .min_by(|(a, _), (b, _)| {
                distance(*a, x)
                    .partial_cmp(&distance(*b, x))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(vertex, xi)| (xi.coords, *vertex))
            .unwrap_or((projection.xi, projection.point))
    };

    let offset = x - point;
    let sign = match geometry.surface_normal(&xi) {
        Some(normal) if offset.dot(&normal) < T::zero() => -T::one(),
        _ => T::one(),
    };
    NearestPoint {
        cutter_element_id,
        xi,
        point,
        offset,
        signed_distance: sign * offset.norm(),
    }
}
