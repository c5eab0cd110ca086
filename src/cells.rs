//! Integration cells of cut xfem elements.
use crate::element::{ElementGeometry, ElementShape};
use crate::Real;
use nalgebra::{Point3, Scalar};
use serde::{Deserialize, Serialize};
use xcut_geometry::tetrahedron_signed_volume;

/// A volume cell of an xfem element.
///
/// Cells produced by the tessellation are `Tet4` or `Tet10`. An uncut element is represented by a
/// single cell of its own shape covering the whole reference element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct DomainIntCell<T: Scalar> {
    pub shape: ElementShape,
    /// Node coordinates in the reference frame of the xfem element.
    pub domain_coords: Vec<Point3<T>>,
    /// Node coordinates in the current configuration.
    pub physical_coords: Vec<Point3<T>>,
}

impl<T: Real> DomainIntCell<T> {
    /// A tetrahedral cell given by its nodes in the reference frame of `xfem`.
    pub fn from_domain_coords(xfem: &ElementGeometry<T>, shape: ElementShape, domain_coords: Vec<Point3<T>>) -> Self {
        let physical_coords = domain_coords
            .iter()
            .map(|xi| xfem.map_reference_coords(&xi.coords))
            .collect();
        Self {
            shape,
            domain_coords,
            physical_coords,
        }
    }

    /// The cell covering the whole reference element of `xfem`.
    pub fn whole_element(xfem: &ElementGeometry<T>) -> Self {
        let shape = xfem.shape();
        Self::from_domain_coords(xfem, shape, shape.reference_nodes())
    }

    /// Signed volume of the cell in reference coordinates of the xfem element.
    ///
    /// Quadratic cells are measured by their corners.
    pub fn reference_volume(&self) -> T {
        match self.shape {
            ElementShape::Tet4 | ElementShape::Tet10 => {
                let [a, b, c, d] = [0, 1, 2, 3].map(|i| self.domain_coords[i]);
                tetrahedron_signed_volume(&[a, b, c, d])
            }
            shape => shape.reference_measure(),
        }
    }
}

/// An interface cell of an xfem element, lying in a single cutter element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct BoundaryIntCell<T: Scalar> {
    /// `Tri3` or `Tri6`.
    pub shape: ElementShape,
    /// Global id of the cutter element the cell lies in.
    pub cutter_element_id: usize,
    /// Node coordinates in the reference frame of the xfem element.
    pub domain_coords: Vec<Point3<T>>,
    /// Node coordinates in the reference frame of the cutter element, third component zero.
    pub boundary_coords: Vec<Point3<T>>,
    /// Node coordinates in the current configuration.
    pub physical_coords: Vec<Point3<T>>,
}

impl<T: Real> BoundaryIntCell<T> {
    /// Physical area of the triangle spanned by the corners of the cell.
    pub fn area(&self) -> T {
        let [a, b, c] = [0, 1, 2].map(|i| self.physical_coords[i]);
        (b - a).cross(&(c - a)).norm() * T::from_f64(0.5).unwrap()
    }

    /// Unit normal of the cell in the current configuration, oriented like the cutter surface.
    pub fn normal(&self) -> Option<nalgebra::Vector3<T>> {
        let [a, b, c] = [0, 1, 2].map(|i| self.physical_coords[i]);
        (b - a).cross(&(c - a)).try_normalize(T::default_epsilon())
    }
}
