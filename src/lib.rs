//! Intersection of volumetric "xfem" discretizations with independently meshed "cutter" surfaces.
//!
//! An intersection pass finds the cutter elements overlapping every xfem element, builds the
//! linearized interface inside each cut xfem element, tetrahedralizes the element conforming to
//! that interface, moves the new vertices back onto the curved cutter surface and returns
//! domain and boundary integration cells. See [`intersection::Intersection::compute`].
pub mod candidates;
pub mod cells;
pub mod construction;
pub mod element;
pub mod error;
pub mod handle;
pub mod interface;
pub mod intersection;
pub mod io;
pub mod mesh;
pub mod recovery;
pub mod root_finding;
pub mod tessellation;
pub mod transform;

pub mod geometry {
    pub use xcut_geometry::*;
}

pub mod optimize {
    pub use xcut_optimize::*;
}

#[cfg(feature = "proptest-support")]
pub mod proptest;

pub extern crate nalgebra;
pub extern crate vtkio;

pub use xcut_traits::Real;
