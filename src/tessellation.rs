//! Tetrahedralization of cut xfem elements.
//!
//! The linearized interface of an xfem element is described as a piecewise linear complex (PLC)
//! in the element's reference coordinates and handed to a [`Tessellator`], which returns a
//! tetrahedral mesh in which every interface triangle is a union of marked faces.
use crate::interface::ElementAccumulator;
use crate::Real;
use nalgebra::{Point3, Scalar};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use xcut_geometry::polymesh::PolyMeshError;

mod arrangement;
pub use arrangement::ArrangementTessellator;

/// Marker of a PLC facet and of the output faces lying on it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FacetMarker {
    /// A facet of the xfem reference element, by local facet index.
    Boundary(usize),
    /// An interface triangle, tagged with its face marker.
    Interface(usize),
}

/// A planar facet of a PLC.
///
/// For boundary facets the first polygon is the outer boundary of the facet, followed by
/// constraint segments (two indices) and isolated points (one index). Interface facets consist
/// of a single triangle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlcFacet {
    pub polygons: Vec<Vec<usize>>,
    pub marker: FacetMarker,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plc<T: Scalar> {
    pub points: Vec<Point3<T>>,
    pub facets: Vec<PlcFacet>,
}

impl<T: Real> Plc<T> {
    /// Builds the PLC of one xfem element from its accumulated interface.
    pub fn from_accumulator(accumulator: &ElementAccumulator<T>) -> Self {
        let shape = accumulator.shape();
        let facet_corners = shape
            .facet_shape()
            .map(|facet_shape| facet_shape.num_corner_nodes())
            .unwrap_or(1);

        let mut facets = Vec::new();
        for (facet_idx, facet_nodes) in shape.facets().iter().enumerate() {
            let mut polygons = vec![facet_nodes.iter().copied().take(facet_corners).collect::<Vec<_>>()];
            polygons.extend(accumulator.segments()[facet_idx].iter().map(|s| s.to_vec()));
            polygons.extend(accumulator.surface_points()[facet_idx].iter().map(|p| vec![*p]));
            facets.push(PlcFacet {
                polygons,
                marker: FacetMarker::Boundary(facet_idx),
            });
        }

        for (triangle, marker) in accumulator.triangles().iter().zip(accumulator.face_markers()) {
            facets.push(PlcFacet {
                polygons: vec![triangle.to_vec()],
                marker: FacetMarker::Interface(*marker),
            });
        }

        Self {
            points: accumulator.points().to_vec(),
            facets,
        }
    }

    pub fn boundary_facets(&self) -> impl '_ + Iterator<Item = (usize, &PlcFacet)> {
        self.facets.iter().filter_map(|facet| match facet.marker {
            FacetMarker::Boundary(idx) => Some((idx, facet)),
            FacetMarker::Interface(_) => None,
        })
    }

    /// Interface triangles and their face markers.
    pub fn interface_triangles(&self) -> impl '_ + Iterator<Item = ([usize; 3], usize)> {
        self.facets.iter().filter_map(|facet| match (facet.marker, facet.polygons.first()) {
            (FacetMarker::Interface(marker), Some(polygon)) if polygon.len() == 3 => {
                Some(([polygon[0], polygon[1], polygon[2]], marker))
            }
            _ => None,
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TessellationOptions {
    /// Identify and report the output faces lying on interface facets.
    pub detect_constrained_facets: bool,
    /// Report the tetrahedra adjacent to every reported face.
    pub output_neighbors: bool,
    /// Report the output faces on the xfem element boundary, tagged with their facet.
    pub preserve_markers: bool,
    /// Produce tet10 elements (and tri6 faces) instead of tet4 (tri3).
    pub quadratic: bool,
}

impl Default for TessellationOptions {
    fn default() -> Self {
        Self {
            detect_constrained_facets: true,
            output_neighbors: true,
            preserve_markers: true,
            quadratic: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TessellationError {
    /// The PLC references points that do not exist or has no boundary.
    InvalidPlc(String),
    PolyMesh(PolyMeshError),
    /// The tetrahedra do not fill the element.
    VolumeMismatch { expected: f64, actual: f64 },
}

impl Display for TessellationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TessellationError::InvalidPlc(msg) => write!(f, "Invalid PLC: {}", msg),
            TessellationError::PolyMesh(err) => write!(f, "Polyhedral decomposition failed: {}", err),
            TessellationError::VolumeMismatch { expected, actual } => write!(
                f,
                "Tetrahedra have total volume {:e}, but the element has volume {:e}.",
                actual, expected
            ),
        }
    }
}

impl Error for TessellationError {}

impl From<PolyMeshError> for TessellationError {
    fn from(err: PolyMeshError) -> Self {
        TessellationError::PolyMesh(err)
    }
}

/// A triangular face of a [`TetMesh`] lying on a PLC facet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedFace {
    /// Three corners, followed by the midside nodes of the edges `(0, 1)`, `(1, 2)`, `(2, 0)`
    /// for quadratic meshes. Interface faces are oriented like the interface triangle they lie in.
    pub vertices: Vec<usize>,
    pub marker: FacetMarker,
    pub adjacent_tets: Vec<usize>,
}

impl MarkedFace {
    pub fn corners(&self) -> [usize; 3] {
        [self.vertices[0], self.vertices[1], self.vertices[2]]
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.marker, FacetMarker::Interface(_))
    }
}

/// Output of a [`Tessellator`], in the reference coordinates of the xfem element.
#[derive(Debug, Clone, PartialEq)]
pub struct TetMesh<T: Scalar> {
    /// The PLC points (same indices), followed by Steiner points and midside nodes.
    pub points: Vec<Point3<T>>,
    pub num_input_points: usize,
    /// Tetrahedra with 4 corners (plus 6 midside nodes in tet10 order for quadratic meshes).
    pub tets: Vec<Vec<usize>>,
    pub faces: Vec<MarkedFace>,
    /// Midside node of every tet edge of a quadratic mesh, by sorted corner pair.
    pub midside_nodes: BTreeMap<[usize; 2], usize>,
    /// Points already processed by curved interface recovery.
    pub visited: BTreeSet<usize>,
}

impl<T: Scalar> TetMesh<T> {
    pub fn is_steiner_point(&self, idx: usize) -> bool {
        idx >= self.num_input_points
    }

    pub fn is_quadratic(&self) -> bool {
        !self.midside_nodes.is_empty()
    }

    pub fn interface_faces(&self) -> impl '_ + Iterator<Item = (usize, &MarkedFace)> {
        self.faces
            .iter()
            .filter_map(|face| match face.marker {
                FacetMarker::Interface(marker) => Some((marker, face)),
                FacetMarker::Boundary(_) => None,
            })
    }
}

/// A constrained tetrahedralization backend.
pub trait Tessellator<T: Real> {
    fn tessellate(&self, plc: &Plc<T>, options: &TessellationOptions) -> Result<TetMesh<T>, TessellationError>;
}
