use crate::candidates::{CommunicationError, RedistributionError};
use crate::element::ElementShape;
use crate::mesh::MeshError;
use crate::tessellation::TessellationError;
use crate::transform::TransformError;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// Fatal errors aborting an intersection pass.
#[derive(Debug, Clone, PartialEq)]
pub enum IntersectionError {
    /// A coordinate transform hit a degenerate element.
    Transform { element: Option<usize>, error: TransformError },
    /// The tessellation of a cut xfem element failed.
    Tessellation { element: usize, error: TessellationError },
    /// An xfem or cutter element has a shape the engine cannot intersect.
    UnsupportedShape { element: usize, shape: ElementShape },
    /// A cutter element is claimed by more than one coupling condition.
    ConditionConflict { element: usize, first: String, second: String },
    /// An element references a node that is not present.
    MissingNode { element: usize, node: usize },
    Mesh(MeshError),
    Communication(CommunicationError),
}

impl IntersectionError {
    /// Attaches the id of the xfem element being processed to a transform error.
    pub(crate) fn in_element(self, element: usize) -> Self {
        match self {
            IntersectionError::Transform { element: None, error } => IntersectionError::Transform {
                element: Some(element),
                error,
            },
            other => other,
        }
    }
}

impl Display for IntersectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntersectionError::Transform { element: Some(element), error } => {
                write!(f, "Coordinate transform failed in element {}: {}", element, error)
            }
            IntersectionError::Transform { element: None, error } => {
                write!(f, "Coordinate transform failed: {}", error)
            }
            IntersectionError::Tessellation { element, error } => {
                write!(f, "Tessellation of element {} failed: {}", element, error)
            }
            IntersectionError::UnsupportedShape { element, shape } => {
                write!(f, "Element {} has unsupported shape {}.", element, shape)
            }
            IntersectionError::ConditionConflict { element, first, second } => write!(
                f,
                "Cutter element {} is claimed by both conditions \"{}\" and \"{}\".",
                element, first, second
            ),
            IntersectionError::MissingNode { element, node } => {
                write!(f, "Element {} references missing node {}.", element, node)
            }
            IntersectionError::Mesh(err) => write!(f, "Invalid mesh: {}", err),
            IntersectionError::Communication(err) => write!(f, "Communication failed: {}", err),
        }
    }
}

impl Error for IntersectionError {}

impl From<TransformError> for IntersectionError {
    fn from(error: TransformError) -> Self {
        IntersectionError::Transform { element: None, error }
    }
}

impl From<MeshError> for IntersectionError {
    fn from(err: MeshError) -> Self {
        match err {
            MeshError::MissingNode { element, node } => IntersectionError::MissingNode { element, node },
            MeshError::ConditionConflict { element, first, second } => {
                IntersectionError::ConditionConflict { element, first, second }
            }
            other => IntersectionError::Mesh(other),
        }
    }
}

impl From<CommunicationError> for IntersectionError {
    fn from(err: CommunicationError) -> Self {
        IntersectionError::Communication(err)
    }
}

impl From<RedistributionError> for IntersectionError {
    fn from(err: RedistributionError) -> Self {
        match err {
            RedistributionError::Communication(err) => err.into(),
            RedistributionError::Mesh(err) => err.into(),
        }
    }
}
