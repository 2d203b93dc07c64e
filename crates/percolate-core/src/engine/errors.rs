//! Error types for Percolate execution.
//!
//! Every library entry point returns `Result<T, EngineError>`; nothing on a
//! library path panics. Each variant carries a stable kind tag exposed via
//! [`EngineError::kind`] so callers (and the wire surface) can match on the
//! error class without parsing messages.

use thiserror::Error;

use crate::engine::graph::{EdgeId, NodeId};

impl From<percolate_frontend::FrontendError> for EngineError {
    fn from(err: percolate_frontend::FrontendError) -> Self {
        match err {
            percolate_frontend::FrontendError::InvalidSyntax(msg) => EngineError::InvalidSyntax(msg),
            percolate_frontend::FrontendError::InvalidIdentifier(msg) => {
                EngineError::InvalidIdentifier(msg)
            }
            other => EngineError::InvalidSyntax(format!("unexpected frontend error: {other}")),
        }
    }
}

/// Errors that can occur while mutating graphs, translating queries, or
/// executing inference.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in the future without breaking changes.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EngineError {
    /// A node with this id is already present.
    #[error("graph error (NodeAlreadyExists): node {0} already exists")]
    NodeAlreadyExists(NodeId),

    /// A referenced node is absent.
    #[error("graph error (NodeDoesNotExist): node {0} does not exist")]
    NodeDoesNotExist(NodeId),

    /// An edge with this id is already present.
    #[error("graph error (EdgeAlreadyExists): edge {0} already exists")]
    EdgeAlreadyExists(EdgeId),

    /// No edge connects the ordered pair.
    #[error("graph error (EdgeDoesNotExist): edge from {from} to {to} does not exist")]
    EdgeDoesNotExist { from: NodeId, to: NodeId },

    /// No edge has this id.
    #[error("graph error (EdgeDoesNotExist): edge {0} does not exist")]
    EdgeDoesNotExistById(EdgeId),

    /// Edge probability outside `[0, 1]`.
    #[error("graph error (InvalidEdgeProbability): probability must be between 0 and 1, got {0}")]
    InvalidEdgeProbability(f64),

    /// A conditioning clause references graph elements that do not exist.
    #[error("graph error (InvalidCondition): {0}")]
    InvalidCondition(String),

    /// An out-of-range or otherwise unusable query parameter.
    #[error("query error (InvalidParameter): {0}")]
    InvalidParameter(String),

    /// A structurally invalid query, e.g. a composite with no sub-queries.
    #[error("query error (InvalidStructure): {0}")]
    InvalidStructure(String),

    /// A nested result did not have the type the combinator requires.
    #[error("query error (TypeMismatch): {0}")]
    TypeMismatch(String),

    /// An unrecognized reachability mode.
    #[error("query error (InvalidMode): {0}")]
    InvalidMode(String),

    /// An identifier failed validation during AST translation.
    #[error("syntax error (InvalidIdentifier): {0}")]
    InvalidIdentifier(String),

    /// The input failed to parse.
    #[error("syntax error (InvalidSyntax): {0}")]
    InvalidSyntax(String),

    /// A graph document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The query was cancelled before completion.
    #[error("query cancelled")]
    Cancelled,
}

impl EngineError {
    /// Stable kind tag for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NodeAlreadyExists(_) => "NodeAlreadyExists",
            Self::NodeDoesNotExist(_) => "NodeDoesNotExist",
            Self::EdgeAlreadyExists(_) => "EdgeAlreadyExists",
            Self::EdgeDoesNotExist { .. } | Self::EdgeDoesNotExistById(_) => "EdgeDoesNotExist",
            Self::InvalidEdgeProbability(_) => "InvalidEdgeProbability",
            Self::InvalidCondition(_) => "InvalidCondition",
            Self::InvalidParameter(_) => "InvalidParameter",
            Self::InvalidStructure(_) => "InvalidStructure",
            Self::TypeMismatch(_) => "TypeMismatch",
            Self::InvalidMode(_) => "InvalidMode",
            Self::InvalidIdentifier(_) => "InvalidIdentifier",
            Self::InvalidSyntax(_) => "InvalidSyntax",
            Self::Serialization(_) => "Serialization",
            Self::Cancelled => "Cancelled",
        }
    }
}
