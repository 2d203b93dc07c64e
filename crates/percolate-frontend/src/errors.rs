//! Error types for parsing the query language.

use thiserror::Error;

/// Errors produced by the frontend.
///
/// Every variant carries a stable kind tag (see [`FrontendError::kind`]) so
/// downstream layers can match on the error class without string parsing.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum FrontendError {
    /// The input failed to parse; the message includes a usage hint keyed to
    /// the leading tokens of the input.
    #[error("syntax error (InvalidSyntax): {0}")]
    InvalidSyntax(String),

    /// An identifier failed the identifier rules at AST construction time.
    #[error("syntax error (InvalidIdentifier): {0}")]
    InvalidIdentifier(String),
}

impl FrontendError {
    /// Stable kind tag for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidSyntax(_) => "InvalidSyntax",
            Self::InvalidIdentifier(_) => "InvalidIdentifier",
        }
    }
}
