//! # Percolate Frontend
//!
//! Lexer, grammar, AST, and parse-error diagnostics for the Percolate query
//! language.

pub mod ast;
pub mod diagnostics;
pub mod errors;
pub mod parser;

// Re-export commonly used types
pub use ast::*;
pub use errors::FrontendError;
pub use parser::parse_line;
