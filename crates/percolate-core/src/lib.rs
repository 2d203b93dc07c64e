//! # Percolate Core
//!
//! A probabilistic graph inference engine. Graphs are directed; each edge is
//! an independent Bernoulli random variable. The engine answers queries about
//! most-probable paths, k-best paths, and reachability probability (exact and
//! Monte-Carlo), composed through a small query algebra with a concurrent,
//! cancellable executor and a line-oriented query language.
//!
//! ```rust,ignore
//! let mut session = percolate_core::Session::new(&percolate_core::new_graph());
//! session.query("CREATE NODE A, B")?;
//! session.query("CREATE EDGE e FROM A TO B PROB 0.9")?;
//! let result = session.query("REACHABILITY FROM A TO B EXACT")?;
//! ```

pub mod engine;
pub mod session;
pub mod storage;
pub mod translate;

use std::io::{Read, Write};

// Re-export the stable library surface.
pub use engine::cancel::CancelToken;
pub use engine::errors::EngineError;
pub use engine::graph::{Condition, Edge, EdgeId, Node, NodeId, Path, ProbGraph, PropMap, PropValue};
pub use engine::query::{InferenceEngine, InferenceMode, Query, DEFAULT_MONTE_CARLO_SAMPLES};
pub use engine::reducer::Reducer;
pub use engine::result::{
    marshal_result_json, BooleanResult, PathResult, PathsResult, ProbabilityResult, QueryResult,
    SampleResult,
};
pub use session::Session;

/// Creates an empty graph.
pub fn new_graph() -> ProbGraph {
    ProbGraph::new()
}

/// Decodes a graph from JSON.
pub fn load(reader: impl Read) -> Result<ProbGraph, EngineError> {
    storage::read_json(reader)
}

/// Encodes a graph as indented JSON.
pub fn save(graph: &ProbGraph, writer: &mut impl Write) -> Result<(), EngineError> {
    storage::write_json(graph, writer)
}

/// Reads a graph from a JSON file.
pub fn load_file(path: impl AsRef<std::path::Path>) -> Result<ProbGraph, EngineError> {
    storage::load_file(path)
}

/// Writes a graph to a JSON file.
pub fn save_file(graph: &ProbGraph, path: impl AsRef<std::path::Path>) -> Result<(), EngineError> {
    storage::save_file(graph, path)
}
