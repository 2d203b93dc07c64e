//! The inference engine for probabilistic graphs.
//!
//! This module provides:
//! - **errors**: Error types with stable kind tags
//! - **graph**: The probabilistic directed adjacency store and conditioning
//! - **heap**: Min-priority queue with stable tie-breaking
//! - **sampling**: Bernoulli world sampling for Monte-Carlo inference
//! - **paths**: Max-probability path and Yen top-k kernels
//! - **reachability**: Exact and Monte-Carlo reachability kernels
//! - **query**: The query algebra and its concurrent executor
//! - **reducer**: Reductions for aggregate queries
//! - **result**: The result model and its wire marshalling
//! - **cancel**: Cooperative cancellation tokens

pub mod cancel;
pub mod errors;
pub mod graph;
pub mod heap;
pub mod paths;
pub mod query;
pub mod reachability;
pub mod reducer;
pub mod result;
pub mod sampling;
