//! Query algebra and its concurrent executor.
//!
//! Queries form a closed sum type; [`Query::execute`] dispatches by variant.
//! Composite variants (`Multi`, `And`, `Or`, `Aggregate`) fan their
//! sub-queries out as scoped threads sharing a child cancellation token,
//! gather results in input order over a bounded channel, and apply their
//! combination after the barrier. The first task to observe an error (or
//! cancellation) cancels its siblings, and the composite returns that first
//! error once every sibling has terminated.
//!
//! The graph is never mutated during execution: `Conditional` runs its inner
//! query against a conditioned clone.

use std::thread;

use crossbeam_channel::bounded;
use tracing::debug;

use crate::engine::cancel::CancelToken;
use crate::engine::errors::EngineError;
use crate::engine::graph::{Condition, NodeId, ProbGraph};
use crate::engine::paths::{max_probability_path, top_k_paths};
use crate::engine::reachability::{exact_reachability, monte_carlo_reachability};
use crate::engine::reducer::Reducer;
use crate::engine::result::{
    BooleanResult, PathResult, PathsResult, ProbabilityResult, QueryResult,
};

/// Trial budget used by `Reachability` in Monte-Carlo mode.
pub const DEFAULT_MONTE_CARLO_SAMPLES: i64 = 10_000;

/// How a reachability query computes its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InferenceMode {
    #[default]
    Exact,
    MonteCarlo,
}

/// A query over a probabilistic graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Single most probable path between two nodes.
    MaxPath { start: NodeId, end: NodeId },
    /// Top-k most probable paths between two nodes.
    TopK { start: NodeId, end: NodeId, k: i64 },
    /// Probability that `end` is reachable from `start`.
    Reachability {
        start: NodeId,
        end: NodeId,
        mode: InferenceMode,
        seed: Option<u64>,
    },
    /// Execute the inner query on a conditioned clone of the graph.
    Conditional {
        condition: Condition,
        inner: Box<Query>,
    },
    /// Execute all sub-queries concurrently; results in input order.
    Multi(Vec<Query>),
    /// Conjunction: product of the sub-queries' probability values.
    And(Vec<Query>),
    /// Disjunction: `1 − ∏(1 − pᵢ)` over the sub-queries.
    Or(Vec<Query>),
    /// Boolean verdict on whether the inner probability meets a threshold.
    Threshold { inner: Box<Query>, threshold: f64 },
    /// Execute sub-queries concurrently and reduce the results.
    Aggregate {
        queries: Vec<Query>,
        reducer: Reducer,
    },
}

impl Query {
    /// Executes this query against `graph`.
    ///
    /// The token is checked on entry; composite variants hand a child token
    /// to their sub-queries so a failing sibling stops the rest.
    pub fn execute(
        &self,
        token: &CancelToken,
        graph: &ProbGraph,
    ) -> Result<QueryResult, EngineError> {
        if token.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        match self {
            Self::MaxPath { start, end } => {
                let path = max_probability_path(graph, start, end)?;
                Ok(QueryResult::Path(PathResult { path }))
            }
            Self::TopK { start, end, k } => {
                let paths = top_k_paths(graph, start, end, *k)?;
                Ok(QueryResult::Paths(PathsResult { paths }))
            }
            Self::Reachability {
                start,
                end,
                mode,
                seed,
            } => match mode {
                InferenceMode::Exact => {
                    let probability = exact_reachability(graph, start, end)?;
                    Ok(QueryResult::Probability(ProbabilityResult { probability }))
                }
                InferenceMode::MonteCarlo => {
                    let sample = monte_carlo_reachability(
                        graph,
                        start,
                        end,
                        DEFAULT_MONTE_CARLO_SAMPLES,
                        seed.unwrap_or_default(),
                        token,
                    )?;
                    Ok(QueryResult::Sample(sample))
                }
            },
            Self::Conditional { condition, inner } => {
                let conditioned = graph.apply_condition(condition)?;
                inner.execute(token, &conditioned)
            }
            Self::Multi(queries) => execute_concurrent(token, graph, queries, |results| {
                Ok(QueryResult::Multi(results))
            }),
            Self::And(queries) => execute_concurrent(token, graph, queries, |results| {
                let mut probability = 1.0;
                for r in &results {
                    probability *= bearing_probability(r)?;
                }
                Ok(QueryResult::Probability(ProbabilityResult { probability }))
            }),
            Self::Or(queries) => execute_concurrent(token, graph, queries, |results| {
                let mut miss_all = 1.0;
                for r in &results {
                    miss_all *= 1.0 - bearing_probability(r)?;
                }
                Ok(QueryResult::Probability(ProbabilityResult {
                    probability: 1.0 - miss_all,
                }))
            }),
            Self::Threshold { inner, threshold } => {
                if !(0.0..=1.0).contains(threshold) {
                    return Err(EngineError::InvalidParameter(format!(
                        "threshold must be between 0 and 1, got {threshold}"
                    )));
                }
                let result = inner.execute(token, graph)?;
                let probability = bearing_probability(&result)?;
                Ok(QueryResult::Boolean(BooleanResult {
                    value: probability >= *threshold,
                }))
            }
            Self::Aggregate { queries, reducer } => {
                execute_concurrent(token, graph, queries, |results| reducer.reduce(&results))
            }
        }
    }
}

fn bearing_probability(result: &QueryResult) -> Result<f64, EngineError> {
    result.probability_value().ok_or_else(|| {
        EngineError::TypeMismatch(format!(
            "inner query expected a probability-bearing result, got {}",
            result.kind()
        ))
    })
}

/// Fan-out / fan-in over scoped threads.
///
/// Results are slotted by input index regardless of completion order. On the
/// first observed error the shared child token is cancelled so the remaining
/// siblings stop early; the error is returned only after the receive loop has
/// drained every worker, i.e. after all siblings terminated.
fn execute_concurrent(
    token: &CancelToken,
    graph: &ProbGraph,
    queries: &[Query],
    combine: impl FnOnce(Vec<QueryResult>) -> Result<QueryResult, EngineError>,
) -> Result<QueryResult, EngineError> {
    if queries.is_empty() {
        return Err(EngineError::InvalidStructure(
            "query requires at least one subquery".to_string(),
        ));
    }
    debug!(subqueries = queries.len(), "composite fan-out");

    let child = token.child();
    let (tx, rx) = bounded::<(usize, Result<QueryResult, EngineError>)>(queries.len());

    let mut slots: Vec<Option<QueryResult>> = Vec::new();
    slots.resize_with(queries.len(), || None);
    let mut first_err: Option<EngineError> = None;

    thread::scope(|scope| {
        for (index, query) in queries.iter().enumerate() {
            let tx = tx.clone();
            let child = child.clone();
            scope.spawn(move || {
                let outcome = query.execute(&child, graph);
                let _ = tx.send((index, outcome));
            });
        }
        drop(tx);

        for (index, outcome) in rx.iter() {
            match outcome {
                Ok(result) => slots[index] = Some(result),
                Err(err) => {
                    child.cancel();
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
        }
    });

    if let Some(err) = first_err {
        return Err(err);
    }

    // Every slot is filled once no worker reported an error.
    let results: Vec<QueryResult> = slots.into_iter().flatten().collect();
    combine(results)
}

/// Executes queries against a fixed graph.
///
/// Thin facade over [`Query::execute`] for callers that do not manage
/// cancellation themselves.
#[derive(Debug, Clone, Copy)]
pub struct InferenceEngine<'g> {
    graph: &'g ProbGraph,
}

impl<'g> InferenceEngine<'g> {
    pub fn new(graph: &'g ProbGraph) -> Self {
        Self { graph }
    }

    /// Executes with a fresh, never-cancelled token.
    pub fn execute(&self, query: &Query) -> Result<QueryResult, EngineError> {
        query.execute(&CancelToken::new(), self.graph)
    }

    /// Executes with a caller-supplied token, e.g. one wired to a timeout.
    pub fn execute_with_token(
        &self,
        token: &CancelToken,
        query: &Query,
    ) -> Result<QueryResult, EngineError> {
        query.execute(token, self.graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::graph::PropMap;

    fn node(id: &str) -> NodeId {
        NodeId::from(id)
    }

    fn diamond() -> ProbGraph {
        let mut g = ProbGraph::new();
        for n in ["A", "B", "C", "D"] {
            g.add_node(node(n), PropMap::default()).expect("node");
        }
        for (id, from, to, p) in [
            ("ab", "A", "B", 0.9),
            ("ac", "A", "C", 0.8),
            ("bd", "B", "D", 0.7),
            ("cd", "C", "D", 0.6),
        ] {
            g.add_edge(id.into(), node(from), node(to), p, PropMap::default())
                .expect("edge");
        }
        g
    }

    fn reach(from: &str, to: &str) -> Query {
        Query::Reachability {
            start: node(from),
            end: node(to),
            mode: InferenceMode::Exact,
            seed: None,
        }
    }

    fn probability_of(result: QueryResult) -> f64 {
        match result.probability_value() {
            Some(p) => p,
            None => panic!("expected probability-bearing result, got {}", result.kind()),
        }
    }

    #[test]
    fn and_multiplies_probabilities() {
        let g = diamond();
        let q = Query::And(vec![reach("A", "B"), reach("A", "C")]);
        let p = probability_of(q.execute(&CancelToken::new(), &g).expect("execute"));
        assert!((p - 0.72).abs() < 1e-9);
    }

    #[test]
    fn or_combines_complements() {
        let g = diamond();
        let q = Query::Or(vec![reach("A", "B"), reach("A", "C")]);
        let p = probability_of(q.execute(&CancelToken::new(), &g).expect("execute"));
        assert!((p - 0.98).abs() < 1e-9);
    }

    #[test]
    fn and_or_are_commutative() {
        let g = diamond();
        for make in [Query::And, Query::Or] {
            let forward = make(vec![reach("A", "B"), reach("A", "C"), reach("B", "D")]);
            let backward = make(vec![reach("B", "D"), reach("A", "C"), reach("A", "B")]);
            let p1 = probability_of(forward.execute(&CancelToken::new(), &g).expect("execute"));
            let p2 = probability_of(backward.execute(&CancelToken::new(), &g).expect("execute"));
            assert!((p1 - p2).abs() < 1e-12);
        }
    }

    #[test]
    fn multi_preserves_input_order() {
        let g = diamond();
        let q = Query::Multi(vec![reach("A", "B"), reach("A", "C"), reach("B", "D")]);
        let QueryResult::Multi(results) = q.execute(&CancelToken::new(), &g).expect("execute")
        else {
            panic!("expected multi result");
        };
        let probs: Vec<f64> = results
            .iter()
            .filter_map(QueryResult::probability_value)
            .collect();
        assert_eq!(probs.len(), 3);
        assert!((probs[0] - 0.9).abs() < 1e-9);
        assert!((probs[1] - 0.8).abs() < 1e-9);
        assert!((probs[2] - 0.7).abs() < 1e-9);
    }

    #[test]
    fn empty_composites_are_rejected() {
        let g = diamond();
        for q in [
            Query::Multi(vec![]),
            Query::And(vec![]),
            Query::Or(vec![]),
            Query::Aggregate {
                queries: vec![],
                reducer: Reducer::Mean,
            },
        ] {
            let err = q.execute(&CancelToken::new(), &g).expect_err("empty");
            assert_eq!(err.kind(), "InvalidStructure");
        }
    }

    #[test]
    fn threshold_compares_inclusively() {
        let g = diamond();
        let make = |threshold| Query::Threshold {
            inner: Box::new(reach("A", "B")),
            threshold,
        };
        for (threshold, expected) in [(0.85, true), (0.9, true), (0.95, false)] {
            let QueryResult::Boolean(b) = make(threshold)
                .execute(&CancelToken::new(), &g)
                .expect("execute")
            else {
                panic!("expected boolean result");
            };
            assert_eq!(b.value, expected, "threshold {threshold}");
        }
    }

    #[test]
    fn threshold_validates_range() {
        let g = diamond();
        for threshold in [-0.1, 1.5] {
            let err = Query::Threshold {
                inner: Box::new(reach("A", "B")),
                threshold,
            }
            .execute(&CancelToken::new(), &g)
            .expect_err("range");
            assert_eq!(err.kind(), "InvalidParameter");
        }
    }

    #[test]
    fn threshold_requires_probability_bearing_inner() {
        let g = diamond();
        let err = Query::Threshold {
            inner: Box::new(Query::TopK {
                start: node("A"),
                end: node("D"),
                k: 2,
            }),
            threshold: 0.5,
        }
        .execute(&CancelToken::new(), &g)
        .expect_err("mismatch");
        assert_eq!(err.kind(), "TypeMismatch");
    }

    #[test]
    fn and_rejects_non_bearing_subresults() {
        let g = diamond();
        let err = Query::And(vec![
            reach("A", "B"),
            Query::Multi(vec![reach("A", "B")]),
        ])
        .execute(&CancelToken::new(), &g)
        .expect_err("mismatch");
        assert_eq!(err.kind(), "TypeMismatch");
    }

    #[test]
    fn conditional_matches_manual_edge_removal() {
        let g = diamond();
        let ab = g.edge_by_id(&"ab".into()).expect("edge").clone();
        let q = Query::Conditional {
            condition: Condition {
                forced_inactive_edges: vec![ab],
                ..Condition::default()
            },
            inner: Box::new(reach("A", "D")),
        };
        let conditioned = probability_of(q.execute(&CancelToken::new(), &g).expect("execute"));

        let mut manual = g.clone();
        manual.remove_edge(&node("A"), &node("B")).expect("remove");
        let expected =
            exact_reachability(&manual, &node("A"), &node("D")).expect("reach");
        assert!((conditioned - expected).abs() < 1e-12);
        // The session graph itself is untouched.
        assert!(g.contains_edge_by_id(&"ab".into()));
    }

    #[test]
    fn error_in_one_branch_fails_the_composite() {
        let g = diamond();
        let q = Query::And(vec![reach("A", "B"), reach("A", "ghost")]);
        let err = q.execute(&CancelToken::new(), &g).expect_err("missing node");
        assert_eq!(err.kind(), "NodeDoesNotExist");
    }

    #[test]
    fn cancelled_token_short_circuits() {
        let g = diamond();
        let token = CancelToken::new();
        token.cancel();
        let err = reach("A", "B").execute(&token, &g).expect_err("cancelled");
        assert_eq!(err.kind(), "Cancelled");
    }

    #[test]
    fn aggregate_runs_reducer_after_barrier() {
        let g = diamond();
        let q = Query::Aggregate {
            queries: vec![reach("A", "B"), reach("A", "C"), reach("B", "D")],
            reducer: Reducer::Min,
        };
        let p = probability_of(q.execute(&CancelToken::new(), &g).expect("execute"));
        assert!((p - 0.7).abs() < 1e-9);
    }

    #[test]
    fn inference_engine_facade() {
        let g = diamond();
        let engine = InferenceEngine::new(&g);
        let p = probability_of(engine.execute(&reach("A", "B")).expect("execute"));
        assert!((p - 0.9).abs() < 1e-9);
    }
}
