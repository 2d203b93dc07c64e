//! Reachability-probability kernels: exact and Monte-Carlo.

use std::collections::VecDeque;
use std::thread;

use crossbeam_channel::bounded;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::engine::cancel::CancelToken;
use crate::engine::errors::EngineError;
use crate::engine::graph::{EdgeId, NodeId, ProbGraph};
use crate::engine::result::SampleResult;
use crate::engine::sampling::{worker_rng, IndependentEdgeSampler, CI95_Z_SCORE};

/// Computes the exact probability that `end` is reachable from `start` under
/// the independent-edge model:
///
/// ```text
/// P(v → t) = 1                                          if v == t
/// P(v → t) = 1 − ∏ (1 − p(e) · P(w → t))   over e = (v, w), w not on stack
/// ```
///
/// Implemented as a memoized depth-first traversal. Nodes already on the
/// current DFS stack contribute probability 0, which cuts cycles but
/// underestimates reachability in cyclic graphs; this is an accepted
/// approximation of the model, not a defect to fix.
pub fn exact_reachability(
    graph: &ProbGraph,
    start: &NodeId,
    end: &NodeId,
) -> Result<f64, EngineError> {
    if !graph.contains_node(start) {
        return Err(EngineError::NodeDoesNotExist(start.clone()));
    }
    if !graph.contains_node(end) {
        return Err(EngineError::NodeDoesNotExist(end.clone()));
    }

    let mut visited = FxHashSet::default();
    let mut memo = FxHashMap::default();
    dfs_reachability(graph, start, end, &mut visited, &mut memo)
}

fn dfs_reachability(
    graph: &ProbGraph,
    current: &NodeId,
    end: &NodeId,
    visited: &mut FxHashSet<NodeId>,
    memo: &mut FxHashMap<NodeId, f64>,
) -> Result<f64, EngineError> {
    if current == end {
        return Ok(1.0);
    }
    if let Some(&value) = memo.get(current) {
        return Ok(value);
    }
    if visited.contains(current) {
        // Back-edge on the current stack: the cyclic sub-computation
        // contributes zero.
        return Ok(0.0);
    }
    visited.insert(current.clone());

    let edges = graph.outgoing_edges(current)?;
    if edges.is_empty() {
        visited.remove(current);
        memo.insert(current.clone(), 0.0);
        return Ok(0.0);
    }

    let mut fail_prob = 1.0;
    for edge in edges {
        let child_prob = dfs_reachability(graph, &edge.to, end, visited, memo)?;
        let success_via_edge = edge.probability * child_prob;
        fail_prob *= 1.0 - success_via_edge;
    }

    let result = 1.0 - fail_prob;
    visited.remove(current);
    memo.insert(current.clone(), result);
    Ok(result)
}

/// BFS over a sampled world: only mask-true edges are traversable.
fn bfs_world_reachability(
    graph: &ProbGraph,
    start: &NodeId,
    end: &NodeId,
    edge_mask: &FxHashMap<EdgeId, bool>,
) -> Result<bool, EngineError> {
    if !graph.contains_node(start) {
        return Err(EngineError::NodeDoesNotExist(start.clone()));
    }
    if !graph.contains_node(end) {
        return Err(EngineError::NodeDoesNotExist(end.clone()));
    }

    let mut visited = FxHashSet::default();
    let mut queue = VecDeque::new();
    visited.insert(start.clone());
    queue.push_back(start.clone());

    while let Some(current) = queue.pop_front() {
        if current == *end {
            return Ok(true);
        }
        for edge in graph.outgoing_edges(&current)? {
            if !edge_mask.get(&edge.id).copied().unwrap_or(false) {
                continue;
            }
            if visited.insert(edge.to.clone()) {
                queue.push_back(edge.to.clone());
            }
        }
    }

    Ok(false)
}

/// Estimates reachability probability by sampling independent worlds.
///
/// The trial budget is split across `min(hardware_parallelism, num_samples)`
/// workers; worker `i` receives `⌊N/W⌋` trials plus one of the remainder.
/// Each worker owns a PCG generator derived from `(seed, worker index)` and
/// reports its tally over a bounded channel. Workers poll the cancellation
/// token between trials, so a cancelled query stops within one BFS.
///
/// The estimate is deterministic for a fixed `(seed, num_samples, worker
/// count)` triple; a different worker count re-partitions the trials and may
/// change the estimate even under the same seed.
pub fn monte_carlo_reachability(
    graph: &ProbGraph,
    start: &NodeId,
    end: &NodeId,
    num_samples: i64,
    seed: u64,
    token: &CancelToken,
) -> Result<SampleResult, EngineError> {
    if num_samples <= 0 {
        return Err(EngineError::InvalidParameter(format!(
            "num_samples must be greater than 0, got {num_samples}"
        )));
    }

    let total = num_samples as usize;
    let num_workers = num_cpus::get().clamp(1, total);
    let per_worker = total / num_workers;
    let remainder = total % num_workers;
    debug!(num_samples, num_workers, "monte-carlo fan-out");

    let (tx, rx) = bounded::<Result<(usize, usize), EngineError>>(num_workers);

    let mut successes = 0usize;
    let mut trials_done = 0usize;
    let mut first_err: Option<EngineError> = None;

    thread::scope(|scope| {
        for worker in 0..num_workers {
            let trials = per_worker + usize::from(worker < remainder);
            let tx = tx.clone();
            let token = token.clone();
            scope.spawn(move || {
                let mut sampler = IndependentEdgeSampler::new(worker_rng(seed, worker as u64));
                let mut hits = 0usize;
                for _ in 0..trials {
                    if token.is_cancelled() {
                        let _ = tx.send(Err(EngineError::Cancelled));
                        return;
                    }
                    let world = sampler.sample(graph);
                    match bfs_world_reachability(graph, start, end, &world.edge_mask) {
                        Ok(true) => hits += 1,
                        Ok(false) => {}
                        Err(e) => {
                            let _ = tx.send(Err(e));
                            return;
                        }
                    }
                }
                let _ = tx.send(Ok((hits, trials)));
            });
        }
        drop(tx);

        for outcome in rx.iter() {
            match outcome {
                Ok((hits, trials)) => {
                    successes += hits;
                    trials_done += trials;
                }
                Err(e) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }
    });

    if let Some(err) = first_err {
        return Err(err);
    }

    let estimate = successes as f64 / trials_done as f64;
    let variance = estimate * (1.0 - estimate);
    let std_err = (variance / trials_done as f64).sqrt();

    Ok(SampleResult {
        estimate,
        num_samples,
        variance,
        std_err,
        ci95_low: estimate - CI95_Z_SCORE * std_err,
        ci95_high: estimate + CI95_Z_SCORE * std_err,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::graph::PropMap;

    fn node(id: &str) -> NodeId {
        NodeId::from(id)
    }

    fn chain(probs: &[f64]) -> ProbGraph {
        let mut g = ProbGraph::new();
        for i in 0..=probs.len() {
            g.add_node(NodeId::from(format!("n{i}")), PropMap::default())
                .expect("node");
        }
        for (i, p) in probs.iter().enumerate() {
            g.add_edge(
                EdgeId::from(format!("e{i}")),
                NodeId::from(format!("n{i}")),
                NodeId::from(format!("n{}", i + 1)),
                *p,
                PropMap::default(),
            )
            .expect("edge");
        }
        g
    }

    #[test]
    fn chain_reachability_is_edge_product() {
        let g = chain(&[0.9, 0.8]);
        let p = exact_reachability(&g, &node("n0"), &node("n2")).expect("reach");
        assert!((p - 0.72).abs() < 1e-9);
    }

    #[test]
    fn parallel_paths_combine_independently() {
        // Two node-disjoint routes from S to T with probabilities 0.63 and
        // 0.48: reachability is 1 - (1-0.63)(1-0.48).
        let mut g = ProbGraph::new();
        for n in ["S", "B", "C", "T"] {
            g.add_node(node(n), PropMap::default()).expect("node");
        }
        for (id, from, to, p) in [
            ("sb", "S", "B", 0.9),
            ("bt", "B", "T", 0.7),
            ("sc", "S", "C", 0.8),
            ("ct", "C", "T", 0.6),
        ] {
            g.add_edge(id.into(), node(from), node(to), p, PropMap::default())
                .expect("edge");
        }
        let p = exact_reachability(&g, &node("S"), &node("T")).expect("reach");
        let expected = 1.0 - (1.0 - 0.63) * (1.0 - 0.48);
        assert!((p - expected).abs() < 1e-9);
    }

    #[test]
    fn same_node_is_certain() {
        let g = chain(&[0.5]);
        let p = exact_reachability(&g, &node("n0"), &node("n0")).expect("reach");
        assert_eq!(p, 1.0);
    }

    #[test]
    fn unreachable_is_zero() {
        let mut g = ProbGraph::new();
        g.add_node(node("A"), PropMap::default()).expect("node");
        g.add_node(node("B"), PropMap::default()).expect("node");
        let p = exact_reachability(&g, &node("A"), &node("B")).expect("reach");
        assert_eq!(p, 0.0);
    }

    #[test]
    fn missing_node_is_an_error() {
        let g = chain(&[0.5]);
        let err = exact_reachability(&g, &node("ghost"), &node("n1")).expect_err("missing");
        assert_eq!(err.kind(), "NodeDoesNotExist");
    }

    #[test]
    fn cycle_back_edge_contributes_zero() {
        // A -> B -> A cycle plus B -> T exit. The cyclic continuation B -> A
        // is cut while A is on the stack, so the result is exactly
        // p(A->B) * p(B->T) rather than the series-summed value.
        let mut g = ProbGraph::new();
        for n in ["A", "B", "T"] {
            g.add_node(node(n), PropMap::default()).expect("node");
        }
        for (id, from, to, p) in [
            ("ab", "A", "B", 0.5),
            ("ba", "B", "A", 0.5),
            ("bt", "B", "T", 0.5),
        ] {
            g.add_edge(id.into(), node(from), node(to), p, PropMap::default())
                .expect("edge");
        }
        let p = exact_reachability(&g, &node("A"), &node("T")).expect("reach");
        assert!((p - 0.25).abs() < 1e-9);
    }

    #[test]
    fn monte_carlo_matches_exact_within_tolerance() {
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

        let exact = exact_reachability(&g, &node("A"), &node("D")).expect("exact");
        let sample = monte_carlo_reachability(
            &g,
            &node("A"),
            &node("D"),
            10_000,
            42,
            &CancelToken::new(),
        )
        .expect("sample");

        assert!((sample.estimate - exact).abs() < 0.05);
        assert_eq!(sample.num_samples, 10_000);
        assert!(sample.ci95_low <= sample.estimate && sample.estimate <= sample.ci95_high);
        assert!(sample.std_err > 0.0);
    }

    #[test]
    fn monte_carlo_is_deterministic_for_fixed_seed() {
        let g = chain(&[0.5, 0.5]);
        let run = || {
            monte_carlo_reachability(&g, &node("n0"), &node("n2"), 2_000, 7, &CancelToken::new())
                .expect("sample")
                .estimate
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn monte_carlo_rejects_non_positive_samples() {
        let g = chain(&[0.5]);
        let err =
            monte_carlo_reachability(&g, &node("n0"), &node("n1"), 0, 1, &CancelToken::new())
                .expect_err("bad samples");
        assert_eq!(err.kind(), "InvalidParameter");
    }

    #[test]
    fn monte_carlo_observes_cancellation() {
        let g = chain(&[0.5, 0.5]);
        let token = CancelToken::new();
        token.cancel();
        let err = monte_carlo_reachability(&g, &node("n0"), &node("n2"), 1_000, 1, &token)
            .expect_err("cancelled");
        assert_eq!(err.kind(), "Cancelled");
    }

    #[test]
    fn certain_chain_estimates_one() {
        let g = chain(&[1.0, 1.0]);
        let sample =
            monte_carlo_reachability(&g, &node("n0"), &node("n2"), 500, 3, &CancelToken::new())
                .expect("sample");
        assert_eq!(sample.estimate, 1.0);
        assert_eq!(sample.variance, 0.0);
    }
}
