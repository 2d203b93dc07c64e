//! Most-probable-path kernels.
//!
//! Both kernels work on the `-ln p` transformation: maximizing a product of
//! edge probabilities is minimizing a sum of non-negative weights, so
//! Dijkstra applies. Edges with probability 0 get infinite weight and are
//! effectively excluded.

use rustc_hash::FxHashMap;

use crate::engine::errors::EngineError;
use crate::engine::graph::{NodeId, Path, ProbGraph};
use crate::engine::heap::MinHeap;

/// Finds the single most probable path from `start` to `end`.
///
/// Runs Dijkstra over `weight(e) = -ln(p(e))` and converts the minimum
/// distance back with `exp(-d)`.
///
/// - Both endpoints must exist (`NodeDoesNotExist` otherwise).
/// - `start == end` yields the trivial path `[start]` with probability 1.0.
/// - An unreachable `end` yields the empty-path sentinel, not an error.
/// - Ties between equal-weight paths resolve by the priority queue's stable
///   insertion order.
pub fn max_probability_path(
    graph: &ProbGraph,
    start: &NodeId,
    end: &NodeId,
) -> Result<Path, EngineError> {
    if !graph.contains_node(start) {
        return Err(EngineError::NodeDoesNotExist(start.clone()));
    }
    if !graph.contains_node(end) {
        return Err(EngineError::NodeDoesNotExist(end.clone()));
    }

    let mut dist: FxHashMap<NodeId, f64> =
        graph.nodes().map(|n| (n.id.clone(), f64::INFINITY)).collect();
    let mut prev: FxHashMap<NodeId, NodeId> = FxHashMap::default();
    dist.insert(start.clone(), 0.0);

    let mut queue = MinHeap::new();
    queue.push(0.0, start.clone());

    while let Some((priority, current)) = queue.pop() {
        if current == *end {
            break;
        }
        let current_dist = dist.get(&current).copied().unwrap_or(f64::INFINITY);
        if priority > current_dist {
            continue; // stale queue entry
        }

        for edge in graph.outgoing_edges(&current)? {
            let weight = -edge.probability.ln();
            let alt = current_dist + weight;
            let best = dist.get(&edge.to).copied().unwrap_or(f64::INFINITY);
            if alt < best {
                dist.insert(edge.to.clone(), alt);
                prev.insert(edge.to.clone(), current.clone());
                queue.push(alt, edge.to.clone());
            }
        }
    }

    let end_dist = dist.get(end).copied().unwrap_or(f64::INFINITY);
    if end_dist.is_infinite() {
        return Ok(Path::empty());
    }

    let mut nodes = Vec::new();
    let mut at = end.clone();
    loop {
        nodes.push(at.clone());
        if at == *start {
            break;
        }
        match prev.get(&at) {
            Some(p) => at = p.clone(),
            // dist[end] finite guarantees a complete predecessor chain.
            None => return Ok(Path::empty()),
        }
    }
    nodes.reverse();

    Ok(Path {
        nodes,
        probability: (-end_dist).exp(),
    })
}

/// Joint probability of a node sequence against `graph`, or 0.0 if any hop
/// is missing.
fn path_probability(graph: &ProbGraph, nodes: &[NodeId]) -> f64 {
    let mut prob = 1.0;
    for pair in nodes.windows(2) {
        match graph.edge(&pair[0], &pair[1]) {
            Ok(edge) => prob *= edge.probability,
            Err(_) => return 0.0,
        }
    }
    prob
}

/// Returns true if `prefix` is a prefix of `nodes`.
fn has_prefix(nodes: &[NodeId], prefix: &[NodeId]) -> bool {
    nodes.len() >= prefix.len() && nodes[..prefix.len()] == *prefix
}

/// Finds the top `k` most probable paths from `start` to `end` using Yen's
/// K-shortest-paths algorithm over the `-ln p` transformation.
///
/// Each iteration deviates from the previous best path at every spur index,
/// removing the edges that would recreate already-accepted paths sharing the
/// same root. Candidates are deduplicated by node-sequence equality, and each
/// accepted path's probability is computed against the original graph.
///
/// The result is sorted by probability descending. Fewer than `k` paths is a
/// normal outcome when fewer distinct paths exist. `k <= 0` fails with
/// `InvalidParameter`.
pub fn top_k_paths(
    graph: &ProbGraph,
    start: &NodeId,
    end: &NodeId,
    k: i64,
) -> Result<Vec<Path>, EngineError> {
    if k <= 0 {
        return Err(EngineError::InvalidParameter(format!(
            "k must be greater than 0, got {k}"
        )));
    }

    let first = max_probability_path(graph, start, end)?;
    if first.is_empty() {
        return Ok(Vec::new());
    }

    let mut results = vec![first];
    let mut candidates: Vec<Path> = Vec::new();

    for i in 1..k as usize {
        let prev_path = results[i - 1].clone();

        for spur_idx in 0..prev_path.nodes.len().saturating_sub(1) {
            let spur_node = &prev_path.nodes[spur_idx];
            let root = &prev_path.nodes[..spur_idx + 1];

            let mut deviated = graph.clone();
            for accepted in &results {
                if accepted.nodes.len() > spur_idx && has_prefix(&accepted.nodes, root) {
                    let from = &accepted.nodes[spur_idx];
                    let to = &accepted.nodes[spur_idx + 1];
                    // Already removed for an earlier accepted path is fine.
                    let _ = deviated.remove_edge(from, to);
                }
            }

            let spur_path = match max_probability_path(&deviated, spur_node, end) {
                Ok(p) if !p.is_empty() => p,
                _ => continue,
            };

            let mut full_nodes: Vec<NodeId> = root[..root.len() - 1].to_vec();
            full_nodes.extend(spur_path.nodes);

            if candidates.iter().any(|c| c.nodes == full_nodes) {
                continue;
            }

            let probability = path_probability(graph, &full_nodes);
            candidates.push(Path {
                nodes: full_nodes,
                probability,
            });
        }

        if candidates.is_empty() {
            break;
        }

        let mut best_idx = 0;
        for (j, candidate) in candidates.iter().enumerate().skip(1) {
            if candidate.probability > candidates[best_idx].probability {
                best_idx = j;
            }
        }
        results.push(candidates.swap_remove(best_idx));
    }

    results.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    Ok(results)
}
