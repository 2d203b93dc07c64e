//! World sampling for Monte-Carlo inference.
//!
//! A *world* is a deterministic graph obtained by sampling each edge's
//! presence as an independent Bernoulli trial. Worlds are represented as an
//! edge mask over the original graph rather than materialized clones.

use rand::Rng;
use rand_pcg::Pcg64;
use rustc_hash::FxHashMap;

use crate::engine::graph::{EdgeId, ProbGraph};

/// z-score for a two-sided 95% confidence interval.
pub const CI95_Z_SCORE: f64 = 1.959964;

/// Stream-derivation constant mixed into per-worker seeds.
const SEED_STREAM_MIX: u64 = 0xDA94_2042_E4DD_58B5;

/// One sampled world: each edge is present (`true`) with its own probability.
#[derive(Debug, Clone)]
pub struct SampledWorld {
    pub edge_mask: FxHashMap<EdgeId, bool>,
}

/// Samples worlds by flipping an independent Bernoulli coin per edge.
///
/// Owns its RNG; Monte-Carlo workers each construct their own sampler so no
/// RNG state is ever shared.
#[derive(Debug)]
pub struct IndependentEdgeSampler<R> {
    rng: R,
}

impl<R: Rng> IndependentEdgeSampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Draws one world from the graph's edge distribution.
    pub fn sample(&mut self, graph: &ProbGraph) -> SampledWorld {
        let mut edge_mask =
            FxHashMap::with_capacity_and_hasher(graph.edge_count(), Default::default());
        for edge in graph.edges() {
            let present = self.rng.gen::<f64>() <= edge.probability;
            edge_mask.insert(edge.id.clone(), present);
        }
        SampledWorld { edge_mask }
    }
}

/// Builds the PCG generator for one Monte-Carlo worker.
///
/// Worker `i` is seeded from `(seed + i, (seed XOR mix) + i)` so that workers
/// draw from disjoint streams while the whole run stays reproducible for a
/// fixed `(seed, worker count)` pair.
pub(crate) fn worker_rng(seed: u64, worker: u64) -> Pcg64 {
    let state = seed.wrapping_add(worker);
    let stream = (seed ^ SEED_STREAM_MIX).wrapping_add(worker);
    Pcg64::new(u128::from(state), u128::from(stream))
}
