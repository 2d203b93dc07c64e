//! Reducers for `AGGREGATE` queries.
//!
//! A closed sum of five variants, kept as an enum (not an open trait) so
//! aggregation stays exhaustively type-checked.

use crate::engine::errors::EngineError;
use crate::engine::result::{PathResult, ProbabilityResult, QueryResult};

/// A named reduction over the results of an aggregate's sub-queries.
#[derive(Debug, Clone, PartialEq)]
pub enum Reducer {
    /// Arithmetic mean of the probability values.
    Mean,
    /// Maximum probability value.
    Max,
    /// Minimum probability value.
    Min,
    /// The path result with the highest joint probability.
    BestPath,
    /// Fraction of probability values at or above the threshold.
    CountAbove(f64),
}

impl Reducer {
    /// Applies the reduction. Inputs must be probability-bearing (or Path
    /// results for [`Reducer::BestPath`]); anything else is a `TypeMismatch`.
    pub fn reduce(&self, results: &[QueryResult]) -> Result<QueryResult, EngineError> {
        if results.is_empty() {
            return Err(EngineError::InvalidStructure(
                "aggregate requires at least one result to reduce".to_string(),
            ));
        }

        match self {
            Self::Mean => {
                let mut sum = 0.0;
                for r in results {
                    sum += probability_of(r)?;
                }
                Ok(probability(sum / results.len() as f64))
            }
            Self::Max => {
                let mut max = 0.0f64;
                for r in results {
                    max = max.max(probability_of(r)?);
                }
                Ok(probability(max))
            }
            Self::Min => {
                let mut min = 1.0f64;
                for r in results {
                    min = min.min(probability_of(r)?);
                }
                Ok(probability(min))
            }
            Self::BestPath => {
                let mut best: Option<&PathResult> = None;
                for r in results {
                    let QueryResult::Path(pr) = r else {
                        return Err(EngineError::TypeMismatch(format!(
                            "bestpath reducer expected a path result, got {}",
                            r.kind()
                        )));
                    };
                    let better = best
                        .map(|b| pr.path.probability > b.path.probability)
                        .unwrap_or(true);
                    if better {
                        best = Some(pr);
                    }
                }
                match best {
                    Some(pr) => Ok(QueryResult::Path(pr.clone())),
                    None => Err(EngineError::InvalidStructure(
                        "aggregate requires at least one result to reduce".to_string(),
                    )),
                }
            }
            Self::CountAbove(threshold) => {
                if !(0.0..=1.0).contains(threshold) {
                    return Err(EngineError::InvalidParameter(format!(
                        "countabove threshold must be between 0 and 1, got {threshold}"
                    )));
                }
                let mut count = 0usize;
                for r in results {
                    if probability_of(r)? >= *threshold {
                        count += 1;
                    }
                }
                Ok(probability(count as f64 / results.len() as f64))
            }
        }
    }
}

fn probability_of(result: &QueryResult) -> Result<f64, EngineError> {
    result.probability_value().ok_or_else(|| {
        EngineError::TypeMismatch(format!(
            "reducer expected a probability-bearing result, got {}",
            result.kind()
        ))
    })
}

fn probability(p: f64) -> QueryResult {
    QueryResult::Probability(ProbabilityResult { probability: p })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::graph::{NodeId, Path};
    use crate::engine::result::{BooleanResult, SampleResult};

    fn prob(p: f64) -> QueryResult {
        QueryResult::Probability(ProbabilityResult { probability: p })
    }

    fn path(nodes: &[&str], p: f64) -> QueryResult {
        QueryResult::Path(PathResult {
            path: Path {
                nodes: nodes.iter().map(|n| NodeId::from(*n)).collect(),
                probability: p,
            },
        })
    }

    fn unwrap_probability(r: QueryResult) -> f64 {
        match r {
            QueryResult::Probability(p) => p.probability,
            other => panic!("expected probability result, got {}", other.kind()),
        }
    }

    #[test]
    fn mean_averages_probabilities() {
        let r = Reducer::Mean.reduce(&[prob(0.9), prob(0.8)]).expect("reduce");
        assert!((unwrap_probability(r) - 0.85).abs() < 1e-9);
    }

    #[test]
    fn mean_accepts_any_probability_bearing_result() {
        let sample = QueryResult::Sample(SampleResult {
            estimate: 0.6,
            num_samples: 100,
            variance: 0.24,
            std_err: 0.05,
            ci95_low: 0.5,
            ci95_high: 0.7,
        });
        let r = Reducer::Mean
            .reduce(&[prob(0.4), sample, path(&["A", "B"], 0.8)])
            .expect("reduce");
        assert!((unwrap_probability(r) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn max_and_min_select_extremes() {
        let inputs = [prob(0.9), prob(0.8), prob(0.7)];
        assert!((unwrap_probability(Reducer::Max.reduce(&inputs).expect("max")) - 0.9).abs() < 1e-9);
        assert!((unwrap_probability(Reducer::Min.reduce(&inputs).expect("min")) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn best_path_selects_highest_probability() {
        let r = Reducer::BestPath
            .reduce(&[path(&["A", "B", "D"], 0.63), path(&["A", "B"], 0.9)])
            .expect("reduce");
        let QueryResult::Path(pr) = r else {
            panic!("expected path result");
        };
        assert_eq!(pr.path.probability, 0.9);
        assert_eq!(pr.path.nodes, vec![NodeId::from("A"), NodeId::from("B")]);
    }

    #[test]
    fn best_path_rejects_non_path_inputs() {
        let err = Reducer::BestPath
            .reduce(&[path(&["A", "B"], 0.9), prob(0.5)])
            .expect_err("mismatch");
        assert_eq!(err.kind(), "TypeMismatch");
    }

    #[test]
    fn count_above_counts_inclusive() {
        let r = Reducer::CountAbove(0.75)
            .reduce(&[prob(0.9), prob(0.8), prob(0.7)])
            .expect("reduce");
        assert!((unwrap_probability(r) - 2.0 / 3.0).abs() < 1e-9);

        // Threshold comparison is >=, so an exact hit counts.
        let r = Reducer::CountAbove(0.8)
            .reduce(&[prob(0.8)])
            .expect("reduce");
        assert_eq!(unwrap_probability(r), 1.0);
    }

    #[test]
    fn count_above_validates_threshold() {
        let err = Reducer::CountAbove(1.5)
            .reduce(&[prob(0.5)])
            .expect_err("bad threshold");
        assert_eq!(err.kind(), "InvalidParameter");
    }

    #[test]
    fn probability_reducers_reject_boolean_inputs() {
        for reducer in [Reducer::Mean, Reducer::Max, Reducer::Min, Reducer::CountAbove(0.5)] {
            let err = reducer
                .reduce(&[QueryResult::Boolean(BooleanResult { value: true })])
                .expect_err("mismatch");
            assert_eq!(err.kind(), "TypeMismatch");
        }
    }

    #[test]
    fn empty_input_is_structurally_invalid() {
        let err = Reducer::Mean.reduce(&[]).expect_err("empty");
        assert_eq!(err.kind(), "InvalidStructure");
    }
}
