//! Query result model.
//!
//! A closed sum of six variants with stable wire identifiers. Three of them
//! (Path, Probability, Sample) are *probability-bearing*: a scalar
//! probability in `[0, 1]` can be extracted, which is what the algebraic
//! combinators and most reducers operate on. The capability is modelled as
//! the [`QueryResult::probability_value`] accessor rather than a separate
//! type hierarchy so the reducers get closed-world exhaustive handling.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::engine::errors::EngineError;
use crate::engine::graph::Path;

/// A single most-probable path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    #[serde(rename = "Path")]
    pub path: Path,
}

/// A ranked list of paths, sorted by probability descending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsResult {
    #[serde(rename = "Paths")]
    pub paths: Vec<Path>,
}

/// An exact probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityResult {
    #[serde(rename = "Probability")]
    pub probability: f64,
}

/// A Monte-Carlo estimate with its sampling statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleResult {
    #[serde(rename = "Estimate")]
    pub estimate: f64,
    #[serde(rename = "NumSamples")]
    pub num_samples: i64,
    #[serde(rename = "Variance")]
    pub variance: f64,
    #[serde(rename = "StdErr")]
    pub std_err: f64,
    #[serde(rename = "CI95Low")]
    pub ci95_low: f64,
    #[serde(rename = "CI95High")]
    pub ci95_high: f64,
}

/// A threshold verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanResult {
    #[serde(rename = "Value")]
    pub value: bool,
}

/// The result of executing a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Path(PathResult),
    Paths(PathsResult),
    Probability(ProbabilityResult),
    Sample(SampleResult),
    Boolean(BooleanResult),
    Multi(Vec<QueryResult>),
}

impl QueryResult {
    /// Stable wire identifier for this variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Path(_) => "path",
            Self::Paths(_) => "paths",
            Self::Probability(_) => "probability",
            Self::Sample(_) => "sample",
            Self::Boolean(_) => "boolean",
            Self::Multi(_) => "multi",
        }
    }

    /// Extracts the scalar probability from a probability-bearing result:
    /// a path's joint probability, an exact probability, or a Monte-Carlo
    /// estimate. Returns `None` for Paths, Boolean, and Multi.
    pub fn probability_value(&self) -> Option<f64> {
        match self {
            Self::Path(r) => Some(r.path.probability),
            Self::Probability(r) => Some(r.probability),
            Self::Sample(r) => Some(r.estimate),
            Self::Paths(_) | Self::Boolean(_) | Self::Multi(_) => None,
        }
    }

    fn to_json(&self) -> Result<serde_json::Value, EngineError> {
        let data = match self {
            Self::Path(r) => to_value(r)?,
            Self::Paths(r) => to_value(r)?,
            Self::Probability(r) => to_value(r)?,
            Self::Sample(r) => to_value(r)?,
            Self::Boolean(r) => to_value(r)?,
            Self::Multi(results) => {
                let items: Result<Vec<_>, _> = results.iter().map(Self::to_json).collect();
                serde_json::Value::Array(items?)
            }
        };
        Ok(json!({ "kind": self.kind(), "data": data }))
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<serde_json::Value, EngineError> {
    serde_json::to_value(value).map_err(|e| EngineError::Serialization(e.to_string()))
}

/// Marshals a result as `{"kind": "<variant>", "data": ...}`.
///
/// Multi results marshal each sub-result recursively, so nested entries carry
/// their own `kind`/`data` envelope.
pub fn marshal_result_json(result: &QueryResult) -> Result<Vec<u8>, EngineError> {
    let value = result.to_json()?;
    serde_json::to_vec(&value).map_err(|e| EngineError::Serialization(e.to_string()))
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(r) => write!(
                f,
                "Path: {}\nProbability: {:.6}",
                r.path, r.path.probability
            ),
            Self::Paths(r) => {
                if r.paths.is_empty() {
                    return f.write_str("No paths found.");
                }
                write!(f, "Paths ({}):", r.paths.len())?;
                for (i, p) in r.paths.iter().enumerate() {
                    write!(f, "\n  {}. {} ({:.6})", i + 1, p, p.probability)?;
                }
                Ok(())
            }
            Self::Probability(r) => write!(f, "Probability: {:.6}", r.probability),
            Self::Sample(r) => write!(
                f,
                "Estimate: {:.6} (95% CI: [{:.6}, {:.6}])\nSamples: {}, Std Error: {:.6}",
                r.estimate, r.ci95_low, r.ci95_high, r.num_samples, r.std_err
            ),
            Self::Boolean(r) => write!(f, "Result: {}", r.value),
            Self::Multi(results) => {
                if results.is_empty() {
                    return f.write_str("No results.");
                }
                for (i, sub) in results.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "[{}] {}", i + 1, sub)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::graph::NodeId;

    fn path_result(nodes: &[&str], probability: f64) -> QueryResult {
        QueryResult::Path(PathResult {
            path: Path {
                nodes: nodes.iter().map(|n| NodeId::from(*n)).collect(),
                probability,
            },
        })
    }

    #[test]
    fn probability_bearing_subset() {
        assert_eq!(path_result(&["A", "B"], 0.5).probability_value(), Some(0.5));
        assert_eq!(
            QueryResult::Probability(ProbabilityResult { probability: 0.7 }).probability_value(),
            Some(0.7)
        );
        let sample = QueryResult::Sample(SampleResult {
            estimate: 0.4,
            num_samples: 100,
            variance: 0.24,
            std_err: 0.05,
            ci95_low: 0.3,
            ci95_high: 0.5,
        });
        assert_eq!(sample.probability_value(), Some(0.4));

        assert_eq!(
            QueryResult::Boolean(BooleanResult { value: true }).probability_value(),
            None
        );
        assert_eq!(
            QueryResult::Paths(PathsResult { paths: vec![] }).probability_value(),
            None
        );
        assert_eq!(QueryResult::Multi(vec![]).probability_value(), None);
    }

    #[test]
    fn marshals_path_with_wire_field_names() {
        let bytes = marshal_result_json(&path_result(&["A", "B"], 0.72)).expect("marshal");
        let v: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(v["kind"], "path");
        assert_eq!(v["data"]["Path"]["NodeIDs"][0], "A");
        assert_eq!(v["data"]["Path"]["Probability"], 0.72);
    }

    #[test]
    fn marshals_multi_recursively() {
        let multi = QueryResult::Multi(vec![
            QueryResult::Probability(ProbabilityResult { probability: 0.9 }),
            QueryResult::Boolean(BooleanResult { value: false }),
        ]);
        let bytes = marshal_result_json(&multi).expect("marshal");
        let v: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(v["kind"], "multi");
        assert_eq!(v["data"][0]["kind"], "probability");
        assert_eq!(v["data"][0]["data"]["Probability"], 0.9);
        assert_eq!(v["data"][1]["data"]["Value"], false);
    }

    #[test]
    fn marshals_sample_statistics() {
        let sample = QueryResult::Sample(SampleResult {
            estimate: 0.5,
            num_samples: 10_000,
            variance: 0.25,
            std_err: 0.005,
            ci95_low: 0.49,
            ci95_high: 0.51,
        });
        let bytes = marshal_result_json(&sample).expect("marshal");
        let v: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(v["kind"], "sample");
        for field in [
            "Estimate",
            "NumSamples",
            "Variance",
            "StdErr",
            "CI95Low",
            "CI95High",
        ] {
            assert!(v["data"].get(field).is_some(), "missing {field}");
        }
    }

    #[test]
    fn display_formats_are_human_readable() {
        assert_eq!(
            path_result(&["A", "B", "C"], 0.72).to_string(),
            "Path: A -> B -> C\nProbability: 0.720000"
        );
        assert_eq!(
            QueryResult::Boolean(BooleanResult { value: true }).to_string(),
            "Result: true"
        );
        assert_eq!(
            QueryResult::Paths(PathsResult { paths: vec![] }).to_string(),
            "No paths found."
        );
    }
}
