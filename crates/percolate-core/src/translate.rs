//! Translation of parsed AST lines into executable statements and queries.
//!
//! This is where semantics enter: identifiers introduced by `CREATE` are
//! re-validated (the lexer already guarantees the shape for DSL input, but
//! the check is kept as defense in depth because the store itself admits
//! arbitrary ids through deserialization), conditioning clauses are resolved
//! against the session graph, and the reachability mode keyword is mapped to
//! [`InferenceMode`] with unknown spellings surfacing as `InvalidMode`.

use percolate_frontend::{
    ConditionItemAst, LineAst, PropAst, PropValueAst, QueryAst, ReducerAst, StatementAst,
};
use tracing::debug;

use crate::engine::errors::EngineError;
use crate::engine::graph::{Condition, EdgeId, NodeId, ProbGraph, PropMap, PropValue};
use crate::engine::query::{InferenceMode, Query};
use crate::engine::reducer::Reducer;

/// A translated input line: either a mutation to apply to the session graph
/// or a query to hand to the inference engine.
#[derive(Debug, Clone)]
pub enum Directive {
    Statement(Statement),
    Query(Query),
}

/// A graph mutation.
#[derive(Debug, Clone)]
pub enum Statement {
    CreateNodes { ids: Vec<NodeId>, props: PropMap },
    CreateEdge {
        id: EdgeId,
        from: NodeId,
        to: NodeId,
        probability: f64,
        props: PropMap,
    },
    DeleteNodes { ids: Vec<NodeId> },
    DeleteEdgeBetween { from: NodeId, to: NodeId },
    DeleteEdgeById { id: EdgeId },
}

impl Statement {
    /// Applies the mutation to `graph`, failing on the first error.
    pub fn apply(&self, graph: &mut ProbGraph) -> Result<(), EngineError> {
        match self {
            Self::CreateNodes { ids, props } => {
                for id in ids {
                    graph.add_node(id.clone(), props.clone())?;
                }
                debug!(count = ids.len(), "created nodes");
                Ok(())
            }
            Self::CreateEdge {
                id,
                from,
                to,
                probability,
                props,
            } => graph.add_edge(
                id.clone(),
                from.clone(),
                to.clone(),
                *probability,
                props.clone(),
            ),
            Self::DeleteNodes { ids } => {
                for id in ids {
                    graph.remove_node(id)?;
                }
                Ok(())
            }
            Self::DeleteEdgeBetween { from, to } => graph.remove_edge(from, to),
            Self::DeleteEdgeById { id } => graph.remove_edge_by_id(id),
        }
    }
}

/// Checks the identifier rules: ASCII, `[A-Za-z_][A-Za-z0-9_]*`.
fn validate_identifier(name: &str, kind: &str) -> Result<(), EngineError> {
    let mut bytes = name.bytes();
    let valid = match bytes.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == b'_')
                && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(EngineError::InvalidIdentifier(format!(
            "{kind} identifier {name:?} is invalid: must start with a letter or underscore \
             and contain only letters, digits, and underscores"
        )))
    }
}

fn convert_props(props: &[PropAst]) -> PropMap {
    let mut map = PropMap::default();
    for prop in props {
        let value = match &prop.value {
            PropValueAst::Str(s) => PropValue::Str(s.clone()),
            PropValueAst::Float(f) => PropValue::Float(*f),
            PropValueAst::Int(i) => PropValue::Int(*i),
            PropValueAst::Bool(b) => PropValue::Bool(*b),
        };
        map.insert(prop.key.clone(), value);
    }
    map
}

/// Translates a parsed line against the session graph.
///
/// The graph is needed to resolve conditioning clauses: `GIVEN EDGE e ...`
/// looks the edge up by id so missing edges fail at translation time.
pub fn translate_line(line: &LineAst, graph: &ProbGraph) -> Result<Directive, EngineError> {
    match line {
        LineAst::Statement(stmt) => Ok(Directive::Statement(translate_statement(stmt)?)),
        LineAst::Query(query) => Ok(Directive::Query(translate_query(query, graph)?)),
    }
}

fn translate_statement(stmt: &StatementAst) -> Result<Statement, EngineError> {
    match stmt {
        StatementAst::CreateNode { ids, props } => {
            for id in ids {
                validate_identifier(id, "node")?;
            }
            Ok(Statement::CreateNodes {
                ids: ids.iter().map(|id| NodeId::from(id.as_str())).collect(),
                props: convert_props(props),
            })
        }
        StatementAst::CreateEdge {
            id,
            from,
            to,
            prob,
            props,
        } => {
            validate_identifier(id, "edge")?;
            Ok(Statement::CreateEdge {
                id: EdgeId::from(id.as_str()),
                from: NodeId::from(from.as_str()),
                to: NodeId::from(to.as_str()),
                probability: *prob,
                props: convert_props(props),
            })
        }
        StatementAst::DeleteNode { ids } => Ok(Statement::DeleteNodes {
            ids: ids.iter().map(|id| NodeId::from(id.as_str())).collect(),
        }),
        StatementAst::DeleteEdgeBetween { from, to } => Ok(Statement::DeleteEdgeBetween {
            from: NodeId::from(from.as_str()),
            to: NodeId::from(to.as_str()),
        }),
        StatementAst::DeleteEdgeById { id } => Ok(Statement::DeleteEdgeById {
            id: EdgeId::from(id.as_str()),
        }),
    }
}

fn translate_mode(mode: Option<&str>) -> Result<InferenceMode, EngineError> {
    match mode {
        None => Ok(InferenceMode::Exact),
        Some(m) if m.eq_ignore_ascii_case("EXACT") => Ok(InferenceMode::Exact),
        Some(m) if m.eq_ignore_ascii_case("MONTECARLO") => Ok(InferenceMode::MonteCarlo),
        Some(other) => Err(EngineError::InvalidMode(format!(
            "reachability mode must be EXACT or MONTECARLO, got {other:?}"
        ))),
    }
}

fn translate_query(query: &QueryAst, graph: &ProbGraph) -> Result<Query, EngineError> {
    match query {
        QueryAst::MaxPath { from, to } => Ok(Query::MaxPath {
            start: NodeId::from(from.as_str()),
            end: NodeId::from(to.as_str()),
        }),
        QueryAst::TopK { from, to, k } => Ok(Query::TopK {
            start: NodeId::from(from.as_str()),
            end: NodeId::from(to.as_str()),
            k: *k,
        }),
        QueryAst::Reachability { from, to, mode } => Ok(Query::Reachability {
            start: NodeId::from(from.as_str()),
            end: NodeId::from(to.as_str()),
            mode: translate_mode(mode.as_deref())?,
            seed: None,
        }),
        QueryAst::Multi(queries) => Ok(Query::Multi(translate_queries(queries, graph)?)),
        QueryAst::And(queries) => Ok(Query::And(translate_queries(queries, graph)?)),
        QueryAst::Or(queries) => Ok(Query::Or(translate_queries(queries, graph)?)),
        QueryAst::Conditional { conditions, inner } => Ok(Query::Conditional {
            condition: translate_condition(conditions, graph)?,
            inner: Box::new(translate_query(inner, graph)?),
        }),
        QueryAst::Threshold { threshold, inner } => Ok(Query::Threshold {
            inner: Box::new(translate_query(inner, graph)?),
            threshold: *threshold,
        }),
        QueryAst::Aggregate { reducer, queries } => {
            if queries.is_empty() {
                return Err(EngineError::InvalidStructure(
                    "aggregate requires at least one subquery".to_string(),
                ));
            }
            Ok(Query::Aggregate {
                queries: translate_queries(queries, graph)?,
                reducer: translate_reducer(reducer),
            })
        }
    }
}

fn translate_queries(
    queries: &[QueryAst],
    graph: &ProbGraph,
) -> Result<Vec<Query>, EngineError> {
    if queries.is_empty() {
        return Err(EngineError::InvalidStructure(
            "composite query requires at least one subquery".to_string(),
        ));
    }
    queries
        .iter()
        .map(|q| translate_query(q, graph))
        .collect()
}

fn translate_condition(
    items: &[ConditionItemAst],
    graph: &ProbGraph,
) -> Result<Condition, EngineError> {
    let mut condition = Condition::default();
    for item in items {
        match item {
            ConditionItemAst::Edge { id, active } => {
                let edge = graph.edge_by_id(&EdgeId::from(id.as_str()))?.clone();
                if *active {
                    condition.forced_active_edges.push(edge);
                } else {
                    condition.forced_inactive_edges.push(edge);
                }
            }
            ConditionItemAst::Node { id, active } => {
                let node = NodeId::from(id.as_str());
                if *active {
                    condition.forced_active_nodes.push(node);
                } else {
                    condition.forced_inactive_nodes.push(node);
                }
            }
        }
    }
    Ok(condition)
}

fn translate_reducer(reducer: &ReducerAst) -> Reducer {
    match reducer {
        ReducerAst::Mean => Reducer::Mean,
        ReducerAst::Max => Reducer::Max,
        ReducerAst::Min => Reducer::Min,
        ReducerAst::BestPath => Reducer::BestPath,
        ReducerAst::CountAbove(t) => Reducer::CountAbove(*t),
    }
}
