//! Parser for the Percolate query language, built on the Pest parser
//! generator.
//!
//! The parser transforms a single input line into a typed AST without
//! performing semantic validation: identifiers are kept as raw strings and no
//! graph lookups happen here. Numbers are parsed at parse time so later
//! stages never re-parse literals.
//!
//! The grammar is defined in `grammar.pest` using Pest's PEG syntax. Raw
//! Pest errors are enriched with usage hints in [`crate::diagnostics`].

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::ast::*;
use crate::diagnostics::enrich_parse_error;
use crate::errors::FrontendError;

#[derive(Parser)]
#[grammar = "../grammar.pest"]
pub struct PercolateParser;

/// Parses one input line into an AST.
///
/// # Arguments
///
/// * `source` - A single statement or query, e.g. `MAXPATH FROM a TO b`
///
/// # Returns
///
/// * `Ok(LineAst)` - Successfully parsed line
/// * `Err(FrontendError::InvalidSyntax)` - Parse failure with a usage hint
pub fn parse_line(source: &str) -> Result<LineAst, FrontendError> {
    let mut pairs = PercolateParser::parse(Rule::input, source)
        .map_err(|e| enrich_parse_error(source, &e))?;

    let input = pairs
        .next()
        .ok_or_else(|| FrontendError::InvalidSyntax("empty input".to_string()))?;
    debug_assert_eq!(input.as_rule(), Rule::input);

    let line = input
        .into_inner()
        .find(|p| p.as_rule() == Rule::line)
        .ok_or_else(|| FrontendError::InvalidSyntax("empty input".to_string()))?;

    let node = line
        .into_inner()
        .next()
        .ok_or_else(|| FrontendError::InvalidSyntax("empty input".to_string()))?;

    match node.as_rule() {
        Rule::statement => Ok(LineAst::Statement(build_statement(node)?)),
        Rule::query => Ok(LineAst::Query(build_query(node)?)),
        _ => Err(FrontendError::InvalidSyntax("empty input".to_string())),
    }
}

fn malformed(what: &str) -> FrontendError {
    FrontendError::InvalidSyntax(format!("malformed {what}"))
}

fn parse_float(pair: &Pair<Rule>) -> Result<f64, FrontendError> {
    pair.as_str()
        .parse::<f64>()
        .map_err(|_| FrontendError::InvalidSyntax(format!("invalid number {:?}", pair.as_str())))
}

fn parse_int(pair: &Pair<Rule>) -> Result<i64, FrontendError> {
    pair.as_str()
        .parse::<i64>()
        .map_err(|_| FrontendError::InvalidSyntax(format!("invalid integer {:?}", pair.as_str())))
}

/// Strips the surrounding quotes from a string literal.
///
/// Escape sequences are preserved as written; property values round-trip the
/// raw source text between the quotes. Exactly one quote is removed per side
/// so a literal ending in an escaped quote keeps its backslash-quote pair.
fn unquote_string(s: &str) -> String {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
        .to_string()
}

fn build_statement(pair: Pair<Rule>) -> Result<StatementAst, FrontendError> {
    let stmt = pair
        .into_inner()
        .next()
        .ok_or_else(|| malformed("statement"))?;
    match stmt.as_rule() {
        Rule::create_stmt => build_create(stmt),
        Rule::delete_stmt => build_delete(stmt),
        _ => Err(malformed("statement")),
    }
}

fn build_create(pair: Pair<Rule>) -> Result<StatementAst, FrontendError> {
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::create_node => {
                let mut ids = Vec::new();
                let mut props = Vec::new();
                for c in p.into_inner() {
                    match c.as_rule() {
                        Rule::ident => ids.push(c.as_str().to_string()),
                        Rule::props => props = build_props(c)?,
                        _ => {}
                    }
                }
                if ids.is_empty() {
                    return Err(malformed("CREATE NODE statement"));
                }
                return Ok(StatementAst::CreateNode { ids, props });
            }
            Rule::create_edge => {
                let mut ids = Vec::new();
                let mut prob = None;
                let mut props = Vec::new();
                for c in p.into_inner() {
                    match c.as_rule() {
                        Rule::ident => ids.push(c.as_str().to_string()),
                        Rule::float => prob = Some(parse_float(&c)?),
                        Rule::props => props = build_props(c)?,
                        _ => {}
                    }
                }
                let [id, from, to]: [String; 3] = ids
                    .try_into()
                    .map_err(|_| malformed("CREATE EDGE statement"))?;
                let prob = prob.ok_or_else(|| malformed("CREATE EDGE statement"))?;
                return Ok(StatementAst::CreateEdge {
                    id,
                    from,
                    to,
                    prob,
                    props,
                });
            }
            _ => {}
        }
    }
    Err(malformed("CREATE statement"))
}

fn build_delete(pair: Pair<Rule>) -> Result<StatementAst, FrontendError> {
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::delete_node => {
                let ids: Vec<String> = p
                    .into_inner()
                    .filter(|c| c.as_rule() == Rule::ident)
                    .map(|c| c.as_str().to_string())
                    .collect();
                if ids.is_empty() {
                    return Err(malformed("DELETE NODE statement"));
                }
                return Ok(StatementAst::DeleteNode { ids });
            }
            Rule::delete_edge => {
                for c in p.into_inner() {
                    match c.as_rule() {
                        Rule::delete_edge_between => {
                            let mut idents = c
                                .into_inner()
                                .filter(|i| i.as_rule() == Rule::ident)
                                .map(|i| i.as_str().to_string());
                            let from = idents
                                .next()
                                .ok_or_else(|| malformed("DELETE EDGE statement"))?;
                            let to = idents
                                .next()
                                .ok_or_else(|| malformed("DELETE EDGE statement"))?;
                            return Ok(StatementAst::DeleteEdgeBetween { from, to });
                        }
                        Rule::delete_edge_by_id => {
                            let id = c
                                .into_inner()
                                .find(|i| i.as_rule() == Rule::ident)
                                .map(|i| i.as_str().to_string())
                                .ok_or_else(|| malformed("DELETE EDGE statement"))?;
                            return Ok(StatementAst::DeleteEdgeById { id });
                        }
                        _ => {}
                    }
                }
                return Err(malformed("DELETE EDGE statement"));
            }
            _ => {}
        }
    }
    Err(malformed("DELETE statement"))
}

fn build_props(pair: Pair<Rule>) -> Result<Vec<PropAst>, FrontendError> {
    let mut out = Vec::new();
    for prop in pair.into_inner() {
        if prop.as_rule() != Rule::prop {
            continue;
        }
        let mut key = None;
        let mut value = None;
        for c in prop.into_inner() {
            match c.as_rule() {
                Rule::ident => key = Some(c.as_str().to_string()),
                Rule::prop_value => value = Some(build_prop_value(c)?),
                _ => {}
            }
        }
        match (key, value) {
            (Some(key), Some(value)) => out.push(PropAst { key, value }),
            _ => return Err(malformed("property entry")),
        }
    }
    Ok(out)
}

fn build_prop_value(pair: Pair<Rule>) -> Result<PropValueAst, FrontendError> {
    let v = pair
        .into_inner()
        .next()
        .ok_or_else(|| malformed("property value"))?;
    match v.as_rule() {
        Rule::string => Ok(PropValueAst::Str(unquote_string(v.as_str()))),
        Rule::float => Ok(PropValueAst::Float(parse_float(&v)?)),
        Rule::int => Ok(PropValueAst::Int(parse_int(&v)?)),
        Rule::kw_true => Ok(PropValueAst::Bool(true)),
        Rule::kw_false => Ok(PropValueAst::Bool(false)),
        _ => Err(malformed("property value")),
    }
}

fn build_query(pair: Pair<Rule>) -> Result<QueryAst, FrontendError> {
    let q = pair.into_inner().next().ok_or_else(|| malformed("query"))?;
    match q.as_rule() {
        Rule::maxpath_query => {
            let (from, to) = two_idents(q, "MAXPATH query")?;
            Ok(QueryAst::MaxPath { from, to })
        }
        Rule::topk_query => {
            let mut from = None;
            let mut to = None;
            let mut k = None;
            for c in q.into_inner() {
                match c.as_rule() {
                    Rule::ident if from.is_none() => from = Some(c.as_str().to_string()),
                    Rule::ident => to = Some(c.as_str().to_string()),
                    Rule::int => k = Some(parse_int(&c)?),
                    _ => {}
                }
            }
            match (from, to, k) {
                (Some(from), Some(to), Some(k)) => Ok(QueryAst::TopK { from, to, k }),
                _ => Err(malformed("TOPK query")),
            }
        }
        Rule::reachability_query => {
            let mut from = None;
            let mut to = None;
            let mut mode = None;
            for c in q.into_inner() {
                match c.as_rule() {
                    Rule::ident if from.is_none() => from = Some(c.as_str().to_string()),
                    Rule::ident => to = Some(c.as_str().to_string()),
                    Rule::reach_mode => mode = Some(c.as_str().to_string()),
                    _ => {}
                }
            }
            match (from, to) {
                (Some(from), Some(to)) => Ok(QueryAst::Reachability { from, to, mode }),
                _ => Err(malformed("REACHABILITY query")),
            }
        }
        Rule::multi_query => Ok(QueryAst::Multi(build_query_list(q)?)),
        Rule::and_query => Ok(QueryAst::And(build_query_list(q)?)),
        Rule::or_query => Ok(QueryAst::Or(build_query_list(q)?)),
        Rule::conditional_query => {
            let mut conditions = Vec::new();
            let mut inner = None;
            for c in q.into_inner() {
                match c.as_rule() {
                    Rule::condition_item => conditions.push(build_condition_item(c)?),
                    Rule::query => inner = Some(build_query(c)?),
                    _ => {}
                }
            }
            let inner = inner.ok_or_else(|| malformed("CONDITIONAL query"))?;
            Ok(QueryAst::Conditional {
                conditions,
                inner: Box::new(inner),
            })
        }
        Rule::threshold_query => {
            let mut threshold = None;
            let mut inner = None;
            for c in q.into_inner() {
                match c.as_rule() {
                    Rule::float => threshold = Some(parse_float(&c)?),
                    Rule::query => inner = Some(build_query(c)?),
                    _ => {}
                }
            }
            match (threshold, inner) {
                (Some(threshold), Some(inner)) => Ok(QueryAst::Threshold {
                    threshold,
                    inner: Box::new(inner),
                }),
                _ => Err(malformed("THRESHOLD query")),
            }
        }
        Rule::aggregate_query => {
            let mut reducer = None;
            let mut queries = Vec::new();
            for c in q.into_inner() {
                match c.as_rule() {
                    Rule::reducer => reducer = Some(build_reducer(c)?),
                    Rule::query_list => queries = build_queries(c)?,
                    _ => {}
                }
            }
            let reducer = reducer.ok_or_else(|| malformed("AGGREGATE query"))?;
            Ok(QueryAst::Aggregate { reducer, queries })
        }
        _ => Err(malformed("query")),
    }
}

/// Extracts the two identifiers of a `FROM <a> TO <b>` clause.
fn two_idents(pair: Pair<Rule>, what: &str) -> Result<(String, String), FrontendError> {
    let mut idents = pair
        .into_inner()
        .filter(|c| c.as_rule() == Rule::ident)
        .map(|c| c.as_str().to_string());
    let from = idents.next().ok_or_else(|| malformed(what))?;
    let to = idents.next().ok_or_else(|| malformed(what))?;
    Ok((from, to))
}

fn build_query_list(pair: Pair<Rule>) -> Result<Vec<QueryAst>, FrontendError> {
    let list = pair
        .into_inner()
        .find(|c| c.as_rule() == Rule::query_list)
        .ok_or_else(|| malformed("query list"))?;
    build_queries(list)
}

fn build_queries(list: Pair<Rule>) -> Result<Vec<QueryAst>, FrontendError> {
    list.into_inner()
        .filter(|c| c.as_rule() == Rule::query)
        .map(build_query)
        .collect()
}

fn build_condition_item(pair: Pair<Rule>) -> Result<ConditionItemAst, FrontendError> {
    let item = pair
        .into_inner()
        .next()
        .ok_or_else(|| malformed("GIVEN clause"))?;
    let is_edge = item.as_rule() == Rule::edge_condition;
    let mut id = None;
    let mut active = None;
    for c in item.into_inner() {
        match c.as_rule() {
            Rule::ident => id = Some(c.as_str().to_string()),
            Rule::cond_state => {
                let state = c
                    .into_inner()
                    .next()
                    .ok_or_else(|| malformed("GIVEN clause"))?;
                active = Some(state.as_rule() == Rule::kw_active);
            }
            _ => {}
        }
    }
    match (id, active) {
        (Some(id), Some(active)) if is_edge => Ok(ConditionItemAst::Edge { id, active }),
        (Some(id), Some(active)) => Ok(ConditionItemAst::Node { id, active }),
        _ => Err(malformed("GIVEN clause")),
    }
}

fn build_reducer(pair: Pair<Rule>) -> Result<ReducerAst, FrontendError> {
    let r = pair
        .into_inner()
        .next()
        .ok_or_else(|| malformed("reducer"))?;
    match r.as_rule() {
        Rule::kw_mean => Ok(ReducerAst::Mean),
        Rule::kw_max => Ok(ReducerAst::Max),
        Rule::kw_min => Ok(ReducerAst::Min),
        Rule::kw_bestpath => Ok(ReducerAst::BestPath),
        Rule::count_above => {
            let t = r
                .into_inner()
                .find(|c| c.as_rule() == Rule::float)
                .ok_or_else(|| malformed("COUNTABOVE reducer"))?;
            Ok(ReducerAst::CountAbove(parse_float(&t)?))
        }
        _ => Err(malformed("reducer")),
    }
}
