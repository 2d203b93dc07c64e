//! Enrichment of raw parse errors into actionable diagnostics.
//!
//! Pest's errors point at the failing position but read poorly for an
//! interactive session. This module inspects the leading tokens of the
//! rejected input and attaches a usage hint for the command the user most
//! likely meant, plus targeted messages for the common mistakes: a reserved
//! keyword in identifier position, `PROB` followed by a non-decimal, and a
//! missing `FROM`/`TO`/`K`.

use pest::error::{Error, LineColLocation};

use crate::errors::FrontendError;
use crate::parser::Rule;

/// Every keyword of the language, used for reserved-word diagnostics.
pub const KEYWORDS: [&str; 29] = [
    "CREATE",
    "DELETE",
    "NODE",
    "EDGE",
    "FROM",
    "TO",
    "PROB",
    "MAXPATH",
    "TOPK",
    "REACHABILITY",
    "EXACT",
    "MONTECARLO",
    "MULTI",
    "AND",
    "OR",
    "CONDITIONAL",
    "GIVEN",
    "ACTIVE",
    "INACTIVE",
    "THRESHOLD",
    "AGGREGATE",
    "MEAN",
    "MAX",
    "MIN",
    "BESTPATH",
    "COUNTABOVE",
    "K",
    "TRUE",
    "FALSE",
];

const CREATE_NODE_USAGE: &str = "CREATE NODE <id>[, <id> ...] [{ <key>: <value>, ... }]";
const CREATE_EDGE_USAGE: &str =
    "CREATE EDGE <id> FROM <node> TO <node> PROB <decimal> [{ <key>: <value>, ... }]";
const DELETE_USAGE: &str = "DELETE NODE <id>[, <id> ...] | DELETE EDGE <id> | DELETE EDGE FROM <node> TO <node>";
const MAXPATH_USAGE: &str = "MAXPATH FROM <node> TO <node>";
const TOPK_USAGE: &str = "TOPK FROM <node> TO <node> K <int>";
const REACHABILITY_USAGE: &str = "REACHABILITY FROM <node> TO <node> [EXACT | MONTECARLO]";
const COMPOSITE_USAGE: &str = "( <query>, <query>, ... )";
const CONDITIONAL_USAGE: &str =
    "CONDITIONAL GIVEN (EDGE|NODE) <id> (ACTIVE|INACTIVE)[, ...] ( <query> )";
const THRESHOLD_USAGE: &str = "THRESHOLD <decimal> ( <query> )";
const AGGREGATE_USAGE: &str =
    "AGGREGATE (MEAN | MAX | MIN | BESTPATH | COUNTABOVE <decimal>) ( <query>, ... )";

/// Returns true if `word` matches a language keyword, ignoring case.
pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|k| word.eq_ignore_ascii_case(k))
}

/// Converts a raw Pest error into an [`FrontendError::InvalidSyntax`] with a
/// usage hint derived from the leading tokens of `input`.
pub fn enrich_parse_error(input: &str, err: &Error<Rule>) -> FrontendError {
    let (line, column) = match &err.line_col {
        LineColLocation::Pos((l, c)) => (*l, *c),
        LineColLocation::Span((l, c), _) => (*l, *c),
    };
    let hint = usage_hint(input);
    FrontendError::InvalidSyntax(format!("{hint} (at line {line}, column {column})"))
}

/// Splits the input into coarse tokens: punctuation is a separator and every
/// run of non-separator characters is one token.
fn tokens(input: &str) -> Vec<&str> {
    input
        .split(|c: char| c.is_whitespace() || "(),{}:".contains(c))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Loose decimal check matching the Float lexical class (`digits.digits`).
fn is_decimal(tok: &str) -> bool {
    match tok.split_once('.') {
        Some((int, frac)) => {
            !int.is_empty()
                && !frac.is_empty()
                && int.bytes().all(|b| b.is_ascii_digit())
                && frac.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

fn contains_kw(toks: &[&str], kw: &str) -> bool {
    toks.iter().any(|t| t.eq_ignore_ascii_case(kw))
}

/// Finds the first reserved keyword sitting where an identifier is expected.
///
/// `positions` are token indexes relative to the full token list.
fn reserved_at<'a>(toks: &[&'a str], positions: &[usize]) -> Option<&'a str> {
    positions
        .iter()
        .filter_map(|&i| toks.get(i).copied())
        .find(|t| is_keyword(t))
}

fn reserved_hint(word: &str, usage: &str) -> String {
    format!("{word:?} is a reserved keyword and cannot be used as an identifier; usage: {usage}")
}

fn missing_hint(command: &str, token: &str, usage: &str) -> String {
    format!("{command} is missing the {token} clause; usage: {usage}")
}

fn usage_hint(input: &str) -> String {
    let toks = tokens(input);
    let Some(first) = toks.first() else {
        return "empty input".to_string();
    };

    match first.to_ascii_uppercase().as_str() {
        "CREATE" => match toks.get(1).map(|t| t.to_ascii_uppercase()) {
            Some(ref t) if t == "NODE" => {
                if toks.len() < 3 {
                    format!("CREATE NODE requires at least one identifier; usage: {CREATE_NODE_USAGE}")
                } else if let Some(word) = reserved_at(&toks, &[2]) {
                    reserved_hint(word, CREATE_NODE_USAGE)
                } else {
                    format!("malformed CREATE NODE statement; usage: {CREATE_NODE_USAGE}")
                }
            }
            Some(ref t) if t == "EDGE" => create_edge_hint(&toks),
            _ => format!(
                "CREATE must be followed by NODE or EDGE; usage: {CREATE_NODE_USAGE} | {CREATE_EDGE_USAGE}"
            ),
        },
        "DELETE" => match toks.get(1).map(|t| t.to_ascii_uppercase()) {
            Some(ref t) if t == "NODE" || t == "EDGE" => {
                format!("malformed DELETE statement; usage: {DELETE_USAGE}")
            }
            _ => format!("DELETE must be followed by NODE or EDGE; usage: {DELETE_USAGE}"),
        },
        "MAXPATH" => from_to_hint("MAXPATH", &toks, MAXPATH_USAGE),
        "TOPK" => {
            if !contains_kw(&toks, "FROM") {
                missing_hint("TOPK", "FROM", TOPK_USAGE)
            } else if !contains_kw(&toks, "TO") {
                missing_hint("TOPK", "TO", TOPK_USAGE)
            } else if !contains_kw(&toks, "K") {
                missing_hint("TOPK", "K", TOPK_USAGE)
            } else {
                format!("malformed TOPK query; usage: {TOPK_USAGE}")
            }
        }
        "REACHABILITY" => from_to_hint("REACHABILITY", &toks, REACHABILITY_USAGE),
        "MULTI" => format!("malformed MULTI query; usage: MULTI {COMPOSITE_USAGE}"),
        "AND" => format!("malformed AND query; usage: AND {COMPOSITE_USAGE}"),
        "OR" => format!("malformed OR query; usage: OR {COMPOSITE_USAGE}"),
        "CONDITIONAL" => {
            if !contains_kw(&toks, "GIVEN") {
                missing_hint("CONDITIONAL", "GIVEN", CONDITIONAL_USAGE)
            } else {
                format!("malformed CONDITIONAL query; usage: {CONDITIONAL_USAGE}")
            }
        }
        "THRESHOLD" => match toks.get(1) {
            Some(t) if is_decimal(t) => {
                format!("malformed THRESHOLD query; usage: {THRESHOLD_USAGE}")
            }
            _ => format!(
                "THRESHOLD expects a decimal value such as 0.5; usage: {THRESHOLD_USAGE}"
            ),
        },
        "AGGREGATE" => format!("malformed AGGREGATE query; usage: {AGGREGATE_USAGE}"),
        other => format!(
            "unrecognized command {other:?}; expected CREATE, DELETE, MAXPATH, TOPK, \
             REACHABILITY, MULTI, AND, OR, CONDITIONAL, THRESHOLD, or AGGREGATE"
        ),
    }
}

fn create_edge_hint(toks: &[&str]) -> String {
    if !contains_kw(toks, "FROM") {
        return missing_hint("CREATE EDGE", "FROM", CREATE_EDGE_USAGE);
    }
    if !contains_kw(toks, "TO") {
        return missing_hint("CREATE EDGE", "TO", CREATE_EDGE_USAGE);
    }
    if let Some(word) = reserved_at(toks, &[2]) {
        return reserved_hint(word, CREATE_EDGE_USAGE);
    }
    // Find PROB and check the following token is a decimal literal.
    let prob_idx = toks.iter().position(|t| t.eq_ignore_ascii_case("PROB"));
    match prob_idx {
        None => missing_hint("CREATE EDGE", "PROB", CREATE_EDGE_USAGE),
        Some(i) => match toks.get(i + 1) {
            Some(next) if is_decimal(next) => {
                format!("malformed CREATE EDGE statement; usage: {CREATE_EDGE_USAGE}")
            }
            _ => format!(
                "PROB expects a decimal probability such as 0.75; usage: {CREATE_EDGE_USAGE}"
            ),
        },
    }
}

fn from_to_hint(command: &str, toks: &[&str], usage: &str) -> String {
    if !contains_kw(toks, "FROM") {
        missing_hint(command, "FROM", usage)
    } else if !contains_kw(toks, "TO") {
        missing_hint(command, "TO", usage)
    } else {
        format!("malformed {command} query; usage: {usage}")
    }
}
