//! JSON serialization of graphs.
//!
//! The document schema:
//!
//! ```json
//! {
//!   "nodes": [ { "id": "A", "props": { "k": { "kind": "int", "value": 1 } } } ],
//!   "edges": [ { "id": "e", "from": "A", "to": "B", "probability": 0.5 } ]
//! }
//! ```
//!
//! Encoding uses 2-space indentation and sorts nodes and edges by id so the
//! same graph always writes the same document. Decoding rejects duplicate
//! ids, edges referencing unknown nodes, unknown property kinds, and values
//! whose JSON type does not match the declared kind; unknown fields and the
//! empty object `{}` are accepted. Integer values are truncated toward zero
//! on read, so integers within ±2⁵³ round-trip losslessly.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path as FsPath;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::engine::errors::EngineError;
use crate::engine::graph::{EdgeId, NodeId, ProbGraph, PropMap, PropValue};

#[derive(Debug, Serialize, Deserialize)]
struct StoredValue {
    kind: String,
    #[serde(default, skip_serializing_if = "JsonValue::is_null")]
    value: JsonValue,
}

/// Property entries keyed by name; a `BTreeMap` serializes as a JSON object
/// with sorted keys, keeping the encoded document deterministic.
type StoredProps = BTreeMap<String, StoredValue>;

#[derive(Debug, Serialize, Deserialize)]
struct StoredNode {
    id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    props: StoredProps,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEdge {
    id: String,
    from: String,
    to: String,
    probability: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    props: StoredProps,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredGraph {
    #[serde(default)]
    nodes: Vec<StoredNode>,
    #[serde(default)]
    edges: Vec<StoredEdge>,
}

fn marshal_value(value: &PropValue) -> StoredValue {
    match value {
        PropValue::Int(i) => StoredValue {
            kind: "int".to_string(),
            value: JsonValue::from(*i),
        },
        PropValue::Float(f) => StoredValue {
            kind: "float".to_string(),
            value: JsonValue::from(*f),
        },
        PropValue::Str(s) => StoredValue {
            kind: "string".to_string(),
            value: JsonValue::from(s.clone()),
        },
        PropValue::Bool(b) => StoredValue {
            kind: "bool".to_string(),
            value: JsonValue::from(*b),
        },
    }
}

fn unmarshal_value(stored: &StoredValue) -> Result<PropValue, EngineError> {
    let mismatch = |expected: &str| {
        EngineError::Serialization(format!(
            "expected {expected} for {:?} value, got {}",
            stored.kind,
            json_type_name(&stored.value)
        ))
    };
    match stored.kind.as_str() {
        // int and float both accept JSON numbers; int truncates toward zero.
        "int" => stored
            .value
            .as_f64()
            .map(|f| PropValue::Int(f as i64))
            .ok_or_else(|| mismatch("number")),
        "float" => stored
            .value
            .as_f64()
            .map(PropValue::Float)
            .ok_or_else(|| mismatch("number")),
        "string" => stored
            .value
            .as_str()
            .map(|s| PropValue::Str(s.to_string()))
            .ok_or_else(|| mismatch("string")),
        "bool" => stored
            .value
            .as_bool()
            .map(PropValue::Bool)
            .ok_or_else(|| mismatch("bool")),
        other => Err(EngineError::Serialization(format!(
            "unknown property value kind {other:?}"
        ))),
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn marshal_props(props: &PropMap) -> StoredProps {
    props
        .iter()
        .map(|(k, v)| (k.clone(), marshal_value(v)))
        .collect()
}

fn unmarshal_props(entries: &StoredProps, context: &str) -> Result<PropMap, EngineError> {
    let mut props = PropMap::default();
    for (key, stored) in entries {
        let value = unmarshal_value(stored)
            .map_err(|e| EngineError::Serialization(format!("{context} prop {key}: {e}")))?;
        props.insert(key.clone(), value);
    }
    Ok(props)
}

fn to_stored(graph: &ProbGraph) -> StoredGraph {
    let mut nodes: Vec<StoredNode> = graph
        .nodes()
        .map(|n| StoredNode {
            id: n.id.to_string(),
            props: marshal_props(&n.props),
        })
        .collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    let mut edges: Vec<StoredEdge> = graph
        .edges()
        .map(|e| StoredEdge {
            id: e.id.to_string(),
            from: e.from.to_string(),
            to: e.to.to_string(),
            probability: e.probability,
            props: marshal_props(&e.props),
        })
        .collect();
    edges.sort_by(|a, b| a.id.cmp(&b.id));

    StoredGraph { nodes, edges }
}

fn from_stored(stored: StoredGraph) -> Result<ProbGraph, EngineError> {
    let mut graph = ProbGraph::new();

    for node in &stored.nodes {
        let props = unmarshal_props(&node.props, &format!("node {}", node.id))?;
        graph.add_node(NodeId::from(node.id.as_str()), props)?;
    }

    for edge in &stored.edges {
        let props = unmarshal_props(&edge.props, &format!("edge {}", edge.id))?;
        graph.add_edge(
            EdgeId::from(edge.id.as_str()),
            NodeId::from(edge.from.as_str()),
            NodeId::from(edge.to.as_str()),
            edge.probability,
            props,
        )?;
    }

    Ok(graph)
}

/// Encodes a graph as indented JSON and writes it to `writer`.
pub fn write_json(graph: &ProbGraph, writer: &mut impl Write) -> Result<(), EngineError> {
    let stored = to_stored(graph);
    serde_json::to_writer_pretty(&mut *writer, &stored)
        .map_err(|e| EngineError::Serialization(format!("encoding graph JSON: {e}")))?;
    writer
        .write_all(b"\n")
        .map_err(|e| EngineError::Serialization(format!("encoding graph JSON: {e}")))
}

/// Decodes a graph from JSON read from `reader`.
pub fn read_json(reader: impl Read) -> Result<ProbGraph, EngineError> {
    let stored: StoredGraph = serde_json::from_reader(reader)
        .map_err(|e| EngineError::Serialization(format!("decoding graph JSON: {e}")))?;
    from_stored(stored)
}

/// Writes a graph to a JSON file at `path`.
pub fn save_file(graph: &ProbGraph, path: impl AsRef<FsPath>) -> Result<(), EngineError> {
    let path = path.as_ref();
    let mut file = File::create(path).map_err(|e| {
        EngineError::Serialization(format!("creating file {}: {e}", path.display()))
    })?;
    write_json(graph, &mut file)
}

/// Reads a graph from a JSON file at `path`.
pub fn load_file(path: impl AsRef<FsPath>) -> Result<ProbGraph, EngineError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        EngineError::Serialization(format!("opening file {}: {e}", path.display()))
    })?;
    read_json(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn props_serialize_as_objects() {
        let mut g = ProbGraph::new();
        let mut props = PropMap::default();
        props.insert("count".to_string(), PropValue::Int(42));
        props.insert("name".to_string(), PropValue::Str("hub".to_string()));
        g.add_node(NodeId::from("A"), props).expect("node");

        let mut buf = Vec::new();
        write_json(&g, &mut buf).expect("write");
        let v: JsonValue = serde_json::from_slice(&buf).expect("json");
        assert_eq!(v["nodes"][0]["props"]["count"]["kind"], "int");
        assert_eq!(v["nodes"][0]["props"]["count"]["value"], 42);
        assert_eq!(v["nodes"][0]["props"]["name"]["kind"], "string");
    }

    #[test]
    fn output_is_two_space_indented() {
        let mut g = ProbGraph::new();
        g.add_node(NodeId::from("A"), PropMap::default()).expect("node");
        let mut buf = Vec::new();
        write_json(&g, &mut buf).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("\n  \"nodes\""), "got: {text}");
        assert!(text.ends_with('\n'));
    }
}
