//! Property-graph value model shared by the driver boundary and the mapper

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Properties of a node or relationship
pub type PropertyMap = BTreeMap<String, Value>;

/// Named statement parameters
pub type Params = BTreeMap<String, Value>;

/// A value as exchanged with the graph database
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Node(Node),
    Relationship(Relationship),
    Path(Path),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(p) => Some(p),
            _ => None,
        }
    }

    /// Convert a JSON value into a graph value.
    ///
    /// Integers that fit in `i64` stay integers; everything else numeric
    /// becomes a float.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    n.as_f64().map(Self::Float).unwrap_or(Self::Null)
                }
            }
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert a graph value into JSON. Nodes and relationships collapse to
    /// their property maps; non-finite floats become null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => properties_to_json(map),
            Self::Node(node) => properties_to_json(&node.properties),
            Self::Relationship(rel) => properties_to_json(&rel.properties),
            Self::Path(path) => serde_json::Value::Array(
                path.nodes
                    .iter()
                    .map(|n| properties_to_json(&n.properties))
                    .collect(),
            ),
        }
    }
}

fn properties_to_json(map: &BTreeMap<String, Value>) -> serde_json::Value {
    serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// A node returned by the database
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Node {
    /// Database-internal identifier
    pub id: i64,
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: PropertyMap,
}

impl Node {
    pub fn new(id: i64, label: impl Into<String>) -> Self {
        Self {
            id,
            labels: vec![label.into()],
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// A relationship returned by the database
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Relationship {
    /// Database-internal identifier
    pub id: i64,
    pub start_id: i64,
    pub end_id: i64,
    pub rel_type: String,
    #[serde(default)]
    pub properties: PropertyMap,
}

impl Relationship {
    pub fn new(id: i64, start_id: i64, end_id: i64, rel_type: impl Into<String>) -> Self {
        Self {
            id,
            start_id,
            end_id,
            rel_type: rel_type.into(),
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The node on the other side of `node_id`, if the relationship touches it
    pub fn other(&self, node_id: i64) -> Option<i64> {
        if self.start_id == node_id {
            Some(self.end_id)
        } else if self.end_id == node_id {
            Some(self.start_id)
        } else {
            None
        }
    }
}

/// An alternating sequence of nodes and relationships.
///
/// `relationships[i]` connects `nodes[i]` and `nodes[i + 1]` in either
/// direction; a zero-length path holds exactly one node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Path {
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
}

impl Path {
    pub fn single(node: Node) -> Self {
        Self {
            nodes: vec![node],
            relationships: Vec::new(),
        }
    }

    pub fn start(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }
}
