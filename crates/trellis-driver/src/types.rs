//! Statements, result rows and write summaries

use serde::{Deserialize, Serialize};
use trellis_core::{Params, Value};

/// Whether a connection may write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    ReadOnly,
    #[default]
    ReadWrite,
}

impl AccessMode {
    pub fn can_write(&self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

impl std::fmt::Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "read-only"),
            Self::ReadWrite => write!(f, "read-write"),
        }
    }
}

/// Cypher text plus named parameters
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    pub text: String,
    pub params: Params,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Params::new(),
        }
    }

    pub fn with_params(text: impl Into<String>, params: Params) -> Self {
        Self {
            text: text.into(),
            params,
        }
    }

    /// Builder method to bind a parameter
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// One result record
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Value of a named column
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Counters reported by a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Summary {
    pub nodes_created: usize,
    pub nodes_deleted: usize,
    pub relationships_created: usize,
    pub relationships_deleted: usize,
    pub properties_set: usize,
    pub constraints_added: usize,
    pub indexes_added: usize,
}

impl Summary {
    /// Fold another summary into this one
    pub fn merge(&mut self, other: &Summary) {
        self.nodes_created += other.nodes_created;
        self.nodes_deleted += other.nodes_deleted;
        self.relationships_created += other.relationships_created;
        self.relationships_deleted += other.relationships_deleted;
        self.properties_set += other.properties_set;
        self.constraints_added += other.constraints_added;
        self.indexes_added += other.indexes_added;
    }

    pub fn contains_updates(&self) -> bool {
        *self != Summary::default()
    }
}

impl<'a> std::iter::Sum<&'a Summary> for Summary {
    fn sum<I: Iterator<Item = &'a Summary>>(iter: I) -> Self {
        let mut total = Summary::default();
        for s in iter {
            total.merge(s);
        }
        total
    }
}
