//! Relationship direction and cardinality

use serde::{Deserialize, Serialize};

/// Direction of a relationship as seen from the declaring entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
    Both,
    /// No direction; rendered as an undirected pattern
    #[serde(rename = "none")]
    Undirected,
}

impl Direction {
    /// Parse a declaration value (`incoming|outgoing|both|none`), case-insensitive
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incoming" => Some(Self::Incoming),
            "outgoing" => Some(Self::Outgoing),
            "both" => Some(Self::Both),
            "none" => Some(Self::Undirected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incoming => "incoming",
            Self::Outgoing => "outgoing",
            Self::Both => "both",
            Self::Undirected => "none",
        }
    }

    /// The direction the peer sees. Symmetric directions map to themselves.
    pub fn reverse(&self) -> Self {
        match self {
            Self::Incoming => Self::Outgoing,
            Self::Outgoing => Self::Incoming,
            other => *other,
        }
    }

    pub fn is_directed(&self) -> bool {
        matches!(self, Self::Incoming | Self::Outgoing)
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a relationship field holds one peer or a list of peers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    Many,
}
