//! Relationship registry.
//!
//! Built once at startup through [`RegistryBuilder`], validated, then frozen
//! into a read-only [`RelationshipRegistry`].

use crate::error::{Error, Result};
use crate::field::FieldConfig;
use crate::relation::Direction;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

/// (label, relationship) -> peer label -> configs
type Entries = HashMap<(String, String), HashMap<String, Vec<FieldConfig>>>;

/// Mutable registration phase
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: Mutex<Entries>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a relationship field of `label` pointing at `peer_type`
    pub fn add(&self, label: &str, relationship: &str, peer_type: &str, config: FieldConfig) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry((label.to_string(), relationship.to_string()))
            .or_default()
            .entry(peer_type.to_string())
            .or_default()
            .push(config);
    }

    /// Check that every relationship is declared consistently on both sides.
    ///
    /// Per relationship name the outgoing and incoming counts must match and
    /// the `both` and `none` counts must be even.
    pub fn validate_global(&self) -> Result<()> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        validate(&entries)
    }

    /// Validate and freeze
    pub fn freeze(self) -> Result<RelationshipRegistry> {
        let entries = self
            .entries
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        validate(&entries)?;
        tracing::debug!("Froze relationship registry with {} entries", entries.len());
        Ok(RelationshipRegistry { entries })
    }
}

#[derive(Default)]
struct DirectionCounts {
    incoming: usize,
    outgoing: usize,
    both: usize,
    undirected: usize,
}

fn validate(entries: &Entries) -> Result<()> {
    let mut counts: BTreeMap<&str, DirectionCounts> = BTreeMap::new();

    for ((_, relationship), peers) in entries {
        let counter = counts.entry(relationship.as_str()).or_default();
        for config in peers.values().flatten() {
            match config.direction.unwrap_or(Direction::Outgoing) {
                Direction::Incoming => counter.incoming += 1,
                Direction::Outgoing => counter.outgoing += 1,
                Direction::Both => counter.both += 1,
                Direction::Undirected => counter.undirected += 1,
            }
        }
    }

    for (relationship, c) in &counts {
        if c.incoming != c.outgoing {
            return Err(Error::RegistryValidation(format!(
                "relationship [{}] has {} outgoing but {} incoming declarations",
                relationship, c.outgoing, c.incoming
            )));
        }
        if c.both % 2 != 0 {
            return Err(Error::RegistryValidation(format!(
                "relationship [{}] has an odd number ({}) of `both` declarations",
                relationship, c.both
            )));
        }
        if c.undirected % 2 != 0 {
            return Err(Error::RegistryValidation(format!(
                "relationship [{}] has an odd number ({}) of `none` declarations",
                relationship, c.undirected
            )));
        }
    }

    Ok(())
}

/// Frozen, read-only relationship registry
#[derive(Debug, Default)]
pub struct RelationshipRegistry {
    entries: Entries,
}

impl RelationshipRegistry {
    /// Configs declared by `label` for `relationship` toward `peer_type`
    pub fn configs(&self, label: &str, relationship: &str, peer_type: &str) -> &[FieldConfig] {
        self.entries
            .get(&(label.to_string(), relationship.to_string()))
            .and_then(|peers| peers.get(peer_type))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Resolve the field configs on both ends of a relationship instance
    pub fn get_pair(
        &self,
        start_label: &str,
        start_peer: &str,
        end_label: &str,
        end_peer: &str,
        relationship: &str,
    ) -> Result<(&FieldConfig, &FieldConfig)> {
        let start = pick(
            self.configs(start_label, relationship, start_peer),
            Direction::Outgoing,
            start_label,
            relationship,
        )?;
        let end = pick(
            self.configs(end_label, relationship, end_peer),
            Direction::Incoming,
            end_label,
            relationship,
        )?;
        Ok((start, end))
    }

    /// The field on `peer_label` that mirrors a field declared by `label`
    pub fn reciprocal(
        &self,
        label: &str,
        field: &FieldConfig,
    ) -> Option<&FieldConfig> {
        let relationship = field.relationship.as_deref()?;
        let peer_label = field.peer_label.as_deref()?;
        let direction = field.direction?.reverse();
        let candidates = self.configs(peer_label, relationship, label);
        match candidates {
            [single] => Some(single),
            many => many.iter().find(|c| {
                c.direction == Some(direction) && c.edge_label == field.edge_label
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn pick<'a>(
    candidates: &'a [FieldConfig],
    direction: Direction,
    label: &str,
    relationship: &str,
) -> Result<&'a FieldConfig> {
    match candidates {
        [] => Err(Error::RelationshipNotFound(format!(
            "no [{}] field on [{}]",
            relationship, label
        ))),
        [single] => Ok(single),
        many => {
            let matching: Vec<&FieldConfig> = many
                .iter()
                .filter(|c| c.direction == Some(direction))
                .collect();
            match matching.as_slice() {
                [single] => Ok(single),
                _ => Err(Error::AmbiguousRelationship(format!(
                    "{} [{}] fields on [{}] and none is uniquely {}",
                    many.len(),
                    relationship,
                    label,
                    direction
                ))),
            }
        }
    }
}
