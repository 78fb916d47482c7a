//! State recorded when an entity was loaded or last saved

use crate::key::Key;
use crate::relation::Direction;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationKey {
    pub relationship: String,
    pub direction: Direction,
}

/// Peer keys per relationship, and map keys per properties field, as last
/// observed in the database.
///
/// For relationships modeled by an edge entity the recorded keys are the
/// edge entities' keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSnapshot {
    relations: BTreeMap<RelationKey, BTreeSet<Key>>,
    /// Stored name of a properties field -> its map keys
    properties: BTreeMap<String, BTreeSet<String>>,
}

impl LoadSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure an (empty) entry exists for a relationship
    pub fn ensure(&mut self, relationship: &str, direction: Direction) {
        self.relations
            .entry(RelationKey {
                relationship: relationship.to_string(),
                direction,
            })
            .or_default();
    }

    pub fn record(&mut self, relationship: &str, direction: Direction, key: Key) {
        self.relations
            .entry(RelationKey {
                relationship: relationship.to_string(),
                direction,
            })
            .or_default()
            .insert(key);
    }

    pub fn set(&mut self, relationship: &str, direction: Direction, keys: BTreeSet<Key>) {
        self.relations.insert(
            RelationKey {
                relationship: relationship.to_string(),
                direction,
            },
            keys,
        );
    }

    pub fn peers(&self, relationship: &str, direction: Direction) -> Option<&BTreeSet<Key>> {
        self.relations.get(&RelationKey {
            relationship: relationship.to_string(),
            direction,
        })
    }

    /// Peers of a relationship across all directions
    pub fn peers_by_name(&self, relationship: &str) -> BTreeSet<Key> {
        self.relations
            .iter()
            .filter(|(k, _)| k.relationship == relationship)
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect()
    }

    pub fn relations(&self) -> impl Iterator<Item = (&RelationKey, &BTreeSet<Key>)> {
        self.relations.iter()
    }

    pub fn set_property_keys(&mut self, stored_name: &str, keys: BTreeSet<String>) {
        self.properties.insert(stored_name.to_string(), keys);
    }

    pub fn property_keys(&self, stored_name: &str) -> Option<&BTreeSet<String>> {
        self.properties.get(stored_name)
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty() && self.properties.is_empty()
    }
}
