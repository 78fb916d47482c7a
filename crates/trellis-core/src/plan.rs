//! Save planning.
//!
//! Walks an object graph from a root up to a depth and produces the ordered
//! write operations that bring the database in line with it: one upsert per
//! visited node, and per relationship field the links and unlinks found by
//! diffing the field against the entity's snapshot.

use crate::catalog::Catalog;
use crate::codec::{encode_properties, record_property_keys, reference_keys, remove_dropped_keys};
use crate::error::{Error, Result};
use crate::field::FieldConfig;
use crate::graph::ObjectGraph;
use crate::key::Key;
use crate::relation::Direction;
use crate::snapshot::LoadSnapshot;
use crate::value::Params;
use serde_json::Value as Json;
use std::collections::{BTreeSet, HashMap, HashSet};

/// A node addressed by label and primary key
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRef {
    pub label: String,
    /// Stored name of the primary key (`uuid` or `id`)
    pub key_field: String,
    pub key: Key,
}

/// Identity and properties of an edge entity written with a link
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeWrite {
    pub key_field: String,
    pub key: Key,
    pub props: Params,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or update a node and set its properties
    Upsert { node: NodeRef, props: Params },
    /// Create a relationship if absent; with an edge entity, also set its
    /// properties
    Link {
        relationship: String,
        start: NodeRef,
        end: NodeRef,
        directed: bool,
        edge: Option<EdgeWrite>,
    },
    /// Delete the relationship between two nodes
    Unlink {
        relationship: String,
        start: NodeRef,
        end: NodeRef,
        directed: bool,
    },
    /// Delete the relationship carrying an edge entity's key
    UnlinkEdge {
        relationship: String,
        node: NodeRef,
        edge_key_field: String,
        edge_key: Key,
    },
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum Signature {
    Link {
        relationship: String,
        start: Key,
        end: Key,
        edge: Option<Key>,
    },
    Unlink {
        relationship: String,
        start: Key,
        end: Key,
    },
    UnlinkEdge {
        relationship: String,
        edge: Key,
    },
}

/// Planned writes plus the snapshots to record once they succeed
#[derive(Debug)]
pub struct SavePlan {
    ops: Vec<WriteOp>,
    snapshots: Vec<(Key, LoadSnapshot)>,
}

impl SavePlan {
    pub fn build(graph: &ObjectGraph, root: &Key, depth: u32) -> Result<Self> {
        let mut planner = Planner {
            graph,
            catalog: graph.catalog(),
            ops: Vec::new(),
            upserted: HashSet::new(),
            visited: HashMap::new(),
            planned: HashSet::new(),
            snapshots: Vec::new(),
        };
        planner.visit(root, depth)?;

        tracing::debug!(
            "Planned save of {} at depth {}: {} writes over {} nodes",
            root,
            depth,
            planner.ops.len(),
            planner.upserted.len()
        );
        Ok(Self {
            ops: planner.ops,
            snapshots: planner.snapshots,
        })
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Supersede the snapshots of every node whose relationships were
    /// written. Call only after the writes succeeded.
    pub fn commit(self, graph: &mut ObjectGraph) -> Result<()> {
        for (key, snapshot) in self.snapshots {
            if graph.contains(&key) {
                graph.set_snapshot(&key, snapshot)?;
            }
        }
        Ok(())
    }
}

struct Planner<'g> {
    graph: &'g ObjectGraph,
    catalog: &'g Catalog,
    ops: Vec<WriteOp>,
    upserted: HashSet<Key>,
    /// Deepest remaining depth each node was expanded with
    visited: HashMap<Key, u32>,
    planned: HashSet<Signature>,
    snapshots: Vec<(Key, LoadSnapshot)>,
}

impl<'g> Planner<'g> {
    fn visit(&mut self, key: &Key, depth: u32) -> Result<()> {
        if self.visited.get(key).is_some_and(|&seen| seen >= depth) {
            return Ok(());
        }
        self.visited.insert(key.clone(), depth);

        let (graph, catalog) = (self.graph, self.catalog);
        let (label, json) = graph.record(key)?;
        let config = catalog.config(label)?;
        if config.is_edge() {
            return Err(Error::InvalidOperation(format!(
                "[{}] is an edge entity; save one of its endpoints instead",
                label
            )));
        }
        match Key::from_json(json.get(&config.primary_key().field_name).unwrap_or(&Json::Null)) {
            Some(ref current) if current == key => {}
            other => {
                return Err(Error::Conversion(format!(
                    "primary key of [{}] {} was changed to {:?}",
                    label, key, other
                )))
            }
        }

        let node = self.node_ref(label, key)?;
        let before = graph.snapshot(key).cloned().unwrap_or_default();
        let record = json.as_object().cloned().unwrap_or_default();
        if self.upserted.insert(key.clone()) {
            let mut props = encode_properties(config, &json)?;
            remove_dropped_keys(config, &record, &before, &mut props);
            self.ops.push(WriteOp::Upsert {
                node: node.clone(),
                props,
            });
        }

        // relationships are left alone at depth 0, so their snapshot stays
        let mut after = if depth == 0 {
            before.clone()
        } else {
            LoadSnapshot::new()
        };
        record_property_keys(config, &record, &mut after);
        if depth == 0 {
            self.snapshots.push((key.clone(), after));
            return Ok(());
        }

        let fields: Vec<&FieldConfig> = config.relationships().collect();
        let mut current_by_field = Vec::with_capacity(fields.len());
        for field in &fields {
            let keys: BTreeSet<Key> = reference_keys(&json, field)?.into_iter().collect();
            current_by_field.push(keys);
        }

        for (i, field) in fields.iter().enumerate() {
            let (relationship, direction) = relation_of(field);
            let current = &current_by_field[i];

            // keys held by sibling fields sharing this relationship are not
            // removals from this one
            let claimed: BTreeSet<&Key> = fields
                .iter()
                .enumerate()
                .filter(|(j, f)| *j != i && relation_of(f) == (relationship, direction))
                .flat_map(|(j, _)| current_by_field[j].iter())
                .collect();
            let previous: BTreeSet<Key> = before
                .peers(relationship, direction)
                .map(|keys| keys.iter().filter(|k| !claimed.contains(k)).cloned().collect())
                .unwrap_or_default();

            if field.uses_edge_entity() {
                self.plan_edges(&node, field, current, &previous, depth)?;
            } else {
                self.plan_links(&node, field, current, &previous, depth)?;
            }

            let mut recorded = after.peers(relationship, direction).cloned().unwrap_or_default();
            recorded.extend(current.iter().cloned());
            after.set(relationship, direction, recorded);
        }

        self.snapshots.push((key.clone(), after));
        Ok(())
    }

    fn plan_links(
        &mut self,
        node: &NodeRef,
        field: &FieldConfig,
        current: &BTreeSet<Key>,
        previous: &BTreeSet<Key>,
        depth: u32,
    ) -> Result<()> {
        let (relationship, direction) = relation_of(field);
        let peer_label = field.peer_label.as_deref().unwrap_or_default();

        for peer in current {
            self.visit(peer, depth - 1)?;
        }

        for peer in current.difference(previous) {
            let peer_node = self.node_ref(self.graph.label_of(peer).unwrap_or(peer_label), peer)?;
            let (start, end) = orient(direction, node, &peer_node);
            self.push(
                Signature::Link {
                    relationship: relationship.to_string(),
                    start: start.key.clone(),
                    end: end.key.clone(),
                    edge: None,
                }
                .normalized(direction),
                WriteOp::Link {
                    relationship: relationship.to_string(),
                    start: start.clone(),
                    end: end.clone(),
                    directed: direction.is_directed(),
                    edge: None,
                },
            );
        }

        for peer in previous.difference(current) {
            let peer_node = self.node_ref(peer_label, peer)?;
            let (start, end) = orient(direction, node, &peer_node);
            self.push(
                Signature::Unlink {
                    relationship: relationship.to_string(),
                    start: start.key.clone(),
                    end: end.key.clone(),
                }
                .normalized(direction),
                WriteOp::Unlink {
                    relationship: relationship.to_string(),
                    start: start.clone(),
                    end: end.clone(),
                    directed: direction.is_directed(),
                },
            );
        }
        Ok(())
    }

    fn plan_edges(
        &mut self,
        node: &NodeRef,
        field: &FieldConfig,
        current: &BTreeSet<Key>,
        previous: &BTreeSet<Key>,
        depth: u32,
    ) -> Result<()> {
        let (relationship, direction) = relation_of(field);
        let edge_label = field.edge_label.as_deref().unwrap_or_default();
        let (graph, catalog) = (self.graph, self.catalog);
        let edge_config = catalog.config(edge_label)?;
        let edge_key_field = edge_config.primary_key().stored_name.clone();

        for edge_key in current {
            let (label, edge_json) = graph.record(edge_key)?;
            if label != edge_label {
                return Err(Error::Conversion(format!(
                    "field `{}` holds a [{}], expected [{}]",
                    field.field_name, label, edge_label
                )));
            }
            let (start, end) = graph.edge_endpoints(edge_key)?;
            let (own, peer) = if direction == Direction::Outgoing {
                (&start, &end)
            } else {
                (&end, &start)
            };
            if *own != node.key {
                return Err(Error::Conversion(format!(
                    "edge {} in `{}` is not attached to {}",
                    edge_key, field.field_name, node.key
                )));
            }

            self.visit(peer, depth - 1)?;

            let start_node = self.node_ref(self.label_for(&start)?, &start)?;
            let end_node = self.node_ref(self.label_for(&end)?, &end)?;
            let edge_record = edge_json.as_object().cloned().unwrap_or_default();
            let edge_before = graph.snapshot(edge_key).cloned().unwrap_or_default();
            let mut props = encode_properties(edge_config, &edge_json)?;
            remove_dropped_keys(edge_config, &edge_record, &edge_before, &mut props);
            let mut edge_after = edge_before;
            record_property_keys(edge_config, &edge_record, &mut edge_after);
            self.snapshots.push((edge_key.clone(), edge_after));
            self.push(
                Signature::Link {
                    relationship: relationship.to_string(),
                    start: start.clone(),
                    end: end.clone(),
                    edge: Some(edge_key.clone()),
                },
                WriteOp::Link {
                    relationship: relationship.to_string(),
                    start: start_node,
                    end: end_node,
                    directed: direction.is_directed(),
                    edge: Some(EdgeWrite {
                        key_field: edge_key_field.clone(),
                        key: edge_key.clone(),
                        props,
                    }),
                },
            );
        }

        for edge_key in previous.difference(current) {
            self.push(
                Signature::UnlinkEdge {
                    relationship: relationship.to_string(),
                    edge: edge_key.clone(),
                },
                WriteOp::UnlinkEdge {
                    relationship: relationship.to_string(),
                    node: node.clone(),
                    edge_key_field: edge_key_field.clone(),
                    edge_key: edge_key.clone(),
                },
            );
        }
        Ok(())
    }

    fn push(&mut self, signature: Signature, op: WriteOp) {
        if self.planned.insert(signature) {
            self.ops.push(op);
        }
    }

    fn label_for(&self, key: &Key) -> Result<&'g str> {
        self.graph
            .label_of(key)
            .ok_or_else(|| Error::MissingEntity(key.to_string()))
    }

    fn node_ref(&self, label: &str, key: &Key) -> Result<NodeRef> {
        let config = self.catalog.config(label)?;
        Ok(NodeRef {
            label: label.to_string(),
            key_field: config.primary_key().stored_name.clone(),
            key: key.clone(),
        })
    }
}

impl Signature {
    /// Undirected relationships have no start; order the pair
    fn normalized(self, direction: Direction) -> Self {
        if direction.is_directed() {
            return self;
        }
        match self {
            Self::Link {
                relationship,
                start,
                end,
                edge,
            } if end < start => Self::Link {
                relationship,
                start: end,
                end: start,
                edge,
            },
            Self::Unlink {
                relationship,
                start,
                end,
            } if end < start => Self::Unlink {
                relationship,
                start: end,
                end: start,
            },
            other => other,
        }
    }
}

fn relation_of(field: &FieldConfig) -> (&str, Direction) {
    (
        field.relationship.as_deref().unwrap_or_default(),
        field.direction.unwrap_or(Direction::Outgoing),
    )
}

/// (start, end) of a relationship seen from `this`
fn orient<'a>(direction: Direction, this: &'a NodeRef, peer: &'a NodeRef) -> (&'a NodeRef, &'a NodeRef) {
    match direction {
        Direction::Incoming => (peer, this),
        _ => (this, peer),
    }
}
