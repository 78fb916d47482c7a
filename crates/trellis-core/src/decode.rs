//! Decoding query results into an object graph

use crate::catalog::Catalog;
use crate::codec::{decode_properties, record_property_keys, stored_key};
use crate::entity::{Entity, EntityKind};
use crate::error::{Error, Result};
use crate::field::FieldConfig;
use crate::graph::ObjectGraph;
use crate::key::{Key, Ref};
use crate::relation::{Cardinality, Direction};
use crate::snapshot::LoadSnapshot;
use crate::value::{Node, Relationship, Value};
use serde_json::{Map, Value as Json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Decoded result: the graph plus the keys of top-level nodes and path
/// starts, in order of first appearance.
#[derive(Debug)]
pub struct Decoded {
    pub graph: ObjectGraph,
    pub roots: Vec<Key>,
}

impl Decoded {
    /// Keep only roots of type `T`
    pub fn typed<T: Entity>(self) -> Loaded<T> {
        let roots = self
            .roots
            .iter()
            .filter(|key| self.graph.label_of(key) == Some(T::label()))
            .map(|key| Ref::new(key.clone()))
            .collect();
        Loaded {
            graph: self.graph,
            roots,
        }
    }
}

/// Result of a typed load
#[derive(Debug)]
pub struct Loaded<T> {
    pub graph: ObjectGraph,
    pub roots: Vec<Ref<T>>,
}

impl<T: Entity> Loaded<T> {
    pub fn first(&self) -> Option<&T> {
        self.roots.first().and_then(|r| self.graph.get(r))
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.roots.iter().filter_map(|r| self.graph.get(r))
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

struct NodeRecord {
    label: String,
    key: Key,
    json: Map<String, Json>,
    snapshot: LoadSnapshot,
}

struct EdgeRecord {
    label: String,
    json: Map<String, Json>,
    snapshot: LoadSnapshot,
    start: Key,
    end: Key,
}

struct Decoder<'c> {
    catalog: &'c Catalog,
    by_id: HashMap<i64, usize>,
    by_key: HashMap<Key, usize>,
    nodes: Vec<NodeRecord>,
    edges: HashMap<Key, EdgeRecord>,
    edge_order: Vec<Key>,
    relationships: Vec<Relationship>,
    seen_relationships: HashSet<i64>,
    roots: Vec<Key>,
}

/// Decode nodes, relationships and paths (at any nesting inside lists and
/// maps) into a fresh object graph.
pub fn decode<'v>(catalog: Arc<Catalog>, values: impl IntoIterator<Item = &'v Value>) -> Result<Decoded> {
    let mut decoder = Decoder {
        catalog: &catalog,
        by_id: HashMap::new(),
        by_key: HashMap::new(),
        nodes: Vec::new(),
        edges: HashMap::new(),
        edge_order: Vec::new(),
        relationships: Vec::new(),
        seen_relationships: HashSet::new(),
        roots: Vec::new(),
    };

    for value in values {
        decoder.collect(value, true)?;
    }
    decoder.resolve_relationships()?;
    let (nodes, edges, roots) = decoder.finish();

    let mut graph = ObjectGraph::new(Arc::clone(&catalog));
    let node_count = nodes.len();
    let edge_count = edges.len();
    for record in nodes {
        graph.insert_json(&record.label, Json::Object(record.json), Some(record.snapshot))?;
    }
    for record in edges {
        let key = graph.insert_json(&record.label, Json::Object(record.json), Some(record.snapshot))?;
        graph.set_edge_endpoints(&key, record.start, record.end)?;
    }

    tracing::debug!("Decoded {} nodes and {} edges", node_count, edge_count);
    Ok(Decoded { graph, roots })
}

impl<'c> Decoder<'c> {
    fn collect(&mut self, value: &Value, top_level: bool) -> Result<()> {
        match value {
            Value::Node(node) => {
                let key = self.add_node(node)?;
                if top_level {
                    self.roots.push(key);
                }
            }
            Value::Relationship(rel) => self.add_relationship(rel),
            Value::Path(path) => {
                for (i, node) in path.nodes.iter().enumerate() {
                    let key = self.add_node(node)?;
                    if i == 0 && top_level {
                        self.roots.push(key);
                    }
                }
                for rel in &path.relationships {
                    self.add_relationship(rel);
                }
            }
            Value::List(items) => {
                for item in items {
                    self.collect(item, top_level)?;
                }
            }
            Value::Map(map) => {
                for item in map.values() {
                    self.collect(item, false)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn add_node(&mut self, node: &Node) -> Result<Key> {
        if let Some(&idx) = self.by_id.get(&node.id) {
            return Ok(self.nodes[idx].key.clone());
        }

        let catalog = self.catalog;
        let label = catalog.resolve_label(&node.labels).ok_or_else(|| {
            Error::Conversion(format!(
                "no registered entity for node labels {:?}",
                node.labels
            ))
        })?;
        let config = catalog.config(label)?;
        let key = stored_key(config, &node.properties)?;

        if let Some(&idx) = self.by_key.get(&key) {
            self.by_id.insert(node.id, idx);
            return Ok(key);
        }

        let mut json = decode_properties(config, &node.properties, &key);
        let mut snapshot = LoadSnapshot::new();
        record_property_keys(config, &json, &mut snapshot);
        for field in config.relationships() {
            let empty = match field.cardinality {
                Some(Cardinality::One) => Json::Null,
                _ => Json::Array(Vec::new()),
            };
            json.insert(field.field_name.clone(), empty);
            if let (Some(rel), Some(dir)) = (&field.relationship, field.direction) {
                snapshot.ensure(rel, dir);
            }
        }

        let idx = self.nodes.len();
        self.nodes.push(NodeRecord {
            label: label.to_string(),
            key: key.clone(),
            json,
            snapshot,
        });
        self.by_id.insert(node.id, idx);
        self.by_key.insert(key.clone(), idx);
        Ok(key)
    }

    fn add_relationship(&mut self, rel: &Relationship) {
        if self.seen_relationships.insert(rel.id) {
            self.relationships.push(rel.clone());
        }
    }

    fn resolve_relationships(&mut self) -> Result<()> {
        let catalog = self.catalog;
        let relationships = std::mem::take(&mut self.relationships);

        for rel in &relationships {
            let start_idx = self.node_index(rel.start_id, rel)?;
            let end_idx = self.node_index(rel.end_id, rel)?;
            let start_label = self.nodes[start_idx].label.clone();
            let end_label = self.nodes[end_idx].label.clone();

            let (start_cfg, end_cfg) = catalog.registry().get_pair(
                &start_label,
                &end_label,
                &end_label,
                &start_label,
                &rel.rel_type,
            )?;

            let (start_peer, end_peer) = match start_cfg.edge_label.as_deref() {
                Some(edge_label) => {
                    let key = self.add_edge(edge_label, rel, start_idx, end_idx)?;
                    (key.clone(), key)
                }
                None => (
                    self.nodes[end_idx].key.clone(),
                    self.nodes[start_idx].key.clone(),
                ),
            };

            attach(&mut self.nodes[start_idx], start_cfg, start_peer);
            attach(&mut self.nodes[end_idx], end_cfg, end_peer);
        }
        Ok(())
    }

    fn node_index(&self, id: i64, rel: &Relationship) -> Result<usize> {
        self.by_id.get(&id).copied().ok_or_else(|| {
            Error::Conversion(format!(
                "relationship {} [{}] references node {} which is not in the result",
                rel.id, rel.rel_type, id
            ))
        })
    }

    fn add_edge(&mut self, edge_label: &str, rel: &Relationship, start_idx: usize, end_idx: usize) -> Result<Key> {
        let catalog = self.catalog;
        let config = catalog.config(edge_label)?;
        let start = &self.nodes[start_idx];
        let end = &self.nodes[end_idx];

        if let EntityKind::Edge { start: s, end: e } = &config.kind {
            if *s != start.label || *e != end.label {
                return Err(Error::Conversion(format!(
                    "edge [{}] joins [{}] -> [{}] but the relationship joins [{}] -> [{}]",
                    edge_label, s, e, start.label, end.label
                )));
            }
        }

        let key = stored_key(config, &rel.properties)?;
        if !self.edges.contains_key(&key) {
            let json = decode_properties(config, &rel.properties, &key);
            let mut snapshot = LoadSnapshot::new();
            record_property_keys(config, &json, &mut snapshot);
            let record = EdgeRecord {
                label: edge_label.to_string(),
                json,
                snapshot,
                start: start.key.clone(),
                end: end.key.clone(),
            };
            self.edges.insert(key.clone(), record);
            self.edge_order.push(key.clone());
        }
        Ok(key)
    }

    fn finish(mut self) -> (Vec<NodeRecord>, Vec<EdgeRecord>, Vec<Key>) {
        let edges = self
            .edge_order
            .iter()
            .filter_map(|key| self.edges.remove(key))
            .collect();

        let mut seen = HashSet::new();
        let roots = self
            .roots
            .into_iter()
            .filter(|key| seen.insert(key.clone()))
            .collect();

        (self.nodes, edges, roots)
    }
}

fn attach(record: &mut NodeRecord, field: &FieldConfig, peer: Key) {
    let direction = field.direction.unwrap_or(Direction::Outgoing);
    if let Some(rel) = &field.relationship {
        record.snapshot.record(rel, direction, peer.clone());
    }

    let peer = peer.to_json();
    let slot = record
        .json
        .entry(field.field_name.clone())
        .or_insert(Json::Null);
    match field.cardinality {
        Some(Cardinality::One) => *slot = peer,
        _ => match slot {
            Json::Array(items) => {
                if !items.contains(&peer) {
                    items.push(peer);
                }
            }
            other => *other = Json::Array(vec![peer]),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_catalog::school;
    use crate::entity::fixtures::*;

    fn teacher_node(id: i64, uuid: &str, name: &str) -> Node {
        Node::new(id, "Teacher")
            .with_property("uuid", uuid)
            .with_property("name", name)
    }

    fn course_node(id: i64, uuid: &str, title: &str) -> Node {
        Node::new(id, "Course")
            .with_property("uuid", uuid)
            .with_property("title", title)
    }

    #[test]
    fn test_decode_path_fills_both_sides() {
        let path = Value::Path(crate::value::Path {
            nodes: vec![teacher_node(1, "t1", "Ada"), course_node(2, "c1", "Algebra")],
            relationships: vec![Relationship::new(10, 1, 2, "TEACHES")],
        });

        let loaded = decode(school(), [&path]).unwrap().typed::<Teacher>();
        assert_eq!(loaded.len(), 1);
        let teacher = loaded.first().unwrap();
        assert_eq!(teacher.name, "Ada");
        assert_eq!(teacher.courses, vec![Ref::new("c1")]);

        let course: &Course = loaded.graph.get_by_key(&Key::from("c1")).unwrap();
        assert_eq!(course.teacher, Some(Ref::new("t1")));

        let snapshot = loaded.graph.snapshot(&Key::from("t1")).unwrap();
        assert!(snapshot
            .peers("TEACHES", Direction::Outgoing)
            .unwrap()
            .contains(&Key::from("c1")));
    }

    #[test]
    fn test_map_keys_are_recorded() {
        let node = Value::Node(course_node(2, "c1", "Algebra").with_property("meta.room", "B12"));
        let decoded = decode(school(), [&node]).unwrap();
        let snapshot = decoded.graph.snapshot(&Key::from("c1")).unwrap();
        assert_eq!(
            snapshot.property_keys("meta").cloned(),
            Some(["room".to_string()].into_iter().collect())
        );
    }

    #[test]
    fn test_repeated_nodes_collapse() {
        let paths = [
            Value::Path(crate::value::Path {
                nodes: vec![teacher_node(1, "t1", "Ada"), course_node(2, "c1", "Algebra")],
                relationships: vec![Relationship::new(10, 1, 2, "TEACHES")],
            }),
            Value::Path(crate::value::Path {
                nodes: vec![teacher_node(1, "t1", "Ada"), course_node(3, "c2", "Logic")],
                relationships: vec![Relationship::new(11, 1, 3, "TEACHES")],
            }),
            Value::Path(crate::value::Path::single(teacher_node(1, "t1", "Ada"))),
        ];

        let decoded = decode(school(), paths.iter()).unwrap();
        assert_eq!(decoded.graph.len(), 3);
        assert_eq!(decoded.roots, vec![Key::from("t1")]);

        let teacher: &Teacher = decoded.graph.get_by_key(&Key::from("t1")).unwrap();
        assert_eq!(teacher.courses.len(), 2);
    }

    #[test]
    fn test_edge_entities_are_materialized() {
        let student = Node::new(1, "Student")
            .with_property("uuid", "s1")
            .with_property("name", "Sam");
        let rel = Relationship::new(5, 1, 2, "ENROLLED_IN")
            .with_property("uuid", "e1")
            .with_property("enrolled", "2024-03-01T09:30:15Z");
        let path = Value::Path(crate::value::Path {
            nodes: vec![student, course_node(2, "c1", "Algebra")],
            relationships: vec![rel],
        });

        let decoded = decode(school(), [&path]).unwrap();
        let edge: &Enrollment = decoded.graph.get_by_key(&Key::from("e1")).unwrap();
        assert_eq!(edge.start, Some(Ref::new("s1")));
        assert_eq!(edge.end, Some(Ref::new("c1")));

        let student: &Student = decoded.graph.get_by_key(&Key::from("s1")).unwrap();
        assert_eq!(student.enrollments, vec![Ref::new("e1")]);
        let course: &Course = decoded.graph.get_by_key(&Key::from("c1")).unwrap();
        assert_eq!(course.enrollments, vec![Ref::new("e1")]);
    }

    #[test]
    fn test_edge_label_mismatch_is_conversion_error() {
        // Course -> Student is the reverse of the declared Enrollment edge
        let student = Node::new(1, "Student").with_property("uuid", "s1").with_property("name", "Sam");
        let rel = Relationship::new(5, 2, 1, "ENROLLED_IN").with_property("uuid", "e1");
        let path = Value::Path(crate::value::Path {
            nodes: vec![course_node(2, "c1", "Algebra"), student],
            relationships: vec![rel],
        });

        let err = decode(school(), [&path]).unwrap_err();
        assert!(matches!(
            err,
            Error::Conversion(_) | Error::RelationshipNotFound(_)
        ));
    }

    #[test]
    fn test_unknown_label() {
        let node = Value::Node(Node::new(1, "Planet").with_property("uuid", "p"));
        assert!(matches!(
            decode(school(), [&node]).unwrap_err(),
            Error::Conversion(_)
        ));
    }

    #[test]
    fn test_dangling_relationship() {
        let rel = Value::Relationship(Relationship::new(1, 1, 2, "TEACHES"));
        assert!(decode(school(), [&rel]).is_err());
    }
}
