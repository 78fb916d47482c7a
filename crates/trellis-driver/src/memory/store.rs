//! Property graph held in memory

use super::interpreter::{
    Arrow, CompareOp, NodeMatch, Op, Order, Predicate, Projection, PropParam, Window,
};
use crate::error::{DriverError, DriverResult};
use crate::types::{Row, Summary};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use trellis_core::{Node, Params, Path, PropertyMap, Relationship, Value};

/// Rows and counters produced by one statement
#[derive(Debug, Default)]
pub(crate) struct Outcome {
    pub rows: Vec<Row>,
    pub summary: Summary,
}

impl Outcome {
    fn rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            summary: Summary::default(),
        }
    }

    fn summary(summary: Summary) -> Self {
        Self {
            rows: Vec::new(),
            summary,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Store {
    next_id: i64,
    nodes: BTreeMap<i64, Node>,
    relationships: BTreeMap<i64, Relationship>,
    constraints: BTreeSet<(String, String)>,
    indexes: BTreeSet<(String, String)>,
}

impl Store {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn execute(&mut self, op: &Op, params: &Params) -> DriverResult<Outcome> {
        match op {
            Op::Purge => {
                let ids: Vec<i64> = self.nodes.keys().copied().collect();
                Ok(Outcome::summary(self.detach_delete(&ids)))
            }
            Op::DetachDelete(node) => {
                let ids = self.find(node, params)?;
                Ok(Outcome::summary(self.detach_delete(&ids)))
            }
            Op::Upsert { node, props } => self.upsert(node, props, params).map(Outcome::summary),
            Op::Link {
                start,
                end,
                rel_type,
                arrow,
                edge,
                props,
            } => self
                .link(start, end, rel_type, *arrow, edge.as_ref(), props.as_deref(), params)
                .map(Outcome::summary),
            Op::Unlink {
                start,
                end,
                rel_type,
                arrow,
            } => {
                let starts = self.find(start, params)?;
                let ends = self.find(end, params)?;
                let doomed: Vec<i64> = self
                    .relationships
                    .values()
                    .filter(|r| r.rel_type == *rel_type)
                    .filter(|r| {
                        starts.iter().any(|s| {
                            ends.iter()
                                .any(|e| connects(r, *s, *e, *arrow))
                        })
                    })
                    .map(|r| r.id)
                    .collect();
                Ok(Outcome::summary(self.delete_relationships(&doomed)))
            }
            Op::UnlinkEdge {
                start,
                rel_type,
                edge,
            } => {
                let starts = self.find(start, params)?;
                let key = param(params, &edge.param)?;
                let doomed: Vec<i64> = self
                    .relationships
                    .values()
                    .filter(|r| r.rel_type == *rel_type)
                    .filter(|r| starts.contains(&r.start_id) || starts.contains(&r.end_id))
                    .filter(|r| r.properties.get(&edge.property) == Some(key))
                    .map(|r| r.id)
                    .collect();
                Ok(Outcome::summary(self.delete_relationships(&doomed)))
            }
            Op::LoadPaths {
                label,
                hops,
                filter,
                column,
                window,
            } => {
                let starts = self.select(Some(label), filter, params)?;
                let starts = self.order(starts, window.order.as_ref());
                let mut paths = Vec::new();
                for id in starts {
                    match hops {
                        Some((min, max)) => paths.extend(
                            self.paths_from(id, *max)
                                .into_iter()
                                .filter(|p| p.len() >= *min as usize),
                        ),
                        None => paths.extend(self.nodes.get(&id).cloned().map(Path::single)),
                    }
                }
                let rows = paginate(paths, window)
                    .into_iter()
                    .map(|p| Row::new(vec![column.clone()], vec![Value::Path(p)]))
                    .collect();
                Ok(Outcome::rows(rows))
            }
            Op::MatchNodes {
                label,
                filter,
                projection,
                column,
                window,
            } => {
                let ids = self.select(label.as_deref(), filter, params)?;
                let ids = paginate(self.order(ids, window.order.as_ref()), window);
                let rows = match projection {
                    Projection::Count => vec![Row::new(
                        vec![column.clone()],
                        vec![Value::Int(ids.len() as i64)],
                    )],
                    Projection::Nodes => ids
                        .iter()
                        .filter_map(|id| self.nodes.get(id))
                        .map(|n| Row::new(vec![column.clone()], vec![Value::Node(n.clone())]))
                        .collect(),
                };
                Ok(Outcome::rows(rows))
            }
            Op::CountRelationships { rel_type, column } => {
                let count = self
                    .relationships
                    .values()
                    .filter(|r| rel_type.as_ref().map_or(true, |t| r.rel_type == *t))
                    .count();
                Ok(Outcome::rows(vec![Row::new(
                    vec![column.clone()],
                    vec![Value::Int(count as i64)],
                )]))
            }
            Op::CreateConstraint { label, property } => {
                self.check_existing_unique(label, property)?;
                let added = self.constraints.insert((label.clone(), property.clone()));
                Ok(Outcome::summary(Summary {
                    constraints_added: added as usize,
                    ..Default::default()
                }))
            }
            Op::CreateIndex { label, property } => {
                let added = self.indexes.insert((label.clone(), property.clone()));
                Ok(Outcome::summary(Summary {
                    indexes_added: added as usize,
                    ..Default::default()
                }))
            }
            Op::DropConstraint { name, if_exists } => {
                let found = self
                    .constraints
                    .iter()
                    .find(|(l, p)| constraint_name(l, p) == *name)
                    .cloned();
                match found {
                    Some(entry) => {
                        self.constraints.remove(&entry);
                    }
                    None if *if_exists => {}
                    None => {
                        return Err(DriverError::Query(format!(
                            "No such constraint: {}",
                            name
                        )))
                    }
                }
                Ok(Outcome::default())
            }
            Op::DropIndex { name, if_exists } => {
                let found = self
                    .indexes
                    .iter()
                    .find(|(l, p)| index_name(l, p) == *name)
                    .cloned();
                match found {
                    Some(entry) => {
                        self.indexes.remove(&entry);
                    }
                    None if *if_exists => {}
                    None => return Err(DriverError::Query(format!("No such index: {}", name))),
                }
                Ok(Outcome::default())
            }
            Op::ShowConstraints => Ok(Outcome::rows(
                self.constraints
                    .iter()
                    .map(|(l, p)| schema_row(constraint_name(l, p), "UNIQUENESS", l, p))
                    .collect(),
            )),
            Op::ShowIndexes => Ok(Outcome::rows(
                self.indexes
                    .iter()
                    .map(|(l, p)| schema_row(index_name(l, p), "RANGE", l, p))
                    .collect(),
            )),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    fn upsert(&mut self, node: &NodeMatch, props: &str, params: &Params) -> DriverResult<Summary> {
        let props = map_param(params, props)?;
        let label = node.label.clone().unwrap_or_default();
        let mut summary = Summary::default();

        let ids = self.find(node, params)?;
        if ids.is_empty() {
            let key = param(params, &node.key.param)?.clone();
            let mut created = Node::new(self.next_id, label);
            created.properties.insert(node.key.property.clone(), key);
            let (merged, changed) = merge_properties(&created.properties, props);
            self.check_unique(created.id, &created.labels, &merged)?;
            created.properties = merged;
            self.allocate();
            self.nodes.insert(created.id, created);
            summary.nodes_created += 1;
            summary.properties_set += 1 + changed;
            return Ok(summary);
        }

        for id in ids {
            let Some(current) = self.nodes.get(&id) else {
                continue;
            };
            let (merged, changed) = merge_properties(&current.properties, props);
            self.check_unique(id, &current.labels, &merged)?;
            if let Some(n) = self.nodes.get_mut(&id) {
                n.properties = merged;
            }
            summary.properties_set += changed;
        }
        Ok(summary)
    }

    #[allow(clippy::too_many_arguments)]
    fn link(
        &mut self,
        start: &NodeMatch,
        end: &NodeMatch,
        rel_type: &str,
        arrow: Arrow,
        edge: Option<&PropParam>,
        props: Option<&str>,
        params: &Params,
    ) -> DriverResult<Summary> {
        let starts = self.find(start, params)?;
        let ends = self.find(end, params)?;
        let edge_key = match edge {
            Some(e) => Some((e.property.clone(), param(params, &e.param)?.clone())),
            None => None,
        };
        let props = props.map(|p| map_param(params, p)).transpose()?;
        let mut summary = Summary::default();

        for s in &starts {
            for e in &ends {
                let existing = self
                    .relationships
                    .values()
                    .filter(|r| r.rel_type == rel_type && connects(r, *s, *e, arrow))
                    .find(|r| match &edge_key {
                        Some((prop, key)) => r.properties.get(prop) == Some(key),
                        None => true,
                    })
                    .map(|r| r.id);

                let id = match existing {
                    Some(id) => id,
                    None => {
                        let (from, to) = match arrow {
                            Arrow::Incoming => (*e, *s),
                            Arrow::Outgoing | Arrow::Undirected => (*s, *e),
                        };
                        let mut rel = Relationship::new(self.allocate(), from, to, rel_type);
                        if let Some((prop, key)) = &edge_key {
                            rel.properties.insert(prop.clone(), key.clone());
                            summary.properties_set += 1;
                        }
                        let id = rel.id;
                        self.relationships.insert(id, rel);
                        summary.relationships_created += 1;
                        id
                    }
                };

                if let (Some(props), Some(rel)) = (props, self.relationships.get_mut(&id)) {
                    let (merged, changed) = merge_properties(&rel.properties, props);
                    rel.properties = merged;
                    summary.properties_set += changed;
                }
            }
        }
        Ok(summary)
    }

    fn detach_delete(&mut self, ids: &[i64]) -> Summary {
        let doomed: Vec<i64> = self
            .relationships
            .values()
            .filter(|r| ids.contains(&r.start_id) || ids.contains(&r.end_id))
            .map(|r| r.id)
            .collect();
        let mut summary = self.delete_relationships(&doomed);
        for id in ids {
            if self.nodes.remove(id).is_some() {
                summary.nodes_deleted += 1;
            }
        }
        summary
    }

    fn delete_relationships(&mut self, ids: &[i64]) -> Summary {
        let mut summary = Summary::default();
        for id in ids {
            if self.relationships.remove(id).is_some() {
                summary.relationships_deleted += 1;
            }
        }
        summary
    }

    fn allocate(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Constraints
    // ─────────────────────────────────────────────────────────────────────────

    fn check_unique(&self, id: i64, labels: &[String], props: &PropertyMap) -> DriverResult<()> {
        for (label, property) in &self.constraints {
            if !labels.contains(label) {
                continue;
            }
            let Some(value) = props.get(property).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = self.nodes.values().find(|n| {
                n.id != id && n.has_label(label) && n.properties.get(property) == Some(value)
            });
            if let Some(other) = clash {
                return Err(DriverError::ConstraintViolation(format!(
                    "Node({}) already exists with label `{}` and property `{}` = {}",
                    other.id,
                    label,
                    property,
                    value.to_json()
                )));
            }
        }
        Ok(())
    }

    fn check_existing_unique(&self, label: &str, property: &str) -> DriverResult<()> {
        let mut seen = Vec::new();
        for node in self.nodes.values().filter(|n| n.has_label(label)) {
            if let Some(value) = node.properties.get(property).filter(|v| !v.is_null()) {
                if seen.contains(&value) {
                    return Err(DriverError::ConstraintViolation(format!(
                        "Unable to create constraint on :{}({}): duplicate value {}",
                        label,
                        property,
                        value.to_json()
                    )));
                }
                seen.push(value);
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    fn find(&self, node: &NodeMatch, params: &Params) -> DriverResult<Vec<i64>> {
        let key = param(params, &node.key.param)?;
        Ok(self
            .nodes
            .values()
            .filter(|n| node.label.as_ref().map_or(true, |l| n.has_label(l)))
            .filter(|n| n.properties.get(&node.key.property) == Some(key))
            .map(|n| n.id)
            .collect())
    }

    fn select(
        &self,
        label: Option<&str>,
        filter: &[Predicate],
        params: &Params,
    ) -> DriverResult<Vec<i64>> {
        let mut ids = Vec::new();
        for node in self.nodes.values() {
            if label.map_or(true, |l| node.has_label(l)) && self.accepts(node, filter, params)? {
                ids.push(node.id);
            }
        }
        Ok(ids)
    }

    fn accepts(&self, node: &Node, filter: &[Predicate], params: &Params) -> DriverResult<bool> {
        for predicate in filter {
            let ok = match predicate {
                Predicate::Compare {
                    property,
                    op,
                    param: name,
                } => {
                    let expected = param(params, name)?;
                    node.get(property)
                        .map_or(false, |actual| compare(actual, *op, expected))
                }
                Predicate::Null { property, negated } => {
                    let missing = node.get(property).map_or(true, Value::is_null);
                    missing != *negated
                }
                Predicate::Reaches {
                    min,
                    max,
                    label,
                    key,
                } => {
                    let expected = param(params, &key.param)?;
                    self.paths_from(node.id, *max).iter().any(|p| {
                        p.len() >= *min as usize
                            && p.nodes.last().map_or(false, |n| {
                                n.has_label(label) && n.get(&key.property) == Some(expected)
                            })
                    })
                }
            };
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn order(&self, mut ids: Vec<i64>, order: Option<&Order>) -> Vec<i64> {
        if let Some(order) = order {
            ids.sort_by(|a, b| {
                let a = self.nodes.get(a).and_then(|n| n.get(&order.property));
                let b = self.nodes.get(b).and_then(|n| n.get(&order.property));
                sort_values(a, b, order.descending)
            });
        }
        ids
    }

    /// Every path of at most `max` hops starting at `start`, never reusing
    /// a relationship within one path
    fn paths_from(&self, start: i64, max: u32) -> Vec<Path> {
        let mut out = Vec::new();
        let mut nodes = vec![start];
        let mut rels = Vec::new();
        self.walk(&mut out, &mut nodes, &mut rels, max);
        out
    }

    fn walk(&self, out: &mut Vec<Path>, nodes: &mut Vec<i64>, rels: &mut Vec<i64>, left: u32) {
        out.push(Path {
            nodes: nodes
                .iter()
                .filter_map(|id| self.nodes.get(id).cloned())
                .collect(),
            relationships: rels
                .iter()
                .filter_map(|id| self.relationships.get(id).cloned())
                .collect(),
        });
        if left == 0 {
            return;
        }
        let Some(&last) = nodes.last() else {
            return;
        };
        let steps: Vec<(i64, i64)> = self
            .relationships
            .values()
            .filter(|r| !rels.contains(&r.id))
            .filter_map(|r| r.other(last).map(|next| (r.id, next)))
            .collect();
        for (rel, next) in steps {
            nodes.push(next);
            rels.push(rel);
            self.walk(out, nodes, rels, left - 1);
            nodes.pop();
            rels.pop();
        }
    }
}

fn connects(rel: &Relationship, start: i64, end: i64, arrow: Arrow) -> bool {
    let forward = rel.start_id == start && rel.end_id == end;
    let backward = rel.start_id == end && rel.end_id == start;
    match arrow {
        Arrow::Outgoing => forward,
        Arrow::Incoming => backward,
        Arrow::Undirected => forward || backward,
    }
}

/// `SET x += $props`: nulls remove, everything else overwrites
fn merge_properties(current: &PropertyMap, update: &PropertyMap) -> (PropertyMap, usize) {
    let mut merged = current.clone();
    let mut changed = 0;
    for (k, v) in update {
        if v.is_null() {
            if merged.remove(k).is_some() {
                changed += 1;
            }
        } else {
            merged.insert(k.clone(), v.clone());
            changed += 1;
        }
    }
    (merged, changed)
}

fn param<'a>(params: &'a Params, name: &str) -> DriverResult<&'a Value> {
    params
        .get(name)
        .ok_or_else(|| DriverError::Query(format!("Expected parameter(s): {}", name)))
}

fn map_param<'a>(params: &'a Params, name: &str) -> DriverResult<&'a PropertyMap> {
    match param(params, name)? {
        Value::Map(map) => Ok(map),
        other => Err(DriverError::Query(format!(
            "parameter ${} must be a map, got {}",
            name,
            other.to_json()
        ))),
    }
}

fn paginate<T>(items: Vec<T>, window: &Window) -> Vec<T> {
    items
        .into_iter()
        .skip(window.skip.unwrap_or(0))
        .take(window.limit.unwrap_or(usize::MAX))
        .collect()
}

fn order_of(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    }
}

fn compare(actual: &Value, op: CompareOp, expected: &Value) -> bool {
    if actual.is_null() || expected.is_null() {
        return false;
    }
    match op {
        CompareOp::Eq => actual == expected || order_of(actual, expected) == Some(Ordering::Equal),
        CompareOp::Ne => !(actual == expected || order_of(actual, expected) == Some(Ordering::Equal)),
        CompareOp::Lt => order_of(actual, expected) == Some(Ordering::Less),
        CompareOp::Le => matches!(
            order_of(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::Gt => order_of(actual, expected) == Some(Ordering::Greater),
        CompareOp::Ge => matches!(
            order_of(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::Contains | CompareOp::StartsWith | CompareOp::EndsWith => {
            match (actual.as_str(), expected.as_str()) {
                (Some(a), Some(e)) => match op {
                    CompareOp::Contains => a.contains(e),
                    CompareOp::StartsWith => a.starts_with(e),
                    _ => a.ends_with(e),
                },
                _ => false,
            }
        }
    }
}

/// Nulls sort last ascending and first descending
fn sort_values(a: Option<&Value>, b: Option<&Value>, descending: bool) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    let ascending = match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => order_of(a, b).unwrap_or(Ordering::Equal),
    };
    if descending {
        ascending.reverse()
    } else {
        ascending
    }
}

fn constraint_name(label: &str, property: &str) -> String {
    format!("constraint_{}_{}", label.to_lowercase(), property.to_lowercase())
}

fn index_name(label: &str, property: &str) -> String {
    format!("index_{}_{}", label.to_lowercase(), property.to_lowercase())
}

fn schema_row(name: String, kind: &str, label: &str, property: &str) -> Row {
    Row::new(
        vec![
            "name".to_string(),
            "type".to_string(),
            "labelsOrTypes".to_string(),
            "properties".to_string(),
        ],
        vec![
            Value::String(name),
            Value::from(kind),
            Value::List(vec![Value::from(label)]),
            Value::List(vec![Value::from(property)]),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::interpreter::parse;

    fn run(store: &mut Store, text: &str, params: Params) -> DriverResult<Outcome> {
        store.execute(&parse(text)?, &params)
    }

    fn props(pairs: &[(&str, Value)]) -> Value {
        Value::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    fn upsert(store: &mut Store, label: &str, key: &str, extra: &[(&str, Value)]) {
        let text = format!("MERGE (n:{} {{uuid: $key}}) SET n += $props", label);
        let mut params = Params::new();
        params.insert("key".into(), key.into());
        params.insert("props".into(), props(extra));
        run(store, &text, params).unwrap();
    }

    fn link(store: &mut Store, start: &str, end: &str) -> Summary {
        let mut params = Params::new();
        params.insert("start".into(), start.into());
        params.insert("end".into(), end.into());
        run(
            store,
            "MATCH (a:Teacher {uuid: $start}) MATCH (b:Course {uuid: $end}) MERGE (a)-[r:TEACHES]->(b)",
            params,
        )
        .unwrap()
        .summary
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut store = Store::default();
        upsert(&mut store, "Teacher", "t1", &[("name", "Ada".into())]);
        upsert(&mut store, "Teacher", "t1", &[("name", "Grace".into())]);
        assert_eq!(store.node_count(), 1);
        let node = store.nodes.values().next().unwrap();
        assert_eq!(node.get("name"), Some(&Value::from("Grace")));
    }

    #[test]
    fn test_null_property_removes() {
        let mut store = Store::default();
        upsert(&mut store, "Teacher", "t1", &[("name", "Ada".into())]);
        upsert(&mut store, "Teacher", "t1", &[("name", Value::Null)]);
        let node = store.nodes.values().next().unwrap();
        assert!(node.get("name").is_none());
    }

    #[test]
    fn test_link_merges_once() {
        let mut store = Store::default();
        upsert(&mut store, "Teacher", "t1", &[]);
        upsert(&mut store, "Course", "c1", &[]);
        assert_eq!(link(&mut store, "t1", "c1").relationships_created, 1);
        assert_eq!(link(&mut store, "t1", "c1").relationships_created, 0);
        assert_eq!(store.relationship_count(), 1);
    }

    #[test]
    fn test_unique_constraint_rejects_duplicates() {
        let mut store = Store::default();
        run(
            &mut store,
            "CREATE CONSTRAINT IF NOT EXISTS FOR (n:Course) REQUIRE n.title IS UNIQUE",
            Params::new(),
        )
        .unwrap();
        upsert(&mut store, "Course", "c1", &[("title", "Rust".into())]);

        let mut params = Params::new();
        params.insert("key".into(), "c2".into());
        params.insert("props".into(), props(&[("title", "Rust".into())]));
        let err = run(&mut store, "MERGE (n:Course {uuid: $key}) SET n += $props", params)
            .unwrap_err();
        assert!(matches!(err, DriverError::ConstraintViolation(_)));
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn test_paths_within_depth() {
        let mut store = Store::default();
        upsert(&mut store, "Teacher", "t1", &[]);
        upsert(&mut store, "Course", "c1", &[]);
        upsert(&mut store, "Course", "c2", &[]);
        link(&mut store, "t1", "c1");
        link(&mut store, "t1", "c2");

        let rows = run(
            &mut store,
            "MATCH p=(n:Course)-[*0..2]-() WHERE n.uuid = $key RETURN p",
            [("key".to_string(), Value::from("c1"))].into_iter().collect(),
        )
        .unwrap()
        .rows;
        // c1, c1-t1, c1-t1-c2
        assert_eq!(rows.len(), 3);
        let longest = rows
            .iter()
            .filter_map(|r| r.get("p").and_then(Value::as_path))
            .map(Path::len)
            .max();
        assert_eq!(longest, Some(2));
    }

    #[test]
    fn test_order_and_page() {
        let mut store = Store::default();
        for (key, name) in [("a", "Cy"), ("b", "Ada"), ("c", "Bo")] {
            upsert(&mut store, "Teacher", key, &[("name", name.into())]);
        }
        let rows = run(
            &mut store,
            "MATCH p=(n:Teacher) RETURN p ORDER BY n.name SKIP 1 LIMIT 1",
            Params::new(),
        )
        .unwrap()
        .rows;
        assert_eq!(rows.len(), 1);
        let start = rows[0]
            .get("p")
            .and_then(Value::as_path)
            .and_then(Path::start)
            .unwrap();
        assert_eq!(start.get("name"), Some(&Value::from("Bo")));
    }

    #[test]
    fn test_missing_parameter() {
        let mut store = Store::default();
        let err = run(
            &mut store,
            "MATCH (n:Teacher {uuid: $key}) DETACH DELETE n",
            Params::new(),
        )
        .unwrap_err();
        assert!(matches!(err, DriverError::Query(_)));
    }
}
