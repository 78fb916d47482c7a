//! Rendering of save plans into parameterized statements

use crate::error::Result;
use trellis_core::{Direction, EdgeWrite, NodeRef, SavePlan, Value, WriteOp};
use trellis_cypher::{Batch, NodePattern, Pattern, QueryBuilder, RelPattern, SetItem};

/// Stage one statement per write operation, in plan order
pub(crate) fn render(plan: &SavePlan) -> Result<Batch> {
    let mut batch = Batch::new();
    for op in plan.ops() {
        batch.stage(&statement(op))?;
    }
    Ok(batch)
}

fn endpoint(var: &str, node: &NodeRef, param: &str) -> NodePattern {
    NodePattern::new(var)
        .label(&node.label)
        .prop(&node.key_field, param)
}

fn arrow(directed: bool) -> Direction {
    if directed {
        Direction::Outgoing
    } else {
        Direction::Undirected
    }
}

fn statement(op: &WriteOp) -> QueryBuilder {
    match op {
        WriteOp::Upsert { node, props } => QueryBuilder::new()
            .merge(&Pattern::node(endpoint("n", node, "key")))
            .set(&[SetItem::merge("n", "props")])
            .param("key", node.key.to_value())
            .param("props", Value::Map(props.clone())),

        WriteOp::Link {
            relationship,
            start,
            end,
            directed,
            edge,
        } => {
            let mut rel = RelPattern::new()
                .var("r")
                .rel_type(relationship)
                .direction(arrow(*directed));
            if let Some(EdgeWrite { key_field, .. }) = edge {
                rel = rel.prop(key_field, "edge");
            }
            let builder = QueryBuilder::new()
                .match_(&Pattern::node(endpoint("a", start, "start")))
                .match_(&Pattern::node(endpoint("b", end, "end")))
                .merge(&Pattern::node(NodePattern::new("a")).to(rel, NodePattern::new("b")))
                .param("start", start.key.to_value())
                .param("end", end.key.to_value());
            match edge {
                Some(edge) => builder
                    .set(&[SetItem::merge("r", "props")])
                    .param("edge", edge.key.to_value())
                    .param("props", Value::Map(edge.props.clone())),
                None => builder,
            }
        }

        WriteOp::Unlink {
            relationship,
            start,
            end,
            directed,
        } => QueryBuilder::new()
            .match_(&Pattern::node(endpoint("a", start, "start")).to(
                RelPattern::new()
                    .var("r")
                    .rel_type(relationship)
                    .direction(arrow(*directed)),
                endpoint("b", end, "end"),
            ))
            .delete(false, &["r"])
            .param("start", start.key.to_value())
            .param("end", end.key.to_value()),

        WriteOp::UnlinkEdge {
            relationship,
            node,
            edge_key_field,
            edge_key,
        } => QueryBuilder::new()
            .match_(&Pattern::node(endpoint("a", node, "start")).to(
                RelPattern::new()
                    .var("r")
                    .rel_type(relationship)
                    .prop(edge_key_field, "edge"),
                NodePattern::anonymous(),
            ))
            .delete(false, &["r"])
            .param("start", node.key.to_value())
            .param("edge", edge_key.to_value()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{Key, Params};

    fn node(label: &str, key: &str) -> NodeRef {
        NodeRef {
            label: label.to_string(),
            key_field: "uuid".to_string(),
            key: Key::from(key),
        }
    }

    #[test]
    fn test_upsert() {
        let mut props = Params::new();
        props.insert("name".to_string(), Value::from("Oates"));
        let stmt = statement(&WriteOp::Upsert {
            node: node("Teacher", "t1"),
            props,
        })
        .build()
        .unwrap();
        assert_eq!(stmt.text, "MERGE (n:Teacher {uuid: $key}) SET n += $props");
        assert_eq!(stmt.params.get("key"), Some(&Value::from("t1")));
    }

    #[test]
    fn test_link_plain_and_undirected() {
        let stmt = statement(&WriteOp::Link {
            relationship: "TEACHES_CLASS".to_string(),
            start: node("Teacher", "t1"),
            end: node("Course", "c1"),
            directed: true,
            edge: None,
        })
        .build()
        .unwrap();
        assert_eq!(
            stmt.text,
            "MATCH (a:Teacher {uuid: $start}) MATCH (b:Course {uuid: $end}) \
             MERGE (a)-[r:TEACHES_CLASS]->(b)"
        );

        let stmt = statement(&WriteOp::Link {
            relationship: "PEER".to_string(),
            start: node("Student", "s1"),
            end: node("Student", "s2"),
            directed: false,
            edge: None,
        })
        .build()
        .unwrap();
        assert!(stmt.text.ends_with("MERGE (a)-[r:PEER]-(b)"));
    }

    #[test]
    fn test_link_with_edge() {
        let mut props = Params::new();
        props.insert("enrolled_date".to_string(), Value::from("2024-01-01T00:00:00Z"));
        let stmt = statement(&WriteOp::Link {
            relationship: "ENROLLED".to_string(),
            start: node("Student", "s1"),
            end: node("Course", "c1"),
            directed: true,
            edge: Some(EdgeWrite {
                key_field: "uuid".to_string(),
                key: Key::from("e1"),
                props,
            }),
        })
        .build()
        .unwrap();
        assert_eq!(
            stmt.text,
            "MATCH (a:Student {uuid: $start}) MATCH (b:Course {uuid: $end}) \
             MERGE (a)-[r:ENROLLED {uuid: $edge}]->(b) SET r += $props"
        );
        assert_eq!(stmt.params.get("edge"), Some(&Value::from("e1")));
    }

    #[test]
    fn test_unlinks() {
        let stmt = statement(&WriteOp::Unlink {
            relationship: "TEACHES_CLASS".to_string(),
            start: node("Teacher", "t1"),
            end: node("Course", "c1"),
            directed: true,
        })
        .build()
        .unwrap();
        assert_eq!(
            stmt.text,
            "MATCH (a:Teacher {uuid: $start})-[r:TEACHES_CLASS]->(b:Course {uuid: $end}) DELETE r"
        );

        let stmt = statement(&WriteOp::UnlinkEdge {
            relationship: "ENROLLED".to_string(),
            node: node("Student", "s1"),
            edge_key_field: "uuid".to_string(),
            edge_key: Key::from("e1"),
        })
        .build()
        .unwrap();
        assert_eq!(
            stmt.text,
            "MATCH (a:Student {uuid: $start})-[r:ENROLLED {uuid: $edge}]-() DELETE r"
        );
    }
}
