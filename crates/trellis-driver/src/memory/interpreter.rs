//! Statement recognition for the in-memory driver.
//!
//! Only the statement shapes the mapper and its query builder emit are
//! understood. Anything else is reported as unsupported rather than
//! guessed at.

use crate::error::{DriverError, DriverResult};
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// `{property: $param}` inside a pattern
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PropParam {
    pub property: String,
    pub param: String,
}

/// A node pattern matched by one keyed property
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NodeMatch {
    pub label: Option<String>,
    pub key: PropParam,
}

/// Arrow drawn between the first and second node of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arrow {
    Outgoing,
    Incoming,
    Undirected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    StartsWith,
    EndsWith,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Predicate {
    Compare {
        property: String,
        op: CompareOp,
        param: String,
    },
    Null {
        property: String,
        negated: bool,
    },
    /// `(n)-[*min..max]-(:Label {property: $param})`
    Reaches {
        min: u32,
        max: u32,
        label: String,
        key: PropParam,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Order {
    pub property: String,
    pub descending: bool,
}

/// Ordering and paging shared by read statements
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Window {
    pub order: Option<Order>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Projection {
    Nodes,
    Count,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Op {
    Purge,
    DetachDelete(NodeMatch),
    Upsert {
        node: NodeMatch,
        props: String,
    },
    Link {
        start: NodeMatch,
        end: NodeMatch,
        rel_type: String,
        arrow: Arrow,
        edge: Option<PropParam>,
        props: Option<String>,
    },
    Unlink {
        start: NodeMatch,
        end: NodeMatch,
        rel_type: String,
        arrow: Arrow,
    },
    UnlinkEdge {
        start: NodeMatch,
        rel_type: String,
        edge: PropParam,
    },
    LoadPaths {
        label: String,
        hops: Option<(u32, u32)>,
        filter: Vec<Predicate>,
        column: String,
        window: Window,
    },
    MatchNodes {
        label: Option<String>,
        filter: Vec<Predicate>,
        projection: Projection,
        column: String,
        window: Window,
    },
    CountRelationships {
        rel_type: Option<String>,
        column: String,
    },
    CreateConstraint {
        label: String,
        property: String,
    },
    CreateIndex {
        label: String,
        property: String,
    },
    DropConstraint {
        name: String,
        if_exists: bool,
    },
    DropIndex {
        name: String,
        if_exists: bool,
    },
    ShowConstraints,
    ShowIndexes,
}

impl Op {
    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            Self::LoadPaths { .. }
                | Self::MatchNodes { .. }
                | Self::CountRelationships { .. }
                | Self::ShowConstraints
                | Self::ShowIndexes
        )
    }
}

struct Patterns {
    purge: Regex,
    delete: Regex,
    upsert: Regex,
    link: Regex,
    unlink: Regex,
    unlink_edge: Regex,
    load: Regex,
    match_nodes: Regex,
    count_rels: Regex,
    create_constraint: Regex,
    create_index: Regex,
    drop_constraint: Regex,
    drop_index: Regex,
    compare: Regex,
    null_check: Regex,
    reaches: Regex,
}

const NODE_KEY: &str = r"\((\w+):(\w+) \{(\w+): \$(\w+)\}\)";
const WINDOW: &str =
    r"(?: ORDER BY (\w+)\.(\w+)( DESC| ASC)?)?(?: SKIP (\d+))?(?: LIMIT (\d+))?";

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            purge: Regex::new(r"^MATCH \((\w+)\) DETACH DELETE (\w+)$")?,
            delete: Regex::new(r"^MATCH \((\w+)(?::(\w+))? \{(\w+): \$(\w+)\}\) DETACH DELETE (\w+)$")?,
            upsert: Regex::new(&format!(r"^MERGE {} SET (\w+) \+= \$(\w+)$", NODE_KEY))?,
            link: Regex::new(&format!(
                r"^MATCH {} MATCH {} MERGE \((\w+)\)(<?-)\[(\w+):(\w+)(?: \{{(\w+): \$(\w+)\}})?\]-(>?)\((\w+)\)(?: SET (\w+) \+= \$(\w+))?$",
                NODE_KEY, NODE_KEY
            ))?,
            unlink: Regex::new(&format!(
                r"^MATCH {}(<?-)\[(\w+):(\w+)\]-(>?){} DELETE (\w+)$",
                NODE_KEY, NODE_KEY
            ))?,
            unlink_edge: Regex::new(&format!(
                r"^MATCH {}(<?-)\[(\w+):(\w+) \{{(\w+): \$(\w+)\}}\]-(>?)\(\) DELETE (\w+)$",
                NODE_KEY
            ))?,
            load: Regex::new(&format!(
                r"^MATCH (\w+)=\((\w+):(\w+)\)(?:-\[\*(\d+)\.\.(\d+)\]-\(\))?(?: WHERE (.+?))? RETURN (\w+){}$",
                WINDOW
            ))?,
            match_nodes: Regex::new(&format!(
                r"^MATCH \((\w+)(?::(\w+))?\)(?: WHERE (.+?))? RETURN (?:count\((\w+)\)|(\w+))(?: AS (\w+))?{}$",
                WINDOW
            ))?,
            count_rels: Regex::new(
                r"^MATCH \(\)-\[(\w+)(?::(\w+))?\]->?\(\) RETURN count\((\w+)\)(?: AS (\w+))?$",
            )?,
            create_constraint: Regex::new(
                r"^CREATE CONSTRAINT(?: \w+)? IF NOT EXISTS FOR \((\w+):(\w+)\) REQUIRE (\w+)\.(\w+) IS UNIQUE$",
            )?,
            create_index: Regex::new(
                r"^CREATE INDEX(?: \w+)? IF NOT EXISTS FOR \((\w+):(\w+)\) ON \((\w+)\.(\w+)\)$",
            )?,
            drop_constraint: Regex::new(r"^DROP CONSTRAINT (\w+)( IF EXISTS)?$")?,
            drop_index: Regex::new(r"^DROP INDEX (\w+)( IF EXISTS)?$")?,
            compare: Regex::new(
                r"^(\w+)\.(\w+) (=|<>|<=|>=|<|>|CONTAINS|STARTS WITH|ENDS WITH) \$(\w+)$",
            )?,
            null_check: Regex::new(r"^(\w+)\.(\w+) IS (NOT )?NULL$")?,
            reaches: Regex::new(
                r"^\((\w+)\)-\[\*(\d+)\.\.(\d+)\]-\(:(\w+) \{(\w+): \$(\w+)\}\)$",
            )?,
        })
    }
}

static PATTERNS: OnceLock<Result<Patterns, regex::Error>> = OnceLock::new();

fn patterns() -> DriverResult<&'static Patterns> {
    PATTERNS
        .get_or_init(Patterns::compile)
        .as_ref()
        .map_err(|e| DriverError::Query(format!("statement patterns failed to compile: {}", e)))
}

/// Recognize a statement
pub(crate) fn parse(text: &str) -> DriverResult<Op> {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let p = patterns()?;

    match text.as_str() {
        "SHOW CONSTRAINTS" => return Ok(Op::ShowConstraints),
        "SHOW INDEXES" => return Ok(Op::ShowIndexes),
        _ => {}
    }

    if let Some(c) = p.purge.captures(&text) {
        same_var(&c[1], &c[2], &text)?;
        return Ok(Op::Purge);
    }

    if let Some(c) = p.delete.captures(&text) {
        same_var(&c[1], &c[5], &text)?;
        return Ok(Op::DetachDelete(NodeMatch {
            label: c.get(2).map(|m| m.as_str().to_string()),
            key: prop_param(&c, 3),
        }));
    }

    if let Some(c) = p.upsert.captures(&text) {
        same_var(&c[1], &c[5], &text)?;
        return Ok(Op::Upsert {
            node: node_match(&c, 1),
            props: c[6].to_string(),
        });
    }

    if let Some(c) = p.link.captures(&text) {
        let first = (&c[1], node_match(&c, 1));
        let second = (&c[5], node_match(&c, 5));
        let lookup = |var: &str| {
            if var == first.0 {
                Ok(first.1.clone())
            } else if var == second.0 {
                Ok(second.1.clone())
            } else {
                Err(unsupported(&text))
            }
        };
        let start = lookup(&c[9])?;
        let end = lookup(&c[16])?;
        if let Some(set_var) = c.get(17) {
            same_var(set_var.as_str(), &c[11], &text)?;
        }
        return Ok(Op::Link {
            start,
            end,
            rel_type: c[12].to_string(),
            arrow: arrow(&c[10], &c[15], &text)?,
            edge: c.get(13).map(|_| prop_param(&c, 13)),
            props: c.get(18).map(|m| m.as_str().to_string()),
        });
    }

    if let Some(c) = p.unlink.captures(&text) {
        same_var(&c[6], &c[13], &text)?;
        return Ok(Op::Unlink {
            start: node_match(&c, 1),
            end: node_match(&c, 9),
            rel_type: c[7].to_string(),
            arrow: arrow(&c[5], &c[8], &text)?,
        });
    }

    if let Some(c) = p.unlink_edge.captures(&text) {
        same_var(&c[6], &c[11], &text)?;
        return Ok(Op::UnlinkEdge {
            start: node_match(&c, 1),
            rel_type: c[7].to_string(),
            edge: prop_param(&c, 8),
        });
    }

    if let Some(c) = p.load.captures(&text) {
        let (path_var, node_var) = (&c[1], &c[2]);
        same_var(path_var, &c[7], &text)?;
        let hops = match (c.get(4), c.get(5)) {
            (Some(min), Some(max)) => Some((number(min.as_str())?, number(max.as_str())?)),
            _ => None,
        };
        return Ok(Op::LoadPaths {
            label: c[3].to_string(),
            hops,
            filter: where_clause(c.get(6).map(|m| m.as_str()), node_var)?,
            column: path_var.to_string(),
            window: window(&c, 8, node_var, &text)?,
        });
    }

    if let Some(c) = p.match_nodes.captures(&text) {
        let node_var = &c[1];
        let (projection, returned) = match (c.get(4), c.get(5)) {
            (Some(v), _) => (Projection::Count, v.as_str()),
            (_, Some(v)) => (Projection::Nodes, v.as_str()),
            _ => return Err(unsupported(&text)),
        };
        same_var(node_var, returned, &text)?;
        let column = match (c.get(6), &projection) {
            (Some(alias), _) => alias.as_str().to_string(),
            (None, Projection::Count) => format!("count({})", node_var),
            (None, Projection::Nodes) => node_var.to_string(),
        };
        return Ok(Op::MatchNodes {
            label: c.get(2).map(|m| m.as_str().to_string()),
            filter: where_clause(c.get(3).map(|m| m.as_str()), node_var)?,
            projection,
            column,
            window: window(&c, 7, node_var, &text)?,
        });
    }

    if let Some(c) = p.count_rels.captures(&text) {
        same_var(&c[1], &c[3], &text)?;
        return Ok(Op::CountRelationships {
            rel_type: c.get(2).map(|m| m.as_str().to_string()),
            column: c
                .get(4)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| format!("count({})", &c[1])),
        });
    }

    if let Some(c) = p.create_constraint.captures(&text) {
        same_var(&c[1], &c[3], &text)?;
        return Ok(Op::CreateConstraint {
            label: c[2].to_string(),
            property: c[4].to_string(),
        });
    }

    if let Some(c) = p.create_index.captures(&text) {
        same_var(&c[1], &c[3], &text)?;
        return Ok(Op::CreateIndex {
            label: c[2].to_string(),
            property: c[4].to_string(),
        });
    }

    if let Some(c) = p.drop_constraint.captures(&text) {
        return Ok(Op::DropConstraint {
            name: c[1].to_string(),
            if_exists: c.get(2).is_some(),
        });
    }

    if let Some(c) = p.drop_index.captures(&text) {
        return Ok(Op::DropIndex {
            name: c[1].to_string(),
            if_exists: c.get(2).is_some(),
        });
    }

    Err(unsupported(&text))
}

fn unsupported(text: &str) -> DriverError {
    DriverError::Unsupported(text.to_string())
}

fn same_var(a: &str, b: &str, text: &str) -> DriverResult<()> {
    if a == b {
        Ok(())
    } else {
        Err(unsupported(text))
    }
}

fn number<T: std::str::FromStr>(s: &str) -> DriverResult<T> {
    s.parse()
        .map_err(|_| DriverError::Query(format!("invalid number: {}", s)))
}

fn prop_param(c: &Captures<'_>, at: usize) -> PropParam {
    PropParam {
        property: c[at].to_string(),
        param: c[at + 1].to_string(),
    }
}

/// Node match from `(var:Label {prop: $param})` captured starting at `at`
fn node_match(c: &Captures<'_>, at: usize) -> NodeMatch {
    NodeMatch {
        label: Some(c[at + 1].to_string()),
        key: prop_param(c, at + 2),
    }
}

fn arrow(left: &str, right: &str, text: &str) -> DriverResult<Arrow> {
    match (left, right) {
        ("-", ">") => Ok(Arrow::Outgoing),
        ("<-", "") => Ok(Arrow::Incoming),
        ("-", "") => Ok(Arrow::Undirected),
        _ => Err(unsupported(text)),
    }
}

fn window(c: &Captures<'_>, at: usize, node_var: &str, text: &str) -> DriverResult<Window> {
    let order = match c.get(at) {
        Some(var) => {
            same_var(var.as_str(), node_var, text)?;
            Some(Order {
                property: c[at + 1].to_string(),
                descending: c.get(at + 2).map(|m| m.as_str()) == Some(" DESC"),
            })
        }
        None => None,
    };
    Ok(Window {
        order,
        skip: c.get(at + 3).map(|m| number(m.as_str())).transpose()?,
        limit: c.get(at + 4).map(|m| number(m.as_str())).transpose()?,
    })
}

/// Conjunction of simple predicates over one node variable
fn where_clause(clause: Option<&str>, var: &str) -> DriverResult<Vec<Predicate>> {
    let Some(clause) = clause else {
        return Ok(Vec::new());
    };
    if clause.contains(" OR ") || clause.contains(" XOR ") || clause.starts_with("NOT ") {
        return Err(unsupported(clause));
    }

    let p = patterns()?;
    let mut predicates = Vec::new();
    for part in clause.split(" AND ") {
        let part = strip_group(part.trim(), var);

        if let Some(c) = p.compare.captures(part) {
            same_var(&c[1], var, part)?;
            let op = match &c[3] {
                "=" => CompareOp::Eq,
                "<>" => CompareOp::Ne,
                "<" => CompareOp::Lt,
                "<=" => CompareOp::Le,
                ">" => CompareOp::Gt,
                ">=" => CompareOp::Ge,
                "CONTAINS" => CompareOp::Contains,
                "STARTS WITH" => CompareOp::StartsWith,
                _ => CompareOp::EndsWith,
            };
            predicates.push(Predicate::Compare {
                property: c[2].to_string(),
                op,
                param: c[4].to_string(),
            });
        } else if let Some(c) = p.null_check.captures(part) {
            same_var(&c[1], var, part)?;
            predicates.push(Predicate::Null {
                property: c[2].to_string(),
                negated: c.get(3).is_some(),
            });
        } else if let Some(c) = p.reaches.captures(part) {
            same_var(&c[1], var, part)?;
            predicates.push(Predicate::Reaches {
                min: number(&c[2])?,
                max: number(&c[3])?,
                label: c[4].to_string(),
                key: prop_param(&c, 5),
            });
        } else {
            return Err(unsupported(part));
        }
    }
    Ok(predicates)
}

/// `(n.prop = $x)` -> `n.prop = $x`; path patterns keep their parentheses
fn strip_group<'a>(part: &'a str, var: &str) -> &'a str {
    let prefix = format!("({}.", var);
    if part.starts_with(&prefix) && part.ends_with(')') {
        &part[1..part.len() - 1]
    } else {
        part
    }
}
