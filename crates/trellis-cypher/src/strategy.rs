//! Path load strategies.
//!
//! Every strategy matches paths rooted at nodes of one label and returns
//! them as `p`:
//!
//! ```text
//! MATCH p=(n:Label)-[*0..depth]-() WHERE ... RETURN p
//! ```
//!
//! Depth 0 drops the relationship segment and returns the root alone.

use crate::builder::QueryBuilder;
use crate::clause::{OrderBy, ReturnItem};
use crate::condition::Condition;
use crate::error::{CypherError, CypherResult};
use crate::pattern::{NodePattern, Pattern, RelPattern};
use serde::{Deserialize, Serialize};
use trellis_core::limits::validate_load_depth;

/// Variable every strategy binds the returned path to
pub const PATH_VAR: &str = "p";

/// Ordering plus page window for a load
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub order_by_var: String,
    pub order_by_field: String,
    #[serde(default)]
    pub descending: bool,
}

impl Pagination {
    pub fn new(
        page: i64,
        limit: i64,
        order_by_var: impl Into<String>,
        order_by_field: impl Into<String>,
    ) -> Self {
        Self {
            page,
            limit,
            order_by_var: order_by_var.into(),
            order_by_field: order_by_field.into(),
            descending: false,
        }
    }

    /// Builder method to sort descending
    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    /// All four of page, limit and both order-by names must be usable
    pub fn validate(&self) -> CypherResult<()> {
        let mut problems = Vec::new();
        if self.page < 0 {
            problems.push(format!("page number must be >= 0, got {}", self.page));
        }
        if self.limit <= 1 {
            problems.push(format!("limit per page must be > 1, got {}", self.limit));
        }
        if self.order_by_var.trim().is_empty() {
            problems.push("order by variable can not be empty".to_string());
        }
        if self.order_by_field.trim().is_empty() {
            problems.push("order by field can not be empty".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(CypherError::Pagination(problems.join("; ")))
        }
    }

    /// Append `ORDER BY var.field [DESC] SKIP page*limit LIMIT limit`
    pub fn apply(&self, builder: QueryBuilder) -> CypherResult<QueryBuilder> {
        self.validate()?;
        let order = OrderBy {
            var: self.order_by_var.clone(),
            field: self.order_by_field.clone(),
            descending: self.descending,
        };
        // validate() guarantees both are non-negative
        let skip = (self.page as u64).saturating_mul(self.limit as u64);
        Ok(builder
            .order_by(&[order])
            .skip(skip)
            .limit(self.limit as u64))
    }
}

/// The far end an edge-constrained load must reach
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeConstraint {
    pub end_label: String,
    pub end_field: String,
    pub min_jumps: u32,
    pub max_jumps: u32,
}

impl EdgeConstraint {
    pub fn new(end_label: impl Into<String>, end_field: impl Into<String>) -> Self {
        Self {
            end_label: end_label.into(),
            end_field: end_field.into(),
            min_jumps: 1,
            max_jumps: 1,
        }
    }

    pub fn jumps(mut self, min: u32, max: u32) -> Self {
        self.min_jumps = min;
        self.max_jumps = max;
        self
    }

    /// `(var)-[*min..max]-(:End {field: $field})`; the value is bound under
    /// the field name
    fn condition(&self, var: &str) -> Condition {
        Condition::exists(Pattern::node(NodePattern::new(var)).to(
            RelPattern::new().hops(self.min_jumps, self.max_jumps),
            NodePattern::anonymous()
                .label(&self.end_label)
                .prop(&self.end_field, &self.end_field),
        ))
    }
}

fn paths(var: &str, label: &str, depth: u32) -> QueryBuilder {
    let root = NodePattern::new(var).label(label);
    let pattern = if depth == 0 {
        Pattern::node(root)
    } else {
        Pattern::node(root).to(RelPattern::new().hops(0, depth), NodePattern::anonymous())
    };
    let builder = QueryBuilder::new();
    let builder = match validate_load_depth(depth) {
        Ok(()) => builder,
        Err(e) => builder.fail(e.to_string()),
    };
    builder.match_(&pattern.path(PATH_VAR))
}

fn finish(builder: QueryBuilder, conditions: Vec<Condition>) -> QueryBuilder {
    let builder = match conditions.len() {
        0 => builder,
        1 => builder.where_(&conditions[0]),
        _ => builder.where_(&Condition::And(conditions)),
    };
    builder.return_(false, &[ReturnItem::var(PATH_VAR)])
}

/// Paths around the single node whose `key_field` equals `$key_field`
pub fn load_one(
    var: &str,
    label: &str,
    key_field: &str,
    depth: u32,
    filter: Option<&Condition>,
) -> QueryBuilder {
    let mut conditions = vec![Condition::eq(var, key_field, key_field)];
    conditions.extend(filter.cloned());
    finish(paths(var, label, depth), conditions)
}

/// Paths around every node of `label`
pub fn load_all(var: &str, label: &str, depth: u32, filter: Option<&Condition>) -> QueryBuilder {
    finish(paths(var, label, depth), filter.cloned().into_iter().collect())
}

/// Paths around every node of `label` that reaches the constrained end
pub fn load_edge_constraint(
    var: &str,
    label: &str,
    constraint: &EdgeConstraint,
    depth: u32,
    filter: Option<&Condition>,
) -> QueryBuilder {
    let mut conditions = vec![constraint.condition(var)];
    conditions.extend(filter.cloned());
    finish(paths(var, label, depth), conditions)
}
