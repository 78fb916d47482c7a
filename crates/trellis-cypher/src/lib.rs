//! Trellis Cypher - Query construction for the Trellis graph mapper
//!
//! Provides a deferred-error fluent [`QueryBuilder`], the pattern and
//! condition sub-expressions it renders, and the path load strategies the
//! session uses to fetch entities to a bounded depth.

pub mod builder;
pub mod clause;
pub mod condition;
pub mod error;
mod ident;
pub mod pattern;
pub mod strategy;

pub use builder::{Batch, Bound, QueryBuilder};
pub use clause::{OrderBy, RemoveItem, ReturnItem, SetItem, Unwind};
pub use condition::{Comparison, Condition};
pub use error::{CypherError, CypherResult};
pub use pattern::{NodePattern, Pattern, RelPattern};
pub use strategy::{load_all, load_edge_constraint, load_one, EdgeConstraint, Pagination};
