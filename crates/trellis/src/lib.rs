//! Trellis - Object-graph mapper for Cypher graph databases
//!
//! Entities declare their fields once; the catalog derives and cross-checks
//! their persistence metadata at startup. Sessions load bounded
//! neighbourhoods of the graph into an [`ObjectGraph`], and saves diff that
//! graph against what was loaded to write only the changed relationships.
//!
//! ```ignore
//! let catalog = Catalog::builder()
//!     .register::<Teacher>()
//!     .register::<Course>()
//!     .build()?;
//! let ogm = Ogm::in_memory(Config::default(), catalog).await?;
//!
//! let mut session = ogm.session(AccessMode::ReadWrite).await?;
//! let mut graph = session.graph();
//! let teacher = graph.insert(Teacher::new("Oates"))?;
//! session.save(&mut graph, &teacher, 1).await?;
//! session.close().await?;
//! ```

pub mod config;
pub mod error;
mod index;
pub mod ogm;
mod save;
pub mod session;

pub use config::{Config, IndexStrategy};
pub use error::{Error, Result};
pub use ogm::Ogm;
pub use session::{LoadOptions, Session};

pub use trellis_core::{
    BaseNode, Catalog, Decoded, Direction, EdgeEntity, Entity, FieldDescriptor, FieldType, Key,
    Loaded, ObjectGraph, Params, Ref, Value,
};
pub use trellis_cypher::{Comparison, Condition, EdgeConstraint, Pagination, QueryBuilder};
pub use trellis_driver::{AccessMode, MemoryPool, Pool, Row, Summary};
