//! Trellis Core - Metadata engine and object graph for the Trellis mapper
//!
//! This crate turns declared entity schemas into validated configuration,
//! cross-checks relationship declarations, and provides the object graph
//! that loads decode into and saves are planned from.

pub mod binding;
pub mod catalog;
pub mod codec;
pub mod decode;
pub mod entity;
pub mod error;
pub mod field;
pub mod graph;
pub mod key;
pub mod limits;
pub mod plan;
pub mod registry;
pub mod relation;
pub mod snapshot;
pub mod tag;
pub mod value;

pub use catalog::{Catalog, CatalogBuilder, CatalogEntry};
pub use decode::{decode, Decoded, Loaded};
pub use entity::{
    derive_config, derive_edge_config, BaseNode, EdgeEntity, Entity, EntityConfig, EntityKind,
};
pub use error::{Error, Result};
pub use field::{FieldConfig, FieldDescriptor, FieldType, Primitive};
pub use graph::ObjectGraph;
pub use key::{Key, KeyKind, Ref};
pub use limits::{LimitError, MAX_LOAD_DEPTH, MAX_SAVE_DEPTH};
pub use plan::{EdgeWrite, NodeRef, SavePlan, WriteOp};
pub use registry::{RegistryBuilder, RelationshipRegistry};
pub use relation::{Cardinality, Direction};
pub use snapshot::LoadSnapshot;
pub use value::{Node, Params, Path, PropertyMap, Relationship, Value};
