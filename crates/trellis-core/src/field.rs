//! Field descriptors and derived field configuration

use crate::entity::{EdgeEntity, Entity};
use crate::key::KeyKind;
use crate::relation::{Cardinality, Direction};
use crate::tag::{self, Tag};
use serde::Serialize;

/// Primitive scalar kinds an alias may wrap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
}

impl Primitive {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::U8 | Self::U16 | Self::U32 | Self::U64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Coerce a JSON scalar to this primitive's storage shape.
    ///
    /// Returns `None` when the value cannot be represented.
    pub fn coerce(&self, json: &serde_json::Value) -> Option<serde_json::Value> {
        use serde_json::Value as Json;
        match (self, json) {
            (_, Json::Null) => Some(Json::Null),
            (Self::Bool, Json::Bool(_)) => Some(json.clone()),
            (Self::String, Json::String(_)) => Some(json.clone()),
            (p, Json::Number(n)) if p.is_integer() => n
                .as_i64()
                .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
                .map(Json::from),
            (p, Json::Number(n)) if p.is_float() => n
                .as_f64()
                .and_then(serde_json::Number::from_f64)
                .map(Json::Number),
            _ => None,
        }
    }
}

/// Label of a relationship target, captured at descriptor construction
#[derive(Clone, Copy)]
pub struct Target {
    label: fn() -> &'static str,
    endpoints: Option<Endpoints>,
}

#[derive(Clone, Copy)]
struct Endpoints {
    start: fn() -> &'static str,
    end: fn() -> &'static str,
}

impl Target {
    pub fn node<T: Entity>() -> Self {
        Self {
            label: T::label,
            endpoints: None,
        }
    }

    pub fn edge<E: EdgeEntity>() -> Self {
        Self {
            label: E::label,
            endpoints: Some(Endpoints {
                start: <E::Start as Entity>::label,
                end: <E::End as Entity>::label,
            }),
        }
    }

    /// Label of the referenced entity (the edge entity for edge targets)
    pub fn label(&self) -> &'static str {
        (self.label)()
    }

    pub fn is_edge(&self) -> bool {
        self.endpoints.is_some()
    }

    /// Label of the node on the far side of the relationship.
    ///
    /// For edge targets this is the edge's end when outgoing, its start
    /// otherwise.
    pub fn peer_label(&self, direction: Direction) -> &'static str {
        match self.endpoints {
            Some(endpoints) if direction == Direction::Outgoing => (endpoints.end)(),
            Some(endpoints) => (endpoints.start)(),
            None => self.label(),
        }
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.endpoints {
            Some(e) => write!(f, "Edge({}: {} -> {})", self.label(), (e.start)(), (e.end)()),
            None => write!(f, "Node({})", self.label()),
        }
    }
}

/// Declared type of an entity field
#[derive(Clone, Copy)]
pub enum FieldType {
    Primitive(Primitive),
    /// Named wrapper around a primitive
    Alias {
        name: &'static str,
        underlying: Primitive,
    },
    DateTime,
    /// String-keyed map of dynamic values, stored as `field.key` properties
    PropertiesMap,
    /// Any other map type
    Map,
    One(Target),
    Many(Target),
    /// Descriptors of a flattened struct
    Embedded(fn() -> Vec<FieldDescriptor>),
}

impl FieldType {
    pub const BOOL: Self = Self::Primitive(Primitive::Bool);
    pub const INT64: Self = Self::Primitive(Primitive::I64);
    pub const FLOAT64: Self = Self::Primitive(Primitive::F64);
    pub const STRING: Self = Self::Primitive(Primitive::String);

    pub fn alias(name: &'static str, underlying: Primitive) -> Self {
        Self::Alias { name, underlying }
    }

    /// Reference to a single node entity
    pub fn one<T: Entity>() -> Self {
        Self::One(Target::node::<T>())
    }

    /// References to many node entities
    pub fn many<T: Entity>() -> Self {
        Self::Many(Target::node::<T>())
    }

    /// Reference to a single edge entity
    pub fn edge<E: EdgeEntity>() -> Self {
        Self::One(Target::edge::<E>())
    }

    /// References to many edge entities
    pub fn edges<E: EdgeEntity>() -> Self {
        Self::Many(Target::edge::<E>())
    }

    /// The primitive this type stores as, resolving aliases
    pub fn primitive(&self) -> Option<Primitive> {
        match self {
            Self::Primitive(p) => Some(*p),
            Self::Alias { underlying, .. } => Some(*underlying),
            _ => None,
        }
    }

    pub fn target(&self) -> Option<&Target> {
        match self {
            Self::One(t) | Self::Many(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Self::PropertiesMap | Self::Map)
    }
}

impl std::fmt::Debug for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primitive(p) => write!(f, "{:?}", p),
            Self::Alias { name, underlying } => write!(f, "{}({:?})", name, underlying),
            Self::DateTime => f.write_str("DateTime"),
            Self::PropertiesMap => f.write_str("PropertiesMap"),
            Self::Map => f.write_str("Map"),
            Self::One(t) => write!(f, "One({:?})", t),
            Self::Many(t) => write!(f, "Many({:?})", t),
            Self::Embedded(_) => f.write_str("Embedded"),
        }
    }
}

/// A field as declared by an entity type
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub ty: FieldType,
    pub declaration: &'static str,
}

impl FieldDescriptor {
    pub fn new(name: &'static str, ty: FieldType, declaration: &'static str) -> Self {
        Self {
            name,
            ty,
            declaration,
        }
    }

    /// Flatten another descriptor list into the owning entity
    pub fn embed(fields: fn() -> Vec<FieldDescriptor>) -> Self {
        Self {
            name: "",
            ty: FieldType::Embedded(fields),
            declaration: "",
        }
    }
}

/// Derived persistence contract of one field
#[derive(Debug, Clone, Serialize)]
pub struct FieldConfig {
    pub field_name: String,
    pub stored_name: String,
    #[serde(skip)]
    pub ty: FieldType,
    pub relationship: Option<String>,
    pub direction: Option<Direction>,
    pub cardinality: Option<Cardinality>,
    /// Resolved label of the node on the far side
    pub peer_label: Option<String>,
    /// Label of the edge entity modeling this relationship, if any
    pub edge_label: Option<String>,
    pub unique: bool,
    pub index: bool,
    pub primary_key: bool,
    pub time: bool,
    pub properties: bool,
    pub alias: Option<Primitive>,
    pub ignore: bool,
}

impl FieldConfig {
    /// Parse and validate a descriptor. Errors are plain messages; the caller
    /// attaches the entity name.
    pub fn from_descriptor(descriptor: &FieldDescriptor) -> Result<Self, String> {
        let tag = tag::parse(descriptor.declaration)
            .map_err(|e| format!("field `{}`: {}", descriptor.name, e))?;

        let config = Self::from_tag(descriptor, &tag);
        config
            .validate(&tag)
            .map_err(|e| format!("field `{}`: {}", descriptor.name, e))?;
        Ok(config.resolve())
    }

    fn from_tag(descriptor: &FieldDescriptor, tag: &Tag) -> Self {
        let cardinality = match descriptor.ty {
            FieldType::One(_) => Some(Cardinality::One),
            FieldType::Many(_) => Some(Cardinality::Many),
            _ => None,
        };
        let alias = match descriptor.ty {
            FieldType::Alias { underlying, .. } => Some(underlying),
            _ => None,
        };

        Self {
            field_name: descriptor.name.to_string(),
            stored_name: tag.name.clone().unwrap_or_else(|| descriptor.name.to_string()),
            ty: descriptor.ty,
            relationship: tag.relationship.clone(),
            direction: tag.direction,
            cardinality,
            peer_label: None,
            edge_label: None,
            unique: tag.unique,
            index: tag.index,
            primary_key: tag.primary_key,
            time: tag.time || matches!(descriptor.ty, FieldType::DateTime),
            properties: tag.properties,
            alias,
            ignore: tag.ignore,
        }
    }

    fn validate(&self, tag: &Tag) -> Result<(), String> {
        if self.ignore {
            let only_ignore = Tag {
                ignore: true,
                ..Tag::default()
            };
            if *tag != only_ignore {
                return Err("ignored field can not carry any other declaration".into());
            }
            return Ok(());
        }

        if self.properties || self.ty.is_map() {
            if !self.properties {
                return Err("map fields must be declared as properties".into());
            }
            if !matches!(self.ty, FieldType::PropertiesMap) {
                return Err("properties must be a string-keyed map of dynamic values".into());
            }
            if self.primary_key
                || self.relationship.is_some()
                || self.direction.is_some()
                || self.index
                || self.unique
                || tag.time
            {
                return Err("properties field can only declare a name".into());
            }
            return Ok(());
        }

        if self.relationship.is_some()
            || self.direction.is_some()
            || self.cardinality.is_some()
        {
            match self.relationship.as_deref() {
                None => return Err("relationship name must be declared on entity references".into()),
                Some("") => return Err("relationship name can not be empty".into()),
                Some(_) => {}
            }
            if self.cardinality.is_none() {
                return Err("relationship can only be declared on an entity reference".into());
            }
            if self.primary_key || self.properties || self.index || self.unique || tag.time {
                return Err("relationship field can not be pk, properties, index, unique or time".into());
            }
            if self.stored_name != self.field_name {
                return Err("relationship field can not be renamed".into());
            }
            return Ok(());
        }

        if self.time {
            let epoch = self.ty.primitive() == Some(Primitive::I64);
            if !epoch && !matches!(self.ty, FieldType::DateTime) {
                return Err("time field must be an i64 epoch or a DateTime".into());
            }
            if self.primary_key {
                return Err("time field can not be a primary key".into());
            }
        }

        if self.primary_key && (self.index || self.unique) {
            return Err("pk can not also be index or unique".into());
        }
        if self.index && self.unique {
            return Err("field can not be both index and unique".into());
        }

        if self.primary_key {
            match self.ty.primitive() {
                Some(Primitive::String) if self.stored_name != "uuid" => {
                    return Err("string primary key must be named `uuid`".into())
                }
                Some(Primitive::I64) if self.stored_name != "id" => {
                    return Err("i64 primary key must be named `id`".into())
                }
                Some(Primitive::String) | Some(Primitive::I64) => {}
                _ => return Err("primary key must be a string or an i64".into()),
            }
        }

        if matches!(self.ty, FieldType::Embedded(_)) {
            return Err("embedded descriptors can not be declared as fields".into());
        }

        Ok(())
    }

    fn resolve(mut self) -> Self {
        if let Some(target) = self.ty.target() {
            let direction = self.direction.unwrap_or(Direction::Outgoing);
            self.direction = Some(direction);
            self.peer_label = Some(target.peer_label(direction).to_string());
            if target.is_edge() {
                self.edge_label = Some(target.label().to_string());
            }
        }
        self
    }

    pub fn is_relationship(&self) -> bool {
        self.relationship.is_some()
    }

    pub fn uses_edge_entity(&self) -> bool {
        self.edge_label.is_some()
    }

    /// Fields written as node or relationship properties
    pub fn is_persisted_property(&self) -> bool {
        !self.ignore && !self.primary_key && !self.is_relationship()
    }

    /// Key kind for a primary-key field
    pub fn key_kind(&self) -> Option<KeyKind> {
        if !self.primary_key {
            return None;
        }
        match self.ty.primitive() {
            Some(Primitive::String) => Some(KeyKind::Uuid),
            Some(Primitive::I64) => Some(KeyKind::Id),
            _ => None,
        }
    }

    /// Time stored as an integer epoch rather than an RFC 3339 string
    pub fn is_epoch_time(&self) -> bool {
        self.time && self.ty.primitive() == Some(Primitive::I64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &'static str, ty: FieldType, decl: &'static str) -> Result<FieldConfig, String> {
        FieldConfig::from_descriptor(&FieldDescriptor::new(name, ty, decl))
    }

    #[test]
    fn test_scalar_defaults() {
        let cfg = config("title", FieldType::STRING, "").unwrap();
        assert_eq!(cfg.stored_name, "title");
        assert!(cfg.is_persisted_property());
        assert!(!cfg.is_relationship());
    }

    #[test]
    fn test_renamed_unique() {
        let cfg = config("email", FieldType::STRING, "name=mail;unique").unwrap();
        assert_eq!(cfg.stored_name, "mail");
        assert!(cfg.unique);
    }

    #[test]
    fn test_ignore_is_exclusive() {
        assert!(config("scratch", FieldType::STRING, "-").unwrap().ignore);
        assert!(config("scratch", FieldType::STRING, "-;index").is_err());
        assert!(config("scratch", FieldType::STRING, "-;name=x").is_err());
    }

    #[test]
    fn test_properties_rules() {
        let cfg = config("props", FieldType::PropertiesMap, "properties;name=meta").unwrap();
        assert!(cfg.properties);
        assert_eq!(cfg.stored_name, "meta");

        assert!(config("props", FieldType::PropertiesMap, "").is_err());
        assert!(config("props", FieldType::Map, "properties").is_err());
        assert!(config("props", FieldType::PropertiesMap, "properties;unique").is_err());
        assert!(config("count", FieldType::INT64, "properties").is_err());
    }

    #[test]
    fn test_time_rules() {
        assert!(config("created", FieldType::DateTime, "").unwrap().time);
        let epoch = config("seen", FieldType::INT64, "time").unwrap();
        assert!(epoch.is_epoch_time());
        assert!(config("seen", FieldType::STRING, "time").is_err());
        assert!(config("seen", FieldType::alias("Epoch", Primitive::I64), "time").is_ok());
    }

    #[test]
    fn test_primary_key_rules() {
        let uuid = config("uuid", FieldType::STRING, "pk").unwrap();
        assert_eq!(uuid.key_kind(), Some(KeyKind::Uuid));

        let id = config("id", FieldType::INT64, "pk").unwrap();
        assert_eq!(id.key_kind(), Some(KeyKind::Id));

        let aliased = config("key", FieldType::alias("NodeId", Primitive::String), "pk;name=uuid").unwrap();
        assert_eq!(aliased.key_kind(), Some(KeyKind::Uuid));

        assert!(config("key", FieldType::STRING, "pk").is_err());
        assert!(config("id", FieldType::Primitive(Primitive::I32), "pk").is_err());
        assert!(config("uuid", FieldType::STRING, "pk;unique").is_err());
    }

    #[test]
    fn test_index_and_unique_exclusive() {
        assert!(config("code", FieldType::STRING, "index;unique").is_err());
    }

    #[test]
    fn test_relationship_requires_reference_type() {
        let err = config("label", FieldType::STRING, "relationship=HAS").unwrap_err();
        assert!(err.contains("entity reference"));
        assert!(config("label", FieldType::STRING, "direction=incoming").is_err());
    }

    #[test]
    fn test_unknown_tokens_are_named() {
        let err = config("title", FieldType::STRING, "indexed").unwrap_err();
        assert!(err.contains("indexed"));
    }
}
