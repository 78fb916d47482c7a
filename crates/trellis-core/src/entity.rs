//! Entity traits and derived entity configuration

use crate::error::{Error, Result};
use crate::field::{FieldConfig, FieldDescriptor, FieldType};
use crate::key::Ref;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A type mapped to graph nodes.
///
/// Field access goes through the serde representation, so every declared
/// field name must match the field's serialized name. Relationship fields
/// hold `Option<Ref<_>>` or `Vec<Ref<_>>`; ignored fields must deserialize
/// from absence (`#[serde(default)]`).
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Declared fields in order
    fn fields() -> Vec<FieldDescriptor>;

    /// Graph label; defaults to the type name without its module path
    fn label() -> &'static str {
        type_label::<Self>()
    }
}

/// A type mapped to graph relationships that carry their own properties.
///
/// Endpoints are not serialized (`#[serde(skip)]`); they are set when an
/// edge is decoded and read when it is saved.
pub trait EdgeEntity: Entity {
    type Start: Entity;
    type End: Entity;

    fn start(&self) -> Option<&Ref<Self::Start>>;
    fn end(&self) -> Option<&Ref<Self::End>>;
    fn set_start(&mut self, start: Ref<Self::Start>);
    fn set_end(&mut self, end: Ref<Self::End>);
}

/// Last path segment of a type name, generic arguments removed
pub fn type_label<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Embeddable holder for a ulid string primary key.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Person {
///     #[serde(flatten)]
///     base: BaseNode,
///     name: String,
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

impl BaseNode {
    pub fn fields() -> Vec<FieldDescriptor> {
        vec![FieldDescriptor::new("uuid", FieldType::STRING, "pk")]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntityKind {
    Node,
    Edge { start: String, end: String },
}

/// Validated metadata of one entity type
#[derive(Debug, Clone, Serialize)]
pub struct EntityConfig {
    pub label: String,
    pub kind: EntityKind,
    pub fields: Vec<FieldConfig>,
    #[serde(skip)]
    pk_index: usize,
}

impl EntityConfig {
    /// Derive and validate configuration from a descriptor list
    pub fn derive(label: &str, kind: EntityKind, descriptors: Vec<FieldDescriptor>) -> Result<Self> {
        let mut fields = Vec::new();
        for descriptor in flatten(descriptors) {
            let field = FieldConfig::from_descriptor(&descriptor)
                .map_err(|message| Error::configuration(label, message))?;
            fields.push(field);
        }

        let pk_fields: Vec<usize> = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.primary_key)
            .map(|(i, _)| i)
            .collect();
        let pk_index = match pk_fields.as_slice() {
            [single] => *single,
            [] => return Err(Error::configuration(label, "no primary key defined")),
            _ => return Err(Error::configuration(label, "more than one primary key defined")),
        };

        if matches!(kind, EntityKind::Edge { .. }) {
            if let Some(field) = fields.iter().find(|f| f.is_relationship()) {
                return Err(Error::configuration(
                    label,
                    format!("edge can not declare relationship field `{}`", field.field_name),
                ));
            }
        }

        let mut stored = HashSet::new();
        for field in fields.iter().filter(|f| !f.ignore) {
            if !stored.insert(field.stored_name.as_str()) {
                return Err(Error::configuration(
                    label,
                    format!("stored name `{}` is used more than once", field.stored_name),
                ));
            }
        }

        Ok(Self {
            label: label.to_string(),
            kind,
            fields,
            pk_index,
        })
    }

    pub fn primary_key(&self) -> &FieldConfig {
        &self.fields[self.pk_index]
    }

    pub fn field(&self, field_name: &str) -> Option<&FieldConfig> {
        self.fields.iter().find(|f| f.field_name == field_name)
    }

    pub fn relationships(&self) -> impl Iterator<Item = &FieldConfig> {
        self.fields.iter().filter(|f| f.is_relationship())
    }

    /// Scalar, time and properties fields written on save
    pub fn properties(&self) -> impl Iterator<Item = &FieldConfig> {
        self.fields.iter().filter(|f| f.is_persisted_property())
    }

    pub fn is_edge(&self) -> bool {
        matches!(self.kind, EntityKind::Edge { .. })
    }
}

fn flatten(descriptors: Vec<FieldDescriptor>) -> Vec<FieldDescriptor> {
    let mut out = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        match descriptor.ty {
            FieldType::Embedded(inner) => out.extend(flatten(inner())),
            _ => out.push(descriptor),
        }
    }
    out
}

/// Derive the configuration of a node entity
pub fn derive_config<T: Entity>() -> Result<EntityConfig> {
    EntityConfig::derive(T::label(), EntityKind::Node, T::fields())
}

/// Derive the configuration of an edge entity
pub fn derive_edge_config<E: EdgeEntity>() -> Result<EntityConfig> {
    let kind = EntityKind::Edge {
        start: <E::Start as Entity>::label().to_string(),
        end: <E::End as Entity>::label().to_string(),
    };
    EntityConfig::derive(E::label(), kind, E::fields())
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small schema shared by core unit tests

    use super::*;
    use crate::field::FieldType;
    use std::collections::HashMap;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct Teacher {
        #[serde(flatten)]
        pub base: BaseNode,
        pub name: String,
        #[serde(default)]
        pub courses: Vec<Ref<Course>>,
    }

    impl Entity for Teacher {
        fn fields() -> Vec<FieldDescriptor> {
            vec![
                FieldDescriptor::embed(BaseNode::fields),
                FieldDescriptor::new("name", FieldType::STRING, "index"),
                FieldDescriptor::new("courses", FieldType::many::<Course>(), "relationship=TEACHES"),
            ]
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct Course {
        #[serde(flatten)]
        pub base: BaseNode,
        pub title: String,
        #[serde(default)]
        pub meta: HashMap<String, serde_json::Value>,
        #[serde(default)]
        pub teacher: Option<Ref<Teacher>>,
        #[serde(default)]
        pub enrollments: Vec<Ref<Enrollment>>,
    }

    impl Entity for Course {
        fn fields() -> Vec<FieldDescriptor> {
            vec![
                FieldDescriptor::embed(BaseNode::fields),
                FieldDescriptor::new("title", FieldType::STRING, "unique"),
                FieldDescriptor::new("meta", FieldType::PropertiesMap, "properties"),
                FieldDescriptor::new(
                    "teacher",
                    FieldType::one::<Teacher>(),
                    "relationship=TEACHES;direction=incoming",
                ),
                FieldDescriptor::new(
                    "enrollments",
                    FieldType::edges::<Enrollment>(),
                    "relationship=ENROLLED_IN;direction=incoming",
                ),
            ]
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct Student {
        #[serde(flatten)]
        pub base: BaseNode,
        pub name: String,
        #[serde(default)]
        pub enrollments: Vec<Ref<Enrollment>>,
    }

    impl Entity for Student {
        fn fields() -> Vec<FieldDescriptor> {
            vec![
                FieldDescriptor::embed(BaseNode::fields),
                FieldDescriptor::new("name", FieldType::STRING, ""),
                FieldDescriptor::new(
                    "enrollments",
                    FieldType::edges::<Enrollment>(),
                    "relationship=ENROLLED_IN;direction=outgoing",
                ),
            ]
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct Enrollment {
        #[serde(flatten)]
        pub base: BaseNode,
        pub enrolled: chrono::DateTime<chrono::Utc>,
        #[serde(skip)]
        pub start: Option<Ref<Student>>,
        #[serde(skip)]
        pub end: Option<Ref<Course>>,
    }

    impl Entity for Enrollment {
        fn fields() -> Vec<FieldDescriptor> {
            vec![
                FieldDescriptor::embed(BaseNode::fields),
                FieldDescriptor::new("enrolled", FieldType::DateTime, ""),
            ]
        }
    }

    impl EdgeEntity for Enrollment {
        type Start = Student;
        type End = Course;

        fn start(&self) -> Option<&Ref<Student>> {
            self.start.as_ref()
        }

        fn end(&self) -> Option<&Ref<Course>> {
            self.end.as_ref()
        }

        fn set_start(&mut self, start: Ref<Student>) {
            self.start = Some(start);
        }

        fn set_end(&mut self, end: Ref<Course>) {
            self.end = Some(end);
        }
    }
}
