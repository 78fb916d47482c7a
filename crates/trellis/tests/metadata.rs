//! Registration and query-construction properties

mod common;

use serde::{Deserialize, Serialize};
use trellis::{BaseNode, Catalog, Direction, Entity, FieldDescriptor, FieldType, Ref};
use trellis_core::Error as CoreError;
use trellis_cypher::{CypherError, NodePattern, Pattern, QueryBuilder, ReturnItem, SetItem};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Orphan {
    name: String,
}

impl Entity for Orphan {
    fn fields() -> Vec<FieldDescriptor> {
        vec![FieldDescriptor::new("name", FieldType::STRING, "")]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Twice {
    #[serde(flatten)]
    base: BaseNode,
    #[serde(default)]
    id: i64,
}

impl Entity for Twice {
    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::embed(BaseNode::fields),
            FieldDescriptor::new("id", FieldType::INT64, "pk"),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Author {
    #[serde(flatten)]
    base: BaseNode,
    #[serde(default)]
    books: Vec<Ref<Book>>,
}

impl Entity for Author {
    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::embed(BaseNode::fields),
            FieldDescriptor::new("books", FieldType::many::<Book>(), "relationship=WROTE"),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Book {
    #[serde(flatten)]
    base: BaseNode,
    #[serde(default)]
    author: Option<Ref<Author>>,
}

impl Entity for Book {
    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::embed(BaseNode::fields),
            FieldDescriptor::new(
                "author",
                FieldType::one::<Author>(),
                "relationship=WROTE;direction=outgoing",
            ),
        ]
    }
}

#[test]
fn test_primary_key_count() {
    let err = Catalog::builder().register::<Orphan>().build().unwrap_err();
    assert!(matches!(err, CoreError::Configuration { .. }));

    let err = Catalog::builder().register::<Twice>().build().unwrap_err();
    assert!(matches!(err, CoreError::Configuration { .. }));

    assert!(common::catalog().config_of::<common::Teacher>().is_ok());
}

#[test]
fn test_relationship_defaults() {
    let catalog = Catalog::builder()
        .register::<Author>()
        .register::<Book>()
        .build();
    // both sides declare WROTE as outgoing
    assert!(matches!(catalog, Err(CoreError::RegistryValidation(_))));

    let config = trellis_core::derive_config::<Author>().unwrap();
    let books = config.field("books").unwrap();
    assert_eq!(books.direction, Some(Direction::Outgoing));
    assert_eq!(books.stored_name, books.field_name);
}

#[test]
fn test_school_registry_is_balanced() {
    let catalog = common::catalog();
    assert_eq!(catalog.len(), 6);
    for config in catalog.configs() {
        for field in config.relationships() {
            assert_eq!(field.stored_name, field.field_name);
        }
    }
    let (start, end) = catalog
        .registry()
        .get_pair("Student", "Course", "Course", "Student", "ENROLLED")
        .unwrap();
    assert_eq!(start.field_name, "enrollments");
    assert_eq!(end.field_name, "enrollments");
}

#[test]
fn test_builder_errors_aggregate() {
    assert_eq!(QueryBuilder::new().build().unwrap_err(), CypherError::Empty);

    let err = QueryBuilder::new()
        .match_(&Pattern::node(NodePattern::new("n").label("Teacher")))
        .set(&[SetItem::merge("n", "bad param")])
        .return_(false, &[ReturnItem::var("")])
        .build()
        .unwrap_err();
    assert_eq!(err.count(), 2);
}
