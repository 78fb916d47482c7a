//! School schema shared by the integration tests

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use trellis::{
    AccessMode, BaseNode, Catalog, Config, EdgeEntity, Entity, FieldDescriptor, FieldType, Ogm,
    Ref, Session,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Department {
    #[serde(flatten)]
    pub base: BaseNode,
    pub name: String,
    #[serde(default)]
    pub subjects: Vec<Ref<Subject>>,
    #[serde(default)]
    pub teachers: Vec<Ref<Teacher>>,
}

impl Entity for Department {
    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::embed(BaseNode::fields),
            FieldDescriptor::new("name", FieldType::STRING, ""),
            FieldDescriptor::new(
                "subjects",
                FieldType::many::<Subject>(),
                "relationship=CURRICULUM;direction=outgoing",
            ),
            FieldDescriptor::new(
                "teachers",
                FieldType::many::<Teacher>(),
                "relationship=FOR_DEPARTMENT;direction=incoming",
            ),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subject {
    #[serde(flatten)]
    pub base: BaseNode,
    pub name: String,
    #[serde(default)]
    pub department: Option<Ref<Department>>,
    #[serde(default)]
    pub teachers: Vec<Ref<Teacher>>,
    #[serde(default)]
    pub courses: Vec<Ref<Course>>,
}

impl Entity for Subject {
    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::embed(BaseNode::fields),
            FieldDescriptor::new("name", FieldType::STRING, ""),
            FieldDescriptor::new(
                "department",
                FieldType::one::<Department>(),
                "relationship=CURRICULUM;direction=incoming",
            ),
            FieldDescriptor::new(
                "teachers",
                FieldType::many::<Teacher>(),
                "relationship=TAUGHT_BY;direction=outgoing",
            ),
            FieldDescriptor::new(
                "courses",
                FieldType::many::<Course>(),
                "relationship=SUBJECT_TAUGHT;direction=incoming",
            ),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Teacher {
    #[serde(flatten)]
    pub base: BaseNode,
    pub name: String,
    #[serde(default)]
    pub courses: Vec<Ref<Course>>,
    #[serde(default)]
    pub subjects: Vec<Ref<Subject>>,
    #[serde(default)]
    pub department: Option<Ref<Department>>,
}

impl Entity for Teacher {
    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::embed(BaseNode::fields),
            FieldDescriptor::new("name", FieldType::STRING, "unique"),
            FieldDescriptor::new(
                "courses",
                FieldType::many::<Course>(),
                "relationship=TEACHES_CLASS;direction=outgoing",
            ),
            FieldDescriptor::new(
                "subjects",
                FieldType::many::<Subject>(),
                "relationship=TAUGHT_BY;direction=incoming",
            ),
            FieldDescriptor::new(
                "department",
                FieldType::one::<Department>(),
                "relationship=FOR_DEPARTMENT;direction=outgoing",
            ),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Course {
    #[serde(flatten)]
    pub base: BaseNode,
    pub name: String,
    #[serde(default)]
    pub subject: Option<Ref<Subject>>,
    #[serde(default)]
    pub teacher: Option<Ref<Teacher>>,
    #[serde(default)]
    pub enrollments: Vec<Ref<Enrollment>>,
}

impl Entity for Course {
    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::embed(BaseNode::fields),
            FieldDescriptor::new("name", FieldType::STRING, ""),
            FieldDescriptor::new(
                "subject",
                FieldType::one::<Subject>(),
                "relationship=SUBJECT_TAUGHT;direction=outgoing",
            ),
            FieldDescriptor::new(
                "teacher",
                FieldType::one::<Teacher>(),
                "relationship=TEACHES_CLASS;direction=incoming",
            ),
            FieldDescriptor::new(
                "enrollments",
                FieldType::edges::<Enrollment>(),
                "relationship=ENROLLED;direction=incoming",
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
    pub grades: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub enrollments: Vec<Ref<Enrollment>>,
}

impl Entity for Student {
    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::embed(BaseNode::fields),
            FieldDescriptor::new("name", FieldType::STRING, "unique"),
            FieldDescriptor::new("grades", FieldType::PropertiesMap, "properties"),
            FieldDescriptor::new(
                "enrollments",
                FieldType::edges::<Enrollment>(),
                "relationship=ENROLLED;direction=outgoing",
            ),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Enrollment {
    #[serde(flatten)]
    pub base: BaseNode,
    pub enrolled_date: DateTime<Utc>,
    #[serde(skip)]
    pub start: Option<Ref<Student>>,
    #[serde(skip)]
    pub end: Option<Ref<Course>>,
}

impl Entity for Enrollment {
    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::embed(BaseNode::fields),
            FieldDescriptor::new("enrolled_date", FieldType::DateTime, "time"),
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

pub fn catalog() -> Catalog {
    Catalog::builder()
        .register::<Department>()
        .register::<Subject>()
        .register::<Teacher>()
        .register::<Course>()
        .register::<Student>()
        .register_edge::<Enrollment>()
        .build()
        .unwrap()
}

pub async fn ogm() -> Ogm {
    Ogm::in_memory(Config::default(), catalog()).await.unwrap()
}

pub async fn session(ogm: &Ogm) -> Session {
    ogm.session(AccessMode::ReadWrite).await.unwrap()
}

pub fn teacher(name: &str) -> Teacher {
    Teacher {
        name: name.to_string(),
        ..Teacher::default()
    }
}

pub fn course(name: &str) -> Course {
    Course {
        name: name.to_string(),
        ..Course::default()
    }
}

pub fn student(name: &str) -> Student {
    Student {
        name: name.to_string(),
        ..Student::default()
    }
}
