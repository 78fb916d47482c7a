//! Entity identity: primary keys and typed references

use crate::value::Value;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use ulid::Ulid;

/// Primary-key value of a mapped entity.
///
/// String keys are stored under the `uuid` property, integer keys under `id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Id(i64),
    Uuid(String),
}

/// Which kind of primary key an entity declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Uuid,
    Id,
}

impl KeyKind {
    /// The property name a key of this kind must be stored under
    pub fn stored_name(&self) -> &'static str {
        match self {
            Self::Uuid => "uuid",
            Self::Id => "id",
        }
    }

    /// Generate a fresh key of this kind
    pub fn generate(&self) -> Key {
        match self {
            Self::Uuid => Key::Uuid(Ulid::new().to_string()),
            Self::Id => {
                // low 64 bits of a ULID are random; mask to a positive i64
                let bits = Ulid::new().0 as u64 & (i64::MAX as u64);
                Key::Id(bits.max(1) as i64)
            }
        }
    }
}

impl Key {
    pub fn kind(&self) -> KeyKind {
        match self {
            Self::Uuid(_) => KeyKind::Uuid,
            Self::Id(_) => KeyKind::Id,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Uuid(s) => Value::String(s.clone()),
            Self::Id(i) => Value::Int(*i),
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self::Uuid(s.clone())),
            Value::Int(i) => Some(Self::Id(*i)),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Uuid(s) => serde_json::Value::String(s.clone()),
            Self::Id(i) => serde_json::Value::from(*i),
        }
    }

    /// Read a key out of a JSON value; null and empty strings are "no key"
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::String(s) if !s.is_empty() => Some(Self::Uuid(s.clone())),
            serde_json::Value::Number(n) => n.as_i64().map(Self::Id),
            _ => None,
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uuid(s) => write!(f, "{}", s),
            Self::Id(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::Uuid(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::Uuid(s)
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Self::Id(i)
    }
}

/// Typed reference from one entity to another inside an object graph.
///
/// Serializes as the bare key, so relationship fields round-trip through
/// serde as plain key values.
pub struct Ref<T> {
    key: Key,
    marker: PhantomData<fn() -> T>,
}

impl<T> Ref<T> {
    pub fn new(key: impl Into<Key>) -> Self {
        Self {
            key: key.into(),
            marker: PhantomData,
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn into_key(self) -> Key {
        self.key
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self::new(self.key.clone())
    }
}

impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for Ref<T> {}

impl<T> Hash for Ref<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<T> std::fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ref({})", self.key)
    }
}

impl<T> Serialize for Ref<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.key.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Ref<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Key::deserialize(deserializer).map(Self::new)
    }
}
