//! Field declaration parsing.
//!
//! A declaration is a `;`-separated list of tokens. Keyed tokens use `=`
//! (`name`, `relationship`, `direction`); the rest are flags (`pk`,
//! `unique`, `index`, `properties`, `time`, `-`).

use crate::relation::Direction;
use thiserror::Error;

pub const DELIMITER: char = ';';
pub const ASSIGNMENT: char = '=';

/// Flag marking a field as not persisted
pub const IGNORE_FLAG: &str = "-";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TagError {
    #[error("key '{0}' is not recognized")]
    UnknownKey(String),

    #[error("flag '{0}' is not recognized")]
    UnknownFlag(String),

    #[error("token '{0}' must be of the form key=value")]
    MalformedAssignment(String),

    #[error("direction '{0}' is not one of incoming|outgoing|both|none")]
    UnknownDirection(String),

    #[error("key '{0}' is declared twice")]
    Duplicate(String),
}

/// Parsed field declaration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub name: Option<String>,
    pub relationship: Option<String>,
    pub direction: Option<Direction>,
    pub primary_key: bool,
    pub unique: bool,
    pub index: bool,
    pub properties: bool,
    pub time: bool,
    pub ignore: bool,
}

impl Tag {
    /// True if no key or flag was declared
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Parse a field declaration. Empty tokens are skipped.
pub fn parse(declaration: &str) -> Result<Tag, TagError> {
    let mut tag = Tag::default();

    for token in declaration.split(DELIMITER).map(str::trim) {
        if token.is_empty() {
            continue;
        }

        if token.contains(ASSIGNMENT) {
            let mut parts = token.splitn(2, ASSIGNMENT);
            let key = parts.next().unwrap_or_default().trim();
            let value = parts.next().unwrap_or_default().trim();
            if key.is_empty() || value.is_empty() || value.contains(ASSIGNMENT) {
                return Err(TagError::MalformedAssignment(token.to_string()));
            }

            match key {
                "name" => set_once(&mut tag.name, key, value.to_string())?,
                "relationship" => set_once(&mut tag.relationship, key, value.to_string())?,
                "direction" => {
                    let direction = Direction::parse(value)
                        .ok_or_else(|| TagError::UnknownDirection(value.to_string()))?;
                    set_once(&mut tag.direction, key, direction)?;
                }
                _ => return Err(TagError::UnknownKey(key.to_string())),
            }
            continue;
        }

        match token {
            "pk" => tag.primary_key = true,
            "unique" => tag.unique = true,
            "index" => tag.index = true,
            "properties" => tag.properties = true,
            "time" => tag.time = true,
            IGNORE_FLAG => tag.ignore = true,
            other => return Err(TagError::UnknownFlag(other.to_string())),
        }
    }

    Ok(tag)
}

fn set_once<T>(slot: &mut Option<T>, key: &str, value: T) -> Result<(), TagError> {
    if slot.is_some() {
        return Err(TagError::Duplicate(key.to_string()));
    }
    *slot = Some(value);
    Ok(())
}
