//! Type-erased access to registered entity types.
//!
//! Each registration monomorphizes a small table of functions so the object
//! graph can convert, key and wire entities knowing only their label.

use crate::entity::{EdgeEntity, Entity};
use crate::error::{Error, Result};
use crate::key::{Key, Ref};
use std::any::Any;

/// Boxed entity stored in an object graph
pub type AnyEntity = dyn Any + Send + Sync;

#[derive(Clone, Copy)]
pub struct EntityBinding {
    pub(crate) to_json: fn(&AnyEntity) -> Result<serde_json::Value>,
    pub(crate) from_json: fn(serde_json::Value) -> Result<Box<AnyEntity>>,
    pub(crate) edge: Option<EdgeBinding>,
}

#[derive(Clone, Copy)]
pub struct EdgeBinding {
    pub(crate) start_label: fn() -> &'static str,
    pub(crate) end_label: fn() -> &'static str,
    pub(crate) start_key: fn(&AnyEntity) -> Result<Option<Key>>,
    pub(crate) end_key: fn(&AnyEntity) -> Result<Option<Key>>,
    pub(crate) set_start: fn(&mut AnyEntity, Key) -> Result<()>,
    pub(crate) set_end: fn(&mut AnyEntity, Key) -> Result<()>,
}

impl EntityBinding {
    pub fn node<T: Entity>() -> Self {
        Self {
            to_json: to_json::<T>,
            from_json: from_json::<T>,
            edge: None,
        }
    }

    pub fn edge<E: EdgeEntity>() -> Self {
        Self {
            to_json: to_json::<E>,
            from_json: from_json::<E>,
            edge: Some(EdgeBinding {
                start_label: <E::Start as Entity>::label,
                end_label: <E::End as Entity>::label,
                start_key: start_key::<E>,
                end_key: end_key::<E>,
                set_start: set_start::<E>,
                set_end: set_end::<E>,
            }),
        }
    }

    pub fn to_json(&self, entity: &AnyEntity) -> Result<serde_json::Value> {
        (self.to_json)(entity)
    }

    pub fn from_json(&self, json: serde_json::Value) -> Result<Box<AnyEntity>> {
        (self.from_json)(json)
    }

    pub fn edge_binding(&self) -> Option<&EdgeBinding> {
        self.edge.as_ref()
    }
}

impl EdgeBinding {
    pub fn start_label(&self) -> &'static str {
        (self.start_label)()
    }

    pub fn end_label(&self) -> &'static str {
        (self.end_label)()
    }

    /// Start and end keys; an unset endpoint is a conversion error
    pub fn endpoints(&self, entity: &AnyEntity) -> Result<(Key, Key)> {
        let start = (self.start_key)(entity)?;
        let end = (self.end_key)(entity)?;
        match (start, end) {
            (Some(start), Some(end)) => Ok((start, end)),
            _ => Err(Error::Conversion(format!(
                "edge between [{}] and [{}] has no start or end set",
                self.start_label(),
                self.end_label()
            ))),
        }
    }

    /// Copy whichever endpoints are set on `from` onto `to`
    pub fn copy_endpoints(&self, from: &AnyEntity, to: &mut AnyEntity) -> Result<()> {
        if let Some(start) = (self.start_key)(from)? {
            (self.set_start)(to, start)?;
        }
        if let Some(end) = (self.end_key)(from)? {
            (self.set_end)(to, end)?;
        }
        Ok(())
    }

    pub fn set_endpoints(&self, entity: &mut AnyEntity, start: Key, end: Key) -> Result<()> {
        (self.set_start)(entity, start)?;
        (self.set_end)(entity, end)
    }
}

fn downcast<T: Entity>(entity: &AnyEntity) -> Result<&T> {
    entity
        .downcast_ref::<T>()
        .ok_or_else(|| Error::Conversion(format!("unable to cast entity to [{}]", T::label())))
}

fn downcast_mut<T: Entity>(entity: &mut AnyEntity) -> Result<&mut T> {
    entity
        .downcast_mut::<T>()
        .ok_or_else(|| Error::Conversion(format!("unable to cast entity to [{}]", T::label())))
}

fn to_json<T: Entity>(entity: &AnyEntity) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(downcast::<T>(entity)?)?)
}

fn from_json<T: Entity>(json: serde_json::Value) -> Result<Box<AnyEntity>> {
    let entity: T = serde_json::from_value(json)
        .map_err(|e| Error::Conversion(format!("unable to decode [{}]: {}", T::label(), e)))?;
    Ok(Box::new(entity))
}

fn start_key<E: EdgeEntity>(entity: &AnyEntity) -> Result<Option<Key>> {
    Ok(downcast::<E>(entity)?.start().map(|r| r.key().clone()))
}

fn end_key<E: EdgeEntity>(entity: &AnyEntity) -> Result<Option<Key>> {
    Ok(downcast::<E>(entity)?.end().map(|r| r.key().clone()))
}

fn set_start<E: EdgeEntity>(entity: &mut AnyEntity, key: Key) -> Result<()> {
    downcast_mut::<E>(entity)?.set_start(Ref::new(key));
    Ok(())
}

fn set_end<E: EdgeEntity>(entity: &mut AnyEntity, key: Key) -> Result<()> {
    downcast_mut::<E>(entity)?.set_end(Ref::new(key));
    Ok(())
}
