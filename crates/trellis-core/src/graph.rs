//! Object graph: the identity map a session loads into and saves from

use crate::binding::AnyEntity;
use crate::catalog::Catalog;
use crate::codec::reference_keys;
use crate::entity::{EdgeEntity, Entity};
use crate::error::{Error, Result};
use crate::field::FieldConfig;
use crate::key::{Key, Ref};
use crate::relation::{Cardinality, Direction};
use crate::snapshot::LoadSnapshot;
use serde_json::Value as Json;
use std::collections::HashMap;
use std::sync::Arc;

struct Slot {
    label: String,
    entity: Box<AnyEntity>,
    snapshot: Option<LoadSnapshot>,
}

/// One typed instance per primary key, plus the relationship snapshot each
/// loaded instance was read with.
///
/// Relationship fields hold [`Ref`]s into the same graph, so cycles and
/// shared peers need no shared ownership.
pub struct ObjectGraph {
    catalog: Arc<Catalog>,
    slots: HashMap<Key, Slot>,
    order: Vec<Key>,
}

impl ObjectGraph {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            slots: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Typed access
    // ─────────────────────────────────────────────────────────────────────────

    /// Add an entity, assigning a primary key if it has none.
    ///
    /// Inserting a key that is already present replaces the instance and
    /// keeps its snapshot.
    pub fn insert<T: Entity>(&mut self, entity: T) -> Result<Ref<T>> {
        let entry = self.catalog.entry(T::label())?;
        let pk = entry.config.primary_key();
        let mut json = serde_json::to_value(&entity)?;

        let (key, entity): (Key, Box<AnyEntity>) =
            match json.get(&pk.field_name).and_then(Key::from_json) {
                Some(key) => (key, Box::new(entity)),
                None => {
                    let kind = pk.key_kind().ok_or_else(|| {
                        Error::Conversion(format!("[{}] has no usable primary key", T::label()))
                    })?;
                    let key = kind.generate();
                    let object = json.as_object_mut().ok_or_else(|| {
                        Error::Conversion(format!("[{}] does not serialize to a map", T::label()))
                    })?;
                    object.insert(pk.field_name.clone(), key.to_json());
                    let mut keyed = entry.binding().from_json(json)?;
                    // endpoints are not part of the serde form
                    if let Some(edge) = entry.binding().edge_binding() {
                        edge.copy_endpoints(&entity, &mut *keyed)?;
                    }
                    tracing::debug!("Assigned key {} to new {}", key, T::label());
                    (key, keyed)
                }
            };

        self.put(T::label(), key.clone(), entity, None)?;
        Ok(Ref::new(key))
    }

    pub fn get<T: Entity>(&self, r: &Ref<T>) -> Option<&T> {
        self.get_by_key(r.key())
    }

    pub fn get_mut<T: Entity>(&mut self, r: &Ref<T>) -> Option<&mut T> {
        self.slots
            .get_mut(r.key())
            .and_then(|slot| slot.entity.downcast_mut::<T>())
    }

    pub fn get_by_key<T: Entity>(&self, key: &Key) -> Option<&T> {
        self.slots
            .get(key)
            .and_then(|slot| slot.entity.downcast_ref::<T>())
    }

    /// References to every `T` in insertion order
    pub fn refs<T: Entity>(&self) -> Vec<Ref<T>> {
        self.order
            .iter()
            .filter(|key| self.label_of(key) == Some(T::label()))
            .map(|key| Ref::new(key.clone()))
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Untyped access
    // ─────────────────────────────────────────────────────────────────────────

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.order.iter()
    }

    pub fn label_of(&self, key: &Key) -> Option<&str> {
        self.slots.get(key).map(|slot| slot.label.as_str())
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop an instance from the graph. The database is not touched.
    pub fn remove(&mut self, key: &Key) -> bool {
        if self.slots.remove(key).is_some() {
            self.order.retain(|k| k != key);
            true
        } else {
            false
        }
    }

    pub fn snapshot(&self, key: &Key) -> Option<&LoadSnapshot> {
        self.slots.get(key).and_then(|slot| slot.snapshot.as_ref())
    }

    pub fn set_snapshot(&mut self, key: &Key, snapshot: LoadSnapshot) -> Result<()> {
        let slot = self
            .slots
            .get_mut(key)
            .ok_or_else(|| Error::MissingEntity(key.to_string()))?;
        slot.snapshot = Some(snapshot);
        Ok(())
    }

    /// Label and serde form of an instance
    pub fn record(&self, key: &Key) -> Result<(&str, Json)> {
        let slot = self
            .slots
            .get(key)
            .ok_or_else(|| Error::MissingEntity(key.to_string()))?;
        let entry = self.catalog.entry(&slot.label)?;
        let json = entry.binding().to_json(&*slot.entity)?;
        Ok((slot.label.as_str(), json))
    }

    /// Insert an instance rebuilt from its serde form
    pub fn insert_json(&mut self, label: &str, json: Json, snapshot: Option<LoadSnapshot>) -> Result<Key> {
        let entry = self.catalog.entry(label)?;
        let pk = entry.config.primary_key();
        let key = json
            .get(&pk.field_name)
            .and_then(Key::from_json)
            .ok_or_else(|| Error::Conversion(format!("[{}] record has no primary key", label)))?;
        let entity = entry.binding().from_json(json)?;
        self.put(label, key.clone(), entity, snapshot)?;
        Ok(key)
    }

    /// Start and end keys of an edge instance
    pub fn edge_endpoints(&self, key: &Key) -> Result<(Key, Key)> {
        let slot = self
            .slots
            .get(key)
            .ok_or_else(|| Error::MissingEntity(key.to_string()))?;
        let entry = self.catalog.entry(&slot.label)?;
        let edge = entry
            .binding()
            .edge_binding()
            .ok_or_else(|| Error::Conversion(format!("[{}] is not an edge entity", slot.label)))?;
        edge.endpoints(&*slot.entity)
    }

    pub fn set_edge_endpoints(&mut self, key: &Key, start: Key, end: Key) -> Result<()> {
        let catalog = Arc::clone(&self.catalog);
        let slot = self
            .slots
            .get_mut(key)
            .ok_or_else(|| Error::MissingEntity(key.to_string()))?;
        let entry = catalog.entry(&slot.label)?;
        let edge = entry
            .binding()
            .edge_binding()
            .ok_or_else(|| Error::Conversion(format!("[{}] is not an edge entity", slot.label)))?;
        edge.set_endpoints(&mut *slot.entity, start, end)
    }

    fn put(
        &mut self,
        label: &str,
        key: Key,
        entity: Box<AnyEntity>,
        snapshot: Option<LoadSnapshot>,
    ) -> Result<()> {
        match self.slots.get_mut(&key) {
            Some(slot) if slot.label != label => Err(Error::Conversion(format!(
                "key {} already holds a [{}], not a [{}]",
                key, slot.label, label
            ))),
            Some(slot) => {
                slot.entity = entity;
                if snapshot.is_some() {
                    slot.snapshot = snapshot;
                }
                Ok(())
            }
            None => {
                self.order.push(key.clone());
                self.slots.insert(
                    key,
                    Slot {
                        label: label.to_string(),
                        entity,
                        snapshot,
                    },
                );
                Ok(())
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Link helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Reference `to` from `from.field`, and `from` from the mirroring field
    /// on `to` when one is registered.
    pub fn link<A: Entity, B: Entity>(&mut self, from: &Ref<A>, field: &str, to: &Ref<B>) -> Result<()> {
        let catalog = Arc::clone(&self.catalog);
        let config = relationship_field(&catalog, A::label(), field)?;
        if config.uses_edge_entity() {
            return Err(Error::InvalidOperation(format!(
                "[{}].{} is modeled by an edge entity; use link_with_edge",
                A::label(),
                field
            )));
        }
        check_peer(config, B::label())?;
        self.require(from.key())?;
        self.require(to.key())?;

        self.add_reference(from.key(), config, to.key())?;
        if let Some(mirror) = catalog.registry().reciprocal(A::label(), config) {
            self.add_reference(to.key(), mirror, from.key())?;
        }
        Ok(())
    }

    /// Create an edge entity between `from` and `to` and reference it from
    /// both sides. Endpoints are oriented by the field's direction.
    pub fn link_with_edge<A: Entity, E: EdgeEntity, B: Entity>(
        &mut self,
        from: &Ref<A>,
        field: &str,
        to: &Ref<B>,
        mut edge: E,
    ) -> Result<Ref<E>> {
        let catalog = Arc::clone(&self.catalog);
        let config = relationship_field(&catalog, A::label(), field)?;
        if config.edge_label.as_deref() != Some(E::label()) {
            return Err(Error::InvalidOperation(format!(
                "[{}].{} is not modeled by [{}]",
                A::label(),
                field,
                E::label()
            )));
        }
        check_peer(config, B::label())?;
        self.require(from.key())?;
        self.require(to.key())?;

        let (start, end) = if config.direction == Some(Direction::Outgoing) {
            (from.key(), to.key())
        } else {
            (to.key(), from.key())
        };
        edge.set_start(Ref::new(start.clone()));
        edge.set_end(Ref::new(end.clone()));
        let edge_ref = self.insert(edge)?;

        self.add_reference(from.key(), config, edge_ref.key())?;
        if let Some(mirror) = catalog.registry().reciprocal(A::label(), config) {
            self.add_reference(to.key(), mirror, edge_ref.key())?;
        }
        Ok(edge_ref)
    }

    /// Remove the relationship between `from` and `to` on both sides.
    ///
    /// Edge entities joining the two are dropped from the graph.
    pub fn unlink(&mut self, from: &Key, field: &str, to: &Key) -> Result<()> {
        let catalog = Arc::clone(&self.catalog);
        let label = self
            .label_of(from)
            .ok_or_else(|| Error::MissingEntity(from.to_string()))?
            .to_string();
        let config = relationship_field(&catalog, &label, field)?;
        let mirror = catalog.registry().reciprocal(&label, config);

        if !config.uses_edge_entity() {
            self.remove_reference(from, config, to)?;
            if let (Some(mirror), true) = (mirror, self.contains(to)) {
                self.remove_reference(to, mirror, from)?;
            }
            return Ok(());
        }

        let (_, json) = self.record(from)?;
        for edge_key in reference_keys(&json, config)? {
            let (start, end) = self.edge_endpoints(&edge_key)?;
            let joins = (&start == from && &end == to) || (&start == to && &end == from);
            if !joins {
                continue;
            }
            self.remove_reference(from, config, &edge_key)?;
            if let (Some(mirror), true) = (mirror, self.contains(to)) {
                self.remove_reference(to, mirror, &edge_key)?;
            }
            self.remove(&edge_key);
        }
        Ok(())
    }

    fn require(&self, key: &Key) -> Result<()> {
        if self.contains(key) {
            Ok(())
        } else {
            Err(Error::MissingEntity(key.to_string()))
        }
    }

    fn add_reference(&mut self, key: &Key, field: &FieldConfig, peer: &Key) -> Result<()> {
        let peer = peer.to_json();
        self.update_json(key, |object| {
            let slot = object.entry(field.field_name.clone()).or_insert(Json::Null);
            match field.cardinality {
                Some(Cardinality::One) => *slot = peer,
                _ => match slot {
                    Json::Array(items) => {
                        if !items.contains(&peer) {
                            items.push(peer);
                        }
                    }
                    other => *other = Json::Array(vec![peer]),
                },
            }
        })
    }

    fn remove_reference(&mut self, key: &Key, field: &FieldConfig, peer: &Key) -> Result<()> {
        let peer = peer.to_json();
        self.update_json(key, |object| match object.get_mut(&field.field_name) {
            Some(Json::Array(items)) => items.retain(|item| *item != peer),
            Some(slot) if *slot == peer => *slot = Json::Null,
            _ => {}
        })
    }

    /// Round-trip an instance through its serde form
    fn update_json(
        &mut self,
        key: &Key,
        update: impl FnOnce(&mut serde_json::Map<String, Json>),
    ) -> Result<()> {
        let catalog = Arc::clone(&self.catalog);
        let slot = self
            .slots
            .get_mut(key)
            .ok_or_else(|| Error::MissingEntity(key.to_string()))?;
        let entry = catalog.entry(&slot.label)?;
        let mut json = entry.binding().to_json(&*slot.entity)?;
        let object = json.as_object_mut().ok_or_else(|| {
            Error::Conversion(format!("[{}] does not serialize to a map", slot.label))
        })?;
        update(object);
        slot.entity = entry.binding().from_json(json)?;
        Ok(())
    }
}

impl std::fmt::Debug for ObjectGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectGraph")
            .field("len", &self.slots.len())
            .field("keys", &self.order)
            .finish()
    }
}

fn relationship_field<'a>(catalog: &'a Catalog, label: &str, field: &str) -> Result<&'a FieldConfig> {
    catalog
        .config(label)?
        .field(field)
        .filter(|f| f.is_relationship())
        .ok_or_else(|| Error::InvalidOperation(format!("[{}].{} is not a relationship field", label, field)))
}

fn check_peer(config: &FieldConfig, label: &str) -> Result<()> {
    if config.peer_label.as_deref() == Some(label) {
        Ok(())
    } else {
        Err(Error::InvalidOperation(format!(
            "field `{}` links to [{}], not [{}]",
            config.field_name,
            config.peer_label.as_deref().unwrap_or_default(),
            label
        )))
    }
}
