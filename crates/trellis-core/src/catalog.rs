//! Entity catalog: the frozen result of registering every mapped type

use crate::binding::EntityBinding;
use crate::entity::{derive_config, derive_edge_config, EdgeEntity, Entity, EntityConfig};
use crate::error::{Error, Result};
use crate::registry::{RegistryBuilder, RelationshipRegistry};
use std::collections::HashMap;

struct Registration {
    derive: fn() -> Result<EntityConfig>,
    binding: EntityBinding,
}

/// Collects entity types before validation.
///
/// ```ignore
/// let catalog = Catalog::builder()
///     .register::<Teacher>()
///     .register::<Course>()
///     .build()?;
/// ```
#[derive(Default)]
pub struct CatalogBuilder {
    registrations: Vec<Registration>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node entity type
    pub fn register<T: Entity>(mut self) -> Self {
        self.registrations.push(Registration {
            derive: derive_config::<T>,
            binding: EntityBinding::node::<T>(),
        });
        self
    }

    /// Register an edge entity type
    pub fn register_edge<E: EdgeEntity>(mut self) -> Self {
        self.registrations.push(Registration {
            derive: derive_edge_config::<E>,
            binding: EntityBinding::edge::<E>(),
        });
        self
    }

    /// Derive every configuration, populate and validate the relationship
    /// registry, then freeze.
    pub fn build(self) -> Result<Catalog> {
        let registry = RegistryBuilder::new();
        let mut entries: HashMap<String, CatalogEntry> = HashMap::new();

        for registration in self.registrations {
            let config = (registration.derive)()?;
            if entries.contains_key(&config.label) {
                return Err(Error::configuration(
                    &config.label,
                    "label registered more than once",
                ));
            }

            for field in config.relationships() {
                if let (Some(relationship), Some(peer)) = (&field.relationship, &field.peer_label) {
                    registry.add(&config.label, relationship, peer, field.clone());
                }
            }

            tracing::debug!(
                "Registered entity {} ({} fields)",
                config.label,
                config.fields.len()
            );
            entries.insert(
                config.label.clone(),
                CatalogEntry {
                    config,
                    binding: registration.binding,
                },
            );
        }

        check_targets(&entries)?;
        let registry = registry.freeze()?;

        Ok(Catalog { entries, registry })
    }
}

/// Every relationship must point at registered types
fn check_targets(entries: &HashMap<String, CatalogEntry>) -> Result<()> {
    for entry in entries.values() {
        for field in entry.config.relationships() {
            let peer = field.peer_label.as_deref().unwrap_or_default();
            match entries.get(peer) {
                Some(target) if !target.config.is_edge() => {}
                _ => {
                    return Err(Error::configuration(
                        &entry.config.label,
                        format!(
                            "field `{}` targets [{}] which is not a registered node entity",
                            field.field_name, peer
                        ),
                    ))
                }
            }
            if let Some(edge) = field.edge_label.as_deref() {
                if !entries.get(edge).is_some_and(|e| e.config.is_edge()) {
                    return Err(Error::configuration(
                        &entry.config.label,
                        format!(
                            "field `{}` uses [{}] which is not a registered edge entity",
                            field.field_name, edge
                        ),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// One registered entity type
pub struct CatalogEntry {
    pub config: EntityConfig,
    pub(crate) binding: EntityBinding,
}

impl CatalogEntry {
    pub fn binding(&self) -> &EntityBinding {
        &self.binding
    }
}

/// Frozen metadata shared by every session
pub struct Catalog {
    entries: HashMap<String, CatalogEntry>,
    registry: RelationshipRegistry,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::new()
    }

    pub fn entry(&self, label: &str) -> Result<&CatalogEntry> {
        self.entries
            .get(label)
            .ok_or_else(|| Error::UnregisteredType(label.to_string()))
    }

    pub fn config(&self, label: &str) -> Result<&EntityConfig> {
        self.entry(label).map(|e| &e.config)
    }

    pub fn config_of<T: Entity>(&self) -> Result<&EntityConfig> {
        self.config(T::label())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    /// Registered configurations in label order
    pub fn configs(&self) -> Vec<&EntityConfig> {
        let mut configs: Vec<&EntityConfig> = self.entries.values().map(|e| &e.config).collect();
        configs.sort_by(|a, b| a.label.cmp(&b.label));
        configs
    }

    /// First of `labels` that names a registered type
    pub fn resolve_label<'a>(&self, labels: &'a [String]) -> Option<&'a str> {
        labels
            .iter()
            .map(String::as_str)
            .find(|l| self.entries.contains_key(*l))
    }

    pub fn registry(&self) -> &RelationshipRegistry {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("labels", &self.configs().iter().map(|c| &c.label).collect::<Vec<_>>())
            .finish()
    }
}
