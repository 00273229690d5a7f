//! Registry of tracked entity types
//!
//! Decides which entity types are audited and which of their fields are
//! visible, masked or excluded, and wires the lifecycle hooks that drive the
//! diff/record path for each registered type.
//!
//! Registration is a configuration-time operation: the registry is expected
//! to be populated at startup and read concurrently afterwards.

use std::borrow::Borrow;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, AuditResult};

use super::context::UnitOfWork;
use super::receivers::{default_hooks, HookKind, LifecycleEvent, LifecycleHook};
use super::recorder::Recorder;

/// Name used in dispatch keys when a registry is not given one
pub const DEFAULT_REGISTRY_NAME: &str = "auditlog";

/// Identifier of a trackable record type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(String);

impl EntityType {
    /// Create an entity type identifier
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this identifier names something that can be tracked
    ///
    /// Starts with an ASCII letter or `_`, then ASCII alphanumerics, `_`,
    /// `.` or `:` (so `blog.Article` and `blog::Article` are accepted).
    pub fn is_valid(&self) -> bool {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':'))
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EntityType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EntityType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Field visibility policy for one tracked entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntityConfig {
    /// The entity type this policy applies to
    pub entity_type: EntityType,

    /// Fields to consider; empty means every field
    #[serde(default)]
    pub include_fields: BTreeSet<String>,

    /// Fields never reported, even when listed in `include_fields`
    #[serde(default)]
    pub exclude_fields: BTreeSet<String>,

    /// Fields reported with a placeholder instead of their values
    #[serde(default)]
    pub mask_fields: BTreeSet<String>,

    /// Relation tracking; registration rejects `true`
    #[serde(default)]
    pub supports_relations: bool,
}

impl TrackedEntityConfig {
    /// A policy that tracks every field of the entity type
    pub fn new(entity_type: impl Into<EntityType>) -> Self {
        Self {
            entity_type: entity_type.into(),
            include_fields: BTreeSet::new(),
            exclude_fields: BTreeSet::new(),
            mask_fields: BTreeSet::new(),
            supports_relations: false,
        }
    }

    /// Restrict tracking to these fields
    pub fn with_include<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Never report these fields
    pub fn with_exclude<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Report changes to these fields without their values
    pub fn with_mask<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mask_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Ask for relation tracking (unsupported)
    pub fn with_relations(mut self, relations: bool) -> Self {
        self.supports_relations = relations;
        self
    }

    /// Whether a field takes part in diffing
    pub fn is_visible(&self, field: &str) -> bool {
        if self.exclude_fields.contains(field) {
            return false;
        }
        self.include_fields.is_empty() || self.include_fields.contains(field)
    }

    /// Whether a field's values are replaced by the placeholder
    pub fn is_masked(&self, field: &str) -> bool {
        self.mask_fields.contains(field)
    }
}

/// Identity of one wired hook
///
/// Deterministic, so wiring the same type twice replaces instead of
/// duplicating.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    pub registry: String,
    pub entity_type: EntityType,
    pub hook: HookKind,
}

/// Keeps track of the entity types whose mutations are audited
pub struct Registry {
    name: String,
    hooks: HashMap<HookKind, Arc<dyn LifecycleHook>>,
    configs: RwLock<HashMap<EntityType, TrackedEntityConfig>>,
    wiring: RwLock<HashMap<DispatchKey, Arc<dyn LifecycleHook>>>,
}

impl Registry {
    /// Create a registry whose hooks record through `recorder`
    pub fn new(recorder: Arc<Recorder>) -> Self {
        Self::named(DEFAULT_REGISTRY_NAME, recorder)
    }

    /// Create a registry with its own name in dispatch keys
    pub fn named(name: impl Into<String>, recorder: Arc<Recorder>) -> Self {
        Self {
            name: name.into(),
            hooks: default_hooks(recorder),
            configs: RwLock::new(HashMap::new()),
            wiring: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the default hook for some lifecycle events
    ///
    /// Affects types registered after the call.
    pub fn with_custom_hooks<I>(mut self, custom: I) -> Self
    where
        I: IntoIterator<Item = (HookKind, Arc<dyn LifecycleHook>)>,
    {
        self.hooks.extend(custom);
        self
    }

    /// Name used in this registry's dispatch keys
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register an entity type for auditing
    ///
    /// Stores (or overwrites) the policy and wires all four lifecycle hooks.
    /// Returns the entity type unchanged so the call can wrap a definition.
    ///
    /// # Errors
    ///
    /// - [`AuditError::UnsupportedFeature`] if relation tracking is requested
    /// - [`AuditError::InvalidTarget`] if the entity type is not trackable
    pub fn register(&self, config: TrackedEntityConfig) -> AuditResult<EntityType> {
        if config.supports_relations {
            return Err(AuditError::UnsupportedFeature(format!(
                "relation tracking is not supported (requested for {})",
                config.entity_type
            )));
        }

        if !config.entity_type.is_valid() {
            return Err(AuditError::InvalidTarget(format!(
                "'{}' is not a valid trackable record type",
                config.entity_type
            )));
        }

        let entity_type = config.entity_type.clone();

        {
            let mut wiring = self.wiring.write();
            for (kind, hook) in &self.hooks {
                wiring.insert(self.dispatch_key(&entity_type, *kind), Arc::clone(hook));
            }
        }
        self.configs.write().insert(entity_type.clone(), config);

        tracing::debug!(registry = %self.name, entity_type = %entity_type, "registered tracked entity");
        Ok(entity_type)
    }

    /// Stop auditing an entity type
    ///
    /// Does nothing if the type was never registered.
    pub fn unregister(&self, entity_type: &str) {
        let removed = self.configs.write().remove(entity_type);
        let Some(config) = removed else {
            return;
        };

        let mut wiring = self.wiring.write();
        for kind in HookKind::ALL {
            wiring.remove(&self.dispatch_key(&config.entity_type, kind));
        }

        tracing::debug!(registry = %self.name, entity_type = %entity_type, "unregistered tracked entity");
    }

    /// Whether an entity type is registered
    pub fn contains(&self, entity_type: &str) -> bool {
        self.configs.read().contains_key(entity_type)
    }

    /// Field policy of a registered entity type
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::NotRegistered`] if the type is not tracked.
    pub fn field_policy(&self, entity_type: &str) -> AuditResult<TrackedEntityConfig> {
        self.configs
            .read()
            .get(entity_type)
            .cloned()
            .ok_or_else(|| AuditError::NotRegistered(entity_type.to_string()))
    }

    /// All registered entity types, sorted
    pub fn registered(&self) -> Vec<EntityType> {
        let mut types: Vec<_> = self.configs.read().keys().cloned().collect();
        types.sort();
        types
    }

    /// Number of hooks currently wired for an entity type
    pub fn wired_hooks(&self, entity_type: &str) -> usize {
        self.wiring
            .read()
            .keys()
            .filter(|key| key.entity_type.as_str() == entity_type)
            .count()
    }

    /// Dispatch key for an entity type and hook kind
    pub fn dispatch_key(&self, entity_type: &EntityType, hook: HookKind) -> DispatchKey {
        DispatchKey {
            registry: self.name.clone(),
            entity_type: entity_type.clone(),
            hook,
        }
    }

    /// Deliver a lifecycle event from the storage layer
    ///
    /// Events for unregistered types are ignored. Hooks contain their own
    /// failures, so dispatch never fails the mutation being observed.
    pub fn dispatch(&self, uow: &mut UnitOfWork, event: &LifecycleEvent<'_>) {
        let entity_type = event.instance().entity_type();

        let Some(policy) = self.configs.read().get(entity_type).cloned() else {
            return;
        };

        let key = self.dispatch_key(&policy.entity_type, event.kind());
        let Some(hook) = self.wiring.read().get(&key).cloned() else {
            return;
        };

        hook.handle(uow, event, &policy);
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("name", &self.name)
            .field("registered", &self.registered())
            .finish()
    }
}
