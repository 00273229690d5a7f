//! Lifecycle hooks
//!
//! The storage layer reports four lifecycle events per tracked mutation.
//! Before-hooks capture the prior state into the unit of work; after-hooks
//! diff it against the current state and record the result.
//!
//! Hooks observe mutations, they never take part in them: every failure in
//! here is logged and swallowed.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::AuditResult;

use super::context::UnitOfWork;
use super::diff::diff;
use super::entry::{Action, ObjectRef};
use super::recorder::Recorder;
use super::registry::TrackedEntityConfig;
use super::snapshot::{Snapshot, TrackedRecord};

/// The four lifecycle points a tracked type is wired for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookKind {
    PreSave,
    PostSave,
    PreDelete,
    PostDelete,
}

impl HookKind {
    pub const ALL: [HookKind; 4] = [
        HookKind::PreSave,
        HookKind::PostSave,
        HookKind::PreDelete,
        HookKind::PostDelete,
    ];
}

/// Looks up the currently persisted state of a record
///
/// Implemented by the storage layer. Return [`AuditError::NotFound`] when the
/// record no longer exists.
///
/// [`AuditError::NotFound`]: crate::error::AuditError::NotFound
pub trait PriorStateSource {
    fn fetch_prior(&self, entity_type: &str, primary_key: &str) -> AuditResult<Snapshot>;
}

/// A lifecycle notification from the storage layer
#[derive(Clone, Copy)]
pub enum LifecycleEvent<'a> {
    /// About to insert or update `instance`
    BeforeSave {
        instance: &'a dyn TrackedRecord,
        source: &'a dyn PriorStateSource,
    },
    /// `instance` was inserted (`created`) or updated
    AfterSave {
        instance: &'a dyn TrackedRecord,
        created: bool,
    },
    /// About to delete `instance`
    BeforeDelete { instance: &'a dyn TrackedRecord },
    /// `instance` was deleted
    AfterDelete { instance: &'a dyn TrackedRecord },
}

impl<'a> LifecycleEvent<'a> {
    pub fn kind(&self) -> HookKind {
        match self {
            LifecycleEvent::BeforeSave { .. } => HookKind::PreSave,
            LifecycleEvent::AfterSave { .. } => HookKind::PostSave,
            LifecycleEvent::BeforeDelete { .. } => HookKind::PreDelete,
            LifecycleEvent::AfterDelete { .. } => HookKind::PostDelete,
        }
    }

    pub fn instance(&self) -> &'a dyn TrackedRecord {
        match *self {
            LifecycleEvent::BeforeSave { instance, .. }
            | LifecycleEvent::AfterSave { instance, .. }
            | LifecycleEvent::BeforeDelete { instance }
            | LifecycleEvent::AfterDelete { instance } => instance,
        }
    }
}

/// Handler wired to one lifecycle point of a tracked type
pub trait LifecycleHook: Send + Sync {
    fn handle(&self, uow: &mut UnitOfWork, event: &LifecycleEvent<'_>, policy: &TrackedEntityConfig);
}

/// Default wiring: capture on the before-hooks, record on the after-hooks
pub fn default_hooks(recorder: Arc<Recorder>) -> HashMap<HookKind, Arc<dyn LifecycleHook>> {
    let capture: Arc<dyn LifecycleHook> = Arc::new(CapturePrior);
    let record: Arc<dyn LifecycleHook> = Arc::new(RecordChanges::new(recorder));

    HashMap::from([
        (HookKind::PreSave, Arc::clone(&capture)),
        (HookKind::PostSave, Arc::clone(&record)),
        (HookKind::PreDelete, capture),
        (HookKind::PostDelete, record),
    ])
}

/// Stashes the prior state of a record in the unit of work
#[derive(Debug, Default)]
pub struct CapturePrior;

impl LifecycleHook for CapturePrior {
    fn handle(&self, uow: &mut UnitOfWork, event: &LifecycleEvent<'_>, _policy: &TrackedEntityConfig) {
        let instance = event.instance();
        let entity_type = instance.entity_type();

        // Unsaved records have no prior state
        let Some(pk) = instance.primary_key() else {
            return;
        };

        let prior = match event {
            LifecycleEvent::BeforeSave { source, .. } => {
                match source.fetch_prior(entity_type, &pk) {
                    Ok(snapshot) => Some(snapshot),
                    Err(err) if err.is_not_found() => {
                        tracing::debug!(entity_type, pk = %pk, "no persisted prior state");
                        None
                    }
                    Err(err) => {
                        tracing::warn!(entity_type, pk = %pk, error = %err, "prior state lookup failed, treating as absent");
                        None
                    }
                }
            }
            LifecycleEvent::BeforeDelete { .. } => Some(instance.snapshot()),
            _ => return,
        };

        uow.stash_prior(entity_type, &pk, prior);
    }
}

/// Diffs the captured prior state against the outcome and records it
pub struct RecordChanges {
    recorder: Arc<Recorder>,
}

impl RecordChanges {
    pub fn new(recorder: Arc<Recorder>) -> Self {
        Self { recorder }
    }
}

impl LifecycleHook for RecordChanges {
    fn handle(&self, uow: &mut UnitOfWork, event: &LifecycleEvent<'_>, policy: &TrackedEntityConfig) {
        let instance = event.instance();
        let entity_type = instance.entity_type();

        let Some(object) = ObjectRef::of(instance) else {
            tracing::warn!(entity_type, "mutation of a record without a primary key, not recorded");
            return;
        };

        let captured = uow.take_prior(entity_type, &object.pk);

        let (action, changes) = match event {
            LifecycleEvent::AfterSave { created: true, .. } => {
                (Action::Create, diff(None, Some(&instance.snapshot()), policy))
            }
            LifecycleEvent::AfterSave { created: false, .. } => {
                let prior = captured.flatten();
                (
                    Action::Update,
                    diff(prior.as_ref(), Some(&instance.snapshot()), policy),
                )
            }
            LifecycleEvent::AfterDelete { .. } => {
                let prior = captured.flatten().unwrap_or_else(|| instance.snapshot());
                (Action::Delete, diff(Some(&prior), None, policy))
            }
            _ => return,
        };

        if let Err(err) = self
            .recorder
            .record(action, entity_type, &object, &changes, uow)
        {
            tracing::warn!(
                entity_type,
                pk = %object.pk,
                action = %action,
                error = %err,
                "failed to record audit entry"
            );
        }
    }
}
