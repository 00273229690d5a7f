//! Change-diffing and actor-attribution engine
//!
//! Records who created, updated or deleted a tracked record, from where, and
//! which fields moved from which value to which value.
//!
//! # Architecture
//!
//! - `Registry`: which entity types are tracked, their field policy
//!   (include/exclude/mask), and the hooks wired for each type.
//! - `UnitOfWork`: the actor and origin bound to one inbound request,
//!   passed to every dispatch made on its behalf.
//! - `diff`: filtered, masked field-level change set between two snapshots.
//! - `Recorder`: turns a change set plus context into an `AuditRecord` and
//!   hands it to an `AuditSink`, skipping updates that changed nothing.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use auditlog::audit::{
//!     Actor, JsonlSink, LifecycleEvent, Recorder, Registry, RemoteAddr,
//!     TrackedEntityConfig, UnitOfWork,
//! };
//!
//! let recorder = Arc::new(Recorder::new(Arc::new(JsonlSink::new(log_path))));
//! let registry = Registry::new(recorder);
//! registry.register(
//!     TrackedEntityConfig::new("Article").with_include(["title", "status"]),
//! )?;
//!
//! // Once per request
//! let mut uow = UnitOfWork::bound(
//!     Some(Actor::authenticated("7", "alice")),
//!     RemoteAddr::direct(peer).with_forwarded_for(header),
//! );
//!
//! // From the storage layer
//! registry.dispatch(&mut uow, &LifecycleEvent::BeforeSave { instance: &article, source: &db });
//! db.save(&article)?;
//! registry.dispatch(&mut uow, &LifecycleEvent::AfterSave { instance: &article, created: false });
//! ```

mod context;
mod diff;
mod entry;
mod logger;
mod receivers;
mod recorder;
mod registry;
mod sink;
mod snapshot;

pub use context::{
    resolve_remote_addr, Actor, ActorContext, RemoteAddr, UnitOfWork, NO_SESSION,
    UNAUTHENTICATED_ACTOR,
};
pub use diff::{
    diff, normalize_value, ChangeFormat, ChangeSet, FieldChange, ABSENT_VALUE, MASKED_VALUE,
};
pub use entry::{action_verb, Action, AuditRecord, ObjectRef};
pub use logger::JsonlSink;
pub use receivers::{
    default_hooks, CapturePrior, HookKind, LifecycleEvent, LifecycleHook, PriorStateSource,
    RecordChanges,
};
pub use recorder::Recorder;
pub use registry::{
    DispatchKey, EntityType, Registry, TrackedEntityConfig, DEFAULT_REGISTRY_NAME,
};
pub use sink::{AuditSink, MemorySink, TracingSink};
pub use snapshot::{Snapshot, TrackedRecord};
