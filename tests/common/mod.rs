//! Test fixtures shared by the integration tests: a tracked `Article` type
//! and an in-memory store playing the storage layer.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use auditlog::audit::{
    Actor, LifecycleEvent, MemorySink, PriorStateSource, Recorder, Registry, RemoteAddr,
    Snapshot, TrackedEntityConfig, TrackedRecord, UnitOfWork,
};
use auditlog::{AuditError, AuditResult};

#[derive(Debug, Clone, Serialize)]
pub struct Article {
    #[serde(skip)]
    pub id: Option<u64>,
    pub title: String,
    pub status: String,
    pub body: String,
}

impl Article {
    pub fn new(title: &str, status: &str, body: &str) -> Self {
        Self {
            id: None,
            title: title.into(),
            status: status.into(),
            body: body.into(),
        }
    }
}

impl TrackedRecord for Article {
    fn entity_type(&self) -> &str {
        "Article"
    }

    fn primary_key(&self) -> Option<String> {
        self.id.map(|id| id.to_string())
    }

    fn object_repr(&self) -> String {
        self.title.clone()
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::from_serialize(self).unwrap_or_default()
    }
}

/// Storage collaborator: persists snapshots and fires lifecycle events
#[derive(Default)]
pub struct Store {
    rows: Mutex<HashMap<String, Snapshot>>,
    next_id: Mutex<u64>,
}

impl PriorStateSource for Store {
    fn fetch_prior(&self, entity_type: &str, primary_key: &str) -> AuditResult<Snapshot> {
        self.rows
            .lock()
            .get(primary_key)
            .cloned()
            .ok_or_else(|| AuditError::not_found(entity_type, primary_key))
    }
}

impl Store {
    pub fn save(&self, registry: &Registry, uow: &mut UnitOfWork, article: &mut Article) {
        registry.dispatch(
            uow,
            &LifecycleEvent::BeforeSave {
                instance: &*article,
                source: self,
            },
        );

        let created = article.id.is_none();
        if created {
            let mut next = self.next_id.lock();
            *next += 1;
            article.id = Some(*next);
        }
        self.rows
            .lock()
            .insert(article.id.unwrap().to_string(), article.snapshot());

        registry.dispatch(
            uow,
            &LifecycleEvent::AfterSave {
                instance: &*article,
                created,
            },
        );
    }

    pub fn delete(&self, registry: &Registry, uow: &mut UnitOfWork, article: &Article) {
        registry.dispatch(uow, &LifecycleEvent::BeforeDelete { instance: article });
        self.rows
            .lock()
            .remove(&article.primary_key().unwrap());
        registry.dispatch(uow, &LifecycleEvent::AfterDelete { instance: article });
    }
}

pub fn setup(config: TrackedEntityConfig) -> (Registry, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let registry = Registry::new(Arc::new(Recorder::new(sink.clone())));
    registry.register(config).unwrap();
    (registry, sink)
}

pub fn alice() -> UnitOfWork {
    UnitOfWork::bound(
        Some(Actor::authenticated("7", "alice")),
        RemoteAddr::direct("10.0.0.9").with_forwarded_for("1.2.3.4, 5.6.7.6"),
    )
}
