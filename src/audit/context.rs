//! Actor attribution for one unit of work
//!
//! The request pipeline binds the acting user and the originating address to
//! a [`UnitOfWork`] at the start of each inbound request. The handle is owned
//! by that request and handed to [`Registry::dispatch`] by mutable reference,
//! so nothing bound here is ever visible to another request.
//!
//! [`Registry::dispatch`]: super::registry::Registry::dispatch

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::diff::ABSENT_VALUE;
use super::snapshot::Snapshot;

/// Actor label used when no authenticated actor is bound
pub const UNAUTHENTICATED_ACTOR: &str = "An unauthenticated user";

/// Session tag used when no authenticated actor is bound
pub const NO_SESSION: &str = "NO_SESSION";

/// The identity responsible for a mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Stable identifier of the user
    pub id: String,
    /// Display name
    pub name: String,
    /// Whether the request pipeline authenticated this actor
    pub authenticated: bool,
    /// Hash identifying the actor's authenticated session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_hash: Option<String>,
}

impl Actor {
    /// An authenticated actor
    pub fn authenticated(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            authenticated: true,
            session_hash: None,
        }
    }

    /// An actor marker the pipeline could not authenticate
    pub fn anonymous() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            authenticated: false,
            session_hash: None,
        }
    }

    /// Attach a session hash
    pub fn with_session_hash(mut self, hash: impl Into<String>) -> Self {
        self.session_hash = Some(hash.into());
        self
    }

    /// Whether this marker identifies a real authenticated user
    pub fn is_authenticated(&self) -> bool {
        self.authenticated && !self.id.trim().is_empty()
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            f.write_str(&self.id)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// Network origin of a request as seen by the pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteAddr {
    direct: Option<String>,
    forwarded_for: Option<String>,
}

impl RemoteAddr {
    /// No address information
    pub fn unknown() -> Self {
        Self::default()
    }

    /// The address of the direct connection
    pub fn direct(addr: impl Into<String>) -> Self {
        Self {
            direct: Some(addr.into()),
            forwarded_for: None,
        }
    }

    /// Add the raw value of a forwarded-for header
    pub fn with_forwarded_for(mut self, header: impl Into<String>) -> Self {
        self.forwarded_for = Some(header.into());
        self
    }

    /// The originating address
    pub fn resolve(&self) -> Option<String> {
        resolve_remote_addr(self.direct.as_deref(), self.forwarded_for.as_deref())
    }
}

/// Resolve the originating address of a request
///
/// Behind a proxy the first entry of the forwarded-for list is the client;
/// otherwise the direct connection address is used.
pub fn resolve_remote_addr(direct: Option<&str>, forwarded_for: Option<&str>) -> Option<String> {
    let forwarded = forwarded_for
        .and_then(|header| header.split(',').next())
        .map(str::trim)
        .filter(|addr| !addr.is_empty());

    forwarded
        .or_else(|| direct.map(str::trim).filter(|addr| !addr.is_empty()))
        .map(str::to_string)
}

/// Actor and origin bound to one unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor: Option<Actor>,
    remote_addr: Option<String>,
    session: String,
}

impl ActorContext {
    /// Resolve a context from what the pipeline knows about the request
    ///
    /// Missing or unauthenticated actor markers resolve to no actor.
    pub fn new(actor: Option<Actor>, remote: &RemoteAddr) -> Self {
        let actor = actor.filter(Actor::is_authenticated);
        let session = actor
            .as_ref()
            .and_then(|a| a.session_hash.clone())
            .unwrap_or_else(|| NO_SESSION.to_string());

        Self {
            actor,
            remote_addr: remote.resolve(),
            session,
        }
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    pub fn remote_addr(&self) -> Option<&str> {
        self.remote_addr.as_deref()
    }

    pub fn session(&self) -> &str {
        &self.session
    }
}

type PendingKey = (String, String);

/// Per-request handle carrying the bound context
///
/// Also holds the prior snapshots captured by before-hooks until the matching
/// after-hook consumes them. A unit of work dropped between the two hooks
/// takes its captures with it and nothing is recorded.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    context: Option<ActorContext>,
    pending: HashMap<PendingKey, Option<Snapshot>>,
}

impl UnitOfWork {
    /// A unit of work with nothing bound
    pub fn new() -> Self {
        Self::default()
    }

    /// A unit of work bound to an actor and origin
    pub fn bound(actor: Option<Actor>, remote: RemoteAddr) -> Self {
        let mut uow = Self::new();
        uow.bind(actor, remote);
        uow
    }

    /// Establish the context of this unit of work
    ///
    /// Replaces any earlier binding and drops pending captures.
    pub fn bind(&mut self, actor: Option<Actor>, remote: RemoteAddr) {
        self.context = Some(ActorContext::new(actor, &remote));
        self.pending.clear();
    }

    /// The bound context, if any
    pub fn context(&self) -> Option<&ActorContext> {
        self.context.as_ref()
    }

    /// The authenticated actor, if any
    pub fn current_actor(&self) -> Option<&Actor> {
        self.context.as_ref().and_then(ActorContext::actor)
    }

    /// The originating address, if known
    pub fn current_remote_address(&self) -> Option<&str> {
        self.context.as_ref().and_then(ActorContext::remote_addr)
    }

    /// Session tag of the bound actor, or [`NO_SESSION`]
    pub fn session_tag(&self) -> &str {
        self.context
            .as_ref()
            .map(ActorContext::session)
            .unwrap_or(NO_SESSION)
    }

    /// Display label of the actor, or [`UNAUTHENTICATED_ACTOR`]
    pub fn actor_label(&self) -> String {
        self.current_actor()
            .map(ToString::to_string)
            .unwrap_or_else(|| UNAUTHENTICATED_ACTOR.to_string())
    }

    /// Prefix for log lines about this unit of work
    pub fn default_log_message(&self) -> String {
        format!(
            "{} user '{}' {}",
            self.current_remote_address().unwrap_or(ABSENT_VALUE),
            self.actor_label(),
            self.session_tag()
        )
    }

    /// Number of before-hook captures still waiting for their after-hook
    pub fn pending_captures(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn stash_prior(&mut self, entity_type: &str, pk: &str, prior: Option<Snapshot>) {
        self.pending
            .insert((entity_type.to_string(), pk.to_string()), prior);
    }

    /// Outer `None` means no capture happened; inner `None` means the prior
    /// state was looked up and found absent.
    pub(crate) fn take_prior(&mut self, entity_type: &str, pk: &str) -> Option<Option<Snapshot>> {
        self.pending
            .remove(&(entity_type.to_string(), pk.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarded_for_wins() {
        assert_eq!(
            resolve_remote_addr(Some("10.0.0.1"), Some("1.2.3.4, 5.6.7.6")),
            Some("1.2.3.4".to_string())
        );
    }

    #[test]
    fn test_direct_address_fallback() {
        assert_eq!(
            resolve_remote_addr(Some("10.0.0.1"), None),
            Some("10.0.0.1".to_string())
        );
        assert_eq!(
            resolve_remote_addr(Some("10.0.0.1"), Some("  ")),
            Some("10.0.0.1".to_string())
        );
        assert_eq!(resolve_remote_addr(None, None), None);
    }

    #[test]
    fn test_unbound_is_absent() {
        let uow = UnitOfWork::new();
        assert!(uow.current_actor().is_none());
        assert!(uow.current_remote_address().is_none());
        assert_eq!(uow.session_tag(), NO_SESSION);
        assert_eq!(uow.actor_label(), UNAUTHENTICATED_ACTOR);
    }

    #[test]
    fn test_bind_authenticated_actor() {
        let actor = Actor::authenticated("7", "alice").with_session_hash("abc123");
        let uow = UnitOfWork::bound(Some(actor), RemoteAddr::direct("192.168.1.5"));

        assert_eq!(uow.current_actor().map(|a| a.id.as_str()), Some("7"));
        assert_eq!(uow.current_remote_address(), Some("192.168.1.5"));
        assert_eq!(uow.session_tag(), "abc123");
        assert_eq!(uow.default_log_message(), "192.168.1.5 user 'alice' abc123");
    }

    #[test]
    fn test_unauthenticated_marker_is_absent() {
        let uow = UnitOfWork::bound(Some(Actor::anonymous()), RemoteAddr::unknown());
        assert!(uow.current_actor().is_none());

        let blank = Actor::authenticated("  ", "ghost");
        let uow = UnitOfWork::bound(Some(blank), RemoteAddr::unknown());
        assert!(uow.current_actor().is_none());
        assert_eq!(
            uow.default_log_message(),
            "None user 'An unauthenticated user' NO_SESSION"
        );
    }

    #[test]
    fn test_rebind_replaces_everything() {
        let mut uow = UnitOfWork::bound(
            Some(Actor::authenticated("1", "alice")),
            RemoteAddr::direct("10.0.0.1"),
        );
        uow.stash_prior("Article", "1", None);

        uow.bind(None, RemoteAddr::unknown());
        assert!(uow.current_actor().is_none());
        assert!(uow.current_remote_address().is_none());
        assert_eq!(uow.pending_captures(), 0);
    }

    #[test]
    fn test_pending_capture_roundtrip() {
        let mut uow = UnitOfWork::new();
        uow.stash_prior("Article", "1", Some(Snapshot::new()));

        assert_eq!(uow.take_prior("Article", "1"), Some(Some(Snapshot::new())));
        assert_eq!(uow.take_prior("Article", "1"), None);
    }
}
