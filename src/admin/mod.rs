//! Administrative mutations over groups, memberships, permissions, bucket
//! assignments and principals.
//!
//! Every mutation runs through [`AdminService::apply`]: the admin gate, then
//! the store change, then exactly one audit event if state changed.

mod buckets;
mod groups;
mod principals;
pub mod validation;

use std::sync::Arc;

use crate::audit::{AuditEntry, AuditRecorder};
use crate::auth::CredentialHasher;
use crate::authz::require_admin;
use crate::error::Result;
use crate::store::Store;
use crate::types::{AuditRetention, Principal};

pub use principals::NewPrincipal;

/// Outcome of a mutation body: the value handed back to the caller and the
/// event to record, if any state changed.
pub(crate) struct Applied<T> {
    value: T,
    entry: Option<AuditEntry>,
}

impl<T> Applied<T> {
    fn changed(value: T, entry: AuditEntry) -> Self {
        Self {
            value,
            entry: Some(entry),
        }
    }

    fn unchanged(value: T) -> Self {
        Self { value, entry: None }
    }
}

#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn Store>,
    audit: AuditRecorder,
    hasher: Arc<dyn CredentialHasher>,
    retention: AuditRetention,
    allow_signup: bool,
}

impl AdminService {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        audit: AuditRecorder,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Self {
        Self {
            store,
            audit,
            hasher,
            retention: AuditRetention::default(),
            allow_signup: false,
        }
    }

    #[must_use]
    pub fn with_retention(mut self, retention: AuditRetention) -> Self {
        self.retention = retention;
        self
    }

    #[must_use]
    pub fn with_signup(mut self, allow_signup: bool) -> Self {
        self.allow_signup = allow_signup;
        self
    }

    /// Runs an admin-only mutation.
    fn apply<T>(
        &self,
        actor: &Principal,
        mutation: impl FnOnce() -> Result<Applied<T>>,
    ) -> Result<T> {
        require_admin(actor)?;
        self.apply_as(Some(actor), mutation)
    }

    /// Runs a mutation whose authorization the caller has already settled.
    /// `None` records a system event.
    fn apply_as<T>(
        &self,
        actor: Option<&Principal>,
        mutation: impl FnOnce() -> Result<Applied<T>>,
    ) -> Result<T> {
        let Applied { value, entry } = mutation()?;

        if let Some(entry) = entry {
            let actor_id = actor.map(|p| p.id.as_str());
            tracing::info!(
                actor = actor_id.unwrap_or("system"),
                action = entry.action,
                resource = %entry.resource,
                "admin mutation"
            );
            self.audit.record(actor_id, &entry);
        }

        Ok(value)
    }

    /// Admin-only read.
    fn read<T>(&self, actor: &Principal, read: impl FnOnce() -> Result<T>) -> Result<T> {
        require_admin(actor)?;
        read()
    }
}
