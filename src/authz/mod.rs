//! Permission resolution: the allow/deny decision for a principal and a
//! resource, and the set of buckets a principal may see.
//!
//! Policy is split from storage. `decide` and `resolve_buckets` are pure
//! functions over rows read in one store call, and [`Authorizer`] wires them
//! to a [`Store`].

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::store::{BucketSnapshot, Store};
use crate::types::{AccessLevel, GroupPermission, Principal};

/// Resource family checked by the object-storage gate.
pub const BUCKET_RESOURCE: &str = "bucket";

/// Buckets a principal may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "buckets", rename_all = "snake_case")]
pub enum BucketSet {
    /// No filtering applies.
    All,
    /// Strict allow-list; may be empty.
    Only(BTreeSet<String>),
}

impl BucketSet {
    #[must_use]
    pub fn contains(&self, bucket: &str) -> bool {
        match self {
            BucketSet::All => true,
            BucketSet::Only(allowed) => allowed.contains(bucket),
        }
    }

    /// Keeps only the visible names, preserving input order.
    #[must_use]
    pub fn filter(&self, buckets: Vec<String>) -> Vec<String> {
        buckets.into_iter().filter(|b| self.contains(b)).collect()
    }
}

/// How a bucket set was reached. Recomputed on every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    AdminBypass,
    Assigned,
    ExcludedByOthers,
    Unconfigured,
}

/// Returns true if a stored grant pattern covers the requested resource.
///
/// The grant is either identical to the requested name or a colon-qualified
/// child of it: requesting `bucket` matches a stored `bucket:reports`, but
/// requesting `bucket:reports` does not match a stored `bucket`.
#[must_use]
pub fn resource_matches(stored: &str, requested: &str) -> bool {
    match stored.strip_prefix(requested) {
        Some("") => true,
        Some(rest) => rest.starts_with(':'),
        None => false,
    }
}

/// Decides a non-admin request from every permission row the principal holds.
///
/// A principal holding no rows at all may read anything; writes always need
/// an explicit grant.
#[must_use]
pub fn decide(permissions: &[GroupPermission], resource: &str, requested: AccessLevel) -> bool {
    let allowed = permissions
        .iter()
        .filter(|p| resource_matches(&p.resource, resource))
        .any(|p| p.access.grants(requested));

    allowed || (requested == AccessLevel::Read && permissions.is_empty())
}

/// Resolves a non-admin bucket set from an assignment snapshot.
#[must_use]
pub fn resolve_buckets(snapshot: BucketSnapshot) -> (Visibility, BucketSet) {
    if !snapshot.assigned.is_empty() {
        (Visibility::Assigned, BucketSet::Only(snapshot.assigned))
    } else if snapshot.system_total > 0 {
        (Visibility::ExcludedByOthers, BucketSet::Only(BTreeSet::new()))
    } else {
        (Visibility::Unconfigured, BucketSet::All)
    }
}

/// Fails with `Forbidden` unless the principal holds the admin role.
pub fn require_admin(principal: &Principal) -> Result<()> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}

#[derive(Clone)]
pub struct Authorizer {
    store: Arc<dyn Store>,
}

impl Authorizer {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn is_allowed(
        &self,
        principal: &Principal,
        resource: &str,
        requested: AccessLevel,
    ) -> Result<bool> {
        if principal.is_admin() {
            return Ok(true);
        }

        let permissions = self.store.list_principal_permissions(&principal.id)?;
        let allowed = decide(&permissions, resource, requested);

        tracing::debug!(
            principal = %principal.id,
            resource,
            access = %requested,
            rows = permissions.len(),
            allowed,
            "authorization decision"
        );

        Ok(allowed)
    }

    /// Like [`Authorizer::is_allowed`] but turns a denial into `Forbidden`.
    pub fn authorize(
        &self,
        principal: &Principal,
        resource: &str,
        requested: AccessLevel,
    ) -> Result<()> {
        if self.is_allowed(principal, resource, requested)? {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }

    pub fn visible_buckets(&self, principal: &Principal) -> Result<BucketSet> {
        Ok(self.visibility(principal)?.1)
    }

    pub fn visibility(&self, principal: &Principal) -> Result<(Visibility, BucketSet)> {
        if principal.is_admin() {
            return Ok((Visibility::AdminBypass, BucketSet::All));
        }

        let snapshot = self.store.bucket_snapshot(&principal.id)?;
        let resolved = resolve_buckets(snapshot);
        tracing::debug!(principal = %principal.id, state = ?resolved.0, "bucket visibility");
        Ok(resolved)
    }

    /// Gate in front of object-storage calls: the bucket must be visible and
    /// the principal must hold `requested` on the bucket resource family.
    pub fn ensure_bucket_allowed(
        &self,
        principal: &Principal,
        bucket: &str,
        requested: AccessLevel,
    ) -> Result<()> {
        if !self.visible_buckets(principal)?.contains(bucket) {
            return Err(Error::Forbidden);
        }
        self.authorize(principal, BUCKET_RESOURCE, requested)
    }

    pub fn filter_buckets(&self, principal: &Principal, buckets: Vec<String>) -> Result<Vec<String>> {
        Ok(self.visible_buckets(principal)?.filter(buckets))
    }
}
