mod schema;
mod sqlite;

use std::collections::BTreeSet;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// The bucket-assignment rows relevant to one principal, read in a single
/// transaction together with the system-wide assignment count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketSnapshot {
    /// Union of the principal's direct assignments and those of its groups.
    pub assigned: BTreeSet<String>,
    /// Number of group and principal assignment rows in the whole system.
    pub system_total: i64,
}

/// An audit row as persisted, with `details` still in its serialized form.
#[derive(Debug, Clone)]
pub struct StoredAuditEvent {
    pub id: i64,
    pub principal_id: Option<String>,
    pub username: Option<String>,
    pub action: String,
    pub resource: String,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Principal operations
    fn create_principal(&self, principal: &Principal) -> Result<()>;
    fn get_principal(&self, id: &str) -> Result<Option<Principal>>;
    fn get_principal_by_username(&self, username: &str) -> Result<Option<Principal>>;
    fn list_principals(&self, cursor: &str, limit: i32) -> Result<Vec<Principal>>;
    fn update_principal(&self, principal: &Principal) -> Result<()>;
    /// Saves the principal and deletes its sessions, except `keep_session`,
    /// in one transaction. Returns the number of sessions deleted.
    fn update_principal_revoking_sessions(
        &self,
        principal: &Principal,
        keep_session: Option<&str>,
    ) -> Result<usize>;
    /// Removes the principal with its memberships, bucket assignments and
    /// sessions in one transaction. Returns `None` if it did not exist.
    fn delete_principal(
        &self,
        id: &str,
        retention: AuditRetention,
    ) -> Result<Option<PrincipalRemoval>>;
    fn has_admin(&self) -> Result<bool>;

    // Group operations
    fn create_group(&self, group: &Group) -> Result<()>;
    fn get_group(&self, id: &str) -> Result<Option<Group>>;
    fn list_groups(&self) -> Result<Vec<Group>>;
    /// Removes the group with its permissions, memberships and bucket
    /// assignments in one transaction. Returns `None` if it did not exist.
    fn delete_group(&self, id: &str) -> Result<Option<GroupRemoval>>;

    // Membership operations (many-to-many)
    fn add_membership(&self, membership: &Membership) -> Result<()>;
    fn remove_membership(&self, principal_id: &str, group_id: &str) -> Result<bool>;
    fn list_group_members(&self, group_id: &str) -> Result<Vec<Principal>>;
    fn list_principal_groups(&self, principal_id: &str) -> Result<Vec<Group>>;

    // Group permission operations
    fn upsert_group_permission(
        &self,
        group_id: &str,
        resource: &str,
        access: AccessLevel,
    ) -> Result<PermissionChange>;
    fn get_group_permission(&self, id: i64) -> Result<Option<GroupPermission>>;
    fn delete_group_permission(&self, id: i64) -> Result<bool>;
    fn list_group_permissions(&self, group_id: &str) -> Result<Vec<GroupPermission>>;
    /// Every permission row reachable through the principal's memberships.
    fn list_principal_permissions(&self, principal_id: &str) -> Result<Vec<GroupPermission>>;

    // Bucket assignment operations
    fn add_bucket_assignment(&self, assignment: &BucketAssignment) -> Result<()>;
    fn remove_bucket_assignment(&self, grantee: &BucketGrantee, bucket: &str) -> Result<bool>;
    fn list_bucket_assignments(&self, grantee: &BucketGrantee) -> Result<Vec<String>>;
    fn bucket_snapshot(&self, principal_id: &str) -> Result<BucketSnapshot>;

    // Session operations
    fn create_session(&self, session: &Session) -> Result<()>;
    fn get_session_by_lookup(&self, lookup: &str) -> Result<Option<Session>>;
    fn delete_session(&self, id: &str) -> Result<bool>;
    fn update_session_last_used(&self, id: &str) -> Result<()>;

    // Audit operations (append-only)
    fn append_audit_event(
        &self,
        principal_id: Option<&str>,
        action: &str,
        resource: &str,
        details: &str,
        created_at: &DateTime<Utc>,
    ) -> Result<i64>;
    fn query_audit_events(&self, query: &AuditQuery) -> Result<(Vec<StoredAuditEvent>, i64)>;
}
