use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccessLevel, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub username: String,
    #[serde(skip)]
    pub credential_hash: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub principal_id: String,
    pub group_id: String,
    pub created_at: DateTime<Utc>,
}

/// A `(resource-pattern, access-level)` grant held by a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupPermission {
    pub id: i64,
    pub group_id: String,
    pub resource: String,
    pub access: AccessLevel,
}

/// Who a bucket assignment makes the bucket visible to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum BucketGrantee {
    Group(String),
    Principal(String),
}

impl BucketGrantee {
    /// Audit resource tag for the grantee, e.g. `group:<id>`.
    #[must_use]
    pub fn resource_tag(&self) -> String {
        match self {
            BucketGrantee::Group(id) => format!("group:{id}"),
            BucketGrantee::Principal(id) => format!("principal:{id}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketAssignment {
    pub grantee: BucketGrantee,
    pub bucket: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub action: String,
    pub resource: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A login session. The raw token is only ever shown to the client once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(skip)]
    pub token_hash: String,
    #[serde(skip)]
    pub token_lookup: String,
    pub principal_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

/// What happened to the audit rows of a deleted principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditRetention {
    /// Keep the rows and null out `principal_id`.
    #[default]
    Preserve,
    /// Delete the rows with the principal.
    Purge,
}

impl AuditRetention {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            AuditRetention::Preserve => "preserve",
            AuditRetention::Purge => "purge",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: Group,
    pub members: Vec<Principal>,
    pub permissions: Vec<GroupPermission>,
    pub buckets: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrincipalDetail {
    #[serde(flatten)]
    pub principal: Principal,
    pub groups: Vec<Group>,
    pub buckets: Vec<String>,
}

/// Row counts removed alongside a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupRemoval {
    pub permissions: usize,
    pub members: usize,
    pub buckets: usize,
}

/// Row counts removed or detached alongside a principal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrincipalRemoval {
    pub memberships: usize,
    pub buckets: usize,
    pub sessions: usize,
    pub audit_events: usize,
}

/// Result of an upsert on `(group, resource)`.
#[derive(Debug, Clone)]
pub struct PermissionChange {
    pub permission: GroupPermission,
    pub previous: Option<AccessLevel>,
}

/// Partial principal update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrincipalPatch {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl PrincipalPatch {
    #[must_use]
    pub fn changes_privileged_fields(&self, current: &Principal) -> bool {
        self.role.is_some_and(|role| role != current.role)
            || self.active.is_some_and(|active| active != current.active)
    }
}

pub const DEFAULT_AUDIT_LIMIT: i64 = 100;

fn default_audit_limit() -> i64 {
    DEFAULT_AUDIT_LIMIT
}

/// Filters for reading the audit trail. Filters are exact matches.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_audit_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub principal_id: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub resource: Option<String>,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_AUDIT_LIMIT,
            offset: 0,
            principal_id: None,
            action: None,
            resource: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    pub events: Vec<AuditEvent>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
