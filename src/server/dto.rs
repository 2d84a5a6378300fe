use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::authz::BucketSet;
use crate::types::{Group, GroupPermission, Principal};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub principal: Principal,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub principal: Principal,
    pub groups: Vec<Group>,
    pub permissions: Vec<GroupPermission>,
    pub buckets: BucketSet,
}

#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    pub resource: String,
    #[serde(default = "default_access")]
    pub access: String,
}

fn default_access() -> String {
    "read".to_string()
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub resource: String,
    pub access: String,
    pub allowed: bool,
}

#[derive(Debug, Deserialize)]
pub struct BucketFilterRequest {
    pub buckets: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BucketFilterResponse {
    pub buckets: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct BucketAccessQuery {
    #[serde(default = "default_access")]
    pub access: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SetPermissionRequest {
    pub resource: String,
    pub access: String,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub principal_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignBucketRequest {
    pub bucket: String,
}

/// Any JSON value is accepted here; the admin layer rejects non-booleans.
#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    #[serde(default)]
    pub active: Value,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub cursor: Option<String>,
}
