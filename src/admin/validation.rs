use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::AccessLevel;

const MAX_USERNAME_LEN: usize = 64;
const MAX_GROUP_NAME_LEN: usize = 64;
const MAX_BUCKET_NAME_LEN: usize = 255;
const MAX_RESOURCE_LEN: usize = 255;
pub const MIN_PASSWORD_LEN: usize = 8;

fn validate_name(value: &str, entity: &str, max_len: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::BadRequest(format!("{entity} cannot be empty")));
    }
    if value.len() > max_len {
        return Err(Error::BadRequest(format!(
            "{entity} cannot exceed {max_len} characters"
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(Error::BadRequest(format!(
            "{entity} cannot contain control characters"
        )));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<()> {
    validate_name(username, "username", MAX_USERNAME_LEN)
}

pub fn validate_group_name(name: &str) -> Result<()> {
    validate_name(name, "group name", MAX_GROUP_NAME_LEN)
}

pub fn validate_bucket_name(bucket: &str) -> Result<()> {
    validate_name(bucket, "bucket name", MAX_BUCKET_NAME_LEN)
}

pub fn validate_resource(resource: &str) -> Result<()> {
    validate_name(resource, "resource", MAX_RESOURCE_LEN)
}

pub fn validate_id(id: &str, field: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

/// Initial credentials set by an admin only need to be present.
pub fn validate_credential(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(Error::BadRequest("password cannot be empty".to_string()));
    }
    Ok(())
}

/// Credentials chosen by the principal themselves.
pub fn validate_new_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn parse_access(access: &str) -> Result<AccessLevel> {
    if access.is_empty() {
        return Err(Error::BadRequest("access cannot be empty".to_string()));
    }
    access.parse()
}

/// The active flag must be a JSON boolean; `"true"` or `1` are rejected.
pub fn parse_active_flag(value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| Error::BadRequest("active must be a boolean".to_string()))
}
