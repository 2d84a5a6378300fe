use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::validation::{
    parse_active_flag, validate_credential, validate_new_password, validate_username,
};
use super::{AdminService, Applied};
use crate::audit::{AuditEntry, username_details};
use crate::error::{Error, Result};
use crate::types::{
    BucketGrantee, Principal, PrincipalDetail, PrincipalPatch, PrincipalRemoval, Role,
};

fn principal_resource(id: &str) -> String {
    format!("principal:{id}")
}

/// Fields for an admin-created principal. Role defaults to a regular user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPrincipal {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

impl AdminService {
    fn build_principal(&self, username: &str, password: &str, role: Role) -> Result<Principal> {
        let now = Utc::now();
        Ok(Principal {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            credential_hash: self.hasher.hash(password)?,
            role,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    fn save_revoking_sessions(&self, principal: &Principal, keep: Option<&str>) -> Result<()> {
        let revoked = self
            .store
            .update_principal_revoking_sessions(principal, keep)?;
        if revoked > 0 {
            tracing::info!(principal = %principal.id, revoked, "sessions revoked");
        }
        Ok(())
    }

    pub fn create_principal(&self, actor: &Principal, new: &NewPrincipal) -> Result<Principal> {
        self.apply(actor, || {
            validate_username(&new.username)?;
            validate_credential(&new.password)?;

            let principal =
                self.build_principal(&new.username, &new.password, new.role.unwrap_or_default())?;
            self.store.create_principal(&principal)?;

            let entry = AuditEntry::new(
                "principal.create",
                principal_resource(&principal.id),
                json!({ "username": principal.username, "role": principal.role }),
            );
            Ok(Applied::changed(principal, entry))
        })
    }

    /// Removes another principal with its memberships, direct bucket
    /// assignments and sessions. Its audit rows follow the retention policy.
    pub fn delete_principal(&self, actor: &Principal, id: &str) -> Result<PrincipalRemoval> {
        self.apply(actor, || {
            if actor.id == id {
                return Err(Error::InvalidOperation(
                    "cannot delete your own account".to_string(),
                ));
            }

            let target = self.store.get_principal(id)?.ok_or(Error::NotFound)?;
            let removal = self
                .store
                .delete_principal(id, self.retention)?
                .ok_or(Error::NotFound)?;

            let entry = AuditEntry::new(
                "principal.delete",
                principal_resource(id),
                json!({
                    "username": target.username,
                    "memberships": removal.memberships,
                    "buckets": removal.buckets,
                    "sessions": removal.sessions,
                    "audit_events": removal.audit_events,
                    "audit_policy": self.retention.as_str(),
                }),
            );
            Ok(Applied::changed(removal, entry))
        })
    }

    /// Partial update. A principal may rename itself; only an admin may
    /// touch other principals or change role and active status. Repeating
    /// the current role or status is allowed for anyone.
    pub fn update_principal(
        &self,
        actor: &Principal,
        id: &str,
        patch: &PrincipalPatch,
    ) -> Result<Principal> {
        if actor.id != id && !actor.is_admin() {
            return Err(Error::Forbidden);
        }

        self.apply_as(Some(actor), || {
            let mut principal = self.store.get_principal(id)?.ok_or(Error::NotFound)?;
            if !actor.is_admin() && patch.changes_privileged_fields(&principal) {
                return Err(Error::Forbidden);
            }
            let mut changes = Map::new();

            if let Some(username) = &patch.username {
                validate_username(username)?;
                if *username != principal.username {
                    if let Some(other) = self.store.get_principal_by_username(username)? {
                        if other.id != principal.id {
                            return Err(Error::Conflict("username already exists".to_string()));
                        }
                    }
                    changes.insert(
                        "username".to_string(),
                        json!({ "old": principal.username, "new": username }),
                    );
                    principal.username.clone_from(username);
                }
            }

            if let Some(role) = patch.role {
                if role != principal.role {
                    changes.insert(
                        "role".to_string(),
                        json!({ "old": principal.role, "new": role }),
                    );
                    principal.role = role;
                }
            }

            let mut deactivated = false;
            if let Some(active) = patch.active {
                if active != principal.active {
                    if !active && actor.id == principal.id {
                        return Err(Error::InvalidOperation(
                            "cannot deactivate your own account".to_string(),
                        ));
                    }
                    changes.insert(
                        "active".to_string(),
                        json!({ "old": principal.active, "new": active }),
                    );
                    principal.active = active;
                    deactivated = !active;
                }
            }

            if changes.is_empty() {
                return Ok(Applied::unchanged(principal));
            }

            principal.updated_at = Utc::now();
            if deactivated {
                self.save_revoking_sessions(&principal, None)?;
            } else {
                self.store.update_principal(&principal)?;
            }

            let entry = AuditEntry::new(
                "principal.update",
                principal_resource(&principal.id),
                Value::Object(changes),
            );
            Ok(Applied::changed(principal, entry))
        })
    }

    /// Admin-only toggle. `active` must be a JSON boolean.
    pub fn set_active(&self, actor: &Principal, id: &str, active: &Value) -> Result<Principal> {
        self.apply(actor, || {
            let active = parse_active_flag(active)?;
            let mut principal = self.store.get_principal(id)?.ok_or(Error::NotFound)?;

            if principal.active == active {
                return Ok(Applied::unchanged(principal));
            }
            if !active && actor.id == principal.id {
                return Err(Error::InvalidOperation(
                    "cannot deactivate your own account".to_string(),
                ));
            }

            let old = principal.active;
            principal.active = active;
            principal.updated_at = Utc::now();
            if active {
                self.store.update_principal(&principal)?;
            } else {
                self.save_revoking_sessions(&principal, None)?;
            }

            let entry = AuditEntry::new(
                "principal.active",
                principal_resource(&principal.id),
                json!({ "old": old, "new": active }),
            );
            Ok(Applied::changed(principal, entry))
        })
    }

    /// Replaces the actor's own credential after checking the current one.
    /// Every other session of the actor is revoked.
    pub fn change_password(
        &self,
        actor: &Principal,
        current_session_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        self.apply_as(Some(actor), || {
            validate_new_password(new_password)?;

            let mut principal = self.store.get_principal(&actor.id)?.ok_or(Error::NotFound)?;
            if !self
                .hasher
                .verify(current_password, &principal.credential_hash)?
            {
                return Err(Error::Forbidden);
            }

            principal.credential_hash = self.hasher.hash(new_password)?;
            principal.updated_at = Utc::now();
            self.save_revoking_sessions(&principal, Some(current_session_id))?;

            let entry = AuditEntry::new(
                "password_change",
                principal_resource(&principal.id),
                username_details(&principal.username),
            );
            Ok(Applied::changed((), entry))
        })
    }

    pub fn list_principals(
        &self,
        actor: &Principal,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<Principal>> {
        self.read(actor, || self.store.list_principals(cursor, limit))
    }

    /// Visible to the principal itself and to admins.
    pub fn principal_detail(&self, actor: &Principal, id: &str) -> Result<PrincipalDetail> {
        if actor.id != id && !actor.is_admin() {
            return Err(Error::Forbidden);
        }

        let principal = self.store.get_principal(id)?.ok_or(Error::NotFound)?;
        Ok(PrincipalDetail {
            groups: self.store.list_principal_groups(id)?,
            buckets: self
                .store
                .list_bucket_assignments(&BucketGrantee::Principal(id.to_string()))?,
            principal,
        })
    }

    /// Creates the first admin account if `username` is not taken yet.
    /// Returns `None` when the account already exists.
    pub fn bootstrap_admin(&self, username: &str, password: &str) -> Result<Option<Principal>> {
        self.apply_as(None, || {
            validate_username(username)?;
            validate_credential(password)?;

            if self.store.get_principal_by_username(username)?.is_some() {
                tracing::info!(username, "bootstrap admin already exists");
                return Ok(Applied::unchanged(None));
            }

            let principal = self.build_principal(username, password, Role::Admin)?;
            self.store.create_principal(&principal)?;

            let entry = AuditEntry::new(
                "bootstrap",
                principal_resource(&principal.id),
                username_details(&principal.username),
            );
            Ok(Applied::changed(Some(principal), entry))
        })
    }

    /// Self-service account creation. The role is always a regular user.
    pub fn signup(&self, username: &str, password: &str) -> Result<Principal> {
        if !self.allow_signup {
            return Err(Error::Forbidden);
        }

        validate_username(username)?;
        validate_new_password(password)?;

        let principal = self.build_principal(username, password, Role::Standard)?;
        self.store.create_principal(&principal)?;

        self.apply_as(Some(&principal), || {
            let entry = AuditEntry::new(
                "signup",
                principal_resource(&principal.id),
                username_details(&principal.username),
            );
            Ok(Applied::changed(principal.clone(), entry))
        })
    }
}
