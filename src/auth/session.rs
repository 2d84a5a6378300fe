use std::sync::Arc;

use chrono::{Duration, Utc};

use super::{CredentialHasher, TokenGenerator, parse_token};
use crate::audit::{AuditEntry, AuditRecorder, username_details};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Principal, Session};

const MAX_LOOKUP_ATTEMPTS: usize = 3;

/// A freshly issued session. `token` is the only copy of the raw secret.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
    pub principal: Principal,
}

/// Password login and bearer-session validation.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn Store>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: TokenGenerator,
    audit: AuditRecorder,
    ttl: Duration,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        hasher: Arc<dyn CredentialHasher>,
        audit: AuditRecorder,
        ttl_seconds: i64,
    ) -> Self {
        Self {
            tokens: TokenGenerator::new(hasher.clone()),
            store,
            hasher,
            audit,
            ttl: Duration::try_seconds(ttl_seconds).unwrap_or(Duration::MAX),
        }
    }

    /// Checks a username/password pair. Unknown, inactive and wrong-password
    /// cases are indistinguishable to the caller.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Principal> {
        let Some(principal) = self.store.get_principal_by_username(username)? else {
            tracing::debug!(username, "login rejected: unknown username");
            return Err(Error::Unauthorized);
        };

        if !principal.active {
            tracing::debug!(principal = %principal.id, "login rejected: inactive");
            return Err(Error::Unauthorized);
        }

        if !self.hasher.verify(password, &principal.credential_hash)? {
            tracing::debug!(principal = %principal.id, "login rejected: bad credential");
            return Err(Error::Unauthorized);
        }

        Ok(principal)
    }

    pub fn login(&self, username: &str, password: &str) -> Result<IssuedSession> {
        let principal = self.authenticate(username, password)?;
        let issued = self.issue(principal)?;

        self.audit.record(
            Some(&issued.principal.id),
            &AuditEntry::new("login", "auth", username_details(&issued.principal.username)),
        );
        tracing::info!(principal = %issued.principal.id, "session issued");

        Ok(issued)
    }

    /// Creates a session for an already-verified principal.
    pub fn issue(&self, principal: Principal) -> Result<IssuedSession> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let (token, lookup, token_hash) = self.tokens.generate()?;
            let now = Utc::now();
            let expires_at = now
                .checked_add_signed(self.ttl)
                .ok_or_else(|| Error::Config("session lifetime out of range".to_string()))?;
            let session = Session {
                id: uuid::Uuid::new_v4().to_string(),
                token_hash,
                token_lookup: lookup,
                principal_id: principal.id.clone(),
                created_at: now,
                expires_at,
                last_used_at: None,
            };

            match self.store.create_session(&session) {
                Ok(()) => {
                    return Ok(IssuedSession {
                        token,
                        session,
                        principal,
                    });
                }
                Err(Error::TokenLookupCollision) if attempts < MAX_LOOKUP_ATTEMPTS => {
                    tracing::debug!("session lookup collision, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Resolves a raw bearer token to its session and principal.
    pub fn validate(&self, raw_token: &str) -> Result<(Session, Principal)> {
        let (lookup, _secret) = parse_token(raw_token).map_err(|_| Error::Unauthorized)?;

        let session = self
            .store
            .get_session_by_lookup(&lookup)?
            .ok_or(Error::Unauthorized)?;

        if !self.tokens.verify(raw_token, &session.token_hash)? {
            return Err(Error::Unauthorized);
        }

        if session.expires_at < Utc::now() {
            return Err(Error::TokenExpired);
        }

        let principal = self
            .store
            .get_principal(&session.principal_id)?
            .ok_or(Error::Unauthorized)?;

        if !principal.active {
            return Err(Error::Unauthorized);
        }

        if let Err(e) = self.store.update_session_last_used(&session.id) {
            tracing::warn!("Failed to update session last_used_at: {e}");
        }

        Ok((session, principal))
    }

    pub fn logout(&self, session: &Session) -> Result<()> {
        self.store.delete_session(&session.id)?;
        tracing::info!(principal = %session.principal_id, "session closed");
        Ok(())
    }
}
