use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};

use crate::error::Result;
use crate::store::{Store, StoredAuditEvent};
use crate::types::{AuditEvent, AuditPage, AuditQuery, DEFAULT_AUDIT_LIMIT};

const MAX_AUDIT_LIMIT: i64 = 1000;

/// One audit event waiting to be recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub action: &'static str,
    pub resource: String,
    pub details: Value,
}

impl AuditEntry {
    #[must_use]
    pub fn new(action: &'static str, resource: impl Into<String>, details: Value) -> Self {
        Self {
            action,
            resource: resource.into(),
            details,
        }
    }
}

#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn Store>,
}

impl AuditRecorder {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Appends an event. Failures are logged and swallowed so that the
    /// caller's primary operation is never affected.
    pub fn record(&self, principal_id: Option<&str>, entry: &AuditEntry) {
        let details = match serde_json::to_string(&entry.details) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(action = entry.action, "failed to serialize audit details: {e}");
                return;
            }
        };

        if let Err(e) = self.store.append_audit_event(
            principal_id,
            entry.action,
            &entry.resource,
            &details,
            &Utc::now(),
        ) {
            tracing::warn!(
                action = entry.action,
                resource = %entry.resource,
                "failed to record audit event: {e}"
            );
        }
    }

    /// Newest-first page of events plus the total number matching the filters.
    pub fn query(&self, query: &AuditQuery) -> Result<AuditPage> {
        let mut query = query.clone();
        if query.limit <= 0 {
            query.limit = DEFAULT_AUDIT_LIMIT;
        }
        query.limit = query.limit.min(MAX_AUDIT_LIMIT);
        query.offset = query.offset.max(0);

        let (rows, total) = self.store.query_audit_events(&query)?;

        Ok(AuditPage {
            events: rows.into_iter().map(into_event).collect(),
            total,
            limit: query.limit,
            offset: query.offset,
        })
    }
}

/// Structured details when the stored payload parses, the raw text otherwise.
fn decode_details(raw: Option<String>) -> Value {
    match raw {
        None => Value::Null,
        Some(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
    }
}

fn into_event(row: StoredAuditEvent) -> AuditEvent {
    AuditEvent {
        id: row.id,
        principal_id: row.principal_id,
        username: row.username,
        action: row.action,
        resource: row.resource,
        details: decode_details(row.details),
        created_at: row.created_at,
    }
}

/// Convenience for the common `{ "username": ... }` payload.
#[must_use]
pub fn username_details(username: &str) -> Value {
    json!({ "username": username })
}
