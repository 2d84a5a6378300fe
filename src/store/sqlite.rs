use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use super::schema::SCHEMA;
use super::{BucketSnapshot, Store, StoredAuditEvent};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database, used by tests and embedders that
    /// do not need persistence.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn write_principal(conn: &Connection, principal: &Principal) -> Result<()> {
    let rows = conn
        .execute(
            "UPDATE principals SET username = ?1, credential_hash = ?2, role = ?3, active = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                principal.username,
                principal.credential_hash,
                principal.role.as_str(),
                principal.active,
                format_datetime(&principal.updated_at),
                principal.id,
            ],
        )
        .map_err(|e| Error::conflict_on_unique(e, "username already exists"))?;

    if rows == 0 {
        return Err(Error::NotFound);
    }
    Ok(())
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

// Fixed width so that text ordering matches chronological ordering.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

const PRINCIPAL_COLUMNS: &str = "id, username, credential_hash, role, active, created_at, updated_at";

fn principal_from_row(row: &Row<'_>) -> rusqlite::Result<Principal> {
    Ok(Principal {
        id: row.get(0)?,
        username: row.get(1)?,
        credential_hash: row.get(2)?,
        role: Role::from_stored(&row.get::<_, String>(3)?),
        active: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        updated_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: parse_datetime(&row.get::<_, String>(2)?),
    })
}

fn permission_from_row(row: &Row<'_>) -> rusqlite::Result<GroupPermission> {
    let access: String = row.get(3)?;
    let access = AccessLevel::parse(&access).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("invalid access level '{access}'").into(),
        )
    })?;
    Ok(GroupPermission {
        id: row.get(0)?,
        group_id: row.get(1)?,
        resource: row.get(2)?,
        access,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        token_lookup: row.get(2)?,
        principal_id: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        expires_at: parse_datetime(&row.get::<_, String>(5)?),
        last_used_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
    })
}

/// Table and key column holding a grantee's bucket assignments.
fn bucket_table(grantee: &BucketGrantee) -> (&'static str, &'static str, &str) {
    match grantee {
        BucketGrantee::Group(id) => ("group_buckets", "group_id", id),
        BucketGrantee::Principal(id) => ("principal_buckets", "principal_id", id),
    }
}

/// Appends the exact-match audit filters to `sql` and collects their values.
fn audit_filters(query: &AuditQuery, sql: &mut String, values: &mut Vec<Value>) {
    if let Some(principal_id) = &query.principal_id {
        sql.push_str(" AND a.principal_id = ?");
        values.push(Value::Text(principal_id.clone()));
    }
    if let Some(action) = &query.action {
        sql.push_str(" AND a.action = ?");
        values.push(Value::Text(action.clone()));
    }
    if let Some(resource) = &query.resource {
        sql.push_str(" AND a.resource = ?");
        values.push(Value::Text(resource.clone()));
    }
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Principal operations

    fn create_principal(&self, principal: &Principal) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO principals (id, username, credential_hash, role, active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    principal.id,
                    principal.username,
                    principal.credential_hash,
                    principal.role.as_str(),
                    principal.active,
                    format_datetime(&principal.created_at),
                    format_datetime(&principal.updated_at),
                ],
            )
            .map_err(|e| Error::conflict_on_unique(e, "username already exists"))?;
        Ok(())
    }

    fn get_principal(&self, id: &str) -> Result<Option<Principal>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE id = ?1"),
            params![id],
            principal_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_principal_by_username(&self, username: &str) -> Result<Option<Principal>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE username = ?1"),
            params![username],
            principal_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_principals(&self, cursor: &str, limit: i32) -> Result<Vec<Principal>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE username > ?1 ORDER BY username LIMIT ?2"
        ))?;

        let rows = stmt.query_map(params![cursor, limit], principal_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_principal(&self, principal: &Principal) -> Result<()> {
        write_principal(&self.conn(), principal)
    }

    fn update_principal_revoking_sessions(
        &self,
        principal: &Principal,
        keep_session: Option<&str>,
    ) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        write_principal(&tx, principal)?;
        let revoked = tx.execute(
            "DELETE FROM sessions WHERE principal_id = ?1 AND (?2 IS NULL OR id != ?2)",
            params![principal.id, keep_session],
        )?;

        tx.commit()?;
        Ok(revoked)
    }

    fn delete_principal(
        &self,
        id: &str,
        retention: AuditRetention,
    ) -> Result<Option<PrincipalRemoval>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let exists: Option<String> = tx
            .query_row("SELECT id FROM principals WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        if exists.is_none() {
            return Ok(None);
        }

        let memberships = tx.execute("DELETE FROM memberships WHERE principal_id = ?1", params![id])?;
        let buckets = tx.execute(
            "DELETE FROM principal_buckets WHERE principal_id = ?1",
            params![id],
        )?;
        let sessions = tx.execute("DELETE FROM sessions WHERE principal_id = ?1", params![id])?;
        let audit_events = match retention {
            AuditRetention::Preserve => tx.execute(
                "UPDATE audit_events SET principal_id = NULL WHERE principal_id = ?1",
                params![id],
            )?,
            AuditRetention::Purge => tx.execute(
                "DELETE FROM audit_events WHERE principal_id = ?1",
                params![id],
            )?,
        };
        tx.execute("DELETE FROM principals WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(Some(PrincipalRemoval {
            memberships,
            buckets,
            sessions,
            audit_events,
        }))
    }

    fn has_admin(&self) -> Result<bool> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM principals WHERE role = 'admin'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // Group operations

    fn create_group(&self, group: &Group) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO groups (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![group.id, group.name, format_datetime(&group.created_at)],
            )
            .map_err(|e| Error::conflict_on_unique(e, "group already exists"))?;
        Ok(())
    }

    fn get_group(&self, id: &str) -> Result<Option<Group>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, created_at FROM groups WHERE id = ?1",
            params![id],
            group_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_groups(&self) -> Result<Vec<Group>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, name, created_at FROM groups ORDER BY name")?;
        let rows = stmt.query_map([], group_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_group(&self, id: &str) -> Result<Option<GroupRemoval>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let exists: Option<String> = tx
            .query_row("SELECT id FROM groups WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        if exists.is_none() {
            return Ok(None);
        }

        let permissions = tx.execute(
            "DELETE FROM group_permissions WHERE group_id = ?1",
            params![id],
        )?;
        let members = tx.execute("DELETE FROM memberships WHERE group_id = ?1", params![id])?;
        let buckets = tx.execute("DELETE FROM group_buckets WHERE group_id = ?1", params![id])?;
        tx.execute("DELETE FROM groups WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(Some(GroupRemoval {
            permissions,
            members,
            buckets,
        }))
    }

    // Membership operations

    fn add_membership(&self, membership: &Membership) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO memberships (principal_id, group_id, created_at) VALUES (?1, ?2, ?3)",
                params![
                    membership.principal_id,
                    membership.group_id,
                    format_datetime(&membership.created_at),
                ],
            )
            .map_err(|e| Error::conflict_on_unique(e, "principal is already a member of this group"))?;
        Ok(())
    }

    fn remove_membership(&self, principal_id: &str, group_id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM memberships WHERE principal_id = ?1 AND group_id = ?2",
            params![principal_id, group_id],
        )?;
        Ok(rows > 0)
    }

    fn list_group_members(&self, group_id: &str) -> Result<Vec<Principal>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT p.id, p.username, p.credential_hash, p.role, p.active, p.created_at, p.updated_at
             FROM principals p
             JOIN memberships m ON m.principal_id = p.id
             WHERE m.group_id = ?1
             ORDER BY p.username",
        )?;
        let rows = stmt.query_map(params![group_id], principal_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_principal_groups(&self, principal_id: &str) -> Result<Vec<Group>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT g.id, g.name, g.created_at
             FROM groups g
             JOIN memberships m ON m.group_id = g.id
             WHERE m.principal_id = ?1
             ORDER BY g.name",
        )?;
        let rows = stmt.query_map(params![principal_id], group_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Group permission operations

    fn upsert_group_permission(
        &self,
        group_id: &str,
        resource: &str,
        access: AccessLevel,
    ) -> Result<PermissionChange> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let existing: Option<(i64, String)> = tx
            .query_row(
                "SELECT id, access FROM group_permissions WHERE group_id = ?1 AND resource = ?2",
                params![group_id, resource],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (id, previous) = match existing {
            Some((id, old_access)) => {
                tx.execute(
                    "UPDATE group_permissions SET access = ?1 WHERE id = ?2",
                    params![access.as_str(), id],
                )?;
                (id, AccessLevel::parse(&old_access))
            }
            None => {
                tx.execute(
                    "INSERT INTO group_permissions (group_id, resource, access) VALUES (?1, ?2, ?3)",
                    params![group_id, resource, access.as_str()],
                )?;
                (tx.last_insert_rowid(), None)
            }
        };

        tx.commit()?;
        Ok(PermissionChange {
            permission: GroupPermission {
                id,
                group_id: group_id.to_string(),
                resource: resource.to_string(),
                access,
            },
            previous,
        })
    }

    fn get_group_permission(&self, id: i64) -> Result<Option<GroupPermission>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, group_id, resource, access FROM group_permissions WHERE id = ?1",
            params![id],
            permission_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn delete_group_permission(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM group_permissions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn list_group_permissions(&self, group_id: &str) -> Result<Vec<GroupPermission>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, group_id, resource, access FROM group_permissions
             WHERE group_id = ?1 ORDER BY resource",
        )?;
        let rows = stmt.query_map(params![group_id], permission_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_principal_permissions(&self, principal_id: &str) -> Result<Vec<GroupPermission>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT gp.id, gp.group_id, gp.resource, gp.access
             FROM group_permissions gp
             JOIN memberships m ON m.group_id = gp.group_id
             WHERE m.principal_id = ?1
             ORDER BY gp.resource, gp.id",
        )?;
        let rows = stmt.query_map(params![principal_id], permission_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Bucket assignment operations

    fn add_bucket_assignment(&self, assignment: &BucketAssignment) -> Result<()> {
        let (table, column, id) = bucket_table(&assignment.grantee);
        self.conn()
            .execute(
                &format!("INSERT INTO {table} ({column}, bucket_name, created_at) VALUES (?1, ?2, ?3)"),
                params![id, assignment.bucket, format_datetime(&assignment.created_at)],
            )
            .map_err(|e| Error::conflict_on_unique(e, "bucket already assigned"))?;
        Ok(())
    }

    fn remove_bucket_assignment(&self, grantee: &BucketGrantee, bucket: &str) -> Result<bool> {
        let (table, column, id) = bucket_table(grantee);
        let rows = self.conn().execute(
            &format!("DELETE FROM {table} WHERE {column} = ?1 AND bucket_name = ?2"),
            params![id, bucket],
        )?;
        Ok(rows > 0)
    }

    fn list_bucket_assignments(&self, grantee: &BucketGrantee) -> Result<Vec<String>> {
        let (table, column, id) = bucket_table(grantee);
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT bucket_name FROM {table} WHERE {column} = ?1 ORDER BY bucket_name"
        ))?;
        let rows = stmt.query_map(params![id], |row| row.get(0))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn bucket_snapshot(&self, principal_id: &str) -> Result<BucketSnapshot> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let assigned = {
            let mut stmt = tx.prepare(
                "SELECT gb.bucket_name FROM group_buckets gb
                 JOIN memberships m ON m.group_id = gb.group_id
                 WHERE m.principal_id = ?1
                 UNION
                 SELECT bucket_name FROM principal_buckets WHERE principal_id = ?1",
            )?;
            let rows = stmt.query_map(params![principal_id], |row| row.get::<_, String>(0))?;
            rows.collect::<std::result::Result<BTreeSet<_>, _>>()?
        };

        let system_total: i64 = tx.query_row(
            "SELECT (SELECT COUNT(*) FROM group_buckets) + (SELECT COUNT(*) FROM principal_buckets)",
            [],
            |row| row.get(0),
        )?;

        tx.commit()?;
        Ok(BucketSnapshot {
            assigned,
            system_total,
        })
    }

    // Session operations

    fn create_session(&self, session: &Session) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO sessions (id, token_hash, token_lookup, principal_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.id,
                session.token_hash,
                session.token_lookup,
                session.principal_id,
                format_datetime(&session.created_at),
                format_datetime(&session.expires_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Err(Error::TokenLookupCollision)
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_session_by_lookup(&self, lookup: &str) -> Result<Option<Session>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, token_hash, token_lookup, principal_id, created_at, expires_at, last_used_at
             FROM sessions WHERE token_lookup = ?1",
            params![lookup],
            session_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn delete_session(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn update_session_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE sessions SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    // Audit operations

    fn append_audit_event(
        &self,
        principal_id: Option<&str>,
        action: &str,
        resource: &str,
        details: &str,
        created_at: &DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO audit_events (principal_id, action, resource, details, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![principal_id, action, resource, details, format_datetime(created_at)],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn query_audit_events(&self, query: &AuditQuery) -> Result<(Vec<StoredAuditEvent>, i64)> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let mut filters = String::new();
        let mut values = Vec::new();
        audit_filters(query, &mut filters, &mut values);

        let total: i64 = tx.query_row(
            &format!("SELECT COUNT(*) FROM audit_events a WHERE 1=1{filters}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let events = {
            let mut page_values = values.clone();
            page_values.push(Value::Integer(query.limit));
            page_values.push(Value::Integer(query.offset));

            let mut stmt = tx.prepare(&format!(
                "SELECT a.id, a.principal_id, p.username, a.action, a.resource, a.details, a.created_at
                 FROM audit_events a
                 LEFT JOIN principals p ON p.id = a.principal_id
                 WHERE 1=1{filters}
                 ORDER BY a.created_at DESC, a.id DESC
                 LIMIT ? OFFSET ?"
            ))?;
            let rows = stmt.query_map(params_from_iter(page_values.iter()), |row| {
                Ok(StoredAuditEvent {
                    id: row.get(0)?,
                    principal_id: row.get(1)?,
                    username: row.get(2)?,
                    action: row.get(3)?,
                    resource: row.get(4)?,
                    details: row.get(5)?,
                    created_at: parse_datetime(&row.get::<_, String>(6)?),
                })
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        tx.commit()?;
        Ok((events, total))
    }
}
