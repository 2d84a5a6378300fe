pub const SCHEMA: &str = r#"
-- Principals are user accounts; role 'admin' bypasses all resource checks
CREATE TABLE IF NOT EXISTS principals (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    credential_hash TEXT NOT NULL,     -- argon2id hash with embedded salt
    role TEXT NOT NULL DEFAULT 'user',
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS groups (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS memberships (
    principal_id TEXT NOT NULL REFERENCES principals(id) ON DELETE CASCADE,
    group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (principal_id, group_id)
);

-- Group grants; re-assigning a resource updates access in place
CREATE TABLE IF NOT EXISTS group_permissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    resource TEXT NOT NULL,
    access TEXT NOT NULL,              -- 'read', 'write', 'read-write'
    UNIQUE(group_id, resource)
);

-- Bucket allow-lists
CREATE TABLE IF NOT EXISTS group_buckets (
    group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    bucket_name TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (group_id, bucket_name)
);

CREATE TABLE IF NOT EXISTS principal_buckets (
    principal_id TEXT NOT NULL REFERENCES principals(id) ON DELETE CASCADE,
    bucket_name TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (principal_id, bucket_name)
);

-- Login sessions
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    token_hash TEXT NOT NULL,
    token_lookup TEXT NOT NULL,        -- first 8 chars of a UUID for fast lookup
    principal_id TEXT NOT NULL REFERENCES principals(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now')),
    expires_at TEXT NOT NULL,
    last_used_at TEXT
);

-- Append-only; principal_id is NULL for system events
CREATE TABLE IF NOT EXISTS audit_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    principal_id TEXT REFERENCES principals(id) ON DELETE SET NULL,
    action TEXT NOT NULL,
    resource TEXT NOT NULL,
    details TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_memberships_group ON memberships(group_id);
CREATE INDEX IF NOT EXISTS idx_group_permissions_group ON group_permissions(group_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_lookup ON sessions(token_lookup);
CREATE INDEX IF NOT EXISTS idx_sessions_principal ON sessions(principal_id);
CREATE INDEX IF NOT EXISTS idx_audit_events_principal ON audit_events(principal_id);
CREATE INDEX IF NOT EXISTS idx_audit_events_action ON audit_events(action);
CREATE INDEX IF NOT EXISTS idx_audit_events_created ON audit_events(created_at);
"#;
