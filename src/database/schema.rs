//! Database schema definitions for Aurora.
//!
//! Contains SQL statements for creating and managing database tables.

/// SQL statement to create the migrations tracking table.
pub const CREATE_MIGRATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// SQL statement to create the contacts table.
pub const CREATE_CONTACTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS contacts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    phone TEXT NOT NULL,
    priority INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT
);
"#;

/// Priority order is how contacts are always read back.
pub const CREATE_CONTACTS_PRIORITY_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_contacts_priority ON contacts(priority);
"#;

/// SQL statement to create the alert history table (v2 migration).
pub const CREATE_ALERT_HISTORY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS alert_history (
    id TEXT PRIMARY KEY,
    keyword TEXT NOT NULL,
    transcript TEXT NOT NULL,
    location_lat REAL,
    location_lng REAL,
    contact_count INTEGER NOT NULL,
    outcome TEXT NOT NULL,
    results_json TEXT,
    error_message TEXT,
    created_at TEXT NOT NULL
);
"#;

pub const CREATE_ALERT_HISTORY_CREATED_AT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_alert_history_created_at ON alert_history(created_at);
"#;
