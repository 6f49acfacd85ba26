//! Database migration system for Aurora.
//!
//! Migrations are versioned and tracked in the `migrations` table.
//! Each migration is run exactly once, in order.

use rusqlite::Connection;

use crate::database::schema::{
    CREATE_ALERT_HISTORY_CREATED_AT_INDEX, CREATE_ALERT_HISTORY_TABLE,
    CREATE_CONTACTS_PRIORITY_INDEX, CREATE_CONTACTS_TABLE, CREATE_MIGRATIONS_TABLE,
};
use crate::database::DatabaseError;

/// A database migration with a version number, name, and SQL statements.
struct Migration {
    version: i32,
    name: &'static str,
    statements: &'static [&'static str],
}

/// All migrations to be applied, in order.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_contacts_table",
        statements: &[CREATE_CONTACTS_TABLE, CREATE_CONTACTS_PRIORITY_INDEX],
    },
    Migration {
        version: 2,
        name: "create_alert_history_table",
        statements: &[
            CREATE_ALERT_HISTORY_TABLE,
            CREATE_ALERT_HISTORY_CREATED_AT_INDEX,
        ],
    },
];

/// Returns the current schema version from the database.
fn get_current_version(conn: &Connection) -> Result<i32, DatabaseError> {
    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM migrations",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Records a migration as applied.
fn record_migration(conn: &Connection, version: i32, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
        (version, name),
    )?;
    Ok(())
}

/// Runs all pending migrations.
///
/// Each migration runs in its own transaction; a failing migration is rolled
/// back and leaves earlier ones applied.
pub fn run_migrations(conn: &mut Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(CREATE_MIGRATIONS_TABLE)?;

    let current_version = get_current_version(conn)?;
    tracing::debug!("Current database schema version: {}", current_version);

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|m| m.version > current_version)
        .collect();

    if pending.is_empty() {
        tracing::debug!("Database schema is up to date");
        return Ok(());
    }

    tracing::info!("{} pending migration(s) to apply", pending.len());

    for migration in pending {
        tracing::info!(
            "Applying migration {} (v{})",
            migration.name,
            migration.version
        );

        let tx = conn.transaction()?;

        for statement in migration.statements {
            tx.execute_batch(statement).map_err(|e| {
                DatabaseError::Migration(format!("Migration {} failed: {}", migration.name, e))
            })?;
        }

        record_migration(&tx, migration.version, migration.name)?;
        tx.commit()?;
    }

    let final_version = get_current_version(conn)?;
    tracing::info!("Database schema now at version {}", final_version);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [name],
                |row| row.get(0),
            )
            .unwrap();
        count == 1
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();

        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();

        assert!(table_exists(&conn, "contacts"));
        assert!(table_exists(&conn, "alert_history"));
    }

    #[test]
    fn test_migration_version_tracking() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();

        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn test_partial_schema_is_upgraded() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_MIGRATIONS_TABLE).unwrap();
        conn.execute_batch(CREATE_CONTACTS_TABLE).unwrap();
        record_migration(&conn, 1, "create_contacts_table").unwrap();

        run_migrations(&mut conn).unwrap();

        assert!(table_exists(&conn, "alert_history"));
        assert_eq!(get_current_version(&conn).unwrap(), 2);
    }
}
