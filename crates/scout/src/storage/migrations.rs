//! Database migration system for scout.
//!
//! The base schema is created idempotently from
//! [`SCHEMA_STATEMENTS`](super::schema::SCHEMA_STATEMENTS); later changes are
//! listed in [`MIGRATIONS`] and applied once each, in order, with the
//! applied version recorded in the `metadata` table.

use rusqlite::Connection;
use tracing::info;

use crate::error::{Error, Result};

use super::schema::SCHEMA_STATEMENTS;

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// One schema step: the version it produces and the SQL that gets there.
#[derive(Debug)]
pub struct Migration {
    /// Version the schema is at after this step.
    pub version: i32,
    /// What the step does, for logs.
    pub description: &'static str,
    /// Statements to run. Empty for the base version.
    pub sql: &'static str,
}

/// Every migration, in ascending version order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "base observations schema",
        sql: "",
    },
    Migration {
        version: 2,
        description: "locality/time index for per-scan reports",
        sql: "CREATE INDEX IF NOT EXISTS idx_observations_locality_time \
              ON observations(locality_id, timestamp)",
    },
];

/// The schema version this build expects.
#[must_use]
pub fn current_version() -> i32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Initialize the database schema.
///
/// Creates the base tables if needed, then applies every migration newer
/// than the recorded version.
///
/// # Errors
///
/// Returns an error if schema creation or a migration fails, or if the
/// database was written by a newer schema version.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    let version = schema_version(conn)?;
    let target = current_version();
    if version > target {
        return Err(Error::DatabaseMigration {
            message: format!("database schema version {version} is newer than supported {target}"),
        });
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > version) {
        apply(conn, migration)?;
    }
    Ok(())
}

/// Get the recorded schema version, 0 for a fresh database.
fn schema_version(conn: &Connection) -> Result<i32> {
    let result: std::result::Result<String, rusqlite::Error> = conn.query_row(
        "SELECT value FROM metadata WHERE key = ?1",
        [VERSION_KEY],
        |row| row.get(0),
    );

    match result {
        Ok(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}

/// Apply one migration and record its version atomically.
fn apply(conn: &Connection, migration: &Migration) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    if !migration.sql.is_empty() {
        tx.execute_batch(migration.sql)
            .map_err(|e| Error::DatabaseMigration {
                message: format!("migration {} failed: {e}", migration.version),
            })?;
    }
    set_schema_version(&tx, migration.version)?;
    tx.commit()?;
    info!(
        "Applied schema migration {} ({})",
        migration.version, migration.description
    );
    Ok(())
}
