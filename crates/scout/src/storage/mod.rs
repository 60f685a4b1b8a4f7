//! Storage layer for scout.
//!
//! This module provides `SQLite`-based persistent storage for ingested
//! observations. Rows are only ever appended, in one transaction per
//! ingestion batch, and can then be queried by locality, hardware address,
//! or network name.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

const SELECT_COLUMNS: &str =
    "SELECT id, timestamp, locality_id, ssid, mac, rssi, channel, hidden, security FROM observations";

/// An observation ready for insertion, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewObservation {
    /// Locality id of the capture run.
    pub locality_id: i64,
    /// Network name.
    pub ssid: String,
    /// Canonical hardware address.
    pub mac: String,
    /// Signal strength in dBm.
    pub rssi: i32,
    /// Radio channel.
    pub channel: u32,
    /// Whether the network hides its SSID.
    pub hidden: bool,
    /// Security mode code.
    pub security: u32,
}

/// An observation as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObservation {
    /// Surrogate row id.
    pub id: i64,
    /// When the batch containing this row was ingested.
    pub timestamp: DateTime<Utc>,
    /// Locality id of the capture run.
    pub locality_id: i64,
    /// Network name.
    pub ssid: String,
    /// Canonical hardware address.
    pub mac: String,
    /// Signal strength in dBm.
    pub rssi: i32,
    /// Radio channel.
    pub channel: u32,
    /// Whether the network hides its SSID.
    pub hidden: bool,
    /// Security mode code.
    pub security: u32,
}

/// Which ingestions of a locality to read.
///
/// Locality ids restart at 1 after a cleanup, so one id can cover several
/// field visits; only the ingestion timestamp separates them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IngestionScope {
    /// The most recent ingestion.
    #[default]
    Latest,
    /// The ingestion at exactly this time.
    At(DateTime<Utc>),
    /// Every ingestion.
    All,
}

/// Observations of one locality under an [`IngestionScope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalityView {
    /// Locality id.
    pub locality_id: i64,
    /// The ingestion shown, or `None` for all of them (or none found).
    pub ingested_at: Option<DateTime<Utc>>,
    /// Matching rows, strongest signal first.
    pub rows: Vec<StoredObservation>,
}

/// Storage engine for observations.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert a batch of observations stamped with one ingestion time.
    ///
    /// The whole batch is one transaction: either every row lands or, on
    /// error, none do. An empty batch touches nothing and returns 0.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert or the commit fails.
    pub fn insert_batch(
        &mut self,
        timestamp: DateTime<Utc>,
        rows: &[NewObservation],
    ) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let timestamp = format_timestamp(timestamp);
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r"
                INSERT INTO observations
                    (timestamp, locality_id, ssid, mac, rssi, channel, hidden, security)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ",
            )?;
            for row in rows {
                stmt.execute(params![
                    timestamp,
                    row.locality_id,
                    row.ssid,
                    row.mac,
                    row.rssi,
                    row.channel,
                    row.hidden,
                    row.security,
                ])?;
            }
        }
        tx.commit()?;

        debug!("Inserted batch of {} observations", rows.len());
        Ok(rows.len())
    }

    /// Get an observation by its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, id: i64) -> Result<Option<StoredObservation>> {
        let result = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                [id],
                Self::row_to_observation,
            )
            .optional()?;
        Ok(result)
    }

    /// Count all stored observations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Distinct locality ids, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn localities(&self) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT locality_id FROM observations ORDER BY locality_id DESC")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Distinct ingestion times recorded for a locality, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn ingest_times(&self, locality_id: i64) -> Result<Vec<DateTime<Utc>>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT DISTINCT timestamp FROM observations
            WHERE locality_id = ?1 ORDER BY timestamp DESC
            ",
        )?;
        let times = stmt
            .query_map([locality_id], |row| {
                let text: String = row.get(0)?;
                parse_timestamp(0, &text)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(times)
    }

    /// Observations of one locality, optionally limited to one ingestion.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn by_locality(
        &self,
        locality_id: i64,
        ingested_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredObservation>> {
        let rows = if let Some(ts) = ingested_at {
            let mut stmt = self.conn.prepare(&format!(
                "{SELECT_COLUMNS} WHERE locality_id = ?1 AND timestamp = ?2 ORDER BY rssi DESC, id"
            ))?;
            let rows = stmt
                .query_map(params![locality_id, format_timestamp(ts)], Self::row_to_observation)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        } else {
            let mut stmt = self.conn.prepare(&format!(
                "{SELECT_COLUMNS} WHERE locality_id = ?1 ORDER BY rssi DESC, id"
            ))?;
            let rows = stmt
                .query_map([locality_id], Self::row_to_observation)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };
        Ok(rows)
    }

    /// Observations of one locality narrowed to `scope`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn locality_view(&self, locality_id: i64, scope: IngestionScope) -> Result<LocalityView> {
        let ingested_at = match scope {
            IngestionScope::Latest => self.ingest_times(locality_id)?.first().copied(),
            IngestionScope::At(ts) => Some(ts),
            IngestionScope::All => None,
        };
        let rows = match (scope, ingested_at) {
            (IngestionScope::Latest, None) => Vec::new(),
            (_, at) => self.by_locality(locality_id, at)?,
        };
        Ok(LocalityView {
            locality_id,
            ingested_at,
            rows,
        })
    }

    /// Every sighting of one hardware address, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn by_mac(&self, mac: &str, limit: usize) -> Result<Vec<StoredObservation>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE mac = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2"
        ))?;
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(
                params![mac.to_ascii_lowercase(), limit_i64],
                Self::row_to_observation,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Observations whose network name contains `query` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn search_ssid(&self, query: &str, limit: usize) -> Result<Vec<StoredObservation>> {
        let pattern = format!("%{}%", escape_like(query));
        let mut stmt = self.conn.prepare(&format!(
            r"{SELECT_COLUMNS} WHERE ssid LIKE ?1 ESCAPE '\' ORDER BY timestamp DESC, id DESC LIMIT ?2"
        ))?;
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![pattern, limit_i64], Self::row_to_observation)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let (total_observations, localities, distinct_macs): (i64, i64, i64) =
            self.conn.query_row(
                r"
                SELECT COUNT(*), COUNT(DISTINCT locality_id), COUNT(DISTINCT mac)
                FROM observations
                ",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

        let bounds: (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(timestamp), MAX(timestamp) FROM observations",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let first_ingest = bounds
            .0
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let last_ingest = bounds
            .1
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_observations,
            localities,
            distinct_macs,
            first_ingest,
            last_ingest,
            db_size_bytes,
        })
    }

    /// Convert a database row to a `StoredObservation`.
    fn row_to_observation(row: &rusqlite::Row) -> rusqlite::Result<StoredObservation> {
        let timestamp_str: String = row.get(1)?;
        Ok(StoredObservation {
            id: row.get(0)?,
            timestamp: parse_timestamp(1, &timestamp_str)?,
            locality_id: row.get(2)?,
            ssid: row.get(3)?,
            mac: row.get(4)?,
            rssi: row.get(5)?,
            channel: row.get(6)?,
            hidden: row.get(7)?,
            security: row.get(8)?,
        })
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
/// Escape `LIKE` wildcards so the query matches literally.
fn escape_like(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(column: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Total number of observations stored.
    pub total_observations: i64,
    /// Number of distinct locality ids.
    pub localities: i64,
    /// Number of distinct hardware addresses.
    pub distinct_macs: i64,
    /// Earliest ingestion time.
    pub first_ingest: Option<DateTime<Utc>>,
    /// Latest ingestion time.
    pub last_ingest: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
