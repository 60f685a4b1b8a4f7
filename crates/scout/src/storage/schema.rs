//! `SQLite` schema definitions for scout.
//!
//! The `observations` table is append-only: ingestion inserts rows and
//! nothing in this crate updates or deletes them.

/// SQL statement to create the observations table.
pub const CREATE_OBSERVATIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS observations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    locality_id INTEGER NOT NULL,
    ssid TEXT NOT NULL,
    mac TEXT NOT NULL,
    rssi INTEGER NOT NULL,
    channel INTEGER NOT NULL,
    hidden INTEGER NOT NULL,
    security INTEGER NOT NULL
)
";

/// Index for lookups by hardware address.
pub const CREATE_MAC_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_observations_mac ON observations(mac)
";

/// Index for lookups by network name.
pub const CREATE_SSID_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_observations_ssid ON observations(ssid)
";

/// Index for lookups by locality.
pub const CREATE_LOCALITY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_observations_locality ON observations(locality_id)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_OBSERVATIONS_TABLE,
    CREATE_MAC_INDEX,
    CREATE_SSID_INDEX,
    CREATE_LOCALITY_INDEX,
    CREATE_METADATA_TABLE,
];
