//! Configuration management for scout.
//!
//! Configuration is layered with figment: built-in defaults, then a TOML
//! file, then `SCOUT_` environment variables. Nested keys use a double
//! underscore, so `SCOUT_AGENT__SCAN_PASSES=5` sets `agent.scan_passes`.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::scan::{DEFAULT_INTER_PASS_DELAY, DEFAULT_PASSES};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "scout";

/// Environment variable prefix.
const ENV_PREFIX: &str = "SCOUT_";

/// Longest accepted pause between scan passes.
pub const MAX_INTER_PASS_DELAY_MS: u64 = 60_000;

/// Application configuration.
///
/// Precedence, highest first:
/// 1. Environment variables (prefixed with `SCOUT_`)
/// 2. TOML config file at `~/.config/scout/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capture device settings.
    pub agent: AgentConfig,
    /// Ingestion host settings.
    pub hq: HqConfig,
}

/// Capture device settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Record file captures are appended to.
    /// Defaults to `<data dir>/scout/agent/scout_vault.csv`
    pub vault_path: Option<PathBuf>,
    /// File holding the locality counter.
    /// Defaults to `<data dir>/scout/agent/counter.json`
    pub counter_path: Option<PathBuf>,
    /// Scan passes per capture.
    pub scan_passes: usize,
    /// Pause between passes in milliseconds.
    pub inter_pass_delay_ms: u64,
    /// Recorded passes to replay instead of a live radio.
    pub replay_path: Option<PathBuf>,
}

/// Ingestion host settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HqConfig {
    /// Observation database.
    /// Defaults to `<data dir>/scout/hq/database/scout.db`
    pub database_path: Option<PathBuf>,
    /// Record file picked up by `ingest` when none is given.
    /// Defaults to `<data dir>/scout/hq/inbox/scout_vault.csv`
    pub inbox_path: Option<PathBuf>,
    /// Where ingested sources are archived.
    /// Defaults to `<data dir>/scout/hq/archive`
    pub archive_dir: Option<PathBuf>,
    /// OUI vendor table.
    /// Defaults to `<data dir>/scout/hq/static/vendors.json`
    pub vendors_path: Option<PathBuf>,
    /// Tag rules and security labels.
    /// Defaults to `<data dir>/scout/hq/static/ui_content.json`
    pub rules_path: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            vault_path: None,
            counter_path: None,
            scan_passes: DEFAULT_PASSES,
            inter_pass_delay_ms: u64::try_from(DEFAULT_INTER_PASS_DELAY.as_millis())
                .unwrap_or(MAX_INTER_PASS_DELAY_MS),
            replay_path: None,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let config: Config = Self::figment(&config_file).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_file: &std::path::Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.agent.scan_passes == 0 {
            return Err(Error::config_validation(
                "scan_passes must be greater than 0",
            ));
        }

        if self.agent.inter_pass_delay_ms > MAX_INTER_PASS_DELAY_MS {
            return Err(Error::config_validation(format!(
                "inter_pass_delay_ms ({}) cannot exceed {MAX_INTER_PASS_DELAY_MS}",
                self.agent.inter_pass_delay_ms
            )));
        }

        Ok(())
    }

    /// Record file the agent appends to.
    #[must_use]
    pub fn vault_path(&self) -> PathBuf {
        self.agent
            .vault_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join("agent").join("scout_vault.csv"))
    }

    /// File holding the locality counter.
    #[must_use]
    pub fn counter_path(&self) -> PathBuf {
        self.agent
            .counter_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join("agent").join("counter.json"))
    }

    /// Pause between scan passes.
    #[must_use]
    pub fn inter_pass_delay(&self) -> Duration {
        Duration::from_millis(self.agent.inter_pass_delay_ms)
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.hq.database_path.clone().unwrap_or_else(|| {
            Self::default_data_dir()
                .join("hq")
                .join("database")
                .join("scout.db")
        })
    }

    /// Record file ingested when no source is given.
    #[must_use]
    pub fn inbox_path(&self) -> PathBuf {
        self.hq.inbox_path.clone().unwrap_or_else(|| {
            Self::default_data_dir()
                .join("hq")
                .join("inbox")
                .join("scout_vault.csv")
        })
    }

    /// Directory for archived sources.
    #[must_use]
    pub fn archive_dir(&self) -> PathBuf {
        self.hq
            .archive_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join("hq").join("archive"))
    }

    /// OUI vendor table.
    #[must_use]
    pub fn vendors_path(&self) -> PathBuf {
        self.hq
            .vendors_path
            .clone()
            .unwrap_or_else(|| Self::static_dir().join("vendors.json"))
    }

    /// Tag rules and security labels.
    #[must_use]
    pub fn rules_path(&self) -> PathBuf {
        self.hq
            .rules_path
            .clone()
            .unwrap_or_else(|| Self::static_dir().join("ui_content.json"))
    }

    fn static_dir() -> PathBuf {
        Self::default_data_dir().join("hq").join("static")
    }
}
