//! Scan source that replays recorded passes from a JSON file.
//!
//! The file holds one entry per pass, either a list of access points or
//! `{"error": "..."}` for a pass where the radio failed:
//!
//! ```json
//! {
//!   "passes": [
//!     [{"ssid": "Free_WiFi_Zone", "bssid": "aa:bb:cc:11:22:33",
//!       "channel": 6, "rssi": -52, "security": 0, "hidden": false}],
//!     {"error": "radio busy"}
//!   ]
//! }
//! ```

use std::collections::VecDeque;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ScanError, ScanSource};
use crate::error::Result;
use crate::observation::{parse_bssid, RawAccessPoint};

/// One access point in a recorded pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayAccessPoint {
    /// Network name.
    #[serde(default)]
    pub ssid: String,
    /// Hardware address, colon-separated hex.
    pub bssid: String,
    /// Radio channel.
    pub channel: u32,
    /// Signal strength in dBm.
    pub rssi: i32,
    /// Security mode code.
    #[serde(default)]
    pub security: u32,
    /// Whether the network hides its SSID.
    #[serde(default)]
    pub hidden: bool,
}

impl ReplayAccessPoint {
    fn to_raw(&self) -> Option<RawAccessPoint> {
        Some(RawAccessPoint {
            ssid: self.ssid.as_bytes().to_vec(),
            bssid: parse_bssid(&self.bssid)?,
            channel: self.channel,
            rssi: self.rssi,
            security: self.security,
            hidden: self.hidden,
        })
    }
}

/// One recorded pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplayPass {
    /// The pass returned these access points.
    Seen(Vec<ReplayAccessPoint>),
    /// The pass failed with this radio error.
    Failed {
        /// Error message reported by the radio.
        error: String,
    },
}

#[derive(Debug, Deserialize)]
struct ReplayFile {
    passes: Vec<ReplayPass>,
}

/// Replays recorded passes in order; once exhausted every pass is empty.
#[derive(Debug, Clone, Default)]
pub struct ReplayScanSource {
    passes: VecDeque<ReplayPass>,
}

impl ReplayScanSource {
    /// Create a source from in-memory passes.
    #[must_use]
    pub fn new(passes: Vec<ReplayPass>) -> Self {
        Self {
            passes: passes.into(),
        }
    }

    /// Load recorded passes from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid
    /// recording.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let file: ReplayFile = serde_json::from_str(&text)?;
        debug!(
            "Loaded {} recorded passes from {}",
            file.passes.len(),
            path.display()
        );
        Ok(Self::new(file.passes))
    }

    /// Number of recorded passes not yet replayed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.passes.len()
    }
}

impl ScanSource for ReplayScanSource {
    fn scan(&mut self) -> std::result::Result<Vec<RawAccessPoint>, ScanError> {
        match self.passes.pop_front() {
            None => {
                debug!("Replay exhausted, returning an empty pass");
                Ok(Vec::new())
            }
            Some(ReplayPass::Failed { error }) => Err(ScanError::Radio(error)),
            Some(ReplayPass::Seen(aps)) => Ok(aps
                .iter()
                .filter_map(|ap| {
                    let raw = ap.to_raw();
                    if raw.is_none() {
                        warn!(bssid = %ap.bssid, "Skipping recorded access point with malformed address");
                    }
                    raw
                })
                .collect()),
        }
    }
}
