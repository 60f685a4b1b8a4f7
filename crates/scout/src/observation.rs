//! Core survey types for scout.
//!
//! This module defines the raw access-point tuple produced by a radio scan
//! and the normalized [`Observation`] that the rest of the pipeline works
//! with.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Number of octets in a hardware address.
pub const BSSID_LEN: usize = 6;

/// One access point as reported by the radio, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAccessPoint {
    /// Network name as raw bytes; not guaranteed to be valid UTF-8.
    pub ssid: Vec<u8>,
    /// Hardware address of the access point radio.
    pub bssid: [u8; BSSID_LEN],
    /// Radio channel.
    pub channel: u32,
    /// Signal strength in dBm.
    pub rssi: i32,
    /// Security mode code as reported by the radio.
    pub security: u32,
    /// Whether the network hides its SSID.
    pub hidden: bool,
}

/// One detected access point in one scan pass.
///
/// Identity for deduplication is [`Observation::bssid`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Observation {
    /// Network name; empty for hidden networks.
    pub ssid: String,
    /// Canonical lowercase colon-separated hardware address.
    pub bssid: String,
    /// Signal strength in dBm.
    pub rssi: i32,
    /// Radio channel.
    pub channel: u32,
    /// Whether the network hides its SSID.
    pub hidden: bool,
    /// Security mode code.
    pub security: u32,
}

impl Observation {
    /// Normalize a raw scan tuple.
    ///
    /// Invalid UTF-8 in the SSID is replaced with U+FFFD rather than
    /// rejecting the access point.
    #[must_use]
    pub fn from_raw(raw: &RawAccessPoint) -> Self {
        Self {
            ssid: String::from_utf8_lossy(&raw.ssid).into_owned(),
            bssid: format_bssid(&raw.bssid),
            rssi: raw.rssi,
            channel: raw.channel,
            hidden: raw.hidden,
            security: raw.security,
        }
    }

    /// The hidden flag as the 0/1 integer used on disk and in the store.
    #[must_use]
    pub fn hidden_flag(&self) -> u8 {
        u8::from(self.hidden)
    }
}

impl From<&RawAccessPoint> for Observation {
    fn from(raw: &RawAccessPoint) -> Self {
        Self::from_raw(raw)
    }
}

/// Format hardware address octets as lowercase colon-separated hex.
#[must_use]
pub fn format_bssid(octets: &[u8; BSSID_LEN]) -> String {
    octets
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Parse a colon-separated hardware address in either case.
#[must_use]
pub fn parse_bssid(text: &str) -> Option<[u8; BSSID_LEN]> {
    let mut octets = [0u8; BSSID_LEN];
    let mut parts = text.split(':');
    for octet in &mut octets {
        let part = parts.next()?;
        if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        *octet = u8::from_str_radix(part, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(octets)
}

/// Check that a hardware address is in canonical form.
///
/// # Panics
///
/// Panics if the built-in address pattern fails to compile.
#[must_use]
pub fn is_canonical_bssid(text: &str) -> bool {
    static CANONICAL: OnceLock<Regex> = OnceLock::new();
    CANONICAL
        .get_or_init(|| {
            Regex::new(r"^[0-9a-f]{2}(:[0-9a-f]{2}){5}$").expect("Invalid regex pattern")
        })
        .is_match(text)
}
