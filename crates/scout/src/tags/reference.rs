//! Read-only reference tables: OUI vendors and security labels.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

/// Vendor name for addresses whose OUI is not in the table.
pub const UNKNOWN_VENDOR: &str = "Unknown Vendor";

/// Hex characters in an OUI.
const OUI_LEN: usize = 6;

/// The OUI of a hardware address: first six hex digits, uppercased.
#[must_use]
pub fn oui(mac: &str) -> String {
    mac.chars()
        .filter(|c| *c != ':')
        .take(OUI_LEN)
        .collect::<String>()
        .to_ascii_uppercase()
}

fn is_oui_key(key: &str) -> bool {
    let mut digits = 0;
    for c in key.chars().filter(|c| *c != ':') {
        if !c.is_ascii_hexdigit() {
            return false;
        }
        digits += 1;
    }
    digits == OUI_LEN
}

/// OUI to vendor name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VendorTable {
    vendors: HashMap<String, String>,
}

impl VendorTable {
    /// Build a table from `(oui, vendor)` pairs.
    ///
    /// Keys are normalized with [`oui`]; a key that is not exactly six hex
    /// digits once separators are removed is skipped.
    #[must_use]
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            vendors: entries
                .into_iter()
                .filter_map(|(k, v)| {
                    let key = k.as_ref();
                    if is_oui_key(key) {
                        Some((oui(key), v.into()))
                    } else {
                        warn!(oui = %key, "Skipping vendor entry with a malformed OUI");
                        None
                    }
                })
                .collect(),
        }
    }

    /// Load the table from a JSON object of `"AABBCC": "Vendor"`.
    ///
    /// A missing or corrupt file gives an empty table; entries whose value
    /// is not a string are skipped.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let Some(document) = super::read_json(path) else {
            return Self::default();
        };
        let Some(object) = document.as_object() else {
            warn!("Vendor file {} is not a JSON object", path.display());
            return Self::default();
        };

        let table = Self::new(object.iter().filter_map(|(k, v)| {
            let name = v.as_str();
            if name.is_none() {
                warn!(oui = %k, "Skipping vendor entry without a name");
            }
            name.map(|n| (k.as_str(), n))
        }));
        debug!("Loaded {} vendors from {}", table.len(), path.display());
        table
    }

    /// Vendor of a hardware address, or [`UNKNOWN_VENDOR`].
    #[must_use]
    pub fn lookup(&self, mac: &str) -> &str {
        self.vendors
            .get(&oui(mac))
            .map_or(UNKNOWN_VENDOR, String::as_str)
    }

    /// Number of known vendors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vendors.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vendors.is_empty()
    }
}

/// Security code to display label, from `security_standards`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityLabels {
    labels: HashMap<String, String>,
}

impl SecurityLabels {
    /// Parse `{"security_standards": {"<code>": {"label": "..."}}}`.
    #[must_use]
    pub fn from_document(document: &Value) -> Self {
        let labels = document
            .get("security_standards")
            .and_then(Value::as_object)
            .map(|standards| {
                standards
                    .iter()
                    .filter_map(|(code, entry)| {
                        let label = entry.get("label")?.as_str()?;
                        Some((code.clone(), label.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { labels }
    }

    /// Label for a code, or `Unknown (<code>)`.
    #[must_use]
    pub fn label(&self, code: u32) -> String {
        self.labels
            .get(&code.to_string())
            .cloned()
            .unwrap_or_else(|| format!("Unknown ({code})"))
    }
}
