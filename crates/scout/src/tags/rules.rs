//! Tag rule definitions and their loader.
//!
//! Rules live in a JSON file under `analysis_rules`:
//!
//! ```json
//! {
//!   "analysis_rules": {
//!     "default_label": "Stationary AP",
//!     "threat_tags": {
//!       "honeypot": {"source": "ssid", "keywords": ["free_wifi"], "label": "Honeypot?"},
//!       "stealth": {"source": "flag", "field": "hidden", "value": 1, "label": "Stealth AP"}
//!     }
//!   }
//! }
//! ```
//!
//! Rules are evaluated in the order their keys appear in the file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::storage::StoredObservation;

/// Label used when no rule matches and the file names none.
pub const DEFAULT_LABEL: &str = "Stationary AP";

/// A row field a flag rule can compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagField {
    /// Locality id.
    LocalityId,
    /// Network name.
    Ssid,
    /// Hardware address.
    Mac,
    /// Signal strength.
    Rssi,
    /// Radio channel.
    Channel,
    /// Hidden flag, exposed as integer 0 or 1.
    Hidden,
    /// Security mode code.
    Security,
}

impl FlagField {
    /// The row's value for this field, typed as it is stored.
    #[must_use]
    pub fn value_of(self, row: &StoredObservation) -> Value {
        match self {
            Self::LocalityId => Value::from(row.locality_id),
            Self::Ssid => Value::from(row.ssid.as_str()),
            Self::Mac => Value::from(row.mac.as_str()),
            Self::Rssi => Value::from(row.rssi),
            Self::Channel => Value::from(row.channel),
            Self::Hidden => Value::from(u8::from(row.hidden)),
            Self::Security => Value::from(row.security),
        }
    }
}

/// What a rule looks at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum Matcher {
    /// Any keyword is a substring of the lowercased SSID.
    Ssid {
        /// Lowercase substrings.
        keywords: Vec<String>,
    },
    /// Any keyword is a substring of the lowercased vendor name.
    Vendor {
        /// Lowercase substrings.
        keywords: Vec<String>,
    },
    /// A row field equals `value` exactly, type included.
    Flag {
        /// Field to compare.
        field: FlagField,
        /// Expected value.
        value: Value,
    },
}

/// A named tag and the condition that applies it.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDefinition {
    /// Key of the rule in the file.
    pub id: String,
    /// Text shown when the rule matches.
    pub label: String,
    /// Condition.
    pub matcher: Matcher,
}

#[derive(Deserialize)]
struct RuleEntry {
    label: String,
    #[serde(flatten)]
    matcher: Matcher,
}

/// An ordered, immutable rule set.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    rules: Vec<RuleDefinition>,
    default_label: String,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(Vec::new(), None)
    }
}

impl RuleSet {
    /// Build a rule set. Keywords are lowercased.
    #[must_use]
    pub fn new(rules: Vec<RuleDefinition>, default_label: Option<String>) -> Self {
        let rules = rules
            .into_iter()
            .map(|mut rule| {
                if let Matcher::Ssid { keywords } | Matcher::Vendor { keywords } = &mut rule.matcher
                {
                    for keyword in keywords.iter_mut() {
                        *keyword = keyword.to_lowercase();
                    }
                }
                rule
            })
            .collect();
        Self {
            rules,
            default_label: default_label.unwrap_or_else(|| DEFAULT_LABEL.to_string()),
        }
    }

    /// Parse rules from the document's `analysis_rules` section.
    ///
    /// Rules that do not parse are skipped with a warning.
    #[must_use]
    pub fn from_document(document: &Value) -> Self {
        let section = document.get("analysis_rules");
        let default_label = section
            .and_then(|s| s.get("default_label"))
            .and_then(Value::as_str)
            .map(String::from);

        let rules = section
            .and_then(|s| s.get("threat_tags"))
            .and_then(Value::as_object)
            .map(|tags| {
                tags.iter()
                    .filter_map(|(id, def)| match RuleEntry::deserialize(def) {
                        Ok(entry) => Some(RuleDefinition {
                            id: id.clone(),
                            label: entry.label,
                            matcher: entry.matcher,
                        }),
                        Err(e) => {
                            warn!(rule = %id, error = %e, "Skipping invalid tag rule");
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self::new(rules, default_label)
    }

    /// Load rules from a JSON file.
    ///
    /// A missing or corrupt file yields an empty rule set, so
    /// classification still returns the default label.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let Some(document) = super::read_json(path) else {
            return Self::default();
        };
        let set = Self::from_document(&document);
        debug!("Loaded {} tag rules from {}", set.len(), path.display());
        set
    }

    /// Rules in declaration order.
    #[must_use]
    pub fn rules(&self) -> &[RuleDefinition] {
        &self.rules
    }

    /// Label returned when nothing matches.
    #[must_use]
    pub fn default_label(&self) -> &str {
        &self.default_label
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
