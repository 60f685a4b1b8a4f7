//! Tactical tag classification.
//!
//! [`classify`] evaluates a [`RuleSet`] against one stored row and a
//! [`VendorTable`]. It is pure: the same inputs always give the same label.

mod reference;
mod rules;

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::storage::StoredObservation;

pub use reference::{oui, SecurityLabels, VendorTable, UNKNOWN_VENDOR};
pub use rules::{FlagField, Matcher, RuleDefinition, RuleSet, DEFAULT_LABEL};

/// Separator between matching labels.
pub const TAG_SEPARATOR: &str = " | ";

/// Labels of every matching rule, in declaration order, joined with
/// [`TAG_SEPARATOR`]; the rule set's default label if none match.
#[must_use]
pub fn classify(row: &StoredObservation, rules: &RuleSet, vendors: &VendorTable) -> String {
    let ssid = row.ssid.to_lowercase();
    let vendor = vendors.lookup(&row.mac).to_lowercase();
    let contains_any = |haystack: &str, keywords: &[String]| {
        keywords.iter().any(|k| haystack.contains(k.as_str()))
    };

    let tags: Vec<&str> = rules
        .rules()
        .iter()
        .filter(|rule| match &rule.matcher {
            Matcher::Ssid { keywords } => contains_any(&ssid, keywords),
            Matcher::Vendor { keywords } => contains_any(&vendor, keywords),
            Matcher::Flag { field, value } => field.value_of(row) == *value,
        })
        .map(|rule| rule.label.as_str())
        .collect();

    if tags.is_empty() {
        rules.default_label().to_string()
    } else {
        tags.join(TAG_SEPARATOR)
    }
}

/// Everything loaded from the reference files.
#[derive(Debug, Clone, Default)]
pub struct Reference {
    /// OUI vendors.
    pub vendors: VendorTable,
    /// Tag rules.
    pub rules: RuleSet,
    /// Security code labels.
    pub security: SecurityLabels,
}

impl Reference {
    /// Load the vendor file and the rules file. Never fails.
    #[must_use]
    pub fn load(vendors_path: &Path, rules_path: &Path) -> Self {
        let document = read_json(rules_path);
        Self {
            vendors: VendorTable::load(vendors_path),
            rules: document
                .as_ref()
                .map_or_else(RuleSet::default, RuleSet::from_document),
            security: document
                .as_ref()
                .map_or_else(SecurityLabels::default, SecurityLabels::from_document),
        }
    }

    /// Annotate a stored row for display.
    #[must_use]
    pub fn annotate(&self, row: &StoredObservation) -> AnnotatedObservation {
        AnnotatedObservation {
            vendor: self.vendors.lookup(&row.mac).to_string(),
            security_label: self.security.label(row.security),
            tags: classify(row, &self.rules, &self.vendors),
            observation: row.clone(),
        }
    }
}

/// A stored row with its vendor, security label and tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotatedObservation {
    /// The stored row.
    #[serde(flatten)]
    pub observation: StoredObservation,
    /// Vendor name.
    pub vendor: String,
    /// Security label.
    pub security_label: String,
    /// Classification.
    pub tags: String,
}

/// Read a JSON reference file, warning and returning `None` on any failure.
fn read_json(path: &Path) -> Option<Value> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Reference file unavailable");
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Reference file is not valid JSON");
            None
        }
    }
}
