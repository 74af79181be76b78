//! Display names for element types and legend formatting

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Type shown for elements without a `type` attribute
pub const UNKNOWN_TYPE: &str = "Unknown Type";

/// Built-in display names for the model types used by the bundled presets
const DEFAULT_TYPE_LABELS: &[(&str, &str)] = &[
    ("operational_goal", "on interval action"),
    ("action", "on demand action"),
    ("comm_thread", "message sender"),
    ("comm_listener", "message receiver"),
    ("cpc_container", "cp component"),
];

/// Mapping from normalized type string to display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeLabels(BTreeMap<String, String>);

impl Default for TypeLabels {
    fn default() -> Self {
        TypeLabels(
            DEFAULT_TYPE_LABELS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl TypeLabels {
    /// An empty table: every type displays as its normalized form
    pub fn empty() -> Self {
        TypeLabels(BTreeMap::new())
    }

    /// Display name for a raw `type` attribute value
    pub fn display(&self, raw_type: &str) -> String {
        let normalized = normalize_type(raw_type);
        match self.0.get(&normalized) {
            Some(display) => display.clone(),
            None => normalized,
        }
    }
}

/// Drop the descriptive suffix after the first `:`, then trim and lowercase.
///
/// `"comm_thread: MQTT sender"` becomes `"comm_thread"`.
pub fn normalize_type(raw: &str) -> String {
    raw.split(':').next().unwrap_or_default().trim().to_lowercase()
}

/// First letter uppercased, the rest lowercased
pub fn capitalize_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// `"<context> > <type>: <label>"`, or `"<type>: <label>"` without context
pub fn legend(context: &str, type_label: &str, element_label: &str) -> String {
    if context.is_empty() {
        format!("{}: {}", type_label, element_label)
    } else {
        format!("{} > {}: {}", context, type_label, element_label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_type() {
        assert_eq!(normalize_type("comm_thread: MQTT sender"), "comm_thread");
        assert_eq!(normalize_type("  CPS_Component "), "cps_component");
        assert_eq!(normalize_type(""), "");
    }

    #[test]
    fn test_display_uses_table_then_falls_back() {
        let labels = TypeLabels::default();
        assert_eq!(labels.display("operational_goal:every 5s"), "on interval action");
        assert_eq!(labels.display("Sensor"), "sensor");
        assert_eq!(labels.display(UNKNOWN_TYPE), "unknown type");
        assert_eq!(TypeLabels::empty().display("action"), "action");
    }

    #[test]
    fn test_capitalize_word() {
        assert_eq!(capitalize_word("nAME"), "Name");
        assert_eq!(capitalize_word("x"), "X");
        assert_eq!(capitalize_word(""), "");
    }

    #[test]
    fn test_legend() {
        assert_eq!(legend("", "sensor", "Temp"), "sensor: Temp");
        assert_eq!(legend("Engine", "sensor", "Temp"), "Engine > sensor: Temp");
    }
}
