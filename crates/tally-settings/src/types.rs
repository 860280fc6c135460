//! Settings types with compiled defaults.

use serde::{Deserialize, Serialize};
use tally_core::types::ChildKind;

use crate::errors::SettingsError;

/// Top-level settings for the tally engine.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TallySettings {
    /// Group-to-counter bindings. Order is preserved for sweeps.
    pub mappings: Vec<CounterMapping>,
    /// Membership classification parameters.
    pub classifier: ClassifierSettings,
    /// Scheduling and rate-limit parameters.
    pub scheduler: SchedulerSettings,
}

/// One group-to-counter binding. Immutable after startup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterMapping {
    /// The group whose children are counted.
    pub group_id: String,
    /// The counter whose name displays the count.
    pub counter_id: String,
}

/// Membership classification parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifierSettings {
    /// The one child kind that counts.
    pub countable_kind: ChildKind,
    /// Name prefixes marking logically finished members, matched
    /// case-insensitively.
    pub terminal_prefixes: Vec<String>,
    /// Optional allow-list: when set, only children whose name starts with
    /// one of these prefixes are counted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_prefixes: Option<Vec<String>>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            countable_kind: ChildKind::Text,
            terminal_prefixes: vec!["closed".to_owned(), "resolved".to_owned()],
            tracked_prefixes: None,
        }
    }
}

/// Scheduling and rate-limit parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerSettings {
    /// Periodic drift-correction sweep interval in seconds.
    pub sweep_interval_secs: u64,
    /// Maximum reconciliation passes in flight across all groups.
    pub max_concurrent: usize,
    /// Timeout applied to each individual directory call, in milliseconds.
    pub call_timeout_ms: u64,
    /// Whether to pin counters to the top of their group after a rename.
    pub pin_counters: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 300,
            max_concurrent: 4,
            call_timeout_ms: 10_000,
            pin_counters: true,
        }
    }
}

impl TallySettings {
    /// Validate the loaded settings.
    ///
    /// Any error here is a startup-fatal `ConfigurationError`: the engine
    /// must not start with a malformed mapping table.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let mut seen_groups = std::collections::HashSet::new();
        for mapping in &self.mappings {
            if mapping.group_id.trim().is_empty() {
                return Err(SettingsError::InvalidValue(
                    "mapping with empty group id".to_owned(),
                ));
            }
            if mapping.counter_id.trim().is_empty() {
                return Err(SettingsError::InvalidValue(format!(
                    "mapping for group {} has an empty counter id",
                    mapping.group_id
                )));
            }
            if mapping.group_id == mapping.counter_id {
                return Err(SettingsError::InvalidValue(format!(
                    "group {} is mapped to itself",
                    mapping.group_id
                )));
            }
            if !seen_groups.insert(mapping.group_id.as_str()) {
                return Err(SettingsError::InvalidValue(format!(
                    "duplicate mapping for group {}",
                    mapping.group_id
                )));
            }
        }
        if self.classifier.terminal_prefixes.iter().any(|p| p.trim().is_empty()) {
            return Err(SettingsError::InvalidValue(
                "empty terminal prefix".to_owned(),
            ));
        }
        if let Some(tracked) = &self.classifier.tracked_prefixes {
            if tracked.iter().any(|p| p.trim().is_empty()) {
                return Err(SettingsError::InvalidValue(
                    "empty tracked prefix".to_owned(),
                ));
            }
        }
        if self.scheduler.sweep_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "sweepIntervalSecs must be at least 1".to_owned(),
            ));
        }
        if self.scheduler.max_concurrent == 0 {
            return Err(SettingsError::InvalidValue(
                "maxConcurrent must be at least 1".to_owned(),
            ));
        }
        if self.scheduler.call_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "callTimeoutMs must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}
