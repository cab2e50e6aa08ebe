//! Analysis configuration.
//!
//! Locating and reading the configuration file belongs to the caller; this
//! module only defines the typed shape and its defaults.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{RtlfpError, RtlfpResult};
use crate::query::engine::{PathPolicy, QueryLimits};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Prefix,
    #[default]
    Substr,
    Regex,
}

/// One architectural-visibility rule, e.g.
/// `{"type": "prefix", "value": "DigitalTop.tile.core.io_commit"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityRule {
    #[serde(rename = "type", default)]
    pub kind: RuleKind,
    #[serde(default)]
    pub value: String,
}

impl VisibilityRule {
    pub fn new(kind: RuleKind, value: &str) -> Self {
        VisibilityRule {
            kind,
            value: value.to_string(),
        }
    }
}

fn default_signal_patterns() -> IndexMap<String, Vec<String>> {
    let mut patterns = IndexMap::new();
    patterns.insert("mapping".to_string(), vec!["*set_idx*".to_string()]);
    patterns.insert("queue".to_string(), vec!["*mshr_full*".to_string()]);
    patterns
}

fn default_workers() -> usize {
    4
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub arch_visible_rules: Vec<VisibilityRule>,
    /// Mechanism tag -> name globs selecting candidate signals.
    #[serde(default = "default_signal_patterns")]
    pub signal_patterns: IndexMap<String, Vec<String>>,
    /// Threads for the per-module graph construction phase.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub path_policy: PathPolicy,
    #[serde(default)]
    pub limits: QueryLimits,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            arch_visible_rules: Vec::new(),
            signal_patterns: default_signal_patterns(),
            workers: default_workers(),
            path_policy: PathPolicy::default(),
            limits: QueryLimits::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_str(raw: &str) -> RtlfpResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| RtlfpError::Config(format!("invalid analysis config: {e}")))
    }
}
