//! Demo step vocabulary.
//!
//! The workflow engine names its steps however its flows were authored, so
//! incoming step ids go through an alias table before they reach the store or
//! the browser.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result, ValidationError};

/// Progress of a single demo step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Processing,
    Complete,
    Error,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Processing => "processing",
            StepStatus::Complete => "complete",
            StepStatus::Error => "error",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processing" => Ok(StepStatus::Processing),
            "complete" => Ok(StepStatus::Complete),
            "error" => Ok(StepStatus::Error),
            other => Err(ValidationError::invalid(
                "status",
                format!("'{}' is not one of processing, complete, error", other),
            )),
        }
    }
}

/// Upstream spellings that map onto canonical step ids.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("ai-complete", "ai-qualification"),
    ("ai-analysis", "ai-qualification"),
    ("ai-analysis-complete", "ai-qualification"),
    ("ai_qualification", "ai-qualification"),
    ("lead-received", "form-submission"),
    ("form-received", "form-submission"),
    ("enrichment-complete", "data-enrichment"),
    ("enrich", "data-enrichment"),
    ("crm-updated", "crm-sync"),
    ("crm-update", "crm-sync"),
    ("email-sent", "email-outreach"),
    ("followup-email", "email-outreach"),
];

/// Lookup table from upstream step ids to canonical ones.
#[derive(Debug, Clone)]
pub struct StepAliases {
    aliases: HashMap<String, String>,
}

impl Default for StepAliases {
    fn default() -> Self {
        Self {
            aliases: BUILTIN_ALIASES
                .iter()
                .map(|(alias, canonical)| (alias.to_string(), canonical.to_string()))
                .collect(),
        }
    }
}

impl StepAliases {
    /// Empty table: every step id passes through untouched.
    pub fn empty() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    /// Adds or replaces entries from a JSON object of `alias -> canonical`.
    pub fn merge_json(&mut self, json: &str) -> Result<()> {
        let extra: HashMap<String, String> = serde_json::from_str(json).map_err(|e| {
            Error::InvalidConfigValue(format!("step alias table is not a JSON object of strings: {}", e))
        })?;
        for (alias, canonical) in extra {
            self.insert(&alias, &canonical);
        }
        Ok(())
    }

    /// Built-in table overlaid with the JSON file at `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfigValue(format!(
                "cannot read step alias file {}: {}",
                path.display(),
                e
            ))
        })?;
        let mut table = Self::default();
        table.merge_json(&raw)?;
        Ok(table)
    }

    pub fn insert(&mut self, alias: &str, canonical: &str) {
        self.aliases
            .insert(normalize_key(alias), canonical.trim().to_string());
    }

    /// Maps `step` onto its canonical id. Unknown ids are returned trimmed.
    pub fn canonicalize(&self, step: &str) -> String {
        let trimmed = step.trim();
        match self.aliases.get(&normalize_key(trimmed)) {
            Some(canonical) => canonical.clone(),
            None => trimmed.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

fn normalize_key(step: &str) -> String {
    step.trim().to_ascii_lowercase()
}
