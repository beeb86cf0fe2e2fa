// ==============================================================================
// config.rs - Analyzer Configuration
// ==============================================================================
// Description: Tunable limits and thresholds for an analysis run
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.1.0
// ==============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

use crate::classifier::ClassifierConfig;
use crate::parsers::vcf::DEFAULT_RECORD_LIMIT;
use crate::recommendations::RecommendationRules;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Records parsed before the parser stops and flags truncation
    pub record_limit: usize,
    /// Optional hard cap on input size. Unset by default: large inputs are
    /// streamed and bounded by `record_limit` instead.
    pub max_file_size: Option<u64>,
    pub classifier: ClassifierConfig,
    pub rules: RecommendationRules,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            record_limit: DEFAULT_RECORD_LIMIT,
            max_file_size: None,
            classifier: ClassifierConfig::default(),
            rules: RecommendationRules::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Load from JSON; missing fields fall back to defaults
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open config file {}", path.display()))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        info!("Loaded analyzer config from {}", path.display());
        Ok(config)
    }

    pub fn with_record_limit(mut self, record_limit: usize) -> Self {
        self.record_limit = record_limit;
        self
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = Some(max_file_size);
        self
    }

    pub fn with_rules(mut self, rules: RecommendationRules) -> Self {
        self.rules = rules;
        self
    }
}
