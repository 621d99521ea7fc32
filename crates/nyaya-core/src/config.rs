//! # Configuration
//!
//! Everything tunable about the pipeline, loaded from one JSON document.
//! Every field has a default, so `{}` is a complete configuration.

use crate::cache::DEFAULT_TRACE_CACHE_SIZE;
use crate::confidence::{Thresholds, Weights};
use crate::context::{DEFAULT_CITIZEN_BUDGET_PERCENT, DEFAULT_MAX_CONTEXT_CHARS};
use crate::error::ConfigError;
use crate::primitives::{DEFAULT_KEYWORD_HITS, DEFAULT_MAX_NODES};
use crate::query::QueryParser;
use crate::rules::RuleTable;
use crate::validation::{ResponseValidator, ValidatorConfig};
use serde::{Deserialize, Serialize};

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Versioned intent rules and vocabularies.
    pub rules: RuleTable,
    pub weights: Weights,
    pub thresholds: Thresholds,
    /// Context budget for professional audiences.
    pub max_context_chars: usize,
    /// Share of `max_context_chars` a citizen gets.
    pub citizen_budget_percent: u8,
    pub max_nodes: usize,
    pub keyword_hits_per_entity: usize,
    pub trace_cache_size: usize,
    /// `proximity_window`, `claim_verbs` and `prohibited_phrases`.
    #[serde(flatten)]
    pub validator: ValidatorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rules: RuleTable::default(),
            weights: Weights::default(),
            thresholds: Thresholds::default(),
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            citizen_budget_percent: DEFAULT_CITIZEN_BUDGET_PERCENT,
            max_nodes: DEFAULT_MAX_NODES,
            keyword_hits_per_entity: DEFAULT_KEYWORD_HITS,
            trace_cache_size: DEFAULT_TRACE_CACHE_SIZE,
            validator: ValidatorConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Compile every pattern and check the scoring tables.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        self.thresholds.validate()?;
        QueryParser::new(&self.rules)?;
        ResponseValidator::new(&self.validator)?;
        Ok(())
    }

    /// Pretty JSON, for `nyaya check --print-config`.
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// =============================================================================
// TESTS
// =============================================================================
