//! # Confidence Scorer
//!
//! Weighted combination of retrieval and validation signals.
//!
//! | Component         | Default weight |
//! |-------------------|----------------|
//! | coverage          | 40%            |
//! | citation density  | 30%            |
//! | chain length      | 15%            |
//! | model uncertainty | 10%            |
//! | temporal validity | 5%             |
//!
//! Weights and thresholds are configuration, not per-request inputs. The
//! validator's adjustment is applied after weighting and the level is
//! derived from the adjusted score.

use crate::context::Audience;
use crate::error::ConfigError;
use crate::graph::GraphStore;
use crate::primitives::{BASIS_POINTS, Score, ScoreDelta};
use crate::traversal::GraphContext;
use crate::Node;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

const HOP_PENALTY: u32 = 1_500;
const DROPPED_PATH_PENALTY: u32 = 250;
const DROPPED_PATH_CAP: u32 = 2_000;
const UNDATED_VALIDITY: Score = Score::new(8_000);

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Component weights in basis points. Must sum to 10_000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub coverage: Score,
    pub citation_density: Score,
    pub chain_length: Score,
    pub uncertainty: Score,
    pub temporal: Score,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            coverage: Score::new(4_000),
            citation_density: Score::new(3_000),
            chain_length: Score::new(1_500),
            uncertainty: Score::new(1_000),
            temporal: Score::new(500),
        }
    }
}

impl Weights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sum: u32 = [
            self.coverage,
            self.citation_density,
            self.chain_length,
            self.uncertainty,
            self.temporal,
        ]
        .iter()
        .map(|w| u32::from(w.basis_points()))
        .sum();
        if sum == u32::from(BASIS_POINTS) {
            Ok(())
        } else {
            Err(ConfigError::WeightsSum(sum))
        }
    }
}

/// Lower bounds of the high, medium and low levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub high: Score,
    pub medium: Score,
    pub low: Score,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high: Score::new(9_000),
            medium: Score::new(8_000),
            low: Score::new(7_000),
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.high > self.medium && self.medium > self.low {
            Ok(())
        } else {
            Err(ConfigError::ThresholdOrder)
        }
    }

    #[must_use]
    pub fn level(&self, score: Score) -> ConfidenceLevel {
        if score >= self.high {
            ConfidenceLevel::High
        } else if score >= self.medium {
            ConfidenceLevel::Medium
        } else if score >= self.low {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::VeryLow
        }
    }
}

// =============================================================================
// LEVELS & SCORE
// =============================================================================

/// Display treatment of a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    /// No warning.
    High,
    /// Displayed with a caution notice.
    Medium,
    /// Flagged for expert review, still displayed.
    Low,
    /// Display blocked.
    VeryLow,
}

impl ConfidenceLevel {
    /// User-facing message.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::High => "High confidence response based on the retrieved legal sources.",
            Self::Medium => {
                "Response based on limited legal sources. Please verify independently."
            }
            Self::Low => {
                "Limited confidence due to incomplete information. Expert review recommended."
            }
            Self::VeryLow => "Very limited confidence. This response requires expert validation.",
        }
    }

    /// Whether display is blocked.
    #[must_use]
    pub fn blocks_display(self) -> bool {
        self == Self::VeryLow
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::VeryLow => "very_low",
        };
        f.write_str(name)
    }
}

/// Everything the scorer looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfidenceSignals {
    pub coverage: Score,
    pub claim_count: usize,
    pub valid_citations: usize,
    /// Share of context facts carrying a citation.
    pub context_citation_ratio: Score,
    pub max_hops_used: u8,
    pub dropped_paths: usize,
    /// Retrieved facts the context budget left out.
    pub omitted_facts: usize,
    /// A seed fact (the provision asked about) was among them.
    pub primary_omitted: bool,
    pub uncertainty: Option<Score>,
    pub temporal_validity: Score,
    pub adjustment: ScoreDelta,
    pub unsupported_claims: usize,
    pub prohibited_language: usize,
    pub audience: Audience,
}

/// Scored confidence with its components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    pub overall: Score,
    pub coverage: Score,
    pub citation_density: Score,
    /// Chain component: shorter chains score higher.
    pub chain_length_penalty: Score,
    /// Uncertainty component: certain providers score higher.
    pub model_uncertainty: Score,
    pub temporal_validity: Score,
    pub level: ConfidenceLevel,
    pub requires_review: bool,
    pub review_reasons: Vec<String>,
    /// Validator adjustment already included in `overall`.
    pub adjustment: ScoreDelta,
}

impl ConfidenceScore {
    #[must_use]
    pub fn message(&self) -> &'static str {
        self.level.message()
    }
}

// =============================================================================
// SCORER
// =============================================================================

/// Weighted scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfidenceScorer {
    weights: Weights,
    thresholds: Thresholds,
}

impl ConfidenceScorer {
    pub fn new(weights: Weights, thresholds: Thresholds) -> Result<Self, ConfigError> {
        weights.validate()?;
        thresholds.validate()?;
        Ok(Self { weights, thresholds })
    }

    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Score one response.
    #[must_use]
    pub fn score(&self, signals: &ConfidenceSignals) -> ConfidenceScore {
        let citation_density = citation_density(signals);
        let chain = chain_component(
            signals.max_hops_used,
            signals.dropped_paths.saturating_add(signals.omitted_facts),
        );
        let model_uncertainty = signals.uncertainty.map_or(Score::NEUTRAL, Score::complement);

        let weighted = signals.coverage.weighted(self.weights.coverage)
            + citation_density.weighted(self.weights.citation_density)
            + chain.weighted(self.weights.chain_length)
            + model_uncertainty.weighted(self.weights.uncertainty)
            + signals.temporal_validity.weighted(self.weights.temporal);
        let overall = Score::new(u16::try_from(weighted).unwrap_or(BASIS_POINTS))
            .adjusted(signals.adjustment);
        let level = self.thresholds.level(overall);

        let mut review_reasons = Vec::new();
        if matches!(level, ConfidenceLevel::Low | ConfidenceLevel::VeryLow) {
            review_reasons.push(format!(
                "overall confidence {overall} below {}",
                self.thresholds.medium
            ));
        }
        if signals.unsupported_claims > 0 {
            review_reasons.push(format!("{} unsupported claim(s)", signals.unsupported_claims));
        }
        if signals.prohibited_language > 0 {
            review_reasons.push("predictive language present".to_string());
        }
        if signals.primary_omitted {
            review_reasons.push("requested provision exceeds the context limit".to_string());
        }
        if signals.audience == Audience::Judge && level != ConfidenceLevel::High {
            review_reasons.push("judicial audience requires high confidence".to_string());
        }

        ConfidenceScore {
            overall,
            coverage: signals.coverage,
            citation_density,
            chain_length_penalty: chain,
            model_uncertainty,
            temporal_validity: signals.temporal_validity,
            level,
            requires_review: !review_reasons.is_empty(),
            review_reasons,
            adjustment: signals.adjustment,
        }
    }
}

/// Citations per claim, capped at one. Text without claims falls back to
/// the context's own citation ratio when it cites anything at all.
fn citation_density(signals: &ConfidenceSignals) -> Score {
    if signals.claim_count > 0 {
        Score::from_ratio(signals.valid_citations as u64, signals.claim_count as u64)
    } else if signals.valid_citations > 0 {
        signals.context_citation_ratio
    } else {
        Score::ZERO
    }
}

/// Hop penalty plus a capped penalty per lost path or omitted fact.
fn chain_component(max_hops: u8, lost: usize) -> Score {
    let dropped = u32::try_from(lost)
        .unwrap_or(u32::MAX)
        .saturating_mul(DROPPED_PATH_PENALTY)
        .min(DROPPED_PATH_CAP);
    let penalty = HOP_PENALTY
        .saturating_mul(u32::from(max_hops))
        .saturating_add(dropped);
    Score::new(u16::try_from(u32::from(BASIS_POINTS).saturating_sub(penalty)).unwrap_or(0))
}

/// Share of retrieved provisions in force at `reference`.
///
/// Nodes without a date inherit their section's; undated provisions score
/// 8000. With no reference date, dated provisions count as in force.
#[must_use]
pub fn temporal_validity<G: GraphStore>(
    graph: &G,
    traversal: &GraphContext,
    reference: Option<NaiveDate>,
) -> Score {
    let scores: Vec<Score> = traversal
        .nodes
        .iter()
        .map(|retrieved| match (effective_date(graph, &retrieved.node), reference) {
            (None, _) => UNDATED_VALIDITY,
            (Some(_), None) => Score::MAX,
            (Some(date), Some(reference)) if date <= reference => Score::MAX,
            (Some(_), Some(_)) => Score::ZERO,
        })
        .collect();
    Score::mean(&scores).unwrap_or(Score::NEUTRAL)
}

fn effective_date<G: GraphStore>(graph: &G, node: &Node) -> Option<NaiveDate> {
    let parent = match node {
        Node::Section(s) => return s.effective_date,
        Node::Clause(c) => &c.parent_section_id,
        Node::Definition(d) => &d.defined_in_section_id,
        Node::Right(r) => &r.granted_by_clause_id,
    };
    graph
        .lookup(parent)
        .and_then(|granter| effective_date(graph, granter))
}

// =============================================================================
// TESTS
// =============================================================================
