//! # Rule Table
//!
//! Versioned, data-driven configuration for intent classification and
//! entity extraction.
//!
//! Behaviour changes ship as a new rule table (JSON), not as new code.
//! `RuleTable::default()` is the built-in consumer-protection table.

use crate::primitives::Score;
use crate::query::IntentType;
use serde::{Deserialize, Serialize};

/// One intent signature: a weight and the patterns that evidence it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRule {
    pub intent: IntentType,
    pub weight: Score,
    /// Regular expressions, matched case-insensitively.
    pub patterns: Vec<String>,
}

/// Scenario routing: trigger words map a situation to the provisions it
/// usually needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioRoute {
    pub name: String,
    pub triggers: Vec<String>,
    #[serde(default)]
    pub sections: Vec<String>,
    #[serde(default)]
    pub terms: Vec<String>,
}

/// Complete classification and extraction rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    pub version: String,
    pub intents: Vec<IntentRule>,
    #[serde(default)]
    pub legal_terms: Vec<String>,
    #[serde(default)]
    pub rights_vocabulary: Vec<String>,
    #[serde(default)]
    pub scenario_routes: Vec<ScenarioRoute>,
    /// Confidence given when nothing matches.
    #[serde(default = "default_fallback_confidence")]
    pub fallback_confidence: Score,
    /// Bonus per additional matching pattern.
    #[serde(default = "default_match_bonus")]
    pub match_bonus: Score,
}

fn default_fallback_confidence() -> Score {
    Score::new(3_000)
}

fn default_match_bonus() -> Score {
    Score::new(500)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for RuleTable {
    fn default() -> Self {
        Self {
            version: "consumer-protection-1".to_string(),
            intents: vec![
                IntentRule {
                    intent: IntentType::SectionRetrieval,
                    weight: Score::new(9_000),
                    patterns: strings(&[
                        r"\bsection\s+\d+(?:\.\d+)*",
                        r"\bsec\.?\s*\d+",
                        r"\bs\.\s*\d+",
                        r"\b(?:chapter|part)\s+[ivxlc\d]+\b",
                    ]),
                },
                IntentRule {
                    intent: IntentType::DefinitionLookup,
                    weight: Score::new(8_500),
                    patterns: strings(&[
                        r#"^\s*(?:what\s+is|what's|who\s+is)\s+(?:an?\s+|the\s+)?["“]?(?:[a-z-]+\s*){1,4}["”]?\s*\??\s*$"#,
                        r"\b(?:define|definition\s+of|meaning\s+of|defined\s+as)\b",
                        r"\bwhat\s+does\s+.{1,40}\s+mean\b",
                    ]),
                },
                IntentRule {
                    intent: IntentType::RightsQuery,
                    weight: Score::new(8_000),
                    patterns: strings(&[
                        r"\b(?:rights?|entitle(?:d|ment)?|protections?)\b.*\b(?:consumers?|buyers?|customers?|purchasers?)\b",
                        r"\b(?:consumers?|buyers?|customers?)\b.*\b(?:rights?|entitle(?:d|ment)?)\b",
                        r"\bwhat\s+(?:are\s+)?my\s+rights\b",
                        r"\b(?:remed(?:y|ies)|redressal|compensation|refund)\b.*\b(?:available|entitled|claim|get)\b",
                    ]),
                },
                IntentRule {
                    intent: IntentType::ScenarioAnalysis,
                    weight: Score::new(7_000),
                    patterns: strings(&[
                        r"\b(?:if|suppose|what\s+happens|what\s+can\s+i\s+do)\b",
                        r"\bcan\s+i\b.*\b(?:file|complain|claim|sue|return)\b",
                        r"\b(?:defective|faulty|broken|damaged)\b",
                        r"\b(?:unfair|misleading|false)\b.*\b(?:advertisement|ad|practice|claim)\b",
                        r"\b(?:overcharg\w*|charged\s+more|excess\s+price)\b",
                    ]),
                },
            ],
            legal_terms: strings(&[
                "consumer",
                "trader",
                "manufacturer",
                "service provider",
                "product seller",
                "complainant",
                "complaint",
                "defect",
                "deficiency",
                "unfair trade practice",
                "restrictive trade practice",
                "unfair contract",
                "misleading advertisement",
                "false advertisement",
                "advertisement",
                "endorsement",
                "consumer rights",
                "product liability",
                "compensation",
                "redressal",
                "district commission",
                "state commission",
                "national commission",
                "central authority",
                "mediation",
                "goods",
                "services",
                "warranty",
                "guarantee",
                "e-commerce",
                "direct selling",
            ]),
            rights_vocabulary: strings(&["right", "rights", "entitled", "entitlement", "entitlements"]),
            scenario_routes: vec![
                ScenarioRoute {
                    name: "defective_goods".to_string(),
                    triggers: strings(&["defective", "faulty", "broken", "damaged", "not working"]),
                    sections: strings(&["35", "39"]),
                    terms: strings(&["defect"]),
                },
                ScenarioRoute {
                    name: "misleading_advertisement".to_string(),
                    triggers: strings(&["misleading", "false advertisement", "fake ad", "false claim"]),
                    sections: strings(&["18", "21", "35"]),
                    terms: strings(&["misleading advertisement", "advertisement"]),
                },
                ScenarioRoute {
                    name: "overcharging".to_string(),
                    triggers: strings(&["overcharged", "overcharging", "charged more", "excess price", "above mrp"]),
                    sections: strings(&["35", "39"]),
                    terms: strings(&["unfair trade practice"]),
                },
                ScenarioRoute {
                    name: "service_deficiency".to_string(),
                    triggers: strings(&["poor service", "deficient service", "not delivered", "service was"]),
                    sections: strings(&["35", "39"]),
                    terms: strings(&["deficiency", "service"]),
                },
            ],
            fallback_confidence: default_fallback_confidence(),
            match_bonus: default_match_bonus(),
        }
    }
}

impl RuleTable {
    /// Parse a rule table from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// =============================================================================
// TESTS
// =============================================================================
