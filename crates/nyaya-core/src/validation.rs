//! # Response Validator
//!
//! Post-hoc checks of explainer output against the citation allow-list.
//!
//! Checks run in order: citation existence, unsupported claims, format
//! compliance, audience citation density. Only fabricated citations make a
//! response invalid; everything else lowers confidence or triggers review.

use crate::context::{Audience, CitationMap};
use crate::error::ConfigError;
use crate::primitives::{BASIS_POINTS, ScoreDelta};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::warn;

/// Default distance, in bytes, between a claim verb and its citation.
pub const DEFAULT_PROXIMITY_WINDOW: usize = 200;

const FABRICATION_PENALTY: u32 = 400;
const UNSUPPORTED_CLAIM_PENALTY: u32 = 100;
const UNSUPPORTED_CLAIM_CAP: u32 = 300;
const FORMAT_PENALTY: u32 = 50;
const FORMAT_CAP: u32 = 200;
const DENSITY_WEIGHT: u32 = 1_500;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Tunable detection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub proximity_window: usize,
    /// Phrases that mark a sentence as a legal assertion.
    pub claim_verbs: Vec<String>,
    /// Regular expressions for predictive language.
    pub prohibited_phrases: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
        Self {
            proximity_window: DEFAULT_PROXIMITY_WINDOW,
            claim_verbs: owned(&[
                "requires",
                "entitles",
                "entitled",
                "prohibits",
                "mandates",
                "grants",
                "provides that",
                "is liable",
                "shall",
                "must",
                "has the right",
            ]),
            prohibited_phrases: owned(&[
                r"\byou\s+will\s+(?:definitely\s+|certainly\s+)?(?:win|succeed|get\s+compensation)\b",
                r"\bthe\s+(?:judge|court|commission)\s+will\s+(?:rule|decide|order|award|find)\b",
                r"\bI\s+predict\b",
                r"\bguaranteed\s+(?:outcome|result|success|win)\b",
                r"\bwill\s+certainly\s+(?:win|succeed|lose)\b",
            ]),
        }
    }
}

// =============================================================================
// RESULT
// =============================================================================

/// Verdict on one explainer output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// False iff a citation token matched nothing in the allow-list.
    pub is_valid: bool,
    /// Sentences asserting law with no citation nearby.
    pub unsupported_claims: Vec<String>,
    /// Citation tokens that resolved to nothing.
    pub fabricated_references: Vec<String>,
    pub format_violations: Vec<String>,
    pub prohibited_language: Vec<String>,
    /// Allow-listed citations the text actually used.
    pub citations_found: Vec<String>,
    pub claim_count: usize,
    /// Citation tokens that resolved.
    pub valid_citation_count: usize,
    pub density_met: bool,
    /// The text is the "information not available" answer.
    pub information_not_available: bool,
    /// Always zero or negative.
    pub confidence_adjustment: ScoreDelta,
}

impl ValidationResult {
    /// Valid, but needs an expert to look at it.
    #[must_use]
    pub fn needs_review(&self) -> bool {
        !self.unsupported_claims.is_empty() || !self.prohibited_language.is_empty()
    }
}

/// One citation value found in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CitationToken {
    value: String,
    span: Range<usize>,
}

// =============================================================================
// VALIDATOR
// =============================================================================

/// Compiled validator.
#[derive(Debug)]
pub struct ResponseValidator {
    proximity_window: usize,
    canonical: Regex,
    alternate: Regex,
    parenthetical: Regex,
    quoted: Regex,
    not_available: Regex,
    claim: Option<Regex>,
    prohibited: Vec<Regex>,
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

impl ResponseValidator {
    pub fn new(config: &ValidatorConfig) -> Result<Self, ConfigError> {
        let verbs: Vec<String> = config
            .claim_verbs
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(|v| regex::escape(v).replace(' ', r"\s+"))
            .collect();
        let claim = if verbs.is_empty() {
            None
        } else {
            Some(compile(&format!(r"\b(?:{})\b", verbs.join("|")))?)
        };

        Ok(Self {
            proximity_window: config.proximity_window,
            canonical: compile(r"\[\s*citation\s*:\s*([^\]]*)\]")?,
            alternate: compile(r"\[\s*(?:ref|reference|source)\s*:\s*([^\]]*)\]")?,
            parenthetical: compile(r"\((section\s+\d+[^)]*)\)")?,
            quoted: compile(r#""[^"]*"|“[^”]*”"#)?,
            not_available: compile(r"information\s+not\s+available\s+in\s+(?:the\s+)?current\s+knowledge\s+base")?,
            claim,
            prohibited: config
                .prohibited_phrases
                .iter()
                .map(|p| compile(p))
                .collect::<Result<_, _>>()?,
        })
    }

    /// Validate `text` against the allow-list.
    pub fn validate(&self, text: &str, citations: &CitationMap, audience: Audience) -> ValidationResult {
        let mut result = ValidationResult {
            information_not_available: self.not_available.is_match(text),
            ..ValidationResult::default()
        };

        // 1. Citation existence
        let tokens = self.citation_tokens(text, &mut result.format_violations);
        for token in &tokens {
            match citations.resolve(&token.value) {
                Some(entry) => {
                    result.valid_citation_count += 1;
                    if !result.citations_found.contains(&entry.citation) {
                        result.citations_found.push(entry.citation.clone());
                    }
                }
                None => {
                    if !result.fabricated_references.contains(&token.value) {
                        warn!(citation = %token.value, "fabricated citation in explanation");
                        result.fabricated_references.push(token.value.clone());
                    }
                }
            }
        }

        // 2. Unsupported claims
        let claims = self.claims(text);
        result.claim_count = claims.len();
        for (sentence, verb) in claims {
            let supported = tokens
                .iter()
                .any(|t| distance(&t.span, &verb) <= self.proximity_window);
            if !supported {
                result
                    .unsupported_claims
                    .push(text[sentence].trim().to_string());
            }
        }

        // 3. Prohibited predictive language
        for pattern in &self.prohibited {
            for found in pattern.find_iter(text) {
                result.prohibited_language.push(found.as_str().to_string());
            }
        }

        // 4. Density
        let shortfall = density_shortfall(audience, result.claim_count, result.valid_citation_count);
        result.density_met = shortfall == 0;

        result.is_valid = result.fabricated_references.is_empty();
        result.confidence_adjustment = adjustment(&result, shortfall);
        result
    }

    /// Every citation value in `text`, recording non-canonical syntax.
    fn citation_tokens(&self, text: &str, violations: &mut Vec<String>) -> Vec<CitationToken> {
        let mut tokens = Vec::new();
        let mut bracketed: Vec<Range<usize>> = Vec::new();

        for (regex, canonical) in [(&self.canonical, true), (&self.alternate, false)] {
            for captures in regex.captures_iter(text) {
                let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
                    continue;
                };
                bracketed.push(whole.range());
                if !canonical {
                    violations.push(format!(
                        "non-canonical citation token `{}`; expected [Citation: ...]",
                        whole.as_str()
                    ));
                }
                if inner.as_str().trim().is_empty() {
                    violations.push(format!("empty citation token `{}`", whole.as_str()));
                    continue;
                }
                for value in inner.as_str().split(';').map(str::trim).filter(|v| !v.is_empty()) {
                    tokens.push(CitationToken {
                        value: value.to_string(),
                        span: whole.range(),
                    });
                }
            }
        }

        for captures in self.parenthetical.captures_iter(text) {
            let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            if bracketed.iter().any(|r| r.start <= whole.start() && whole.end() <= r.end) {
                continue;
            }
            violations.push(format!(
                "parenthetical citation `{}`; expected [Citation: ...]",
                whole.as_str()
            ));
            tokens.push(CitationToken {
                value: inner.as_str().trim().to_string(),
                span: whole.range(),
            });
        }

        tokens.sort_by_key(|t| t.span.start);
        tokens
    }

    /// Claim sentences outside quotations, with the span of their verb.
    fn claims(&self, text: &str) -> Vec<(Range<usize>, Range<usize>)> {
        let Some(claim) = &self.claim else {
            return Vec::new();
        };
        let quoted: Vec<Range<usize>> = self.quoted.find_iter(text).map(|m| m.range()).collect();

        sentence_spans(text)
            .into_iter()
            .filter_map(|sentence| {
                let offset = sentence.start;
                let verb = claim
                    .find_iter(&text[sentence.clone()])
                    .map(|m| (offset + m.start())..(offset + m.end()))
                    .find(|verb| !quoted.iter().any(|q| q.start <= verb.start && verb.end <= q.end))?;
                Some((sentence, verb))
            })
            .collect()
    }
}

/// Byte distance between two spans; zero when they overlap.
fn distance(a: &Range<usize>, b: &Range<usize>) -> usize {
    if a.end <= b.start {
        b.start - a.end
    } else if b.end <= a.start {
        a.start - b.end
    } else {
        0
    }
}

/// Sentence ranges: split at newlines and at `.`/`!`/`?` followed by
/// whitespace or the end of text.
fn sentence_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((index, c)) = chars.next() {
        let boundary = match c {
            '\n' => true,
            '.' | '!' | '?' => chars.peek().is_none_or(|&(_, next)| next.is_whitespace()),
            _ => false,
        };
        if boundary {
            let end = index + c.len_utf8();
            if !text[start..end].trim().is_empty() {
                spans.push(start..end);
            }
            start = end;
        }
    }
    if !text[start..].trim().is_empty() {
        spans.push(start..text.len());
    }
    spans
}

/// Citations required per claim: (citations, per claims).
fn density_requirement(audience: Audience) -> (usize, usize) {
    match audience {
        Audience::Citizen => (1, 3),
        Audience::Lawyer => (1, 2),
        Audience::Judge => (1, 1),
    }
}

/// Missing share of the required citations, in basis points.
fn density_shortfall(audience: Audience, claims: usize, citations: usize) -> u32 {
    if claims == 0 {
        return 0;
    }
    let (per, of) = density_requirement(audience);
    let required = (claims * per).div_ceil(of);
    if citations >= required {
        return 0;
    }
    ((required - citations) * usize::from(BASIS_POINTS) / required) as u32
}

fn adjustment(result: &ValidationResult, density_shortfall: u32) -> ScoreDelta {
    let count = |n: usize| u32::try_from(n).unwrap_or(u32::MAX);
    [
        FABRICATION_PENALTY.saturating_mul(count(result.fabricated_references.len())),
        (UNSUPPORTED_CLAIM_PENALTY.saturating_mul(count(result.unsupported_claims.len())))
            .min(UNSUPPORTED_CLAIM_CAP),
        (FORMAT_PENALTY.saturating_mul(count(result.format_violations.len()))).min(FORMAT_CAP),
        density_shortfall * DENSITY_WEIGHT / u32::from(BASIS_POINTS),
    ]
    .into_iter()
    .map(|bp| ScoreDelta::penalty(bp.min(u32::from(BASIS_POINTS))))
    .fold(ScoreDelta::NONE, ScoreDelta::combine)
}

// =============================================================================
// TESTS
// =============================================================================
