//! # Query Parser
//!
//! Turns free text into exactly one typed `QueryIntent`.
//!
//! Classification is a pure function over the compiled `RuleTable`: each
//! intent signature scores its weight plus a bonus per extra matching
//! pattern, the best score wins, and ties fall back to a fixed priority
//! order. Nothing matching is not an error; the query degrades to
//! `ScenarioAnalysis` with low confidence.

use crate::error::ConfigError;
use crate::primitives::Score;
use crate::rules::{RuleTable, ScenarioRoute};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

// =============================================================================
// INTENT TYPES
// =============================================================================

/// What the user is asking for.
///
/// Variant order is the tie-break priority: earlier wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    SectionRetrieval,
    DefinitionLookup,
    RightsQuery,
    ScenarioAnalysis,
}

impl IntentType {
    /// All intents in priority order.
    pub const ALL: [IntentType; 4] = [
        Self::SectionRetrieval,
        Self::DefinitionLookup,
        Self::RightsQuery,
        Self::ScenarioAnalysis,
    ];

    /// Wire name, as serialized.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SectionRetrieval => "section_retrieval",
            Self::DefinitionLookup => "definition_lookup",
            Self::RightsQuery => "rights_query",
            Self::ScenarioAnalysis => "scenario_analysis",
        }
    }
}

impl fmt::Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something extracted from the query that must resolve against the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    SectionNumber(String),
    Quoted(String),
    LegalTerm(String),
    RightsVocabulary(String),
    Scenario {
        route: String,
        sections: Vec<String>,
        terms: Vec<String>,
    },
}

impl Entity {
    /// Surface text of the entity.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::SectionNumber(t)
            | Self::Quoted(t)
            | Self::LegalTerm(t)
            | Self::RightsVocabulary(t) => t,
            Self::Scenario { route, .. } => route,
        }
    }

    /// Human-readable label, e.g. `Section 35` or `"defect"`.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::SectionNumber(n) => format!("Section {n}"),
            Self::Scenario { route, .. } => format!("scenario {route}"),
            other => format!("\"{}\"", other.text()),
        }
    }

    fn dedup_key(&self) -> String {
        self.text().to_lowercase()
    }
}

/// Point in time the question is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalContext {
    Year(u16),
    Current,
}

/// Rough size of the question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryComplexity {
    Simple,
    Moderate,
    Complex,
}

/// Prior conversational turn, used to resolve follow-up questions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default)]
    pub prior_query: Option<String>,
}

impl SessionContext {
    /// Context carrying the previous question.
    #[must_use]
    pub fn with_prior_query(query: impl Into<String>) -> Self {
        Self {
            prior_query: Some(query.into()),
        }
    }
}

/// The classified query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryIntent {
    pub intent_type: IntentType,
    pub entities: Vec<Entity>,
    pub confidence: Score,
    /// Normalized query text.
    pub query: String,
    /// No signature matched; the intent is the default.
    pub degraded: bool,
    /// Entities were taken from the prior turn.
    pub inherited_entities: bool,
    pub temporal: Option<TemporalContext>,
    pub complexity: QueryComplexity,
    pub rules_version: String,
}

// =============================================================================
// PARSER
// =============================================================================

#[derive(Debug)]
struct CompiledRule {
    intent: IntentType,
    weight: Score,
    patterns: Vec<Regex>,
}

#[derive(Debug)]
struct TermMatcher {
    term: String,
    pattern: Regex,
}

#[derive(Debug)]
struct CompiledRoute {
    route: ScenarioRoute,
    triggers: Vec<Regex>,
}

/// Compiled rule table.
#[derive(Debug)]
pub struct QueryParser {
    version: String,
    rules: Vec<CompiledRule>,
    legal_terms: Vec<TermMatcher>,
    rights_vocabulary: Vec<TermMatcher>,
    routes: Vec<CompiledRoute>,
    fallback_confidence: Score,
    match_bonus: Score,
    section_number: Regex,
    quoted: Regex,
    year: Regex,
    current: Regex,
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

fn word_matcher(term: &str) -> Result<TermMatcher, ConfigError> {
    let escaped = regex::escape(term.trim()).replace(' ', r"\s+");
    Ok(TermMatcher {
        term: term.trim().to_lowercase(),
        pattern: compile(&format!(r"\b{escaped}\b"))?,
    })
}

impl QueryParser {
    /// Compile a rule table.
    pub fn new(table: &RuleTable) -> Result<Self, ConfigError> {
        let rules = table
            .intents
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    intent: rule.intent,
                    weight: rule.weight,
                    patterns: rule
                        .patterns
                        .iter()
                        .map(|p| compile(p))
                        .collect::<Result<_, _>>()?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let mut legal_terms = table
            .legal_terms
            .iter()
            .map(|t| word_matcher(t))
            .collect::<Result<Vec<_>, _>>()?;
        // Longest first so overlapping shorter terms can be suppressed.
        legal_terms.sort_by(|a, b| b.term.len().cmp(&a.term.len()).then(a.term.cmp(&b.term)));

        let rights_vocabulary = table
            .rights_vocabulary
            .iter()
            .map(|t| word_matcher(t))
            .collect::<Result<Vec<_>, _>>()?;

        let routes = table
            .scenario_routes
            .iter()
            .map(|route| {
                Ok(CompiledRoute {
                    route: route.clone(),
                    triggers: route
                        .triggers
                        .iter()
                        .map(|t| word_matcher(t).map(|m| m.pattern))
                        .collect::<Result<_, _>>()?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            version: table.version.clone(),
            rules,
            legal_terms,
            rights_vocabulary,
            routes,
            fallback_confidence: table.fallback_confidence,
            match_bonus: table.match_bonus,
            section_number: compile(r"\b(?:section|sec\.?|s\.)\s*(\d+(?:\.\d+)*)")?,
            quoted: compile(r#"["“]([^"“”]{2,80})["”]"#)?,
            year: compile(r"\b((?:19|20)\d{2})\b")?,
            current: compile(r"\b(?:current|currently|latest|now|today|presently)\b")?,
        })
    }

    /// Version of the compiled rule table.
    #[must_use]
    pub fn rules_version(&self) -> &str {
        &self.version
    }

    /// Classify `text`, optionally in the light of the previous turn.
    #[must_use]
    pub fn parse(&self, text: &str, session: Option<&SessionContext>) -> QueryIntent {
        let query = text.split_whitespace().collect::<Vec<_>>().join(" ");

        if !query.chars().any(char::is_alphanumeric) {
            debug!("empty query, degraded to scenario analysis");
            return QueryIntent {
                intent_type: IntentType::ScenarioAnalysis,
                entities: Vec::new(),
                confidence: Score::ZERO,
                query,
                degraded: true,
                inherited_entities: false,
                temporal: None,
                complexity: QueryComplexity::Simple,
                rules_version: self.version.clone(),
            };
        }

        let mut entities = self.extract_entities(&query);
        let mut inherited_entities = false;
        if entities.is_empty() {
            if let Some(prior) = session.and_then(|s| s.prior_query.as_deref()) {
                entities = self.extract_entities(prior);
                inherited_entities = !entities.is_empty();
            }
        }

        let (intent_type, mut confidence, degraded) = match self.classify(&query) {
            Some((intent, score)) => (intent, score, false),
            None => {
                debug!(query = %query, "no intent signature matched, degraded to scenario analysis");
                (IntentType::ScenarioAnalysis, self.fallback_confidence, true)
            }
        };
        if inherited_entities {
            confidence = confidence.halved();
        }

        let complexity = complexity_of(&query, entities.len());
        QueryIntent {
            intent_type,
            temporal: self.temporal_context(&query),
            entities,
            confidence,
            query,
            degraded,
            inherited_entities,
            complexity,
            rules_version: self.version.clone(),
        }
    }

    /// Best-scoring intent, ties broken by priority.
    fn classify(&self, query: &str) -> Option<(IntentType, Score)> {
        let mut best: Option<(IntentType, Score)> = None;
        for rule in &self.rules {
            let matches = rule.patterns.iter().filter(|p| p.is_match(query)).count();
            if matches == 0 {
                continue;
            }
            let bonus = u32::from(self.match_bonus.basis_points())
                .saturating_mul(matches.saturating_sub(1) as u32);
            let score = Score::new(
                u32::from(rule.weight.basis_points())
                    .saturating_add(bonus)
                    .min(u32::from(u16::MAX)) as u16,
            );
            let better = match best {
                None => true,
                Some((intent, current)) => {
                    score > current || (score == current && rule.intent < intent)
                }
            };
            if better {
                best = Some((rule.intent, score));
            }
        }
        best
    }

    fn extract_entities(&self, query: &str) -> Vec<Entity> {
        let mut entities = Vec::new();

        for caps in self.section_number.captures_iter(query) {
            if let Some(number) = caps.get(1) {
                entities.push(Entity::SectionNumber(number.as_str().to_string()));
            }
        }

        for caps in self.quoted.captures_iter(query) {
            if let Some(quoted) = caps.get(1) {
                entities.push(Entity::Quoted(quoted.as_str().trim().to_lowercase()));
            }
        }

        let mut claimed: Vec<(usize, usize)> = Vec::new();
        let mut terms: Vec<(usize, String)> = Vec::new();
        for matcher in &self.legal_terms {
            for found in matcher.pattern.find_iter(query) {
                let span = (found.start(), found.end());
                if claimed.iter().any(|&(s, e)| span.0 < e && s < span.1) {
                    continue;
                }
                claimed.push(span);
                terms.push((span.0, matcher.term.clone()));
            }
        }
        terms.sort();
        entities.extend(terms.into_iter().map(|(_, t)| Entity::LegalTerm(t)));

        let mut vocabulary: Vec<(usize, String)> = self
            .rights_vocabulary
            .iter()
            .filter_map(|m| m.pattern.find(query).map(|f| (f.start(), m.term.clone())))
            .collect();
        vocabulary.sort();
        entities.extend(vocabulary.into_iter().map(|(_, t)| Entity::RightsVocabulary(t)));

        for compiled in &self.routes {
            if compiled.triggers.iter().any(|t| t.is_match(query)) {
                entities.push(Entity::Scenario {
                    route: compiled.route.name.clone(),
                    sections: compiled.route.sections.clone(),
                    terms: compiled.route.terms.clone(),
                });
            }
        }

        let mut seen = std::collections::BTreeSet::new();
        entities.retain(|e| seen.insert(e.dedup_key()));
        entities
    }

    fn temporal_context(&self, query: &str) -> Option<TemporalContext> {
        let lower = query.to_lowercase();
        for caps in self.year.captures_iter(&lower) {
            let Some(found) = caps.get(1) else { continue };
            // "the Act, 2019" names the statute, not a point in time.
            let before = lower[..found.start()].trim_end().trim_end_matches(',').trim_end();
            if before.ends_with("act") {
                continue;
            }
            if let Ok(year) = found.as_str().parse::<u16>() {
                return Some(TemporalContext::Year(year));
            }
        }
        self.current
            .is_match(&lower)
            .then_some(TemporalContext::Current)
    }
}

fn complexity_of(query: &str, entity_count: usize) -> QueryComplexity {
    let words = query.split_whitespace().count();
    if words <= 6 && entity_count <= 1 {
        QueryComplexity::Simple
    } else if words <= 15 && entity_count <= 3 {
        QueryComplexity::Moderate
    } else {
        QueryComplexity::Complex
    }
}

// =============================================================================
// TESTS
// =============================================================================
