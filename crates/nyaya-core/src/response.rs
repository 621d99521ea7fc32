//! # Response Module
//!
//! What the pipeline hands back: the answer with its audit trail, and the
//! reasoning trace kept for `explain_reasoning`.
//!
//! - Every fact carries the citation and node ids it came from
//! - Every unresolved entity is reported as an unknown, never filled in
//! - Blocked answers keep their facts so reviewers can see what was found

use crate::confidence::ConfidenceScore;
use crate::context::{Audience, ContextMetadata};
use crate::query::{IntentType, QueryIntent};
use crate::traversal::{BrokenReference, DroppedPath, EntityResolution, TraversalStep};
use crate::validation::ValidationResult;
use crate::{NodeId, Score};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one processed query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(pub u64);

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// A statement quoted from the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub statement: String,
    pub citation: String,
    /// Nodes the statement was taken from.
    pub node_ids: Vec<NodeId>,
}

impl Fact {
    #[must_use]
    pub fn new(statement: impl Into<String>, citation: impl Into<String>, node_ids: Vec<NodeId>) -> Self {
        Self {
            statement: statement.into(),
            citation: citation.into(),
            node_ids,
        }
    }
}

/// Something the query asked about that the graph does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unknown {
    /// The entity as it appeared in the query.
    pub query: String,
    /// What was missing.
    pub explanation: String,
}

impl Unknown {
    #[must_use]
    pub fn new(query: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            explanation: explanation.into(),
        }
    }
}

/// Whether the answer reached the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Delivered,
    /// Shown, but flagged for expert review.
    Flagged,
    /// Explanation withheld.
    Blocked,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Delivered => "delivered",
            Self::Flagged => "flagged for review",
            Self::Blocked => "blocked",
        })
    }
}

/// How much of the knowledge base the answer rests on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeMetadata {
    pub snapshot_version: String,
    pub intent: IntentType,
    pub audience: Audience,
    pub coverage: Score,
    pub nodes_retrieved: usize,
    /// The explainer failed and the answer is the quoted fallback.
    pub used_fallback: bool,
    pub information_available: bool,
    pub disclaimer: String,
    /// Confidence notice for the user, if the level calls for one.
    pub notice: Option<String>,
    pub suggestions: Vec<String>,
}

/// The answer to one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query_id: QueryId,
    pub response_text: String,
    /// Resolved citations the answer actually uses.
    pub citations: Vec<String>,
    pub confidence: ConfidenceScore,
    pub requires_review: bool,
    pub outcome: Outcome,
    pub facts: Vec<Fact>,
    pub unknowns: Vec<Unknown>,
    /// Absent when the explainer was never called.
    pub validation: Option<ValidationResult>,
    pub scope: ScopeMetadata,
}

impl QueryResponse {
    /// Whether the answer may be shown as is.
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        self.outcome != Outcome::Blocked
    }

    /// Plain-text report for operators.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "Query {} | {} | confidence {} ({}) | snapshot {}\n",
            self.query_id,
            self.outcome,
            self.confidence.overall,
            self.confidence.level,
            self.scope.snapshot_version
        ));
        output.push_str("┌─────────────────────────────────────┐\n");
        output.push_str("│ FACTS (Quoted from the statute)     │\n");

        if self.facts.is_empty() {
            output.push_str("│ - (none)                            │\n");
        } else {
            for fact in &self.facts {
                let nodes = fact
                    .node_ids
                    .iter()
                    .map(NodeId::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                output.push_str(&format!(
                    "│ - {} [Citation: {}] [nodes: {}]\n",
                    fact.statement, fact.citation, nodes
                ));
            }
        }

        output.push_str("├─────────────────────────────────────┤\n");
        output.push_str("│ UNKNOWN (Not in the knowledge base) │\n");

        if self.unknowns.is_empty() {
            output.push_str("│ - (none)                            │\n");
        } else {
            for unknown in &self.unknowns {
                output.push_str(&format!("│ - {}: {}\n", unknown.query, unknown.explanation));
            }
        }

        output.push_str("└─────────────────────────────────────┘\n");

        if self.requires_review {
            for reason in &self.confidence.review_reasons {
                output.push_str(&format!("review: {reason}\n"));
            }
        }
        output
    }
}

// =============================================================================
// REASONING TRACE
// =============================================================================

/// How an answer was reached, for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningTrace {
    pub query_id: QueryId,
    pub snapshot_version: String,
    pub intent: QueryIntent,
    pub resolutions: Vec<EntityResolution>,
    pub steps: Vec<TraversalStep>,
    pub dropped: Vec<DroppedPath>,
    pub broken_references: Vec<BrokenReference>,
    pub context: ContextMetadata,
    pub citations_used: Vec<String>,
    pub confidence: ConfidenceScore,
    pub outcome: Outcome,
}

impl ReasoningTrace {
    /// Sectioned plain-text rendering.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut output = format!(
            "REASONING TRACE {} (snapshot {})\n",
            self.query_id, self.snapshot_version
        );

        output.push_str("\n1. QUERY ANALYSIS\n");
        output.push_str(&format!(
            "   intent: {} (confidence {}{})\n",
            self.intent.intent_type,
            self.intent.confidence,
            if self.intent.degraded { ", degraded" } else { "" }
        ));
        if self.intent.entities.is_empty() {
            output.push_str("   entities: (none)\n");
        }
        for resolution in &self.resolutions {
            let target = if resolution.is_resolved() {
                resolution
                    .resolved
                    .iter()
                    .map(NodeId::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            } else {
                "unresolved".to_string()
            };
            output.push_str(&format!("   entity {} -> {}\n", resolution.entity.label(), target));
        }

        output.push_str("\n2. GRAPH TRAVERSAL\n");
        if self.steps.is_empty() {
            output.push_str("   no nodes retrieved\n");
        }
        for step in &self.steps {
            match &step.via {
                Some(edge) => output.push_str(&format!(
                    "   [{} hop] {} via {} {} -> {}\n",
                    step.hops, step.node, edge.relation, edge.from, edge.to
                )),
                None => output.push_str(&format!("   [seed] {} ({:?})\n", step.node, step.strategy)),
            }
        }
        for dropped in &self.dropped {
            output.push_str(&format!(
                "   dropped {} at {} hops ({:?})\n",
                dropped.to, dropped.hops, dropped.reason
            ));
        }
        for broken in &self.broken_references {
            output.push_str(&format!(
                "   broken {} reference {} -> {}\n",
                broken.relation, broken.from, broken.to
            ));
        }

        output.push_str("\n3. CONTEXT CONSTRUCTION\n");
        output.push_str(&format!(
            "   audience: {}, {} of {} chars used\n",
            self.context.audience, self.context.used_chars, self.context.budget_chars
        ));
        if self.context.truncated() {
            output.push_str(&format!(
                "   omitted for budget: {}\n",
                self.context
                    .omitted
                    .iter()
                    .map(NodeId::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        for citation in &self.citations_used {
            output.push_str(&format!("   cited: {citation}\n"));
        }

        output.push_str("\n4. OVERALL ASSESSMENT\n");
        output.push_str(&format!(
            "   confidence {} ({}), outcome: {}\n",
            self.confidence.overall, self.confidence.level, self.outcome
        ));
        output.push_str(&format!(
            "   coverage {}, citation density {}, chain {}, uncertainty {}, temporal {}\n",
            self.confidence.coverage,
            self.confidence.citation_density,
            self.confidence.chain_length_penalty,
            self.confidence.model_uncertainty,
            self.confidence.temporal_validity
        ));
        for reason in &self.confidence.review_reasons {
            output.push_str(&format!("   review: {reason}\n"));
        }
        output
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::{ConfidenceScorer, ConfidenceSignals};
    use crate::primitives::ScoreDelta;
    use crate::query::{Entity, QueryComplexity};
    use crate::traversal::{DropReason, Strategy, TraversedEdge};
    use crate::Relation;
    use std::collections::BTreeMap;

    fn confidence() -> ConfidenceScore {
        ConfidenceScorer::default().score(&ConfidenceSignals {
            coverage: Score::MAX,
            claim_count: 0,
            valid_citations: 1,
            context_citation_ratio: Score::MAX,
            max_hops_used: 1,
            dropped_paths: 0,
            omitted_facts: 0,
            primary_omitted: false,
            uncertainty: None,
            temporal_validity: Score::MAX,
            adjustment: ScoreDelta::NONE,
            unsupported_claims: 0,
            prohibited_language: 0,
            audience: Audience::Citizen,
        })
    }

    fn response() -> QueryResponse {
        QueryResponse {
            query_id: QueryId(7),
            response_text: "text".to_string(),
            citations: vec!["Act, Section 35".to_string()],
            confidence: confidence(),
            requires_review: false,
            outcome: Outcome::Delivered,
            facts: vec![Fact::new(
                "A complaint may be filed",
                "Act, Section 35",
                vec![NodeId::from("S35")],
            )],
            unknowns: vec![Unknown::new("Section 999", "no such section in snapshot v1")],
            validation: None,
            scope: ScopeMetadata {
                snapshot_version: "v1".to_string(),
                intent: IntentType::SectionRetrieval,
                audience: Audience::Citizen,
                coverage: Score::new(5_000),
                nodes_retrieved: 1,
                used_fallback: false,
                information_available: true,
                disclaimer: String::new(),
                notice: None,
                suggestions: Vec::new(),
            },
        }
    }

    #[test]
    fn response_text_lists_facts_and_unknowns() {
        let text = response().to_text();
        assert!(text.starts_with("Query q7 | delivered"));
        assert!(text.contains("FACTS"));
        assert!(text.contains("A complaint may be filed [Citation: Act, Section 35] [nodes: S35]"));
        assert!(text.contains("UNKNOWN"));
        assert!(text.contains("Section 999: no such section in snapshot v1"));
    }

    #[test]
    fn blocked_response_is_not_delivered() {
        let mut blocked = response();
        assert!(blocked.is_delivered());
        blocked.outcome = Outcome::Blocked;
        assert!(!blocked.is_delivered());
    }

    #[test]
    fn trace_renders_all_sections() {
        let trace = ReasoningTrace {
            query_id: QueryId(3),
            snapshot_version: "v1".to_string(),
            intent: QueryIntent {
                intent_type: IntentType::SectionRetrieval,
                entities: vec![Entity::SectionNumber("35".to_string())],
                confidence: Score::new(9_500),
                query: "section 35".to_string(),
                degraded: false,
                inherited_entities: false,
                temporal: None,
                complexity: QueryComplexity::Simple,
                rules_version: "test".to_string(),
            },
            resolutions: vec![EntityResolution {
                entity: Entity::SectionNumber("35".to_string()),
                resolved: vec![NodeId::from("S35")],
            }],
            steps: vec![
                TraversalStep {
                    node: NodeId::from("S35"),
                    hops: 0,
                    strategy: Strategy::DirectLookup,
                    via: None,
                },
                TraversalStep {
                    node: NodeId::from("S39"),
                    hops: 1,
                    strategy: Strategy::Relationship,
                    via: Some(TraversedEdge {
                        from: NodeId::from("S35"),
                        to: NodeId::from("S39"),
                        relation: Relation::References,
                        context: None,
                    }),
                },
            ],
            dropped: vec![DroppedPath {
                from: Some(NodeId::from("S39")),
                to: NodeId::from("S40"),
                relation: Some(Relation::References),
                hops: 3,
                reason: DropReason::HopLimit,
            }],
            broken_references: Vec::new(),
            context: ContextMetadata {
                snapshot_version: "v1".to_string(),
                intent: IntentType::SectionRetrieval,
                audience: Audience::Lawyer,
                budget_chars: 8_000,
                used_chars: 420,
                block_counts: BTreeMap::new(),
                omitted: Vec::new(),
                uncited: Vec::new(),
            },
            citations_used: vec!["Act, Section 35".to_string()],
            confidence: confidence(),
            outcome: Outcome::Delivered,
        };

        let text = trace.to_text();
        for heading in ["QUERY ANALYSIS", "GRAPH TRAVERSAL", "CONTEXT CONSTRUCTION", "OVERALL ASSESSMENT"] {
            assert!(text.contains(heading), "missing {heading}");
        }
        assert!(text.contains("entity Section 35 -> S35"));
        assert!(text.contains("[seed] S35 (DirectLookup)"));
        assert!(text.contains("S39 via references S35 -> S39"));
        assert!(text.contains("dropped S40 at 3 hops (HopLimit)"));
        assert!(text.contains("cited: Act, Section 35"));
    }
}
