//! # Pipeline
//!
//! Parse, traverse, build context, explain, validate, score.
//!
//! A request pins one snapshot for its whole life. The split between
//! `prepare` and `finalize` is the external-call boundary: callers that
//! run the explainer elsewhere (another thread, an async task, with a
//! deadline) hold the `PreparedQuery` across it, and validation can only
//! start once they hand the explainer's result back.

use crate::cache::{CacheStats, LruCache};
use crate::compositor::Compositor;
use crate::confidence::{
    ConfidenceLevel, ConfidenceScore, ConfidenceScorer, ConfidenceSignals, temporal_validity,
};
use crate::config::PipelineConfig;
use crate::context::{Audience, ContextBuilder, LlmContext};
use crate::error::{ConfigError, ExplainerError};
use crate::explainer::{Explainer, Explanation, ExplanationRequest};
use crate::graph::GraphStore;
use crate::grounding::{CitationCheck, verify_citations};
use crate::prompt::{disclaimer, instructions, suggestions};
use crate::query::{QueryIntent, QueryParser, SessionContext, TemporalContext};
use crate::response::{Fact, Outcome, QueryId, QueryResponse, ReasoningTrace, ScopeMetadata, Unknown};
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::traversal::{GraphContext, TraversalEngine};
use crate::validation::{ResponseValidator, ValidationResult};
use crate::{Score, ScoreDelta};
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// A query taken up to the external-call boundary.
#[derive(Debug)]
pub struct PreparedQuery {
    query_id: QueryId,
    snapshot: Arc<Snapshot>,
    audience: Audience,
    intent: QueryIntent,
    traversal: GraphContext,
    context: LlmContext,
    instructions: String,
}

impl PreparedQuery {
    #[must_use]
    pub fn query_id(&self) -> QueryId {
        self.query_id
    }

    #[must_use]
    pub fn intent(&self) -> &QueryIntent {
        &self.intent
    }

    #[must_use]
    pub fn traversal(&self) -> &GraphContext {
        &self.traversal
    }

    #[must_use]
    pub fn context(&self) -> &LlmContext {
        &self.context
    }

    /// Version of the pinned snapshot.
    #[must_use]
    pub fn snapshot_version(&self) -> &str {
        self.snapshot.version()
    }

    /// Whether anything was found worth explaining.
    ///
    /// False for an empty retrieval and when no entity resolved; such
    /// queries are answered without calling the explainer.
    #[must_use]
    pub fn needs_explanation(&self) -> bool {
        !self.context.is_empty() && self.traversal.coverage > Score::ZERO
    }

    /// Whether retrieval succeeded but every fact exceeded the context budget.
    #[must_use]
    pub fn context_exhausted(&self) -> bool {
        self.context.is_empty()
            && self.context.metadata.truncated()
            && self.traversal.coverage > Score::ZERO
    }

    /// Citations of the facts the context budget left out, in omission order.
    fn omitted_citations(&self) -> Vec<String> {
        self.context
            .metadata
            .omitted
            .iter()
            .filter_map(|id| {
                self.traversal
                    .citations
                    .get(id)
                    .cloned()
                    .or_else(|| self.snapshot.graph().citation(id).map(str::to_string))
            })
            .collect()
    }

    /// What to send to the explainer.
    #[must_use]
    pub fn request(&self) -> ExplanationRequest<'_> {
        ExplanationRequest {
            instructions: &self.instructions,
            context_text: &self.context.formatted_text,
            audience: self.audience,
            query: &self.intent.query,
        }
    }
}

/// The grounding pipeline over a swappable snapshot.
#[derive(Debug)]
pub struct Pipeline {
    store: Arc<SnapshotStore>,
    parser: QueryParser,
    traversal: TraversalEngine,
    builder: ContextBuilder,
    validator: ResponseValidator,
    scorer: ConfidenceScorer,
    traces: Mutex<LruCache<QueryId, ReasoningTrace>>,
    next_id: AtomicU64,
}

impl Pipeline {
    /// Compile `config` into a pipeline serving `store`.
    pub fn new(store: Arc<SnapshotStore>, config: &PipelineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            store,
            parser: QueryParser::new(&config.rules)?,
            traversal: TraversalEngine::new(config.max_nodes, config.keyword_hits_per_entity),
            builder: ContextBuilder::new(config.max_context_chars, config.citizen_budget_percent),
            validator: ResponseValidator::new(&config.validator)?,
            scorer: ConfidenceScorer::new(config.weights, config.thresholds)?,
            traces: Mutex::new(LruCache::new(config.trace_cache_size)),
            next_id: AtomicU64::new(1),
        })
    }

    /// The snapshot store this pipeline reads from.
    #[must_use]
    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Parse, traverse and build the explainer context.
    pub fn prepare(
        &self,
        text: &str,
        audience: Audience,
        session: Option<&SessionContext>,
    ) -> PreparedQuery {
        let query_id = QueryId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let snapshot = self.store.current();

        let intent = self.parser.parse(text, session);
        debug!(
            %query_id,
            intent = %intent.intent_type,
            entities = intent.entities.len(),
            degraded = intent.degraded,
            "query parsed"
        );

        let traversal = self.traversal.traverse(snapshot.graph(), &intent);
        let context = self.builder.build(
            snapshot.graph(),
            &traversal,
            audience,
            intent.intent_type,
            snapshot.version(),
        );
        debug!(
            %query_id,
            facts = context.facts.len(),
            citations = context.citation_map.len(),
            used_chars = context.metadata.used_chars,
            "context built"
        );

        PreparedQuery {
            query_id,
            instructions: instructions(audience, intent.intent_type),
            snapshot,
            audience,
            intent,
            traversal,
            context,
        }
    }

    /// Validate and score the explainer's result.
    ///
    /// A failed explainer is answered with the quoted fallback, which goes
    /// through the same checks.
    pub fn finalize(
        &self,
        prepared: PreparedQuery,
        explanation: Result<Explanation, ExplainerError>,
    ) -> QueryResponse {
        if !prepared.needs_explanation() {
            return self.finalize_without_explanation(prepared);
        }

        let (explanation, used_fallback) = match explanation {
            Ok(explanation) => (explanation, false),
            Err(error) => {
                warn!(
                    query_id = %prepared.query_id,
                    %error,
                    "explainer failed, answering with quoted provisions"
                );
                (Explanation::new(Compositor::fallback(&prepared.context)), true)
            }
        };

        let validation = self.validator.validate(
            &explanation.text,
            &prepared.context.citation_map,
            prepared.audience,
        );
        debug!(
            query_id = %prepared.query_id,
            valid = validation.is_valid,
            claims = validation.claim_count,
            citations = validation.valid_citation_count,
            "explanation validated"
        );

        let mut confidence = self.scorer.score(&self.signals(
            &prepared,
            Some(&validation),
            explanation.uncertainty,
        ));
        if !validation.is_valid {
            confidence.requires_review = true;
            confidence.review_reasons.push(format!(
                "{} fabricated citation(s)",
                validation.fabricated_references.len()
            ));
        }

        let outcome = if !validation.is_valid || confidence.level.blocks_display() {
            Outcome::Blocked
        } else if confidence.requires_review {
            Outcome::Flagged
        } else {
            Outcome::Delivered
        };
        let response_text = match outcome {
            Outcome::Blocked => Compositor::blocked(prepared.audience),
            Outcome::Delivered | Outcome::Flagged => explanation.text,
        };
        let citations = validation.citations_found.clone();

        self.respond(prepared, response_text, citations, confidence, outcome, Some(validation), used_fallback)
    }

    /// Answer a query that retrieved nothing usable.
    ///
    /// When the provisions were found but none fit the context budget, the
    /// reply is flagged and lists them instead of claiming nothing exists.
    pub fn finalize_without_explanation(&self, prepared: PreparedQuery) -> QueryResponse {
        let mut confidence = self.scorer.score(&self.signals(&prepared, None, None));
        if prepared.context_exhausted() {
            let citations = prepared.omitted_citations();
            warn!(
                query_id = %prepared.query_id,
                omitted = prepared.context.metadata.omitted.len(),
                budget = prepared.context.metadata.budget_chars,
                "every retrieved fact exceeded the context budget"
            );
            if !confidence.requires_review {
                confidence.requires_review = true;
                confidence
                    .review_reasons
                    .push("retrieved provisions exceed the context limit".to_string());
            }
            return self.respond(
                prepared,
                Compositor::truncated(&citations),
                citations,
                confidence,
                Outcome::Flagged,
                None,
                false,
            );
        }
        self.respond(
            prepared,
            Compositor::information_not_available(),
            Vec::new(),
            confidence,
            Outcome::Blocked,
            None,
            false,
        )
    }

    /// Run one query end to end.
    pub fn process_query(
        &self,
        text: &str,
        audience: Audience,
        session: Option<&SessionContext>,
        explainer: &dyn Explainer,
    ) -> QueryResponse {
        let prepared = self.prepare(text, audience, session);
        if !prepared.needs_explanation() {
            return self.finalize_without_explanation(prepared);
        }
        debug!(query_id = %prepared.query_id, explainer = explainer.name(), "calling explainer");
        let explanation = explainer.explain(&prepared.request());
        self.finalize(prepared, explanation)
    }

    /// Check citation strings against the current snapshot.
    pub fn validate_citations<S: AsRef<str>>(&self, citations: &[S]) -> Vec<CitationCheck> {
        let snapshot = self.store.current();
        verify_citations(snapshot.graph(), citations)
    }

    /// How a recent query was answered, if its trace is still cached.
    pub fn explain_reasoning(&self, query_id: QueryId) -> Option<ReasoningTrace> {
        self.traces.lock().get(&query_id).cloned()
    }

    #[must_use]
    pub fn trace_cache_stats(&self) -> CacheStats {
        self.traces.lock().stats()
    }

    fn signals(
        &self,
        prepared: &PreparedQuery,
        validation: Option<&ValidationResult>,
        uncertainty: Option<Score>,
    ) -> ConfidenceSignals {
        let graph = prepared.snapshot.graph();
        let reference = match prepared.intent.temporal {
            Some(TemporalContext::Year(year)) => NaiveDate::from_ymd_opt(i32::from(year), 12, 31),
            Some(TemporalContext::Current) | None => prepared.snapshot.as_of(),
        };
        ConfidenceSignals {
            coverage: prepared.traversal.coverage,
            claim_count: validation.map_or(0, |v| v.claim_count),
            valid_citations: validation.map_or(0, |v| v.valid_citation_count),
            context_citation_ratio: prepared.context.cited_fact_ratio(),
            max_hops_used: prepared.traversal.max_hops_used,
            dropped_paths: prepared.traversal.dropped.len(),
            omitted_facts: prepared.context.metadata.omitted.len(),
            primary_omitted: prepared
                .context
                .metadata
                .omitted
                .iter()
                .any(|id| prepared.traversal.node(id).is_some_and(|n| n.is_seed())),
            uncertainty,
            temporal_validity: temporal_validity(graph, &prepared.traversal, reference),
            adjustment: validation.map_or(ScoreDelta::NONE, |v| v.confidence_adjustment),
            unsupported_claims: validation.map_or(0, |v| v.unsupported_claims.len()),
            prohibited_language: validation.map_or(0, |v| v.prohibited_language.len()),
            audience: prepared.audience,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn respond(
        &self,
        prepared: PreparedQuery,
        response_text: String,
        citations: Vec<String>,
        confidence: ConfidenceScore,
        outcome: Outcome,
        validation: Option<ValidationResult>,
        used_fallback: bool,
    ) -> QueryResponse {
        let PreparedQuery {
            query_id,
            snapshot,
            audience,
            intent,
            traversal,
            context,
            ..
        } = prepared;
        let information_available = validation.is_some() || context.metadata.truncated();

        let facts = context
            .facts
            .iter()
            .map(|f| Fact::new(f.text.clone(), f.citation.clone(), vec![f.node_id.clone()]))
            .collect();
        let unknowns = traversal
            .unresolved()
            .map(|entity| {
                Unknown::new(
                    entity.label(),
                    format!("no matching provision in snapshot {}", snapshot.version()),
                )
            })
            .collect();

        let scope = ScopeMetadata {
            snapshot_version: snapshot.version().to_string(),
            intent: intent.intent_type,
            audience,
            coverage: traversal.coverage,
            nodes_retrieved: traversal.nodes.len(),
            used_fallback,
            information_available,
            disclaimer: disclaimer(audience).to_string(),
            notice: (confidence.level != ConfidenceLevel::High)
                .then(|| confidence.message().to_string()),
            suggestions: suggestions(intent.intent_type),
        };

        info!(
            %query_id,
            snapshot = snapshot.version(),
            intent = %intent.intent_type,
            %audience,
            outcome = %outcome,
            confidence = %confidence.overall,
            level = %confidence.level,
            fallback = used_fallback,
            "query answered"
        );

        let trace = ReasoningTrace {
            query_id,
            snapshot_version: snapshot.version().to_string(),
            intent,
            resolutions: traversal.resolutions,
            steps: traversal.steps,
            dropped: traversal.dropped,
            broken_references: traversal.broken_references,
            context: context.metadata,
            citations_used: citations.clone(),
            confidence: confidence.clone(),
            outcome,
        };
        self.traces.lock().insert(query_id, trace);

        QueryResponse {
            query_id,
            response_text,
            citations,
            requires_review: confidence.requires_review,
            confidence,
            outcome,
            facts,
            unknowns,
            validation,
            scope,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explainer::{OfflineExplainer, StaticExplainer};
    use crate::graph::Graph;
    use crate::prompt::{BLOCKED_NOTICE, FALLBACK_HEADER, INFORMATION_NOT_AVAILABLE, TRUNCATED_NOTICE};
    use crate::types::{Definition, Section};
    use crate::{Node, NodeId};

    fn pipeline() -> Pipeline {
        let section = Node::Section(Section {
            id: NodeId::from("S2"),
            act: "Act".to_string(),
            number: "2".to_string(),
            title: "Definitions".to_string(),
            text: "In this Act, unless the context otherwise requires".to_string(),
            chapter: Some("I".to_string()),
            page: None,
            effective_date: None,
        });
        let definition = Node::Definition(Definition {
            id: NodeId::from("DEF_consumer"),
            term: "consumer".to_string(),
            text: "any person who buys any goods for a consideration".to_string(),
            defined_in_section_id: NodeId::from("S2"),
            clause_ref: None,
        });
        let graph = Graph::new(vec![section, definition], Vec::new()).unwrap();
        let store = SnapshotStore::new(Snapshot::new("v1", None, graph).unwrap());
        Pipeline::new(Arc::new(store), &PipelineConfig::default()).unwrap()
    }

    #[test]
    fn definition_with_offline_explainer_uses_fallback() {
        let pipeline = pipeline();
        let response =
            pipeline.process_query("What is a consumer?", Audience::Citizen, None, &OfflineExplainer);

        assert!(response.scope.used_fallback);
        assert!(response.response_text.starts_with(FALLBACK_HEADER));
        assert_eq!(response.citations, vec!["Act, Section 2".to_string()]);
        assert_eq!(response.outcome, Outcome::Delivered);
        assert!(response.confidence.overall >= Score::new(7_000));
        assert_eq!(response.facts.len(), 1);
    }

    #[test]
    fn missing_section_is_not_explained() {
        let pipeline = pipeline();
        let explainer = StaticExplainer::new(Explanation::new("made up [Citation: Section 999]"));
        let response = pipeline.process_query("Section 999", Audience::Citizen, None, &explainer);

        assert_eq!(response.response_text, INFORMATION_NOT_AVAILABLE);
        assert_eq!(response.outcome, Outcome::Blocked);
        assert!(!response.scope.information_available);
        assert!(response.validation.is_none());
        assert!(response.confidence.overall < Score::NEUTRAL);
        assert_eq!(response.unknowns.len(), 1);
        assert_eq!(response.unknowns[0].query, "Section 999");
    }

    #[test]
    fn provision_longer_than_the_budget_is_flagged_not_missing() {
        let section = Node::Section(Section {
            id: NodeId::from("S35"),
            act: "Act".to_string(),
            number: "35".to_string(),
            title: "Manner of complaint".to_string(),
            text: "A complaint may be filed with the District Commission. ".repeat(110),
            chapter: None,
            page: None,
            effective_date: None,
        });
        let graph = Graph::new(vec![section], Vec::new()).unwrap();
        let store = SnapshotStore::new(Snapshot::new("v1", None, graph).unwrap());
        let config = PipelineConfig {
            max_context_chars: 500,
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(Arc::new(store), &config).unwrap();

        let prepared = pipeline.prepare("Section 35", Audience::Citizen, None);
        assert!(prepared.context_exhausted());
        assert!(!prepared.needs_explanation());

        let explainer = StaticExplainer::new(Explanation::new("never asked"));
        let response = pipeline.process_query("Section 35", Audience::Citizen, None, &explainer);

        assert_eq!(response.outcome, Outcome::Flagged);
        assert!(response.response_text.starts_with(TRUNCATED_NOTICE));
        assert!(response.response_text.ends_with("- Act, Section 35"));
        assert_eq!(response.citations, vec!["Act, Section 35".to_string()]);
        assert!(response.scope.information_available);
        assert!(response.requires_review);
        assert!(response
            .confidence
            .review_reasons
            .iter()
            .any(|r| r.contains("context limit")));
        assert!(response.facts.is_empty());
        assert!(response.validation.is_none());

        let trace = pipeline.explain_reasoning(response.query_id).unwrap();
        assert_eq!(trace.context.omitted, vec![NodeId::from("S35")]);
    }

    #[test]
    fn fabricated_citation_blocks_delivery() {
        let pipeline = pipeline();
        let explainer = StaticExplainer::new(Explanation::new(
            "A consumer is a buyer [Citation: Section 77].",
        ));
        let response = pipeline.process_query("What is a consumer?", Audience::Lawyer, None, &explainer);

        assert_eq!(response.outcome, Outcome::Blocked);
        assert!(response.response_text.starts_with(BLOCKED_NOTICE));
        assert!(response.requires_review);
        let validation = response.validation.unwrap();
        assert_eq!(validation.fabricated_references, vec!["Section 77".to_string()]);
        assert!(!validation.is_valid);
        assert!(!response.facts.is_empty());
    }

    #[test]
    fn reasoning_trace_is_kept_per_query() {
        let pipeline = pipeline();
        let first = pipeline.process_query("What is a consumer?", Audience::Judge, None, &OfflineExplainer);
        let second = pipeline.process_query("Section 999", Audience::Judge, None, &OfflineExplainer);
        assert_ne!(first.query_id, second.query_id);

        let trace = pipeline.explain_reasoning(first.query_id).unwrap();
        assert_eq!(trace.snapshot_version, "v1");
        assert_eq!(trace.steps.len(), 1);
        assert_eq!(trace.citations_used, vec!["Act, Section 2".to_string()]);
        assert!(pipeline.explain_reasoning(QueryId(9_999)).is_none());
        assert_eq!(pipeline.trace_cache_stats().size, 2);
    }

    #[test]
    fn prepared_query_pins_its_snapshot() {
        let pipeline = pipeline();
        let prepared = pipeline.prepare("What is a consumer?", Audience::Citizen, None);
        pipeline.store().replace(Snapshot::empty("v2"));

        assert_eq!(prepared.snapshot_version(), "v1");
        let response = pipeline.finalize(prepared, Err(ExplainerError::Timeout));
        assert_eq!(response.scope.snapshot_version, "v1");
        assert!(response.scope.used_fallback);

        let after = pipeline.validate_citations(&["Act, Section 2"]);
        assert!(!after[0].exists);
    }
}
