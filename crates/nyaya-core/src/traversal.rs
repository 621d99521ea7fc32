//! # Traversal Engine
//!
//! Resolves a `QueryIntent` against the graph and expands the result along
//! typed relations.
//!
//! Four strategies cooperate:
//! - direct lookup (section numbers, defined terms, scenario routes)
//! - keyword search over the inverted index
//! - relationship traversal, breadth-first from the seed set
//! - multi-hop reasoning (scenario queries expand every relation both ways)
//!
//! Expansion is bounded by the intent's hop limit (never above `MAX_HOPS`)
//! and a node cap. Anything cut off by a bound is recorded as a `DroppedPath`; links to missing nodes are
//! recorded as `BrokenReference` and skipped.

use crate::graph::{GraphStore, Link, normalize_text, tokenize};
use crate::primitives::{DEFAULT_KEYWORD_HITS, DEFAULT_MAX_NODES, MAX_HOPS, Score};
use crate::query::{Entity, IntentType, QueryIntent};
use crate::{Direction, Node, NodeId, NodeKind, Relation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, warn};

// =============================================================================
// RESULT TYPES
// =============================================================================

/// How a node entered the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    DirectLookup,
    KeywordSearch,
    Relationship,
    MultiHop,
}

/// Match quality. Ordering is ranking order: exact first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Partial,
    /// Reached by expansion, not matched against the query.
    Structural,
}

/// A node admitted into a `GraphContext`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedNode {
    pub node: Node,
    /// Hops from the nearest seed (seeds are 0).
    pub hops: u8,
    pub match_kind: MatchKind,
    pub strategy: Strategy,
}

impl RetrievedNode {
    #[must_use]
    pub fn id(&self) -> &NodeId {
        self.node.id()
    }

    /// Seeds are matched against the query directly.
    #[must_use]
    pub fn is_seed(&self) -> bool {
        self.hops == 0
    }
}

/// An edge walked during expansion, in the relation's own direction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TraversedEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub relation: Relation,
    pub context: Option<String>,
}

impl TraversedEdge {
    fn from_link(current: &NodeId, link: &Link) -> Self {
        let (from, to) = match link.direction {
            Direction::Forward => (current.clone(), link.target.clone()),
            Direction::Reverse => (link.target.clone(), current.clone()),
        };
        Self {
            from,
            to,
            relation: link.relation,
            context: link.context.clone(),
        }
    }
}

/// Why a path was not followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    HopLimit,
    NodeCap,
}

/// A path cut off by a traversal bound.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DroppedPath {
    /// `None` when a seed itself was dropped.
    pub from: Option<NodeId>,
    pub to: NodeId,
    pub relation: Option<Relation>,
    /// Hop distance the dropped node would have had.
    pub hops: u8,
    pub reason: DropReason,
}

/// A link whose target is not in the graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BrokenReference {
    pub from: NodeId,
    pub to: NodeId,
    pub relation: Relation,
}

/// One admission, in admission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalStep {
    pub node: NodeId,
    pub hops: u8,
    pub strategy: Strategy,
    pub via: Option<TraversedEdge>,
}

/// What one entity resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityResolution {
    pub entity: Entity,
    pub resolved: Vec<NodeId>,
}

impl EntityResolution {
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !self.resolved.is_empty()
    }
}

/// Everything retrieved for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphContext {
    /// Ranked, deduplicated nodes.
    pub nodes: Vec<RetrievedNode>,
    /// Deduplicated edges, sorted.
    pub edges: Vec<TraversedEdge>,
    /// Node id -> canonical citation.
    pub citations: BTreeMap<NodeId, String>,
    pub coverage: Score,
    pub resolutions: Vec<EntityResolution>,
    pub dropped: Vec<DroppedPath>,
    pub broken_references: Vec<BrokenReference>,
    pub steps: Vec<TraversalStep>,
    pub max_hops_used: u8,
}

impl GraphContext {
    /// Whether nothing was retrieved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Retrieved node by id.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&RetrievedNode> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    /// Entities that resolved to nothing.
    pub fn unresolved(&self) -> impl Iterator<Item = &Entity> {
        self.resolutions
            .iter()
            .filter(|r| !r.is_resolved())
            .map(|r| &r.entity)
    }
}

// =============================================================================
// EXPANSION PLANS
// =============================================================================

const ALL_LINKS: &[(Relation, Direction)] = &[
    (Relation::Contains, Direction::Forward),
    (Relation::Contains, Direction::Reverse),
    (Relation::References, Direction::Forward),
    (Relation::References, Direction::Reverse),
    (Relation::Defines, Direction::Forward),
    (Relation::Defines, Direction::Reverse),
    (Relation::GrantedBy, Direction::Forward),
    (Relation::GrantedBy, Direction::Reverse),
];

/// Relations an intent expands along, and how far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionPlan {
    pub links: &'static [(Relation, Direction)],
    pub max_hops: u8,
    pub strategy: Strategy,
}

impl ExpansionPlan {
    /// Plan for an intent. Never exceeds `MAX_HOPS`.
    #[must_use]
    pub fn for_intent(intent: IntentType) -> Self {
        match intent {
            IntentType::DefinitionLookup => Self {
                links: &[],
                max_hops: 0,
                strategy: Strategy::Relationship,
            },
            IntentType::SectionRetrieval => Self {
                links: &[
                    (Relation::Contains, Direction::Forward),
                    (Relation::References, Direction::Forward),
                ],
                max_hops: 2,
                strategy: Strategy::Relationship,
            },
            IntentType::RightsQuery => Self {
                links: &[
                    (Relation::GrantedBy, Direction::Forward),
                    (Relation::Contains, Direction::Reverse),
                ],
                max_hops: 2,
                strategy: Strategy::Relationship,
            },
            IntentType::ScenarioAnalysis => Self {
                links: ALL_LINKS,
                max_hops: MAX_HOPS,
                strategy: Strategy::MultiHop,
            },
        }
    }

    fn allows(&self, link: &Link) -> bool {
        self.links
            .iter()
            .any(|&(relation, direction)| link.relation == relation && link.direction == direction)
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Bounded retrieval over any `GraphStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalEngine {
    max_nodes: usize,
    keyword_hits: usize,
}

impl Default for TraversalEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NODES, DEFAULT_KEYWORD_HITS)
    }
}

struct Seed {
    id: NodeId,
    match_kind: MatchKind,
    strategy: Strategy,
}

impl TraversalEngine {
    #[must_use]
    pub fn new(max_nodes: usize, keyword_hits: usize) -> Self {
        Self {
            max_nodes: max_nodes.max(1),
            keyword_hits: keyword_hits.max(1),
        }
    }

    /// Retrieve the grounded context for `intent`.
    pub fn traverse<G: GraphStore>(&self, graph: &G, intent: &QueryIntent) -> GraphContext {
        let mut context = GraphContext::default();
        let seeds = self.resolve_entities(graph, intent, &mut context);

        let plan = ExpansionPlan::for_intent(intent.intent_type);
        self.expand(graph, &plan, seeds, &mut context);

        context.nodes.sort_by(|a, b| {
            (a.match_kind, a.hops, a.id()).cmp(&(b.match_kind, b.hops, b.id()))
        });
        context.max_hops_used = context.nodes.iter().map(|n| n.hops).max().unwrap_or(0);
        for retrieved in &context.nodes {
            if let Some(citation) = graph.citation(retrieved.id()) {
                context
                    .citations
                    .insert(retrieved.id().clone(), citation.to_string());
            }
        }

        let resolved = context.resolutions.iter().filter(|r| r.is_resolved()).count();
        context.coverage = Score::from_ratio(resolved as u64, context.resolutions.len() as u64);

        debug!(
            intent = %intent.intent_type,
            nodes = context.nodes.len(),
            coverage = %context.coverage,
            dropped = context.dropped.len(),
            "traversal complete"
        );
        context
    }

    /// Direct lookup and keyword search for each entity.
    fn resolve_entities<G: GraphStore>(
        &self,
        graph: &G,
        intent: &QueryIntent,
        context: &mut GraphContext,
    ) -> Vec<Seed> {
        let mut best: BTreeMap<NodeId, (MatchKind, Strategy)> = BTreeMap::new();

        for entity in &intent.entities {
            let hits = self.resolve_entity(graph, entity, intent);
            for (id, kind, strategy) in &hits {
                let slot = best.entry(id.clone()).or_insert((*kind, *strategy));
                if *kind < slot.0 {
                    *slot = (*kind, *strategy);
                }
            }
            context.resolutions.push(EntityResolution {
                entity: entity.clone(),
                resolved: hits.into_iter().map(|(id, _, _)| id).collect(),
            });
        }

        let mut seeds: Vec<Seed> = best
            .into_iter()
            .map(|(id, (match_kind, strategy))| Seed {
                id,
                match_kind,
                strategy,
            })
            .collect();
        seeds.sort_by(|a, b| (a.match_kind, &a.id).cmp(&(b.match_kind, &b.id)));
        seeds
    }

    fn resolve_entity<G: GraphStore>(
        &self,
        graph: &G,
        entity: &Entity,
        intent: &QueryIntent,
    ) -> Vec<(NodeId, MatchKind, Strategy)> {
        let direct = |ids: &[NodeId]| -> Vec<(NodeId, MatchKind, Strategy)> {
            ids.iter()
                .map(|id| (id.clone(), MatchKind::Exact, Strategy::DirectLookup))
                .collect()
        };

        match entity {
            Entity::SectionNumber(number) => direct(graph.sections_by_number(number)),
            Entity::Quoted(term) | Entity::LegalTerm(term) => {
                let defined = graph.definitions_by_term(term);
                if !defined.is_empty() {
                    return direct(defined);
                }
                graph
                    .keyword_search(term, self.keyword_hits)
                    .into_iter()
                    .map(|hit| {
                        let kind = if hit.exact {
                            MatchKind::Exact
                        } else {
                            MatchKind::Partial
                        };
                        (hit.id, kind, Strategy::KeywordSearch)
                    })
                    .collect()
            }
            Entity::RightsVocabulary(_) => resolve_rights(graph, intent),
            Entity::Scenario {
                sections, terms, ..
            } => {
                let mut hits = Vec::new();
                for number in sections {
                    hits.extend(direct(graph.sections_by_number(number)));
                }
                for term in terms {
                    hits.extend(direct(graph.definitions_by_term(term)));
                }
                hits
            }
        }
    }

    /// Breadth-first expansion from the seed set.
    fn expand<G: GraphStore>(
        &self,
        graph: &G,
        plan: &ExpansionPlan,
        seeds: Vec<Seed>,
        context: &mut GraphContext,
    ) {
        let mut visited: BTreeSet<NodeId> = BTreeSet::new();
        let mut edges: BTreeSet<TraversedEdge> = BTreeSet::new();
        let mut broken: BTreeSet<BrokenReference> = BTreeSet::new();
        let mut queue: VecDeque<(NodeId, u8)> = VecDeque::new();

        for seed in seeds {
            let Some(node) = graph.lookup(&seed.id) else {
                continue;
            };
            if context.nodes.len() >= self.max_nodes {
                context.dropped.push(DroppedPath {
                    from: None,
                    to: seed.id,
                    relation: None,
                    hops: 0,
                    reason: DropReason::NodeCap,
                });
                continue;
            }
            visited.insert(seed.id.clone());
            context.steps.push(TraversalStep {
                node: seed.id.clone(),
                hops: 0,
                strategy: seed.strategy,
                via: None,
            });
            context.nodes.push(RetrievedNode {
                node: node.clone(),
                hops: 0,
                match_kind: seed.match_kind,
                strategy: seed.strategy,
            });
            queue.push_back((seed.id, 0));
        }

        while let Some((current, hops)) = queue.pop_front() {
            for link in graph.links(&current) {
                if !plan.allows(link) {
                    continue;
                }

                let Some(target) = graph.lookup(&link.target) else {
                    let reference = BrokenReference {
                        from: current.clone(),
                        to: link.target.clone(),
                        relation: link.relation,
                    };
                    if broken.insert(reference) {
                        warn!(
                            from = %current,
                            to = %link.target,
                            relation = %link.relation,
                            "broken reference skipped during traversal"
                        );
                    }
                    continue;
                };

                let next_hops = hops.saturating_add(1);
                if hops >= plan.max_hops {
                    if !visited.contains(&link.target) {
                        context.dropped.push(DroppedPath {
                            from: Some(current.clone()),
                            to: link.target.clone(),
                            relation: Some(link.relation),
                            hops: next_hops,
                            reason: DropReason::HopLimit,
                        });
                    }
                    continue;
                }

                let edge = TraversedEdge::from_link(&current, link);
                if visited.contains(&link.target) {
                    edges.insert(edge);
                    continue;
                }
                if context.nodes.len() >= self.max_nodes {
                    context.dropped.push(DroppedPath {
                        from: Some(current.clone()),
                        to: link.target.clone(),
                        relation: Some(link.relation),
                        hops: next_hops,
                        reason: DropReason::NodeCap,
                    });
                    continue;
                }

                visited.insert(link.target.clone());
                context.steps.push(TraversalStep {
                    node: link.target.clone(),
                    hops: next_hops,
                    strategy: plan.strategy,
                    via: Some(edge.clone()),
                });
                context.nodes.push(RetrievedNode {
                    node: target.clone(),
                    hops: next_hops,
                    match_kind: MatchKind::Structural,
                    strategy: plan.strategy,
                });
                edges.insert(edge);
                queue.push_back((link.target.clone(), next_hops));
            }
        }

        context.edges = edges.into_iter().collect();
        context.broken_references = broken.into_iter().collect();
    }
}

/// Right nodes sharing a keyword with the rest of the query.
///
/// The rights vocabulary itself ("rights", "entitled") is not a topic. A
/// question with no topic, or one whose topic no right mentions, gets every
/// right.
fn resolve_rights<G: GraphStore>(
    graph: &G,
    intent: &QueryIntent,
) -> Vec<(NodeId, MatchKind, Strategy)> {
    let vocabulary: BTreeSet<String> = intent
        .entities
        .iter()
        .filter_map(|entity| match entity {
            Entity::RightsVocabulary(term) => Some(normalize_text(term)),
            _ => None,
        })
        .collect();
    let topic: Vec<String> = tokenize(&normalize_text(&intent.query))
        .into_iter()
        .filter(|token| !vocabulary.contains(token))
        .collect();

    let matched: Vec<(NodeId, MatchKind, Strategy)> = if topic.is_empty() {
        Vec::new()
    } else {
        graph
            .keyword_search(&topic.join(" "), graph.node_count())
            .into_iter()
            .filter(|hit| {
                graph
                    .lookup(&hit.id)
                    .is_some_and(|node| node.kind() == NodeKind::Right)
            })
            .map(|hit| (hit.id, MatchKind::Partial, Strategy::KeywordSearch))
            .collect()
    };
    if !matched.is_empty() {
        return matched;
    }

    graph
        .nodes_of_kind(NodeKind::Right)
        .map(|node| (node.id().clone(), MatchKind::Partial, Strategy::DirectLookup))
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::query::{QueryComplexity, QueryIntent};
    use crate::types::{Clause, Definition, Right, Section};
    use crate::Edge;

    fn section(id: &str, number: &str) -> Node {
        Node::Section(Section {
            id: NodeId::from(id),
            act: "Act".to_string(),
            number: number.to_string(),
            title: format!("Section {number} title"),
            text: format!("text of section {number}"),
            chapter: Some("IV".to_string()),
            page: None,
            effective_date: None,
        })
    }

    fn refs(from: &str, to: &str) -> Edge {
        Edge::References {
            from: NodeId::from(from),
            to: NodeId::from(to),
            context_text: None,
        }
    }

    fn intent(intent_type: IntentType, entities: Vec<Entity>) -> QueryIntent {
        QueryIntent {
            intent_type,
            entities,
            confidence: Score::new(8_000),
            query: String::new(),
            degraded: false,
            inherited_entities: false,
            temporal: None,
            complexity: QueryComplexity::Simple,
            rules_version: "test".to_string(),
        }
    }

    /// S1 -> S2 -> S3 -> S4 -> S5 reference chain, plus a cycle back to S1.
    fn chain() -> Graph {
        let nodes = (1..=5).map(|i| section(&format!("S{i}"), &i.to_string())).collect();
        let edges = vec![
            refs("S1", "S2"),
            refs("S2", "S3"),
            refs("S3", "S4"),
            refs("S4", "S5"),
            refs("S5", "S1"),
        ];
        Graph::new(nodes, edges).unwrap()
    }

    fn consumer_graph() -> Graph {
        let nodes = vec![
            section("S2", "2"),
            section("S35", "35"),
            Node::Clause(Clause {
                id: NodeId::from("S2_C7"),
                parent_section_id: NodeId::from("S2"),
                label: "7".to_string(),
                text: "consumer means a buyer".to_string(),
                clause_type: None,
            }),
            Node::Definition(Definition {
                id: NodeId::from("DEF_consumer"),
                term: "consumer".to_string(),
                text: "any person who buys goods".to_string(),
                defined_in_section_id: NodeId::from("S2"),
                clause_ref: None,
            }),
            Node::Right(Right {
                id: NodeId::from("RIGHT_redressal"),
                description: "right to seek redressal".to_string(),
                granted_by_clause_id: NodeId::from("S2_C7"),
                beneficiary: Some("consumer".to_string()),
                right_type: None,
            }),
        ];
        Graph::new(nodes, vec![refs("S35", "S2")]).unwrap()
    }

    #[test]
    fn definition_lookup_returns_only_the_definition() {
        let graph = consumer_graph();
        let ctx = TraversalEngine::default().traverse(
            &graph,
            &intent(
                IntentType::DefinitionLookup,
                vec![Entity::LegalTerm("consumer".to_string())],
            ),
        );

        assert_eq!(ctx.nodes.len(), 1);
        assert_eq!(ctx.nodes[0].id(), &NodeId::from("DEF_consumer"));
        assert_eq!(ctx.nodes[0].strategy, Strategy::DirectLookup);
        assert_eq!(
            ctx.citations.get(&NodeId::from("DEF_consumer")).map(String::as_str),
            Some("Act, Section 2")
        );
        assert_eq!(ctx.coverage, Score::MAX);
    }

    #[test]
    fn missing_section_gives_empty_context() {
        let graph = consumer_graph();
        let ctx = TraversalEngine::default().traverse(
            &graph,
            &intent(
                IntentType::SectionRetrieval,
                vec![Entity::SectionNumber("999".to_string())],
            ),
        );
        assert!(ctx.is_empty());
        assert_eq!(ctx.coverage, Score::ZERO);
        assert_eq!(ctx.unresolved().count(), 1);
    }

    #[test]
    fn no_entities_means_zero_coverage() {
        let graph = consumer_graph();
        let ctx = TraversalEngine::default()
            .traverse(&graph, &intent(IntentType::ScenarioAnalysis, Vec::new()));
        assert!(ctx.is_empty());
        assert_eq!(ctx.coverage, Score::ZERO);
    }

    #[test]
    fn rights_query_climbs_to_granting_section() {
        let graph = consumer_graph();
        let ctx = TraversalEngine::default().traverse(
            &graph,
            &intent(
                IntentType::RightsQuery,
                vec![Entity::RightsVocabulary("rights".to_string())],
            ),
        );
        let ids: Vec<_> = ctx.nodes.iter().map(|n| n.id().as_str()).collect();
        assert_eq!(ids, vec!["RIGHT_redressal", "S2_C7", "S2"]);
        assert_eq!(ctx.max_hops_used, 2);
        assert!(ctx.edges.iter().any(|e| e.relation == Relation::GrantedBy
            && e.from == NodeId::from("RIGHT_redressal")));
    }

    #[test]
    fn rights_keywords_narrow_the_matching_rights() {
        let right = |id: &str, description: &str| {
            Node::Right(Right {
                id: NodeId::from(id),
                description: description.to_string(),
                granted_by_clause_id: NodeId::from("S2_C9"),
                beneficiary: Some("consumer".to_string()),
                right_type: None,
            })
        };
        let graph = Graph::new(
            vec![
                section("S2", "2"),
                Node::Clause(Clause {
                    id: NodeId::from("S2_C9"),
                    parent_section_id: NodeId::from("S2"),
                    label: "9".to_string(),
                    text: "consumer rights include".to_string(),
                    clause_type: None,
                }),
                right("RIGHT_information", "right to be informed about the quality of goods"),
                right("RIGHT_redressal", "right to seek redressal against unfair trade practices"),
            ],
            Vec::new(),
        )
        .unwrap();
        let rights_intent = |query: &str| QueryIntent {
            query: query.to_string(),
            ..intent(
                IntentType::RightsQuery,
                vec![Entity::RightsVocabulary("rights".to_string())],
            )
        };

        let ctx = TraversalEngine::default()
            .traverse(&graph, &rights_intent("what are my rights to redressal"));
        assert_eq!(
            ctx.resolutions[0].resolved,
            vec![NodeId::from("RIGHT_redressal")]
        );
        assert!(ctx.node(&NodeId::from("RIGHT_information")).is_none());

        let all = TraversalEngine::default().traverse(&graph, &rights_intent("what are my rights"));
        assert_eq!(
            all.resolutions[0].resolved,
            vec![NodeId::from("RIGHT_information"), NodeId::from("RIGHT_redressal")]
        );
    }

    #[test]
    fn scenario_expansion_stops_at_three_hops_and_records_drop() {
        let graph = chain();
        let ctx = TraversalEngine::default().traverse(
            &graph,
            &intent(
                IntentType::ScenarioAnalysis,
                vec![Entity::Scenario {
                    route: "r".to_string(),
                    sections: vec!["1".to_string()],
                    terms: Vec::new(),
                }],
            ),
        );

        assert!(ctx.nodes.iter().all(|n| n.hops <= MAX_HOPS));
        // S1 reaches S2, S3, S4 forward and S5, S4 backward within 3 hops.
        assert_eq!(ctx.nodes.len(), 5);
        assert_eq!(ctx.max_hops_used, 2);
        assert!(ctx.dropped.is_empty());
    }

    #[test]
    fn long_chain_is_truncated_with_dropped_paths() {
        let nodes = (1..=6).map(|i| section(&format!("S{i}"), &i.to_string())).collect();
        let edges = vec![
            refs("S1", "S2"),
            refs("S2", "S3"),
            refs("S3", "S4"),
            refs("S4", "S5"),
            refs("S5", "S6"),
        ];
        let graph = Graph::new(nodes, edges).unwrap();
        let ctx = TraversalEngine::default().traverse(
            &graph,
            &intent(
                IntentType::ScenarioAnalysis,
                vec![Entity::SectionNumber("1".to_string())],
            ),
        );

        let ids: Vec<_> = ctx.nodes.iter().map(|n| n.id().as_str()).collect();
        assert_eq!(ids, vec!["S1", "S2", "S3", "S4"]);
        assert_eq!(ctx.dropped.len(), 1);
        assert_eq!(ctx.dropped[0].to, NodeId::from("S5"));
        assert_eq!(ctx.dropped[0].hops, 4);
        assert_eq!(ctx.dropped[0].reason, DropReason::HopLimit);
    }

    #[test]
    fn section_plan_limit_records_dropped_paths() {
        let nodes = (1..=6).map(|i| section(&format!("S{i}"), &i.to_string())).collect();
        let edges = vec![refs("S1", "S2"), refs("S2", "S3"), refs("S3", "S4"), refs("S4", "S5")];
        let graph = Graph::new(nodes, edges).unwrap();
        let ctx = TraversalEngine::default().traverse(
            &graph,
            &intent(
                IntentType::SectionRetrieval,
                vec![Entity::SectionNumber("1".to_string())],
            ),
        );

        let ids: Vec<_> = ctx.nodes.iter().map(|n| n.id().as_str()).collect();
        assert_eq!(ids, vec!["S1", "S2", "S3"]);
        assert_eq!(
            ctx.dropped,
            vec![DroppedPath {
                from: Some(NodeId::from("S3")),
                to: NodeId::from("S4"),
                relation: Some(Relation::References),
                hops: 3,
                reason: DropReason::HopLimit,
            }]
        );
    }

    #[test]
    fn cycles_terminate_and_nodes_are_unique() {
        let graph = chain();
        let ctx = TraversalEngine::default().traverse(
            &graph,
            &intent(
                IntentType::ScenarioAnalysis,
                vec![
                    Entity::SectionNumber("1".to_string()),
                    Entity::SectionNumber("3".to_string()),
                ],
            ),
        );
        let unique: BTreeSet<_> = ctx.nodes.iter().map(|n| n.id().clone()).collect();
        assert_eq!(unique.len(), ctx.nodes.len());
        assert_eq!(ctx.nodes[0].id(), &NodeId::from("S1"));
        assert_eq!(ctx.nodes[1].id(), &NodeId::from("S3"));
    }

    #[test]
    fn node_cap_records_dropped_paths() {
        let graph = chain();
        let ctx = TraversalEngine::new(2, 5).traverse(
            &graph,
            &intent(
                IntentType::ScenarioAnalysis,
                vec![Entity::SectionNumber("1".to_string())],
            ),
        );
        assert_eq!(ctx.nodes.len(), 2);
        assert!(ctx.dropped.iter().all(|d| d.reason == DropReason::NodeCap));
        assert!(!ctx.dropped.is_empty());
    }

    #[test]
    fn broken_reference_is_skipped() {
        let graph = Graph::assume_valid(vec![section("S1", "1")], vec![refs("S1", "S404")]);
        let ctx = TraversalEngine::default().traverse(
            &graph,
            &intent(
                IntentType::ScenarioAnalysis,
                vec![Entity::SectionNumber("1".to_string())],
            ),
        );
        assert_eq!(ctx.nodes.len(), 1);
        assert_eq!(
            ctx.broken_references,
            vec![BrokenReference {
                from: NodeId::from("S1"),
                to: NodeId::from("S404"),
                relation: Relation::References,
            }]
        );
    }

    #[test]
    fn keyword_results_rank_exact_before_partial() {
        let nodes = vec![
            section("S10", "10"),
            Node::Section(Section {
                id: NodeId::from("S11"),
                act: "Act".to_string(),
                number: "11".to_string(),
                title: "Liability".to_string(),
                text: "product liability of a product seller".to_string(),
                chapter: None,
                page: None,
                effective_date: None,
            }),
            Node::Section(Section {
                id: NodeId::from("S09"),
                act: "Act".to_string(),
                number: "9".to_string(),
                title: "Seller".to_string(),
                text: "liability in general".to_string(),
                chapter: None,
                page: None,
                effective_date: None,
            }),
        ];
        let graph = Graph::new(nodes, Vec::new()).unwrap();
        let ctx = TraversalEngine::default().traverse(
            &graph,
            &intent(
                IntentType::DefinitionLookup,
                vec![Entity::LegalTerm("product liability".to_string())],
            ),
        );
        assert_eq!(ctx.nodes[0].id(), &NodeId::from("S11"));
        assert_eq!(ctx.nodes[0].match_kind, MatchKind::Exact);
        assert_eq!(ctx.nodes[1].id(), &NodeId::from("S09"));
        assert_eq!(ctx.nodes[1].match_kind, MatchKind::Partial);
    }

    #[test]
    fn traversal_is_deterministic() {
        let graph = consumer_graph();
        let query = intent(
            IntentType::ScenarioAnalysis,
            vec![
                Entity::LegalTerm("consumer".to_string()),
                Entity::SectionNumber("35".to_string()),
            ],
        );
        let engine = TraversalEngine::default();
        assert_eq!(engine.traverse(&graph, &query), engine.traverse(&graph, &query));
    }
}
