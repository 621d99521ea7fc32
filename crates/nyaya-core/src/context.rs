//! # Context Builder
//!
//! Turns a `GraphContext` into the `LlmContext` handed to the explainer:
//! an audience-tailored text block plus the citation map that is the
//! explainer's only allow-list.
//!
//! Facts are packed whole. A fact whose line does not fit the budget is
//! omitted entirely and listed in the metadata; no citation is ever cut.

use crate::graph::{GraphStore, citation_locator, normalize_citation};
use crate::query::IntentType;
use crate::traversal::{GraphContext, RetrievedNode};
use crate::{Node, NodeId, Relation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Default text budget in characters.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 8_000;

/// Default share of the budget citizens get.
pub const DEFAULT_CITIZEN_BUDGET_PERCENT: u8 = 60;

// =============================================================================
// AUDIENCE
// =============================================================================

/// Who the answer is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    Citizen,
    Lawyer,
    Judge,
}

impl Audience {
    pub const ALL: [Self; 3] = [Self::Citizen, Self::Lawyer, Self::Judge];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Citizen => "citizen",
            Self::Lawyer => "lawyer",
            Self::Judge => "judge",
        }
    }

    /// Whether cross-reference and hierarchy detail is included.
    #[must_use]
    pub fn is_professional(self) -> bool {
        !matches!(self, Self::Citizen)
    }

    fn block_order(self) -> [Block; 4] {
        match self {
            Self::Citizen => [Block::Primary, Block::Rights, Block::Definitions, Block::Related],
            Self::Lawyer | Self::Judge => {
                [Block::Primary, Block::Definitions, Block::Rights, Block::Related]
            }
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Audience {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "citizen" => Ok(Self::Citizen),
            "lawyer" => Ok(Self::Lawyer),
            "judge" => Ok(Self::Judge),
            other => Err(format!("unknown audience '{other}' (expected citizen, lawyer or judge)")),
        }
    }
}

// =============================================================================
// FACTS & CITATION MAP
// =============================================================================

/// Context block a fact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Block {
    Primary,
    Definitions,
    Rights,
    Related,
}

impl Block {
    fn title(self) -> &'static str {
        match self {
            Self::Primary => "PRIMARY PROVISIONS",
            Self::Definitions => "DEFINITIONS",
            Self::Rights => "RIGHTS",
            Self::Related => "RELATED PROVISIONS",
        }
    }
}

/// One cited statement in the context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFact {
    pub block: Block,
    pub node_id: NodeId,
    pub heading: String,
    pub text: String,
    pub citation: String,
}

impl ContextFact {
    fn line(&self, cross_reference: Option<&str>) -> String {
        let mut line = format!(
            "- {}: \"{}\" [Citation: {}]",
            self.heading, self.text, self.citation
        );
        if let Some(context) = cross_reference {
            line.push_str(&format!(" (cross-reference: {context})"));
        }
        line
    }
}

/// An allow-listed citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationEntry {
    /// Short key in emission order: `C1`, `C2`, ...
    pub key: String,
    pub citation: String,
    /// Every node that produced this citation.
    pub node_ids: Vec<NodeId>,
}

/// The citations the explainer may use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationMap {
    entries: Vec<CitationEntry>,
}

impl CitationMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `node_id` is cited as `citation`, merging identical
    /// citations. Returns the entry's key.
    pub fn insert(&mut self, citation: &str, node_id: &NodeId) -> String {
        let normalized = normalize_citation(citation);
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| normalize_citation(&e.citation) == normalized)
        {
            if !entry.node_ids.contains(node_id) {
                entry.node_ids.push(node_id.clone());
            }
            return entry.key.clone();
        }
        let key = format!("C{}", self.entries.len() + 1);
        self.entries.push(CitationEntry {
            key: key.clone(),
            citation: citation.to_string(),
            node_ids: vec![node_id.clone()],
        });
        key
    }

    /// Entry matching a citation token by full text, key or locator.
    #[must_use]
    pub fn resolve(&self, token: &str) -> Option<&CitationEntry> {
        let wanted = normalize_citation(token);
        if wanted.is_empty() {
            return None;
        }
        self.entries.iter().find(|entry| {
            let citation = normalize_citation(&entry.citation);
            citation == wanted
                || entry.key.eq_ignore_ascii_case(&wanted)
                || citation_locator(&citation) == Some(wanted.as_str())
        })
    }

    #[must_use]
    pub fn entries(&self) -> &[CitationEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Citation texts in emission order.
    pub fn citations(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.citation.as_str())
    }
}

// =============================================================================
// LLM CONTEXT
// =============================================================================

/// Bookkeeping about how the context was assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMetadata {
    pub snapshot_version: String,
    pub intent: IntentType,
    pub audience: Audience,
    pub budget_chars: usize,
    pub used_chars: usize,
    pub block_counts: BTreeMap<Block, usize>,
    /// Facts left out because they did not fit.
    pub omitted: Vec<NodeId>,
    /// Retrieved nodes without a canonical citation, never emitted.
    pub uncited: Vec<NodeId>,
}

impl ContextMetadata {
    #[must_use]
    pub fn truncated(&self) -> bool {
        !self.omitted.is_empty()
    }
}

/// The only structure handed to the explainer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmContext {
    pub formatted_text: String,
    pub citation_map: CitationMap,
    pub metadata: ContextMetadata,
    /// Facts emitted into `formatted_text`, in order.
    pub facts: Vec<ContextFact>,
}

impl LlmContext {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Share of emitted facts carrying a citation.
    #[must_use]
    pub fn cited_fact_ratio(&self) -> crate::Score {
        let cited = self.facts.iter().filter(|f| !f.citation.is_empty()).count();
        crate::Score::from_ratio(cited as u64, self.facts.len() as u64)
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Formats a `GraphContext` for one audience within a character budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBuilder {
    max_chars: usize,
    citizen_budget_percent: u8,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONTEXT_CHARS, DEFAULT_CITIZEN_BUDGET_PERCENT)
    }
}

/// Character accounting against the budget. Lines are kept by the
/// caller so blocks can be reserved in priority order and emitted in
/// reading order.
struct Packer {
    budget: usize,
    used: usize,
}

impl Packer {
    fn size(lines: &[String]) -> usize {
        lines.iter().map(|l| l.chars().count() + 1).sum()
    }

    /// Reserve room for all of `lines` or none of them.
    fn reserve(&mut self, lines: &[String]) -> bool {
        let size = Self::size(lines);
        if self.used + size > self.budget {
            return false;
        }
        self.used += size;
        true
    }
}

impl ContextBuilder {
    #[must_use]
    pub fn new(max_chars: usize, citizen_budget_percent: u8) -> Self {
        Self {
            max_chars,
            citizen_budget_percent: citizen_budget_percent.min(100),
        }
    }

    /// Character budget for an audience.
    #[must_use]
    pub fn budget(&self, audience: Audience) -> usize {
        match audience {
            Audience::Citizen => self.max_chars * usize::from(self.citizen_budget_percent) / 100,
            Audience::Lawyer | Audience::Judge => self.max_chars,
        }
    }

    /// Build the explainer context.
    pub fn build<G: GraphStore>(
        &self,
        graph: &G,
        traversal: &GraphContext,
        audience: Audience,
        intent: IntentType,
        snapshot_version: &str,
    ) -> LlmContext {
        let (candidates, uncited) = collect_facts(graph, traversal);

        let mut packer = Packer {
            budget: self.budget(audience),
            used: 0,
        };

        let mut header = vec![format!(
            "LEGAL CONTEXT (snapshot {snapshot_version}, intent: {intent}, audience: {audience})"
        )];
        if audience == Audience::Judge {
            header.push(
                "JUDICIAL CONTEXT: provisions are quoted verbatim for judicial reference. \
                 Rely only on the cited text; draw no inference about outcomes."
                    .to_string(),
            );
        }
        if !packer.reserve(&header) {
            header.clear();
        }

        // Facts in block priority order. Once one fact is left out, every
        // later (lower-priority) fact is left out with it.
        let cross_refs = cross_references(traversal);
        let mut body = Vec::new();
        let mut facts = Vec::new();
        let mut omitted = Vec::new();
        let mut block_counts = BTreeMap::new();
        let mut citation_map = CitationMap::new();
        let mut overflowed = false;

        for block in audience.block_order() {
            let mut header_written = false;
            for fact in candidates.iter().filter(|f| f.block == block) {
                if overflowed {
                    omitted.push(fact.node_id.clone());
                    continue;
                }
                let context = if audience.is_professional() && block == Block::Related {
                    cross_refs.get(&fact.node_id).map(String::as_str)
                } else {
                    None
                };
                let mut lines = Vec::new();
                if !header_written {
                    lines.push(String::new());
                    lines.push(format!("{}:", block.title()));
                }
                lines.push(fact.line(context));

                if packer.reserve(&lines) {
                    header_written = true;
                    body.extend(lines);
                    citation_map.insert(&fact.citation, &fact.node_id);
                    *block_counts.entry(block).or_insert(0) += 1;
                    facts.push(fact.clone());
                } else {
                    overflowed = true;
                    omitted.push(fact.node_id.clone());
                }
            }
        }

        // Orientation only takes what the facts left over.
        let mut orientation = orientation_lines(graph, traversal, audience);
        if !orientation.is_empty() {
            orientation.splice(0..0, [String::new(), "ORIENTATION:".to_string()]);
            if !packer.reserve(&orientation) {
                orientation.clear();
            }
        }

        let mut summary = Vec::new();
        if audience.is_professional() && !citation_map.is_empty() {
            summary.push(String::new());
            summary.push("CITATION SUMMARY:".to_string());
            summary.extend(
                citation_map
                    .entries()
                    .iter()
                    .map(|e| format!("- {}: {}", e.key, e.citation)),
            );
            if !packer.reserve(&summary) {
                summary.clear();
            }
        }

        let lines: Vec<String> = header
            .into_iter()
            .chain(orientation)
            .chain(body)
            .chain(summary)
            .collect();
        let used_chars = packer.used;
        LlmContext {
            formatted_text: lines.join("\n"),
            citation_map,
            metadata: ContextMetadata {
                snapshot_version: snapshot_version.to_string(),
                intent,
                audience,
                budget_chars: packer.budget,
                used_chars,
                block_counts,
                omitted,
                uncited,
            },
            facts,
        }
    }
}

/// Candidate facts in traversal order, plus nodes that have no citation.
fn collect_facts<G: GraphStore>(
    graph: &G,
    traversal: &GraphContext,
) -> (Vec<ContextFact>, Vec<NodeId>) {
    let seeds: BTreeSet<&NodeId> = traversal
        .nodes
        .iter()
        .filter(|n| n.is_seed())
        .map(RetrievedNode::id)
        .collect();

    let mut facts = Vec::new();
    let mut uncited = Vec::new();
    for retrieved in &traversal.nodes {
        let id = retrieved.id();
        let Some(citation) = traversal
            .citations
            .get(id)
            .cloned()
            .or_else(|| graph.citation(id).map(str::to_string))
        else {
            uncited.push(id.clone());
            continue;
        };
        facts.push(ContextFact {
            block: block_for(retrieved, &seeds),
            node_id: id.clone(),
            heading: heading(&retrieved.node),
            text: retrieved.node.text().trim().to_string(),
            citation,
        });
    }
    (facts, uncited)
}

fn block_for(retrieved: &RetrievedNode, seeds: &BTreeSet<&NodeId>) -> Block {
    match &retrieved.node {
        Node::Definition(_) => Block::Definitions,
        Node::Right(_) => Block::Rights,
        Node::Section(_) if retrieved.is_seed() => Block::Primary,
        Node::Clause(c) if retrieved.is_seed() || seeds.contains(&c.parent_section_id) => {
            Block::Primary
        }
        Node::Section(_) | Node::Clause(_) => Block::Related,
    }
}

fn heading(node: &Node) -> String {
    match node {
        Node::Section(s) => format!("Section {} ({})", s.number, s.title.trim()),
        Node::Clause(c) => format!("Clause {}", c.label.trim()),
        Node::Definition(d) => format!("Definition of {}", d.term.trim()),
        Node::Right(r) => match &r.beneficiary {
            Some(beneficiary) => format!("Right of the {}", beneficiary.trim()),
            None => "Right".to_string(),
        },
    }
}

/// The section a node hangs under, if any.
fn owning_section<'a, G: GraphStore>(graph: &'a G, node: &'a Node) -> Option<&'a crate::types::Section> {
    match node {
        Node::Section(s) => Some(s),
        Node::Clause(c) => graph.lookup(&c.parent_section_id)?.as_section(),
        Node::Definition(d) => graph.lookup(&d.defined_in_section_id)?.as_section(),
        Node::Right(r) => match graph.lookup(&r.granted_by_clause_id)? {
            granter @ Node::Clause(_) => owning_section(graph, granter),
            Node::Section(s) => Some(s),
            _ => None,
        },
    }
}

/// Parent section and chapter lines for the seeds; professionals also get
/// the chapter's other sections.
fn orientation_lines<G: GraphStore>(
    graph: &G,
    traversal: &GraphContext,
    audience: Audience,
) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut lines = Vec::new();

    for retrieved in traversal.nodes.iter().filter(|n| n.is_seed()) {
        let Some(section) = owning_section(graph, &retrieved.node) else {
            continue;
        };
        if !seen.insert(section.id.clone()) {
            continue;
        }
        let mut line = format!("- {}", section.act);
        if let Some(chapter) = &section.chapter {
            line.push_str(&format!(" > Chapter {chapter}"));
        }
        line.push_str(&format!(" > Section {} ({})", section.number, section.title.trim()));
        lines.push(line);

        if audience.is_professional()
            && let Some(chapter) = &section.chapter
        {
            let mates: Vec<String> = graph
                .sections_in_chapter(&section.act, chapter)
                .into_iter()
                .filter(|id| **id != section.id)
                .filter_map(|id| graph.lookup(id))
                .filter_map(Node::as_section)
                .map(|s| format!("Section {}", s.number))
                .collect();
            if !mates.is_empty() {
                lines.push(format!("  Chapter {chapter} also contains: {}", mates.join(", ")));
            }
        }
    }
    lines
}

/// Reference context text per referenced node.
fn cross_references(traversal: &GraphContext) -> BTreeMap<NodeId, String> {
    let mut map: BTreeMap<NodeId, String> = BTreeMap::new();
    for edge in &traversal.edges {
        if edge.relation != Relation::References {
            continue;
        }
        let Some(context) = edge.context.as_deref() else {
            continue;
        };
        let cited_from = traversal
            .citations
            .get(&edge.from)
            .map_or_else(|| edge.from.to_string(), Clone::clone);
        let text = format!("from {cited_from}: {context}");
        map.entry(edge.to.clone())
            .and_modify(|existing| {
                existing.push_str("; ");
                existing.push_str(&text);
            })
            .or_insert(text);
    }
    map
}

// =============================================================================
// TESTS
// =============================================================================
