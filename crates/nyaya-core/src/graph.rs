//! # Graph Store
//!
//! The immutable statute graph.
//!
//! A `Graph` is built once per snapshot and only read afterwards. All
//! storage and indices use `BTreeMap`, so every lookup and iteration is
//! deterministic.

use crate::error::GraphError;
use crate::{Direction, Edge, Node, NodeId, NodeKind, Relation};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// GRAPHSTORE TRAIT
// =============================================================================

/// Read-only operations the pipeline needs from a statute graph.
///
/// Every method is bounded by the size of the indices it touches; none of
/// them walks more than one hop.
pub trait GraphStore {
    /// Lookup a node by id.
    fn lookup(&self, id: &NodeId) -> Option<&Node>;

    /// Sections carrying the given number, across all acts.
    fn sections_by_number(&self, number: &str) -> &[NodeId];

    /// Definitions of a term (case-insensitive).
    fn definitions_by_term(&self, term: &str) -> &[NodeId];

    /// Outgoing links of a node, sorted.
    fn links(&self, id: &NodeId) -> &[Link];

    /// Canonical citation of a node.
    fn citation(&self, id: &NodeId) -> Option<&str>;

    /// Nodes whose text matches `phrase`, best first.
    fn keyword_search(&self, phrase: &str, limit: usize) -> Vec<KeywordHit>;

    /// All nodes of one kind, in id order.
    fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node>;

    /// Sections sharing an act and chapter, in id order.
    fn sections_in_chapter(&self, act: &str, chapter: &str) -> Vec<&NodeId>;

    /// Nodes whose normalized citation or locator equals `citation`.
    fn resolve_citation(&self, citation: &str) -> &[NodeId];

    /// Get the total number of nodes.
    fn node_count(&self) -> usize;

    /// Get the total number of stored edges.
    fn edge_count(&self) -> usize;
}

// =============================================================================
// LINKS & SEARCH HITS
// =============================================================================

/// One traversable step out of a node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Link {
    pub relation: Relation,
    pub direction: Direction,
    pub target: NodeId,
    pub context: Option<String>,
}

/// A keyword search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordHit {
    pub id: NodeId,
    /// Whole phrase found at word boundaries.
    pub exact: bool,
    /// Number of phrase tokens present in the node.
    pub overlap: usize,
}

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

/// The statute graph and its lookup indices.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Node storage: NodeId -> Node
    nodes: BTreeMap<NodeId, Node>,

    /// Stored edges in load order.
    edges: Vec<Edge>,

    /// Adjacency: node -> sorted, deduplicated links (both directions).
    links: BTreeMap<NodeId, Vec<Link>>,

    /// Section number -> sections
    section_index: BTreeMap<String, Vec<NodeId>>,

    /// Lower-cased term -> definitions
    term_index: BTreeMap<String, Vec<NodeId>>,

    /// Token -> nodes containing it
    token_index: BTreeMap<String, BTreeSet<NodeId>>,

    /// Normalized, lower-cased searchable text per node
    search_text: BTreeMap<NodeId, String>,

    /// Canonical citation per node
    citations: BTreeMap<NodeId, String>,

    /// Normalized citation or locator -> nodes
    citation_index: BTreeMap<String, Vec<NodeId>>,

    /// Ids that appeared more than once in the input
    duplicates: Vec<NodeId>,
}

impl Graph {
    /// Build and validate a graph.
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self, GraphError> {
        let graph = Self::assume_valid(nodes, edges);
        graph.validate()?;
        Ok(graph)
    }

    /// Build indices without checking referential integrity.
    ///
    /// For input that upstream already validated. Dangling links survive
    /// into the adjacency and are reported by traversal as broken
    /// references.
    #[must_use]
    pub fn assume_valid(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let mut graph = Self::default();

        for node in nodes {
            let id = node.id().clone();
            if graph.nodes.contains_key(&id) {
                graph.duplicates.push(id);
                continue;
            }
            graph.nodes.insert(id, node);
        }
        graph.edges = edges;

        graph.build_links();
        graph.build_lookup_indices();
        graph.build_citations();
        graph
    }

    /// Empty graph.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Get all nodes in deterministic order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all stored edges in load order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Check if the graph contains a node.
    #[must_use]
    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    fn add_link(&mut self, from: &NodeId, link: Link) {
        self.links.entry(from.clone()).or_default().push(link);
    }

    fn link_pair(&mut self, from: &NodeId, to: &NodeId, relation: Relation, context: Option<String>) {
        self.add_link(
            from,
            Link {
                relation,
                direction: Direction::Forward,
                target: to.clone(),
                context: context.clone(),
            },
        );
        self.add_link(
            to,
            Link {
                relation,
                direction: Direction::Reverse,
                target: from.clone(),
                context,
            },
        );
    }

    fn build_links(&mut self) {
        let edges = std::mem::take(&mut self.edges);
        for edge in &edges {
            let (from, to) = edge.endpoints();
            let context = edge.context_text().map(str::to_string);
            self.link_pair(from, to, edge.relation(), context);
        }
        self.edges = edges;

        // Field references imply links even when no edge was stored.
        let implied: Vec<(NodeId, NodeId, Relation)> = self
            .nodes
            .values()
            .filter_map(|node| match node {
                Node::Clause(c) => Some((c.parent_section_id.clone(), c.id.clone(), Relation::Contains)),
                Node::Definition(d) => Some((
                    d.defined_in_section_id.clone(),
                    d.id.clone(),
                    Relation::Defines,
                )),
                Node::Right(r) => Some((r.id.clone(), r.granted_by_clause_id.clone(), Relation::GrantedBy)),
                Node::Section(_) => None,
            })
            .collect();
        for (from, to, relation) in implied {
            self.link_pair(&from, &to, relation, None);
        }

        for links in self.links.values_mut() {
            links.sort();
            links.dedup();
        }
    }

    fn build_lookup_indices(&mut self) {
        for (id, node) in &self.nodes {
            match node {
                Node::Section(s) => {
                    self.section_index
                        .entry(s.number.trim().to_string())
                        .or_default()
                        .push(id.clone());
                }
                Node::Definition(d) => {
                    self.term_index
                        .entry(normalize_text(&d.term))
                        .or_default()
                        .push(id.clone());
                }
                Node::Clause(_) | Node::Right(_) => {}
            }

            let text = normalize_text(&node.searchable_text());
            for token in tokenize(&text) {
                self.token_index.entry(token).or_default().insert(id.clone());
            }
            self.search_text.insert(id.clone(), text);
        }
    }

    fn build_citations(&mut self) {
        let mut citations = BTreeMap::new();
        for (id, node) in &self.nodes {
            if let Some(citation) = compute_citation(&self.nodes, node) {
                citations.insert(id.clone(), citation);
            }
        }

        for (id, citation) in &citations {
            let normalized = normalize_citation(citation);
            let locator = citation_locator(&normalized).map(str::to_string);
            self.citation_index
                .entry(normalized)
                .or_default()
                .push(id.clone());
            if let Some(locator) = locator {
                self.citation_index.entry(locator).or_default().push(id.clone());
            }
        }
        for ids in self.citation_index.values_mut() {
            ids.sort();
            ids.dedup();
        }
        self.citations = citations;
    }
}

// =============================================================================
// INTEGRITY VALIDATION
// =============================================================================

impl Graph {
    /// Check referential integrity, returning the first violation.
    pub fn validate(&self) -> Result<(), GraphError> {
        match self.integrity_issues().into_iter().next() {
            Some(issue) => Err(issue),
            None => Ok(()),
        }
    }

    /// Every referential-integrity violation, in a stable order.
    #[must_use]
    pub fn integrity_issues(&self) -> Vec<GraphError> {
        let mut issues: Vec<GraphError> = self
            .duplicates
            .iter()
            .cloned()
            .map(GraphError::DuplicateNode)
            .collect();

        for node in self.nodes.values() {
            let Some((field, target)) = node.field_references() else {
                continue;
            };
            let target_kind = self.nodes.get(target).map(Node::kind);
            let acceptable = match node.kind() {
                NodeKind::Clause | NodeKind::Definition => target_kind == Some(NodeKind::Section),
                NodeKind::Right => matches!(
                    target_kind,
                    Some(NodeKind::Clause | NodeKind::Section)
                ),
                NodeKind::Section => true,
            };
            if !acceptable {
                issues.push(GraphError::DanglingReference {
                    node: node.id().clone(),
                    field,
                    target: target.clone(),
                });
            }
        }

        for edge in &self.edges {
            let (from, to) = edge.endpoints();
            if !self.contains_node(from) || !self.contains_node(to) {
                issues.push(GraphError::DanglingEdge {
                    relation: edge.relation(),
                    from: from.clone(),
                    to: to.clone(),
                });
            }
        }

        issues.extend(self.containment_issues());
        issues
    }

    /// `Contains` must form a forest: one parent per child, no cycles.
    fn containment_issues(&self) -> Vec<GraphError> {
        let mut issues = Vec::new();
        let mut parent_of: BTreeMap<&NodeId, &NodeId> = BTreeMap::new();

        for (id, links) in &self.links {
            for link in links {
                if link.relation != Relation::Contains || link.direction != Direction::Reverse {
                    continue;
                }
                if parent_of.insert(id, &link.target).is_some() {
                    issues.push(GraphError::MultipleParents(id.clone()));
                }
            }
        }

        let mut reported = BTreeSet::new();
        for &start in parent_of.keys() {
            let mut seen = BTreeSet::new();
            let mut current = start;
            seen.insert(current);
            while let Some(&parent) = parent_of.get(current) {
                if !seen.insert(parent) {
                    if reported.insert(parent.clone()) {
                        issues.push(GraphError::ContainsCycle(parent.clone()));
                    }
                    break;
                }
                current = parent;
            }
        }

        issues
    }
}

// =============================================================================
// GRAPHSTORE IMPLEMENTATION
// =============================================================================

impl GraphStore for Graph {
    fn lookup(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    fn sections_by_number(&self, number: &str) -> &[NodeId] {
        self.section_index
            .get(number.trim())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn definitions_by_term(&self, term: &str) -> &[NodeId] {
        self.term_index
            .get(&normalize_text(term))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn links(&self, id: &NodeId) -> &[Link] {
        self.links.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    fn citation(&self, id: &NodeId) -> Option<&str> {
        self.citations.get(id).map(String::as_str)
    }

    fn keyword_search(&self, phrase: &str, limit: usize) -> Vec<KeywordHit> {
        let phrase = normalize_text(phrase);
        let tokens = tokenize(&phrase);
        if tokens.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut overlap: BTreeMap<&NodeId, usize> = BTreeMap::new();
        for token in &tokens {
            if let Some(ids) = self.token_index.get(token) {
                for id in ids {
                    *overlap.entry(id).or_default() += 1;
                }
            }
        }

        let mut hits: Vec<KeywordHit> = overlap
            .into_iter()
            .map(|(id, overlap)| KeywordHit {
                id: id.clone(),
                exact: self
                    .search_text
                    .get(id)
                    .is_some_and(|text| contains_phrase(text, &phrase)),
                overlap,
            })
            .collect();

        hits.sort_by(|a, b| {
            b.exact
                .cmp(&a.exact)
                .then(b.overlap.cmp(&a.overlap))
                .then(a.id.cmp(&b.id))
        });
        hits.truncate(limit);
        hits
    }

    fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(move |node| node.kind() == kind)
    }

    fn sections_in_chapter(&self, act: &str, chapter: &str) -> Vec<&NodeId> {
        self.nodes
            .values()
            .filter_map(Node::as_section)
            .filter(|s| s.act == act && s.chapter.as_deref() == Some(chapter))
            .map(|s| &s.id)
            .collect()
    }

    fn resolve_citation(&self, citation: &str) -> &[NodeId] {
        self.citation_index
            .get(&normalize_citation(citation))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

// =============================================================================
// CITATIONS & TEXT HELPERS
// =============================================================================

/// Canonical citation of a node, following field references to its section.
fn compute_citation(nodes: &BTreeMap<NodeId, Node>, node: &Node) -> Option<String> {
    match node {
        Node::Section(s) => Some(format!("{}, Section {}", s.act, s.number)),
        Node::Clause(c) => {
            let section = nodes.get(&c.parent_section_id)?.as_section()?;
            Some(format!(
                "{}, Section {}({})",
                section.act,
                section.number,
                bare_label(&c.label)
            ))
        }
        Node::Definition(d) => {
            let section = nodes.get(&d.defined_in_section_id)?.as_section()?;
            Some(match &d.clause_ref {
                Some(clause) => format!(
                    "{}, Section {}({})",
                    section.act,
                    section.number,
                    bare_label(clause)
                ),
                None => format!("{}, Section {}", section.act, section.number),
            })
        }
        Node::Right(r) => match nodes.get(&r.granted_by_clause_id)? {
            granter @ (Node::Section(_) | Node::Clause(_)) => compute_citation(nodes, granter),
            _ => None,
        },
    }
}

/// Clause label without surrounding parentheses.
fn bare_label(label: &str) -> &str {
    label.trim().trim_start_matches('(').trim_end_matches(')')
}

/// Lower-case and collapse whitespace.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a citation for comparison.
///
/// Lower-cases, collapses whitespace, drops spaces before `(` and trailing
/// punctuation, so `"Act, Section 2 (a)."` equals `"act, section 2(a)"`.
#[must_use]
pub fn normalize_citation(citation: &str) -> String {
    normalize_text(citation)
        .replace(" (", "(")
        .trim_end_matches(['.', ',', ';'])
        .to_string()
}

/// Part of a normalized citation from `section` onwards.
#[must_use]
pub fn citation_locator(normalized: &str) -> Option<&str> {
    let (_, rest) = normalized.split_once(", section ")?;
    let start = normalized.len() - rest.len() - "section ".len();
    normalized.get(start..)
}

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "any", "are", "as", "be", "by", "for", "from", "has", "have", "in", "into",
    "is", "it", "its", "of", "on", "or", "such", "than", "that", "the", "this", "to", "was",
    "what", "when", "where", "which", "who", "with",
];

/// Searchable tokens of already-normalized text.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 3 && !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect();
    tokens.sort();
    tokens.dedup();
    tokens
}

/// Whether `needle` occurs in `haystack` at word boundaries.
#[must_use]
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

// =============================================================================
// TESTS
// =============================================================================
