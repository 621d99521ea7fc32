//! # Grounding Module
//!
//! Bulk verification of citation strings against a snapshot.
//!
//! Each citation is normalized and looked up in the graph's citation
//! index, by full text or by locator (`Section 2(7)`). A citation that
//! matches nothing is reported as not existing; nothing is guessed.

use crate::graph::GraphStore;
use crate::NodeId;
use serde::{Deserialize, Serialize};

/// Verdict for one citation string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationCheck {
    pub citation: String,
    pub exists: bool,
    /// First matching node in id order.
    pub resolved_node_id: Option<NodeId>,
    /// Every matching node. A locator can match sections of several acts.
    pub candidates: Vec<NodeId>,
}

impl CitationCheck {
    /// Whether the citation names exactly one node.
    #[must_use]
    pub fn is_unambiguous(&self) -> bool {
        self.candidates.len() == 1
    }
}

/// Check one citation.
#[must_use]
pub fn verify_citation<G: GraphStore>(graph: &G, citation: &str) -> CitationCheck {
    let candidates = graph.resolve_citation(citation).to_vec();
    CitationCheck {
        citation: citation.to_string(),
        exists: !candidates.is_empty(),
        resolved_node_id: candidates.first().cloned(),
        candidates,
    }
}

/// Check citations in input order.
#[must_use]
pub fn verify_citations<G: GraphStore, S: AsRef<str>>(graph: &G, citations: &[S]) -> Vec<CitationCheck> {
    citations
        .iter()
        .map(|c| verify_citation(graph, c.as_ref()))
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
