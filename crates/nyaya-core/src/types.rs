//! # Types
//!
//! Node and edge definitions for the statute graph.
//!
//! Nodes are a closed union of four provision kinds. Edges are directional
//! and may repeat between the same pair with different context. Both are
//! immutable once a snapshot is loaded.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Stable, globally unique node identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Wrap an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Canonical id of a section: `{ACT}_S{number}`.
    #[must_use]
    pub fn section(act_code: &str, number: &str) -> Self {
        Self(format!("{}_S{}", act_code.to_uppercase(), number))
    }

    /// Canonical id of a clause: `{section}_C{label}`.
    #[must_use]
    pub fn clause(section: &NodeId, label: &str) -> Self {
        Self(format!("{}_C{}", section.0, slug(label)))
    }

    /// Canonical id of a definition: `DEF_{term}`.
    #[must_use]
    pub fn definition(term: &str) -> Self {
        Self(format!("DEF_{}", slug(term)))
    }

    /// Canonical id of a right: `RIGHT_{name}`.
    #[must_use]
    pub fn right(name: &str) -> Self {
        Self(format!("RIGHT_{}", slug(name)))
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Lower-case, underscore-joined slug of alphanumeric runs.
fn slug(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

// =============================================================================
// NODES
// =============================================================================

/// Discriminant of a `Node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Section,
    Clause,
    Definition,
    Right,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Section => "section",
            Self::Clause => "clause",
            Self::Definition => "definition",
            Self::Right => "right",
        };
        f.write_str(name)
    }
}

/// A numbered section of an act.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: NodeId,
    pub act: String,
    pub number: String,
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub chapter: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
}

/// A labelled sub-provision of a section, e.g. `(a)` or `(7)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    pub id: NodeId,
    pub parent_section_id: NodeId,
    pub label: String,
    pub text: String,
    #[serde(default)]
    pub clause_type: Option<String>,
}

/// A statutory definition of a term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub id: NodeId,
    pub term: String,
    pub text: String,
    pub defined_in_section_id: NodeId,
    #[serde(default)]
    pub clause_ref: Option<String>,
}

/// A right conferred on a class of beneficiary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Right {
    pub id: NodeId,
    pub description: String,
    pub granted_by_clause_id: NodeId,
    #[serde(default)]
    pub beneficiary: Option<String>,
    #[serde(default)]
    pub right_type: Option<String>,
}

/// A node in the statute graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Section(Section),
    Clause(Clause),
    Definition(Definition),
    Right(Right),
}

impl Node {
    /// Identifier of the node.
    #[must_use]
    pub fn id(&self) -> &NodeId {
        match self {
            Self::Section(s) => &s.id,
            Self::Clause(c) => &c.id,
            Self::Definition(d) => &d.id,
            Self::Right(r) => &r.id,
        }
    }

    /// Kind of the node.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Section(_) => NodeKind::Section,
            Self::Clause(_) => NodeKind::Clause,
            Self::Definition(_) => NodeKind::Definition,
            Self::Right(_) => NodeKind::Right,
        }
    }

    /// The provision's own text.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Section(s) => &s.text,
            Self::Clause(c) => &c.text,
            Self::Definition(d) => &d.text,
            Self::Right(r) => &r.description,
        }
    }

    /// Every searchable field joined with spaces.
    #[must_use]
    pub fn searchable_text(&self) -> String {
        match self {
            Self::Section(s) => format!("{} {}", s.title, s.text),
            Self::Clause(c) => c.text.clone(),
            Self::Definition(d) => format!("{} {}", d.term, d.text),
            Self::Right(r) => {
                let mut text = r.description.clone();
                for extra in [&r.beneficiary, &r.right_type].into_iter().flatten() {
                    text.push(' ');
                    text.push_str(extra);
                }
                text
            }
        }
    }

    /// Field references this node makes to other nodes.
    #[must_use]
    pub fn field_references(&self) -> Option<(&'static str, &NodeId)> {
        match self {
            Self::Section(_) => None,
            Self::Clause(c) => Some(("parent_section_id", &c.parent_section_id)),
            Self::Definition(d) => Some(("defined_in_section_id", &d.defined_in_section_id)),
            Self::Right(r) => Some(("granted_by_clause_id", &r.granted_by_clause_id)),
        }
    }

    /// Section data, if this is a section.
    #[must_use]
    pub fn as_section(&self) -> Option<&Section> {
        match self {
            Self::Section(s) => Some(s),
            _ => None,
        }
    }
}

// =============================================================================
// EDGES
// =============================================================================

/// A directed, possibly repeated, relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Contains {
        parent: NodeId,
        child: NodeId,
    },
    References {
        from: NodeId,
        to: NodeId,
        #[serde(default)]
        context_text: Option<String>,
    },
    Defines {
        source_section: NodeId,
        target_definition: NodeId,
    },
}

impl Edge {
    /// `(from, to)` in the edge's own direction.
    #[must_use]
    pub fn endpoints(&self) -> (&NodeId, &NodeId) {
        match self {
            Self::Contains { parent, child } => (parent, child),
            Self::References { from, to, .. } => (from, to),
            Self::Defines {
                source_section,
                target_definition,
            } => (source_section, target_definition),
        }
    }

    /// Relation carried by the edge.
    #[must_use]
    pub fn relation(&self) -> Relation {
        match self {
            Self::Contains { .. } => Relation::Contains,
            Self::References { .. } => Relation::References,
            Self::Defines { .. } => Relation::Defines,
        }
    }

    /// Reference context, if any.
    #[must_use]
    pub fn context_text(&self) -> Option<&str> {
        match self {
            Self::References { context_text, .. } => context_text.as_deref(),
            _ => None,
        }
    }
}

/// Relation kinds traversal can follow.
///
/// `GrantedBy` is not stored as an edge; it is derived from
/// `Right::granted_by_clause_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Contains,
    References,
    Defines,
    GrantedBy,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Contains => "contains",
            Self::References => "references",
            Self::Defines => "defines",
            Self::GrantedBy => "granted_by",
        };
        f.write_str(name)
    }
}

/// Whether a link follows its relation forwards or backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Reverse,
}

// =============================================================================
// TESTS
// =============================================================================
