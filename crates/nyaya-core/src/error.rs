//! # Errors
//!
//! Failure types for the fallible surfaces of the crate: loading a snapshot,
//! decoding a snapshot file and compiling configuration.
//!
//! Query processing itself never returns these. Data-shape problems met
//! while answering a query are folded into `ConfidenceScore` and
//! `ValidationResult` instead.

use crate::{NodeId, Relation};
use thiserror::Error;

/// Referential-integrity violations that block a snapshot from being served.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("duplicate node id `{0}`")]
    DuplicateNode(NodeId),

    #[error("node `{node}` has {field} `{target}` which is missing or of the wrong kind")]
    DanglingReference {
        node: NodeId,
        field: &'static str,
        target: NodeId,
    },

    #[error("{relation} edge `{from}` -> `{to}` has a missing endpoint")]
    DanglingEdge {
        relation: Relation,
        from: NodeId,
        to: NodeId,
    },

    #[error("contains relation forms a cycle through `{0}`")]
    ContainsCycle(NodeId),

    #[error("node `{0}` is contained by more than one parent")]
    MultipleParents(NodeId),
}

/// Snapshot encoding and decoding failures.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid binary snapshot: {0}")]
    Postcard(#[from] postcard::Error),

    #[error("not a binary snapshot (bad magic header)")]
    BadMagic,

    #[error("unsupported binary snapshot version {0}")]
    UnsupportedVersion(u8),

    #[error("snapshot failed integrity validation: {0}")]
    Graph(#[from] GraphError),
}

/// Configuration failures: rule tables, weights and validator settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("confidence weights sum to {0} basis points, expected 10000")]
    WeightsSum(u32),

    #[error("thresholds must be descending (high > medium > low)")]
    ThresholdOrder,

    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of the external explanation provider.
///
/// The pipeline answers every one of these with the citation-only
/// fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExplainerError {
    #[error("explanation provider is unavailable")]
    Unavailable,

    #[error("explanation provider timed out")]
    Timeout,

    #[error("explanation provider failed: {0}")]
    Provider(String),
}

/// Failures of the optional translation service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    #[error("translation from `{from}` to `{to}` is not supported")]
    UnsupportedPair { from: String, to: String },

    #[error("translation service failed: {0}")]
    Service(String),
}
