//! # Nyaya Core
//!
//! Graph-grounded legal question answering.
//!
//! A question is classified, resolved against an immutable statute graph,
//! and turned into an audience-tailored context whose citations form an
//! allow-list. Whatever an external explainer writes back is checked
//! against that allow-list and scored before anyone sees it.
//!
//! ```text
//! query ─► traversal ─► context ─► [explainer] ─► validation ─► confidence
//! ```
//!
//! Everything here is synchronous and deterministic: ordered maps only,
//! integer scores in basis points, no wall-clock reads. File I/O, network
//! surfaces and the explainer itself live outside this crate.

pub mod cache;
pub mod compositor;
pub mod confidence;
pub mod config;
pub mod context;
pub mod error;
pub mod explainer;
pub mod formats;
pub mod graph;
pub mod grounding;
pub mod pipeline;
pub mod primitives;
pub mod prompt;
pub mod query;
pub mod response;
pub mod rules;
pub mod snapshot;
pub mod traversal;
pub mod types;
pub mod validation;

pub use confidence::{ConfidenceLevel, ConfidenceScore, ConfidenceScorer, Thresholds, Weights};
pub use config::PipelineConfig;
pub use context::{Audience, CitationMap, ContextBuilder, LlmContext};
pub use error::{ConfigError, ExplainerError, FormatError, GraphError, TranslationError};
pub use explainer::{Explainer, Explanation, ExplanationRequest, OfflineExplainer, StaticExplainer};
pub use graph::{Graph, GraphStore};
pub use grounding::CitationCheck;
pub use pipeline::{Pipeline, PreparedQuery};
pub use primitives::{MAX_HOPS, Score, ScoreDelta};
pub use query::{IntentType, QueryIntent, QueryParser, SessionContext};
pub use response::{Outcome, QueryId, QueryResponse, ReasoningTrace};
pub use rules::RuleTable;
pub use snapshot::{SerializableSnapshot, Snapshot, SnapshotStore};
pub use traversal::{GraphContext, TraversalEngine};
pub use types::{Clause, Definition, Direction, Edge, Node, NodeId, NodeKind, Relation, Right, Section};
pub use validation::{ResponseValidator, ValidationResult};
