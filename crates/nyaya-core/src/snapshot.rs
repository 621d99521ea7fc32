//! # Snapshot Store
//!
//! Versioned, immutable graph snapshots behind an atomic pointer.
//!
//! A request pins the snapshot it started with (an `Arc<Snapshot>`) and
//! finishes against it even if a new snapshot is swapped in meanwhile.
//! Replacement never edits a graph in place.

use crate::error::GraphError;
use crate::graph::{Graph, GraphStore};
use crate::{Edge, Node};
use arc_swap::ArcSwap;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

// =============================================================================
// SNAPSHOT
// =============================================================================

/// One validated, immutable instance of the statute graph.
#[derive(Debug)]
pub struct Snapshot {
    version: String,
    as_of: Option<NaiveDate>,
    graph: Graph,
}

impl Snapshot {
    /// Validate `graph` and wrap it as a servable snapshot.
    pub fn new(
        version: impl Into<String>,
        as_of: Option<NaiveDate>,
        graph: Graph,
    ) -> Result<Self, GraphError> {
        graph.validate()?;
        Ok(Self {
            version: version.into(),
            as_of,
            graph,
        })
    }

    /// Snapshot with no provisions. Every query against it is unanswerable.
    #[must_use]
    pub fn empty(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            as_of: None,
            graph: Graph::empty(),
        }
    }

    /// Version label.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Date the corpus reflects, if known.
    #[must_use]
    pub fn as_of(&self) -> Option<NaiveDate> {
        self.as_of
    }

    /// The graph.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}

// =============================================================================
// SERIALIZATION SUPPORT
// =============================================================================

/// Flat, serializable form of a snapshot, shared by the JSON and binary
/// formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableSnapshot {
    pub version: String,
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl From<&Snapshot> for SerializableSnapshot {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            version: snapshot.version.clone(),
            as_of: snapshot.as_of,
            nodes: snapshot.graph.nodes().cloned().collect(),
            edges: snapshot.graph.edges().cloned().collect(),
        }
    }
}

impl TryFrom<SerializableSnapshot> for Snapshot {
    type Error = GraphError;

    fn try_from(serialized: SerializableSnapshot) -> Result<Self, Self::Error> {
        let graph = Graph::new(serialized.nodes, serialized.edges)?;
        Ok(Self {
            version: serialized.version,
            as_of: serialized.as_of,
            graph,
        })
    }
}

// =============================================================================
// SNAPSHOT STORE
// =============================================================================

/// Holder of the current snapshot.
///
/// Readers never block; a swap publishes the new snapshot atomically.
#[derive(Debug)]
pub struct SnapshotStore {
    current: ArcSwap<Snapshot>,
}

impl SnapshotStore {
    /// Create a store serving `snapshot`.
    #[must_use]
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(snapshot),
        }
    }

    /// The snapshot in force right now.
    #[must_use]
    pub fn current(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Atomically replace the served snapshot, returning the previous one.
    pub fn replace(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        info!(
            version = snapshot.version(),
            nodes = snapshot.graph().node_count(),
            edges = snapshot.graph().edge_count(),
            "snapshot swapped in"
        );
        self.current.swap(Arc::new(snapshot))
    }

    /// Validate a serialized snapshot and swap it in.
    ///
    /// On failure the current snapshot stays in force.
    pub fn replace_serialized(
        &self,
        serialized: SerializableSnapshot,
    ) -> Result<Arc<Snapshot>, GraphError> {
        let snapshot = Snapshot::try_from(serialized)?;
        Ok(self.replace(snapshot))
    }
}

// =============================================================================
// TESTS
// =============================================================================
