//! JSON snapshot documents.
//!
//! ```json
//! {
//!   "version": "cpa-2019-r1",
//!   "as_of": "2024-01-01",
//!   "nodes": [{"section": {"id": "CPA_S2", "act": "...", ...}}],
//!   "edges": [{"defines": {"source_section": "CPA_S2", "target_definition": "DEF_consumer"}}]
//! }
//! ```

use crate::error::FormatError;
use crate::snapshot::SerializableSnapshot;

/// Parse a snapshot document from a string.
pub fn snapshot_from_json(json: &str) -> Result<SerializableSnapshot, FormatError> {
    Ok(serde_json::from_str(json)?)
}

/// Parse a snapshot document from raw bytes.
pub fn snapshot_from_json_slice(bytes: &[u8]) -> Result<SerializableSnapshot, FormatError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Render a snapshot document as pretty-printed JSON.
pub fn snapshot_to_json(snapshot: &SerializableSnapshot) -> Result<String, FormatError> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeKind;

    const DOC: &str = r#"{
        "version": "test-1",
        "as_of": "2024-01-01",
        "nodes": [
            {"section": {"id": "S2", "act": "Act", "number": "2", "title": "Definitions",
                         "text": "In this Act", "effective_date": "2020-07-20"}},
            {"definition": {"id": "DEF_consumer", "term": "consumer",
                            "text": "any person who buys goods", "defined_in_section_id": "S2"}}
        ],
        "edges": [
            {"defines": {"source_section": "S2", "target_definition": "DEF_consumer"}}
        ]
    }"#;

    #[test]
    fn parses_document() {
        let snapshot = snapshot_from_json(DOC).unwrap();
        assert_eq!(snapshot.version, "test-1");
        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.nodes[1].kind(), NodeKind::Definition);
        assert_eq!(snapshot.edges.len(), 1);
    }

    #[test]
    fn rejects_unknown_node_kind() {
        let doc = r#"{"version": "x", "nodes": [{"schedule": {"id": "X"}}]}"#;
        assert!(matches!(snapshot_from_json(doc), Err(FormatError::Json(_))));
    }

    #[test]
    fn pretty_output_parses_back() {
        let snapshot = snapshot_from_json(DOC).unwrap();
        let rendered = snapshot_to_json(&snapshot).unwrap();
        assert_eq!(snapshot_from_json(&rendered).unwrap(), snapshot);
    }
}
