//! Integration tests for Nyaya CLI commands and the HTTP surface.
//!
//! Uses tempfile for snapshot, response and configuration files.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum_test::TestServer;
use nyaya::api::{AppState, create_router};
use nyaya::cli::{
    CliError, cmd_check, cmd_citations, cmd_export, cmd_query, cmd_validate, load_config,
    load_pipeline, load_snapshot, read_explanation, validate_response,
};
use nyaya::nyaya_core::formats::{MAGIC, is_binary_snapshot};
use nyaya::nyaya_core::prompt::{FALLBACK_HEADER, INFORMATION_NOT_AVAILABLE};
use nyaya::nyaya_core::{GraphStore, PipelineConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const SECTION_2: &str = "Consumer Protection Act, 2019, Section 2";
const SECTION_35: &str = "Consumer Protection Act, 2019, Section 35";

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Create a temporary directory for tests.
fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Write `content` to `name` inside `dir`.
fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// A small, valid snapshot document.
fn create_snapshot_json(dir: &TempDir) -> PathBuf {
    write_file(
        dir,
        "snapshot.json",
        r#"{
        "version": "cpa-test-v1",
        "as_of": "2024-01-01",
        "nodes": [
            {"section": {"id": "CPA_S2", "act": "Consumer Protection Act, 2019", "number": "2",
                         "title": "Definitions", "text": "In this Act, unless the context otherwise requires,",
                         "chapter": "I"}},
            {"definition": {"id": "DEF_consumer", "term": "consumer",
                            "text": "any person who buys any goods for a consideration",
                            "defined_in_section_id": "CPA_S2"}},
            {"section": {"id": "CPA_S35", "act": "Consumer Protection Act, 2019", "number": "35",
                         "title": "Manner in which complaint shall be made",
                         "text": "A complaint in relation to any goods sold or delivered may be filed with a District Commission",
                         "chapter": "IV"}},
            {"section": {"id": "CPA_S39", "act": "Consumer Protection Act, 2019", "number": "39",
                         "title": "Findings of District Commission",
                         "text": "The District Commission may issue an order to remove the defect pointed out",
                         "chapter": "IV"}}
        ],
        "edges": [
            {"references": {"from": "CPA_S35", "to": "CPA_S39", "context_text": "orders on a complaint"}}
        ]
    }"#,
    )
}

/// A snapshot whose definition points at a section that does not exist.
fn create_dangling_snapshot_json(dir: &TempDir) -> PathBuf {
    write_file(
        dir,
        "dangling.json",
        r#"{
        "version": "broken",
        "nodes": [
            {"definition": {"id": "DEF_orphan", "term": "orphan", "text": "no home",
                            "defined_in_section_id": "CPA_S404"}}
        ]
    }"#,
    )
}

fn config() -> PipelineConfig {
    PipelineConfig::default()
}

// =============================================================================
// LOADING TESTS
// =============================================================================

#[test]
fn test_load_snapshot_json() {
    let temp = create_temp_dir();
    let path = create_snapshot_json(&temp);

    let snapshot = load_snapshot(&path).unwrap();
    assert_eq!(snapshot.version(), "cpa-test-v1");
    assert_eq!(snapshot.graph().node_count(), 4);
    assert_eq!(snapshot.graph().edge_count(), 1);
}

#[test]
fn test_load_snapshot_missing_file() {
    let temp = create_temp_dir();
    let result = load_snapshot(&temp.path().join("absent.json"));
    assert!(matches!(result, Err(CliError::Io { .. })));
}

#[test]
fn test_load_snapshot_rejects_dangling_reference() {
    let temp = create_temp_dir();
    let path = create_dangling_snapshot_json(&temp);
    assert!(matches!(load_snapshot(&path), Err(CliError::Graph(_))));
}

#[test]
fn test_load_snapshot_rejects_garbage() {
    let temp = create_temp_dir();
    let path = write_file(&temp, "garbage.json", "not a snapshot");
    assert!(matches!(load_snapshot(&path), Err(CliError::Format(_))));
}

#[test]
fn test_load_config_defaults_and_file() {
    let temp = create_temp_dir();
    assert_eq!(load_config(None).unwrap(), PipelineConfig::default());

    let path = write_file(&temp, "config.json", r#"{"max_nodes": 12, "proximity_window": 150}"#);
    let loaded = load_config(Some(&path)).unwrap();
    assert_eq!(loaded.max_nodes, 12);
    assert_eq!(loaded.validator.proximity_window, 150);
}

#[test]
fn test_load_config_rejects_bad_weights() {
    let temp = create_temp_dir();
    let path = write_file(
        &temp,
        "config.json",
        r#"{"weights": {"coverage": 5000, "citation_density": 3000, "chain_length": 1500,
                        "uncertainty": 1000, "temporal": 500}}"#,
    );
    assert!(matches!(load_config(Some(&path)), Err(CliError::Config(_))));
}

// =============================================================================
// CHECK COMMAND TESTS
// =============================================================================

#[test]
fn test_check_reports_statistics() {
    let temp = create_temp_dir();
    let path = create_snapshot_json(&temp);

    let report = cmd_check(&path, &config(), false).unwrap();
    assert!(report.contains("Snapshot: cpa-test-v1"));
    assert!(report.contains("As of:    2024-01-01"));
    assert!(report.contains("Nodes:    4"));
    assert!(report.contains("Integrity: ok"));
    assert!(!report.contains("Configuration:"));
}

#[test]
fn test_check_prints_config() {
    let temp = create_temp_dir();
    let path = create_snapshot_json(&temp);

    let report = cmd_check(&path, &config(), true).unwrap();
    assert!(report.contains("Configuration:"));
    assert!(report.contains("\"max_context_chars\""));
}

#[test]
fn test_check_fails_on_integrity_issues() {
    let temp = create_temp_dir();
    let path = create_dangling_snapshot_json(&temp);

    let result = cmd_check(&path, &config(), false);
    assert!(matches!(result, Err(CliError::Integrity(1))));
}

// =============================================================================
// QUERY COMMAND TESTS
// =============================================================================

#[test]
fn test_query_offline_uses_fallback() {
    let temp = create_temp_dir();
    let path = create_snapshot_json(&temp);

    let out = cmd_query(
        &path,
        &config(),
        "What is a consumer?",
        "citizen",
        None,
        None,
        false,
        false,
    )
    .unwrap();
    assert!(out.starts_with(FALLBACK_HEADER));
    assert!(out.contains(&format!("[Citation: {SECTION_2}]")));
    assert!(out.contains("| delivered |"));
}

#[test]
fn test_query_missing_section() {
    let temp = create_temp_dir();
    let path = create_snapshot_json(&temp);

    let out = cmd_query(&path, &config(), "Section 999", "lawyer", None, None, false, false)
        .unwrap();
    assert!(out.starts_with(INFORMATION_NOT_AVAILABLE));
    assert!(out.contains("| blocked |"));
}

#[test]
fn test_query_with_explanation_file() {
    let temp = create_temp_dir();
    let path = create_snapshot_json(&temp);
    let explanation = write_file(
        &temp,
        "explanation.json",
        &format!(
            r#"{{"text": "A consumer is \"any person who buys any goods for a consideration\" [Citation: {SECTION_2}]."}}"#
        ),
    );

    let out = cmd_query(
        &path,
        &config(),
        "What is a consumer?",
        "citizen",
        Some(&explanation),
        None,
        true,
        false,
    )
    .unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["response"]["outcome"], "delivered");
    assert_eq!(value["response"]["scope"]["used_fallback"], false);
    assert_eq!(value["response"]["validation"]["is_valid"], true);
    assert!(value.get("reasoning").is_none());
}

#[test]
fn test_query_json_with_trace() {
    let temp = create_temp_dir();
    let path = create_snapshot_json(&temp);

    let out = cmd_query(&path, &config(), "Section 35", "judge", None, None, true, true).unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["response"]["scope"]["audience"], "judge");
    assert_eq!(value["reasoning"]["steps"].as_array().unwrap().len(), 2);
}

#[test]
fn test_query_text_with_trace() {
    let temp = create_temp_dir();
    let path = create_snapshot_json(&temp);

    let out = cmd_query(&path, &config(), "Section 35", "lawyer", None, None, false, true)
        .unwrap();
    assert!(out.contains("GRAPH TRAVERSAL"));
    assert!(out.contains("CPA_S39 via references CPA_S35 -> CPA_S39"));
}

#[test]
fn test_query_rejects_unknown_audience() {
    let temp = create_temp_dir();
    let path = create_snapshot_json(&temp);

    let result = cmd_query(&path, &config(), "Section 35", "jury", None, None, false, false);
    assert!(matches!(result, Err(CliError::Argument(_))));
}

#[test]
fn test_read_explanation_plain_text() {
    let temp = create_temp_dir();
    let path = write_file(&temp, "explanation.txt", "Plain answer.\n");

    let explanation = read_explanation(&path).unwrap();
    assert_eq!(explanation.text, "Plain answer.");
    assert_eq!(explanation.uncertainty, None);
}

// =============================================================================
// VALIDATE COMMAND TESTS
// =============================================================================

#[test]
fn test_validate_flags_fabricated_citation() {
    let temp = create_temp_dir();
    let path = create_snapshot_json(&temp);
    let response = write_file(
        &temp,
        "response.txt",
        "A complaint may be filed [Citation: Section 77].",
    );

    let result = validate_response(&path, &config(), "Section 35", &response, "lawyer").unwrap();
    assert!(!result.is_valid);
    assert_eq!(result.fabricated_references, vec!["Section 77".to_string()]);

    let report = cmd_validate(&path, &config(), "Section 35", &response, "lawyer", false).unwrap();
    assert!(report.starts_with("Verdict: INVALID"));
    assert!(report.contains("Fabricated:\n  - Section 77"));
}

#[test]
fn test_validate_accepts_grounded_response() {
    let temp = create_temp_dir();
    let path = create_snapshot_json(&temp);
    let response = write_file(
        &temp,
        "response.txt",
        &format!("Section 35 says \"a complaint may be filed\" [Citation: {SECTION_35}]."),
    );

    let report = cmd_validate(&path, &config(), "Section 35", &response, "lawyer", true).unwrap();
    let value: serde_json::Value = serde_json::from_str(&report).unwrap();
    assert_eq!(value["is_valid"], true);
    assert_eq!(value["fabricated_references"].as_array().unwrap().len(), 0);
}

// =============================================================================
// CITATIONS COMMAND TESTS
// =============================================================================

#[test]
fn test_citations_reports_resolved_and_missing() {
    let temp = create_temp_dir();
    let path = create_snapshot_json(&temp);

    let out = cmd_citations(
        &path,
        &config(),
        &[SECTION_35.to_string(), "Section 77".to_string()],
        None,
        false,
    )
    .unwrap();
    assert!(out.contains(&format!("ok       {SECTION_35} -> CPA_S35")));
    assert!(out.contains("missing  Section 77"));
    assert!(out.contains("1/2 citation(s) resolved"));
}

#[test]
fn test_citations_from_file_as_json() {
    let temp = create_temp_dir();
    let path = create_snapshot_json(&temp);
    let list = write_file(&temp, "citations.txt", "# bulk check\nsection 39\n\nSection 404\n");

    let out = cmd_citations(&path, &config(), &[], Some(&list), true).unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    let checks = value.as_array().unwrap();
    assert_eq!(checks.len(), 2);
    assert_eq!(checks[0]["exists"], true);
    assert_eq!(checks[0]["resolved_node_id"], "CPA_S39");
    assert_eq!(checks[1]["exists"], false);
}

#[test]
fn test_citations_requires_input() {
    let temp = create_temp_dir();
    let path = create_snapshot_json(&temp);

    let result = cmd_citations(&path, &config(), &[], None, false);
    assert!(matches!(result, Err(CliError::Argument(_))));
}

// =============================================================================
// EXPORT COMMAND TESTS
// =============================================================================

#[test]
fn test_export_binary_then_load() {
    let temp = create_temp_dir();
    let path = create_snapshot_json(&temp);
    let output = temp.path().join("snapshot.bin");

    let summary = cmd_export(&path, &output, "binary").unwrap();
    assert!(summary.contains("4 nodes, 1 edges"));

    let bytes = std::fs::read(&output).unwrap();
    assert!(bytes.starts_with(MAGIC));
    assert!(is_binary_snapshot(&bytes));

    let reloaded = load_snapshot(&output).unwrap();
    assert_eq!(reloaded.version(), "cpa-test-v1");
    assert_eq!(reloaded.graph().node_count(), 4);
}

#[test]
fn test_export_binary_back_to_json_is_stable() {
    let temp = create_temp_dir();
    let path = create_snapshot_json(&temp);
    let binary = temp.path().join("snapshot.bin");
    let json1 = temp.path().join("one.json");
    let json2 = temp.path().join("two.json");

    cmd_export(&path, &json1, "json").unwrap();
    cmd_export(&json1, &binary, "binary").unwrap();
    cmd_export(&binary, &json2, "json").unwrap();

    let first = std::fs::read_to_string(&json1).unwrap();
    let second = std::fs::read_to_string(&json2).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_export_unknown_format() {
    let temp = create_temp_dir();
    let path = create_snapshot_json(&temp);

    let result = cmd_export(&path, &temp.path().join("out"), "yaml");
    assert!(matches!(result, Err(CliError::Argument(_))));
    assert!(!temp.path().join("out").exists());
}

#[test]
fn test_export_refuses_invalid_snapshot() {
    let temp = create_temp_dir();
    let path = create_dangling_snapshot_json(&temp);

    let result = cmd_export(&path, &temp.path().join("out.bin"), "binary");
    assert!(matches!(result, Err(CliError::Graph(_))));
}

// =============================================================================
// HTTP SURFACE TESTS
// =============================================================================

fn test_server(temp: &TempDir) -> TestServer {
    let path = create_snapshot_json(temp);
    let pipeline = Arc::new(load_pipeline(&path, &config()).unwrap());
    TestServer::new(create_router(AppState::new(pipeline))).unwrap()
}

#[tokio::test]
async fn test_api_health() {
    let temp = create_temp_dir();
    let server = test_server(&temp);

    let response = server.get("/health").await;
    assert_eq!(response.status_code(), 200);

    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["snapshot_version"], "cpa-test-v1");
    assert_eq!(body["nodes"], 4);
    assert_eq!(body["trace_cache"]["size"], 0);
}

#[tokio::test]
async fn test_api_query_then_reasoning() {
    let temp = create_temp_dir();
    let server = test_server(&temp);

    let response = server
        .post("/query")
        .json(&serde_json::json!({"query": "What is a consumer?", "audience": "lawyer"}))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: serde_json::Value = response.json();
    assert_eq!(body["scope"]["used_fallback"], true);
    assert_eq!(body["citations"][0], SECTION_2);
    let id = body["query_id"].as_u64().unwrap();

    let trace = server.get(&format!("/reasoning/{id}")).await;
    assert_eq!(trace.status_code(), 200);
    let trace: serde_json::Value = trace.json();
    assert!(trace["text"].as_str().unwrap().contains("QUERY ANALYSIS"));
    assert_eq!(trace["trace"]["citations_used"][0], SECTION_2);
}

#[tokio::test]
async fn test_api_query_blocks_fabricated_explanation() {
    let temp = create_temp_dir();
    let server = test_server(&temp);

    let response = server
        .post("/query")
        .json(&serde_json::json!({
            "query": "Section 35",
            "audience": "lawyer",
            "explanation": {"text": "A complaint may be filed [Citation: Section 77]."}
        }))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: serde_json::Value = response.json();
    assert_eq!(body["outcome"], "blocked");
    assert_eq!(body["validation"]["fabricated_references"][0], "Section 77");
}

#[tokio::test]
async fn test_api_query_blank_text_gets_degraded_answer() {
    let temp = create_temp_dir();
    let server = test_server(&temp);

    let response = server
        .post("/query")
        .json(&serde_json::json!({"query": "   "}))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: serde_json::Value = response.json();
    assert_eq!(body["outcome"], "blocked");
    assert_eq!(body["response_text"], INFORMATION_NOT_AVAILABLE);
    assert_eq!(body["scope"]["information_available"], false);
    let id = body["query_id"].as_u64().unwrap();

    let trace: serde_json::Value = server.get(&format!("/reasoning/{id}")).await.json();
    assert_eq!(trace["trace"]["intent"]["degraded"], true);
}

#[tokio::test]
async fn test_api_unknown_reasoning_trace() {
    let temp = create_temp_dir();
    let server = test_server(&temp);

    let response = server.get("/reasoning/999").expect_failure().await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_api_citations() {
    let temp = create_temp_dir();
    let server = test_server(&temp);

    let response = server
        .post("/citations")
        .json(&serde_json::json!({"citations": [SECTION_35, "Section 77"]}))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: serde_json::Value = response.json();
    assert_eq!(body[0]["resolved_node_id"], "CPA_S35");
    assert_eq!(body[1]["exists"], false);
}
