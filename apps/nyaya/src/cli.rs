//! # Command Line Interface
//!
//! Operator commands over a snapshot file. Every `cmd_*` function returns
//! the report it would print, so tests can inspect it; `run` prints it.
//!
//! Snapshot files may be JSON documents or binary snapshots; the format is
//! sniffed from the magic header.

use crate::api::{AppState, create_router};
use clap::{Parser, Subcommand};
use nyaya_core::formats::{decode_any, encode_snapshot, snapshot_to_json};
use nyaya_core::{
    Audience, ConfigError, Explanation, FormatError, Graph, GraphError, GraphStore, NodeKind,
    OfflineExplainer, Pipeline, PipelineConfig, QueryResponse, ReasoningTrace, ResponseValidator,
    SerializableSnapshot, SessionContext, Snapshot, SnapshotStore, StaticExplainer,
    ValidationResult,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

// =============================================================================
// ARGUMENTS
// =============================================================================

#[derive(Debug, Parser)]
#[command(name = "nyaya", version, about = "Graph-grounded legal question answering")]
pub struct Cli {
    /// Pipeline configuration (JSON). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load a snapshot and report statistics and integrity.
    Check {
        snapshot: PathBuf,
        /// Also print the effective configuration.
        #[arg(long)]
        print_config: bool,
    },

    /// Answer a question against a snapshot.
    Query {
        snapshot: PathBuf,
        text: String,
        #[arg(short, long, default_value = "citizen")]
        audience: String,
        /// Canned explainer output (JSON `{"text": ...}` or plain text).
        /// Without it the citation-only fallback answers.
        #[arg(short, long)]
        explanation: Option<PathBuf>,
        /// Previous question, for follow-ups.
        #[arg(long)]
        prior: Option<String>,
        #[arg(long)]
        json: bool,
        /// Append the reasoning trace.
        #[arg(long)]
        trace: bool,
    },

    /// Validate a response file against the context built for a question.
    Validate {
        snapshot: PathBuf,
        text: String,
        response: PathBuf,
        #[arg(short, long, default_value = "citizen")]
        audience: String,
        #[arg(long)]
        json: bool,
    },

    /// Verify citation strings against a snapshot.
    Citations {
        snapshot: PathBuf,
        citations: Vec<String>,
        /// File with one citation per line.
        #[arg(short, long)]
        file: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },

    /// Convert a snapshot to `json` or `binary`.
    Export {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long, default_value = "binary")]
        format: String,
    },

    /// Serve the read-only HTTP interface.
    Serve {
        snapshot: PathBuf,
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("snapshot rejected: {0}")]
    Graph(#[from] GraphError),

    #[error("snapshot has {0} integrity issue(s)")]
    Integrity(usize),

    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Argument(String),

    #[error("server: {0}")]
    Server(std::io::Error),
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, CliError> {
    std::fs::read(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_text(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), CliError> {
    std::fs::write(path, bytes).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_audience(value: &str) -> Result<Audience, CliError> {
    value.parse().map_err(CliError::Argument)
}

fn to_json<T: Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::Format(FormatError::Json(e)))
}

// =============================================================================
// LOADING
// =============================================================================

/// Load configuration, or the defaults when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, CliError> {
    match path {
        Some(path) => {
            let config = PipelineConfig::from_json_str(&read_text(path)?)?;
            debug!(path = %path.display(), rules = %config.rules.version, "configuration loaded");
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

/// Decode a snapshot file in either format, without integrity checks.
pub fn read_snapshot(path: &Path) -> Result<SerializableSnapshot, CliError> {
    Ok(decode_any(&read_bytes(path)?)?)
}

/// Decode and validate a snapshot file.
pub fn load_snapshot(path: &Path) -> Result<Snapshot, CliError> {
    let snapshot = Snapshot::try_from(read_snapshot(path)?)?;
    info!(
        path = %path.display(),
        version = snapshot.version(),
        nodes = snapshot.graph().node_count(),
        edges = snapshot.graph().edge_count(),
        "snapshot loaded"
    );
    Ok(snapshot)
}

/// Pipeline serving the snapshot at `path`.
pub fn load_pipeline(path: &Path, config: &PipelineConfig) -> Result<Pipeline, CliError> {
    let store = Arc::new(SnapshotStore::new(load_snapshot(path)?));
    Ok(Pipeline::new(store, config)?)
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Statistics and integrity report.
///
/// Every issue is reported before the command fails.
pub fn cmd_check(
    snapshot_path: &Path,
    config: &PipelineConfig,
    print_config: bool,
) -> Result<String, CliError> {
    let serialized = read_snapshot(snapshot_path)?;
    let graph = Graph::assume_valid(serialized.nodes, serialized.edges);

    let mut by_kind: BTreeMap<NodeKind, usize> = BTreeMap::new();
    for node in graph.nodes() {
        *by_kind.entry(node.kind()).or_default() += 1;
    }

    let mut out = String::new();
    let _ = writeln!(out, "Snapshot: {}", serialized.version);
    if let Some(as_of) = serialized.as_of {
        let _ = writeln!(out, "As of:    {as_of}");
    }
    let _ = writeln!(out, "Nodes:    {}", graph.node_count());
    for (kind, count) in &by_kind {
        let _ = writeln!(out, "  {:<11} {count}", kind.to_string());
    }
    let _ = writeln!(out, "Edges:    {}", graph.edge_count());

    let issues = graph.integrity_issues();
    if issues.is_empty() {
        let _ = writeln!(out, "Integrity: ok");
    } else {
        let _ = writeln!(out, "Integrity: {} issue(s)", issues.len());
        for issue in &issues {
            warn!(%issue, "integrity issue");
            let _ = writeln!(out, "  - {issue}");
        }
    }

    if print_config {
        let _ = writeln!(out, "\nConfiguration:\n{}", config.to_json_pretty()?);
    }

    if issues.is_empty() {
        Ok(out)
    } else {
        print!("{out}");
        Err(CliError::Integrity(issues.len()))
    }
}

/// Answer `text`, optionally with a canned explanation.
pub fn cmd_query(
    snapshot_path: &Path,
    config: &PipelineConfig,
    text: &str,
    audience: &str,
    explanation: Option<&Path>,
    prior: Option<&str>,
    json: bool,
    trace: bool,
) -> Result<String, CliError> {
    let audience = parse_audience(audience)?;
    let pipeline = load_pipeline(snapshot_path, config)?;
    let session = prior.map(SessionContext::with_prior_query);

    let response = match explanation {
        Some(path) => {
            let explainer = StaticExplainer::new(read_explanation(path)?);
            pipeline.process_query(text, audience, session.as_ref(), &explainer)
        }
        None => pipeline.process_query(text, audience, session.as_ref(), &OfflineExplainer),
    };

    let reasoning = if trace {
        pipeline.explain_reasoning(response.query_id)
    } else {
        None
    };

    if json {
        return to_json(&QueryReport {
            response: &response,
            reasoning: reasoning.as_ref(),
        });
    }

    let mut out = format!("{}\n\n{}", response.response_text, response.to_text());
    if let Some(reasoning) = reasoning {
        out.push('\n');
        out.push_str(&reasoning.to_text());
    }
    Ok(out)
}

#[derive(Serialize)]
struct QueryReport<'a> {
    response: &'a QueryResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<&'a ReasoningTrace>,
}

/// Explainer output file: JSON `Explanation`, else the raw text.
pub fn read_explanation(path: &Path) -> Result<Explanation, CliError> {
    let contents = read_text(path)?;
    match serde_json::from_str::<Explanation>(&contents) {
        Ok(explanation) => Ok(explanation),
        Err(_) => Ok(Explanation::new(contents.trim_end())),
    }
}

/// Run the validator over a response file.
pub fn validate_response(
    snapshot_path: &Path,
    config: &PipelineConfig,
    text: &str,
    response_path: &Path,
    audience: &str,
) -> Result<ValidationResult, CliError> {
    let audience = parse_audience(audience)?;
    let pipeline = load_pipeline(snapshot_path, config)?;
    let validator = ResponseValidator::new(&config.validator)?;
    let response = read_text(response_path)?;

    let prepared = pipeline.prepare(text, audience, None);
    Ok(validator.validate(&response, &prepared.context().citation_map, audience))
}

pub fn cmd_validate(
    snapshot_path: &Path,
    config: &PipelineConfig,
    text: &str,
    response_path: &Path,
    audience: &str,
    json: bool,
) -> Result<String, CliError> {
    let result = validate_response(snapshot_path, config, text, response_path, audience)?;
    if json {
        return to_json(&result);
    }

    let mut out = String::new();
    let verdict = if !result.is_valid {
        "INVALID"
    } else if result.needs_review() {
        "VALID (needs review)"
    } else {
        "VALID"
    };
    let _ = writeln!(out, "Verdict: {verdict}");
    let _ = writeln!(
        out,
        "Citations: {} valid, {} fabricated",
        result.valid_citation_count,
        result.fabricated_references.len()
    );
    let _ = writeln!(out, "Claims: {}", result.claim_count);
    let _ = writeln!(out, "Adjustment: {}", result.confidence_adjustment);

    let sections: [(&str, &[String]); 5] = [
        ("Cited", &result.citations_found),
        ("Fabricated", &result.fabricated_references),
        ("Unsupported claims", &result.unsupported_claims),
        ("Prohibited language", &result.prohibited_language),
        ("Format violations", &result.format_violations),
    ];
    for (title, items) in sections {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{title}:");
        for item in items {
            let _ = writeln!(out, "  - {item}");
        }
    }
    Ok(out)
}

/// Bulk citation verification.
pub fn cmd_citations(
    snapshot_path: &Path,
    config: &PipelineConfig,
    citations: &[String],
    file: Option<&Path>,
    json: bool,
) -> Result<String, CliError> {
    let mut all: Vec<String> = citations.to_vec();
    if let Some(path) = file {
        all.extend(
            read_text(path)?
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        );
    }
    if all.is_empty() {
        return Err(CliError::Argument("no citations given".to_string()));
    }

    let pipeline = load_pipeline(snapshot_path, config)?;
    let checks = pipeline.validate_citations(&all);
    if json {
        return to_json(&checks);
    }

    let mut out = String::new();
    for check in &checks {
        match &check.resolved_node_id {
            Some(id) if check.is_unambiguous() => {
                let _ = writeln!(out, "ok       {} -> {id}", check.citation);
            }
            Some(id) => {
                let _ = writeln!(
                    out,
                    "ambiguous {} -> {id} ({} candidates)",
                    check.citation,
                    check.candidates.len()
                );
            }
            None => {
                let _ = writeln!(out, "missing  {}", check.citation);
            }
        }
    }
    let found = checks.iter().filter(|c| c.exists).count();
    let _ = writeln!(out, "{found}/{} citation(s) resolved", checks.len());
    Ok(out)
}

/// Validate a snapshot and write it in `format` (`json` or `binary`).
pub fn cmd_export(input: &Path, output: &Path, format: &str) -> Result<String, CliError> {
    let snapshot = load_snapshot(input)?;
    let serialized = SerializableSnapshot::from(&snapshot);

    let bytes = match format {
        "json" => snapshot_to_json(&serialized)?.into_bytes(),
        "binary" => encode_snapshot(&serialized)?,
        other => {
            return Err(CliError::Argument(format!(
                "unknown export format `{other}` (expected json or binary)"
            )));
        }
    };
    write_bytes(output, &bytes)?;

    info!(output = %output.display(), format, bytes = bytes.len(), "snapshot exported");
    Ok(format!(
        "Exported {} ({} nodes, {} edges) to {} as {format}",
        snapshot.version(),
        snapshot.graph().node_count(),
        snapshot.graph().edge_count(),
        output.display()
    ))
}

/// Serve the HTTP interface until Ctrl-C.
pub async fn cmd_serve(
    snapshot_path: &Path,
    config: &PipelineConfig,
    addr: SocketAddr,
) -> Result<(), CliError> {
    let pipeline = Arc::new(load_pipeline(snapshot_path, config)?);
    let app = create_router(AppState::new(pipeline));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(CliError::Server)?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(CliError::Server)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Execute a parsed command line.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config.as_deref())?;

    let out = match cli.command {
        Command::Check {
            snapshot,
            print_config,
        } => cmd_check(&snapshot, &config, print_config)?,
        Command::Query {
            snapshot,
            text,
            audience,
            explanation,
            prior,
            json,
            trace,
        } => cmd_query(
            &snapshot,
            &config,
            &text,
            &audience,
            explanation.as_deref(),
            prior.as_deref(),
            json,
            trace,
        )?,
        Command::Validate {
            snapshot,
            text,
            response,
            audience,
            json,
        } => cmd_validate(&snapshot, &config, &text, &response, &audience, json)?,
        Command::Citations {
            snapshot,
            citations,
            file,
            json,
        } => cmd_citations(&snapshot, &config, &citations, file.as_deref(), json)?,
        Command::Export {
            input,
            output,
            format,
        } => cmd_export(&input, &output, &format)?,
        Command::Serve { snapshot, addr } => {
            return cmd_serve(&snapshot, &config, addr).await;
        }
    };

    print!("{out}");
    if !out.ends_with('\n') {
        println!();
    }
    Ok(())
}
