//! docreview - LLM Document Review & Response Normalization Pipeline
//!
//! A Rust microservice for scoring documents with language models, repairing
//! malformed model output, and exporting structured review records.
//!
//! ## Usage
//!
//! ### CLI Mode
//! ```bash
//! docreview analyze ./papers --llm-base-url https://api.openai.com/v1 --llm-key sk-...
//! ```
//!
//! ### HTTP Server Mode
//! ```bash
//! docreview serve --port 3000 --llm-base-url https://api.openai.com/v1 --llm-key sk-...
//! ```

use anyhow::{Context, Result};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use clap::{Parser, Subcommand};
use docreview::provider::{HttpCompletionProvider, ProviderConfig};
use docreview::review::{self, AnalysisDepth, ReviewDocument, ReviewOptions, ReviewRecord};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable consulted when --llm-key is not given
const API_KEY_ENV: &str = "DOCREVIEW_LLM_KEY";

// ============================================================================
// CLI Definition
// ============================================================================

/// LLM Document Review & Response Normalization Pipeline - Rust Microservice
#[derive(Parser)]
#[command(name = "docreview")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Review documents in a directory and export a CSV of records
    Analyze {
        /// Directory containing .txt/.md documents
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// LLM API base URL (e.g., https://api.openai.com/v1)
        #[arg(long)]
        llm_base_url: String,

        /// LLM API key (falls back to DOCREVIEW_LLM_KEY)
        #[arg(long)]
        llm_key: Option<String>,

        /// LLM model name
        #[arg(long, default_value = "gpt-4o-mini")]
        llm_model: String,

        /// Analysis depth
        #[arg(long, default_value = "Standard", value_parser = ["Quick", "Standard", "Detailed"])]
        depth: String,

        /// Comma-separated criteria names (default: all built-in criteria)
        #[arg(long)]
        criteria: Option<String>,

        /// Reviewer name recorded in each result
        #[arg(long, default_value = "docreview")]
        reviewer: String,
    },

    /// Run as HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// LLM API base URL
        #[arg(long)]
        llm_base_url: String,

        /// LLM API key (falls back to DOCREVIEW_LLM_KEY)
        #[arg(long)]
        llm_key: Option<String>,

        /// LLM model name
        #[arg(long, default_value = "gpt-4o-mini")]
        llm_model: String,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Analyze {
            input,
            output,
            llm_base_url,
            llm_key,
            llm_model,
            depth,
            criteria,
            reviewer,
        } => {
            run_analyze(
                input,
                output,
                llm_base_url,
                llm_key,
                llm_model,
                depth,
                criteria,
                reviewer,
            )
            .await
        }
        Commands::Serve {
            port,
            host,
            llm_base_url,
            llm_key,
            llm_model,
        } => run_server(host, port, llm_base_url, llm_key, llm_model).await,
    }
}

/// Resolve the API key from the CLI argument or the environment
fn resolve_api_key(llm_key: Option<String>) -> Result<String> {
    llm_key
        .or_else(|| std::env::var(API_KEY_ENV).ok())
        .with_context(|| format!("No LLM API key: pass --llm-key or set {}", API_KEY_ENV))
}

// ============================================================================
// Batch Analysis
// ============================================================================

#[allow(clippy::too_many_arguments)]
async fn run_analyze(
    input: PathBuf,
    output_dir: PathBuf,
    llm_base_url: String,
    llm_key: Option<String>,
    llm_model: String,
    depth: String,
    criteria: Option<String>,
    reviewer: String,
) -> Result<()> {
    let api_key = resolve_api_key(llm_key)?;
    let config = ProviderConfig::new(&llm_base_url, &api_key, &llm_model)?;
    let provider = HttpCompletionProvider::new(config)?;

    let depth = AnalysisDepth::from_name(&depth).context("Invalid --depth value")?;
    let criteria = match criteria {
        Some(list) => list
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
        None => ReviewOptions::default_criteria(),
    };

    let opts = ReviewOptions {
        reviewer,
        model: llm_model,
        criteria,
        depth,
    };

    let docs = collect_documents(&input)?;
    if docs.is_empty() {
        println!("No .txt/.md documents found in {}", input.display());
        return Ok(());
    }

    // Create timestamped output folder
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let folder_name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "reviews".to_string());
    let output_folder = output_dir.join(format!("{}_{}", timestamp, folder_name));
    std::fs::create_dir_all(&output_folder).context("Failed to create output directory")?;

    println!("Output folder: {}", output_folder.display());
    println!(
        "Reviewing {} documents with {} (max 4 concurrent requests)...",
        docs.len(),
        provider.model()
    );

    let records = review::review_documents(&provider, &opts, &docs).await;

    let csv_path = output_folder.join("reviews.csv");
    save_csv(&csv_path, &records)?;

    let successful = records.iter().filter(|r| r.processing_successful).count();
    println!(
        "Review complete: {} successful, {} failed",
        successful,
        records.len() - successful
    );

    // Log token usage
    let usage = provider.usage();
    let usage_path = output_folder.join("token_usage.log");
    let usage_line = format!(
        "{},{},{},{}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        usage.prompt_tokens,
        usage.completion_tokens,
        usage.total_tokens
    );
    std::fs::write(&usage_path, &usage_line).context("Failed to write token usage log")?;
    println!(
        "Token usage: {} prompt + {} completion = {} total",
        usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
    );

    println!("\n✓ Results in: {}", output_folder.display());
    Ok(())
}

/// Collect .txt/.md documents from a directory
fn collect_documents(dir: &Path) -> Result<Vec<ReviewDocument>> {
    let mut docs = Vec::new();

    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read input directory {}", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        let is_doc = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("txt") || e.eq_ignore_ascii_case("md"))
            .unwrap_or(false);
        if !is_doc {
            continue;
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        match std::fs::read_to_string(&path) {
            Ok(text) => docs.push(ReviewDocument { filename, text }),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Skipping unreadable document");
            }
        }
    }

    docs.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(docs)
}

/// Save review records to a CSV file
fn save_csv(path: &Path, records: &[ReviewRecord]) -> Result<()> {
    if records.is_empty() {
        println!("No data to save to {:?}", path);
        return Ok(());
    }

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context("Failed to create CSV writer")?;

    for record in records {
        wtr.serialize(record).context("Failed to write CSV record")?;
    }

    wtr.flush().context("Failed to flush CSV")?;
    println!("Saved: {:?}", path);
    Ok(())
}

// ============================================================================
// HTTP Server
// ============================================================================

async fn run_server(
    host: String,
    port: u16,
    llm_base_url: String,
    llm_key: Option<String>,
    llm_model: String,
) -> Result<()> {
    let api_key = resolve_api_key(llm_key)?;
    let config = ProviderConfig::new(&llm_base_url, &api_key, &llm_model)?;
    let provider = HttpCompletionProvider::new(config)?;

    info!(host = %host, port = port, model = %llm_model, "Starting HTTP server");
    println!("Starting server at http://{}:{}", host, port);

    let app_state = Arc::new(AppState {
        provider,
        model: llm_model,
    });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/analyze", post(analyze_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}

struct AppState {
    provider: HttpCompletionProvider,
    model: String,
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

/// Analyze request body
#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    text: String,
    #[serde(default = "default_filename")]
    filename: String,
    #[serde(default = "default_reviewer")]
    reviewer: String,
    /// Criteria names; empty means all built-in criteria
    #[serde(default)]
    criteria: Vec<String>,
    depth: Option<String>,
}

fn default_filename() -> String {
    "document".to_string()
}

fn default_reviewer() -> String {
    "api".to_string()
}

/// Analyze response
#[derive(Debug, Serialize)]
struct AnalyzeResponse {
    status: String,
    review: ReviewRecord,
}

/// Document analysis endpoint.
///
/// Always answers 200: an unanalyzable document comes back as a zero-score
/// record with an error field, never as a failed request.
async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> Json<AnalyzeResponse> {
    info!(filename = %req.filename, chars = req.text.len(), "Analyze request");

    let depth = req
        .depth
        .as_deref()
        .and_then(AnalysisDepth::from_name)
        .unwrap_or(AnalysisDepth::Standard);

    let criteria = if req.criteria.is_empty() {
        ReviewOptions::default_criteria()
    } else {
        req.criteria.clone()
    };

    let opts = ReviewOptions {
        reviewer: req.reviewer.clone(),
        model: state.model.clone(),
        criteria,
        depth,
    };

    let review = review::review_document(&state.provider, &opts, &req.filename, &req.text).await;

    let status = if review.processing_successful {
        "success".to_string()
    } else {
        format!("error: {}", review.error)
    };

    Json(AnalyzeResponse { status, review })
}
