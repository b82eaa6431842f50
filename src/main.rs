//! idea-gate server and CLI
//!
//! Submission gate for business ideas: quality filter + duplicate detection.
//!
//! Run with: cargo run -- --serve
//! Or check text offline: cargo run -- --check "some problem statement"

use anyhow::{bail, Result};
use idea_gate::{
    config::GateConfig,
    http, quality,
    service::{self, IdeaService},
};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let mut config = GateConfig::from_env()?;
    if let Some(kind) = args.iter().find_map(|a| a.strip_prefix("--embedder=")) {
        config.embedder = kind.parse()?;
    }
    if let Some(port) = args.iter().find_map(|a| a.strip_prefix("--port=")) {
        config.port = port.parse()?;
    }

    let positional: Vec<&str> = args[1..]
        .iter()
        .filter(|a| !a.starts_with("--embedder=") && !a.starts_with("--port="))
        .map(|a| a.as_str())
        .collect();

    match positional.first().copied() {
        Some("--serve") | None => run_http_server(config).await,
        Some("--check") => {
            let text = positional[1..].join(" ");
            run_check(&text)
        }
        Some("--submit") => {
            let Some(path) = positional.get(1) else {
                bail!("Usage: --submit <submissions.json>");
            };
            run_submit(config, Path::new(path)).await
        }
        Some("--help") | Some("-h") => {
            print_usage();
            Ok(())
        }
        Some(other) => {
            print_usage();
            bail!("Unknown command: {}", other)
        }
    }
}

fn print_usage() {
    println!("ideagate - submission gate for business ideas");
    println!();
    println!("USAGE:");
    println!("  ideagate --serve [--port=N] [--embedder=onnx|hashing]");
    println!("  ideagate --check <text>");
    println!("  ideagate --submit <file.json> [--embedder=onnx|hashing]");
}

/// Run the quality filter on one piece of text
fn run_check(text: &str) -> Result<()> {
    match quality::first_failed_check(text) {
        Some(check) => println!("LOW QUALITY ({})", check.name()),
        None => println!("OK"),
    }
    Ok(())
}

/// Feed submissions from a file through a fresh corpus, in order
async fn run_submit(config: GateConfig, path: &Path) -> Result<()> {
    let submissions = service::read_submissions(path)?;
    let service = IdeaService::from_config(&config)?;

    for submission in submissions {
        let name = submission.name.clone();
        match service.submit_idea(submission).await {
            Ok(response) => println!("{}", serde_json::to_string(&response)?),
            Err(e) => println!(
                "{}",
                serde_json::json!({"status": "error", "ideaName": name, "message": e.to_string()})
            ),
        }
    }

    Ok(())
}

async fn run_http_server(config: GateConfig) -> Result<()> {
    tracing_subscriber::fmt::init();

    let service = Arc::new(IdeaService::from_config(&config)?);
    let origins: Arc<Vec<String>> = Arc::new(config.cors_origins.clone());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(
        port = config.port,
        threshold = service.threshold(),
        "Listening on http://localhost:{}/ideas",
        config.port
    );

    loop {
        let (stream, peer) = listener.accept().await?;
        let service = Arc::clone(&service);
        let origins = Arc::clone(&origins);

        tokio::spawn(async move {
            if let Err(e) = http::handle_connection(stream, service.as_ref(), &origins).await {
                tracing::warn!(%peer, error = %e, "Request error");
            }
        });
    }
}
