//! PDF Q&A server binary
//!
//! Run with: cargo run -p pdf-qa --bin pdf-qa-server -- --config pdf-qa.toml

use clap::Parser;
use pdf_qa::{config::AppConfig, server::PdfQaServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "pdf-qa-server", version, about = "Answer questions about uploaded PDFs")]
struct Args {
    /// TOML configuration file; environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_qa=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Load configuration
    let config = AppConfig::load(args.config.as_deref())?;
    config.validate()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Chat model: {}", config.openai.chat_model.as_deref().unwrap_or_default());
    tracing::info!("  - Embedding model: {}", config.openai.embed_model);
    tracing::info!(
        "  - Chunk size: {} (overlap {})",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    tracing::info!(
        "  - Agent: {} iterations, {:?} early stopping",
        config.agent.max_iterations,
        config.agent.early_stopping
    );

    // Create and start server
    let server = PdfQaServer::new(config)?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST /process-and-query/ - Upload a PDF with questions");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
