//! Antenatal assistant server binary
//!
//! Run with: cargo run -p antenatal-rag --bin antenatal-rag-server

use antenatal_rag::{config::AssistConfig, server::AssistServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "antenatal_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                  Antenatal Guideline RAG                  ║
║        Pregnancy Q&A with Citations + Vitals Risk         ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    let config = AssistConfig::load()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding backend: {:?}", config.embeddings.provider);
    tracing::info!("  - Embedding dimensions: {}", config.embeddings.dimensions);
    tracing::info!("  - LLM model: {}", config.llm.generate_model);
    tracing::info!("  - Chunk size: {}", config.chunking.chunk_size);
    tracing::info!("  - Max concurrent generations: {}", config.generation.max_concurrent);

    let guidelines_dir = config.ingestion.guidelines_dir.clone();
    let server = AssistServer::new(config)?;

    match server.state().assistant().generator().health_check().await {
        Ok(true) => tracing::info!("LLM backend is running"),
        _ => {
            tracing::warn!("LLM backend not available at {}", server.state().config().llm.base_url);
            tracing::warn!("Please start Ollama and pull the configured models");
        }
    }

    // /ready reports 503 until the guidelines are indexed
    if let Some(dir) = guidelines_dir {
        server.state().spawn_guideline_ingest(dir);
    }

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/chat           - Ask questions");
    println!("  POST /api/vitals/assess  - Assess vitals");
    println!("  POST /api/ingest         - Index guidelines");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
