use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use log::{info, warn};
use std::sync::Arc;

use docqa::config::Config;
use docqa::document::FileDocumentLoader;
use docqa::gemini::GeminiModelClient;
use docqa::index::VectorIndexBuilder;
use docqa::session::SessionController;
use docqa::store::{InMemoryStore, QdrantStore, VectorStore};
use docqa::web::{run_server, AppState};

/// Ask questions about an uploaded PDF or text document through a web page
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Address to serve the UI on
    #[arg(long, env = "DOCQA_BIND", default_value = "127.0.0.1:8501")]
    bind: String,

    /// Seconds of inactivity after which a session is discarded
    #[arg(long, env = "DOCQA_SESSION_TTL_SECS", default_value_t = 3600)]
    session_ttl_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = Config::from_env(args.bind, args.session_ttl_secs)
        .context("Invalid configuration")?;

    if config.api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; questions will fail until it is configured");
    }

    let store: Arc<dyn VectorStore> = match config.qdrant.clone() {
        Some(qdrant) => {
            info!("Storing indexes in Qdrant at {}", qdrant.url);
            Arc::new(QdrantStore::new(qdrant).context("Failed to initialize Qdrant client")?)
        }
        None => {
            info!("QDRANT_URL not set; keeping indexes in memory");
            Arc::new(InMemoryStore::new())
        }
    };

    let controller = SessionController::new(
        Arc::new(FileDocumentLoader::new()),
        Arc::new(GeminiModelClient::new(config.gemini.clone())),
        Arc::new(VectorIndexBuilder::new(store, config.chunking, config.top_k)),
        config.api_key.clone(),
    );

    let state = AppState::new(controller, config.session_ttl);
    run_server(&config.bind, state).await
}
