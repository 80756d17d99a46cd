use anyhow::Result;
use std::sync::Arc;
use studynotes::bus::EventConsumer;
use studynotes::cache::RedisCache;
use studynotes::fetch::HttpFetcher;
use studynotes::http::{self, ApiState};
use studynotes::store::{NotesStore, SqliteStore};
use studynotes::summarize::{ChunkingSummarizer, HfClient};
use studynotes::worker::Worker;
use studynotes::Config;

/// Build the summarizer shared by the worker and the HTTP API
fn build_summarizer(config: &Config) -> Result<Arc<ChunkingSummarizer>> {
    let api_key = std::env::var(&config.inference.api_key_env).map_err(|_| {
        anyhow::anyhow!(
            "Environment variable {} not set. Set it in your .env file or as an environment variable.",
            config.inference.api_key_env
        )
    })?;

    let client = Arc::new(HfClient::new(&config.inference, api_key));
    Ok(Arc::new(ChunkingSummarizer::new(
        client,
        config.inference.chunk_size,
    )))
}

/// Open the durable store and ensure the schema exists
async fn build_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let store = Arc::new(SqliteStore::new(&config.store.db_path));
    store.init().await?;
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger from environment variable or default to info level
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("serve");

    match command {
        "worker" => run_worker().await?,
        "serve" => run_server().await?,
        other => {
            eprintln!("Unknown command: {}. Use 'worker' or 'serve'.", other);
            std::process::exit(2);
        }
    }

    Ok(())
}

/// Run the bus-driven ingestion worker
async fn run_worker() -> Result<()> {
    let config = Config::load()?;

    let summarizer = build_summarizer(&config)?;
    let store = build_store(&config).await?;
    let fetcher = Arc::new(HttpFetcher::new(
        config.storage.endpoint.clone(),
        config.storage.bucket.clone(),
    ));
    let cache = Arc::new(RedisCache::connect(&config.cache.url).await?);
    let consumer = EventConsumer::connect(&config.bus).await?;

    let worker = Worker::new(
        fetcher,
        summarizer,
        cache,
        store,
        config.cache.ttl_secs,
    );

    log::info!("Ingestion worker started");
    worker.run(consumer).await?;

    Ok(())
}

/// Run the synchronous HTTP API
async fn run_server() -> Result<()> {
    let config = Config::load()?;

    if !config.http_server.enabled {
        anyhow::bail!("http_server.enabled is false; nothing to serve");
    }

    let summarizer = build_summarizer(&config)?;
    let store: Arc<dyn NotesStore> = build_store(&config).await?;

    let state = Arc::new(ApiState { summarizer, store });
    http::serve(state, &config.http_server).await?;

    Ok(())
}
