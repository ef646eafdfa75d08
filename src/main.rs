use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

mod api;
mod cache;
mod config;
mod error;
mod formats;
mod retrieval;
mod sources;

use crate::api::AppState;
use crate::cache::{spawn_sweeper, StreamCache};
use crate::config::Config;
use crate::formats::FormatSelector;
use crate::retrieval::RetrievalCoordinator;
use crate::sources::YtDlpExtractor;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stream_cache=debug".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!("🎬 Starting stream-cache v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("{}", config.summary());

    let extractor = Arc::new(YtDlpExtractor::new(
        config.ytdlp_path.clone(),
        config.extract_options(),
        config.max_concurrent_extractions,
    ));

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&extractor).await;
    }

    if let Err(e) = extractor.verify().await {
        error!("❌ yt-dlp is not usable, every extraction will fail: {:#}", e);
    }

    let cache = StreamCache::new(config.ttl_policy());
    if let Some(every) = config.sweep_interval() {
        spawn_sweeper(cache.clone(), every);
        info!("🧹 Background cache sweep every {}", humantime::format_duration(every));
    }

    let state = AppState {
        coordinator: RetrievalCoordinator::new(cache, extractor, config.retrieval_settings()),
        selector: Arc::new(FormatSelector::new(&config.trusted_stream_domains)),
    };

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    info!("🚀 Listening on http://{}", addr);

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running HTTP server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("⚠️ Shutdown signal received, closing...");
}

async fn health_check(extractor: &YtDlpExtractor) -> Result<()> {
    extractor.verify().await?;
    println!("OK");
    Ok(())
}
