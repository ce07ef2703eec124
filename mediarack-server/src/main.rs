use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use mediarack_core::providers::{AniListProvider, USER_AGENT};
use mediarack_core::{Enricher, Ingester, QueueOptions, SidecarLocks, Thumbnailer};
use mediarack_server::config::{Args, Config};
use mediarack_server::{routes, AppState};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A .env next to the binary is a convenience, not a requirement.
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    let config = Config::from(args);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let client = Arc::new(
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build HTTP client")?,
    );
    let token = CancellationToken::new();
    let provider = Arc::new(AniListProvider::new(client.clone()));
    let enricher = Arc::new(Enricher::new(provider, client, config.catalog_pace));
    let thumbnailer = Thumbnailer::new(&config.ffmpeg, &config.ffprobe);
    let ingester = Arc::new(
        Ingester::new(
            &config.media_root,
            Arc::new(SidecarLocks::new()),
            enricher,
            thumbnailer,
            token.clone(),
        )
        .with_context(|| format!("failed to open media root {}", config.media_root.display()))?,
    );

    let worker = tokio::spawn({
        let ingester = ingester.clone();
        async move { ingester.run().await }
    });

    // Seed the initial sweep. The short delay lets an interactive request
    // arriving at startup win the LIFO race.
    tokio::spawn({
        let ingester = ingester.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            let seed = QueueOptions {
                directory: PathBuf::from("."),
                id: 0,
                force: false,
            };
            if let Err(err) = ingester.queue(seed).await {
                warn!(error = %err, "failed to queue seed ingest");
            }
        }
    });

    let app = routes::create_router(AppState::new(ingester)).layer(TraceLayer::new_for_http());
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.host, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, root = %config.media_root.display(), "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown({
            let token = token.clone();
            async move {
                let _ = tokio::signal::ctrl_c().await;
                info!("shutting down");
                token.cancel();
            }
        })
        .await
        .context("server error")?;

    token.cancel();
    worker.await.context("ingester worker panicked")??;
    Ok(())
}
