//! Forum Sentiment Service - Main Entry Point
//!
//! Scheduled and on-demand ingestion of forum posts enriched with sentiment.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use forum_sentiment::analysis::{SentimentAnalyzer, TextAnalyticsClient};
use forum_sentiment::api::{self, AppState};
use forum_sentiment::chunkers::TextChunker;
use forum_sentiment::messaging::{BatchLimits, HttpStreamSink, StreamConnection};
use forum_sentiment::pipeline::{IngestPipeline, PostEnricher, RunSettings};
use forum_sentiment::schedule::Schedule;
use forum_sentiment::secrets::{EnvSecretProvider, ServiceSecrets};
use forum_sentiment::source::RedditClient;
use forum_sentiment::types::IngestConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    let fmt_layer = if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "forum_sentiment=info,tower_http=debug".into()),
        ))
        .with(fmt_layer)
        .init();

    // Load configuration
    let config = IngestConfig::load()?;
    let secrets = ServiceSecrets::load(&EnvSecretProvider::new()).await?;

    info!("Starting Forum Sentiment Service v{}", env!("CARGO_PKG_VERSION"));
    info!(
        mode = ?config.mode,
        chunk_size = config.chunk_size,
        post_limit = config.effective_post_limit(),
        "Loaded configuration"
    );

    // Initialize components
    let timeout = config.request_timeout();
    let backend = TextAnalyticsClient::new(
        &secrets.analytics_endpoint,
        &secrets.analytics_key,
        timeout,
    )?
    .with_language(&config.analytics_language);
    let source = RedditClient::new(secrets.reddit.clone(), &config.user_agent, timeout)?
        .with_endpoints(&config.reddit_auth_url, &config.reddit_api_url);

    let mut limits = BatchLimits::new(config.max_batch_bytes);
    if let Some(max_records) = config.max_batch_records {
        limits = limits.with_max_records(max_records);
    }
    let connection = StreamConnection::parse(&secrets.stream_connection)?;
    let mut sink = HttpStreamSink::new(
        &connection,
        &config.event_hub_name,
        limits,
        config.sas_token_ttl(),
        timeout,
    )?;
    if let Some(url) = &config.sink_url {
        sink = sink.with_url(url);
    }
    info!(url = sink.url(), "Stream sink configured");

    let analyzer = SentimentAnalyzer::new(Arc::new(backend), TextChunker::new(config.chunk_size)?)
        .with_mode(config.mode)
        .with_concurrency(config.analysis_concurrency)
        .with_call_timeout(timeout);

    let pipeline = Arc::new(IngestPipeline::new(
        Arc::new(source),
        PostEnricher::new(analyzer),
        Arc::new(sink),
        RunSettings::from_config(&config),
    ));

    // Scheduled trigger
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduled = Schedule::from_config(Arc::clone(&pipeline), &config)
        .map(|schedule| tokio::spawn(schedule.run(shutdown_rx.clone())));
    if scheduled.is_none() {
        info!("Scheduled ingestion disabled");
    }

    // Build HTTP routes
    let state = Arc::new(AppState { pipeline });
    let app = api::router(state)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    if let Some(handle) = scheduled {
        let _ = handle.await;
    }

    Ok(())
}
