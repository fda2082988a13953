mod config;
mod error;
mod guard;
mod handlers;
mod middleware;
mod models;
mod repos;
mod rewards;
mod services;
mod state;
mod stores;
#[cfg(test)]
mod test_utils;
mod tokens;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use axum::http;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::Config,
    repos::Repos,
    rewards::{QUEUE_CAPACITY, RewardQueue, RewardWorker},
    services::{EmailSender, EmailSenderImpl, RecordedDiscountIssuer},
    state::AppState,
    stores::{KvStore, MemoryKvStore, RedisKvStore, Stores},
};

/// How often expired entries are swept from the in-process KV store.
const KV_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "review-api")]
#[command(about = "Review collection API server")]
struct Args {
    /// Run database migrations and exit
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider before any TLS operations
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let args = Args::parse();
    let config = envy::prefixed("REVIEWS_").from_env::<Config>()?;

    // Initialize Sentry for error tracking (must be done early, guard must stay alive)
    let _sentry_guard = config.sentry_dsn.as_ref().map(|dsn| {
        sentry::init((
            dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: Some(config.env.clone().into()),
                ..Default::default()
            },
        ))
    });

    // Set up tracing: JSON in production, human-readable otherwise
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.is_production() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }

    let database = PgPoolOptions::new()
        .max_connections(25)
        .connect(&config.database_url)
        .await?;

    // Run migrations via init container only (--migrate flag)
    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&database).await?;
        tracing::info!("Migrations complete");
        return Ok(());
    }

    // KV backend: Redis when configured, with the in-process store as the
    // per-call fallback; otherwise in-process only.
    let memory = MemoryKvStore::new();
    let kv: Arc<dyn KvStore> = match config.redis_url.as_deref() {
        Some(url) if !url.is_empty() => {
            tracing::info!("Using Redis KV store");
            Arc::new(RedisKvStore::new(
                redis::Client::open(url)?,
                Duration::from_millis(config.redis_timeout_ms),
                memory.clone(),
            ))
        }
        _ => {
            tracing::warn!("No Redis configured, using in-process KV store (single instance only)");
            Arc::new(memory.clone())
        }
    };

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(KV_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = memory.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "purged expired in-process KV entries");
            }
        }
    });

    let email: Arc<dyn EmailSender> = Arc::new(EmailSenderImpl::new(
        config.resend_api_key.clone(),
        config.smtp_url.clone(),
        config.email_from.clone(),
    )?);

    let repos = Repos::postgres(database);
    let stores = Stores::new(kv);

    // Reward worker: issues discount codes and emails them off the request path
    let (rewards, reward_rx) = RewardQueue::channel(QUEUE_CAPACITY);
    let worker = RewardWorker::new(
        Arc::new(RecordedDiscountIssuer::new(repos.discounts.clone())),
        email.clone(),
    );
    tokio::spawn(worker.run(reward_rx));

    let state = AppState {
        config: Arc::new(config.clone()),
        repos,
        stores,
        email,
        rewards,
    };

    // Request ID header name
    let x_request_id = http::HeaderName::from_static("x-request-id");

    let app = handlers::routes()
        .with_state(state)
        // Request ID: generate UUID, include in logs, return in response
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &http::Request<axum::body::Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            },
        ))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1MB limit

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
