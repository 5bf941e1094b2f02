mod config;
mod health;
mod metrics;
mod promoter;
mod worker_loop;

use std::sync::Arc;

use anyhow::Context;
use card_gateway::{GatewayConfig, HttpCardGateway};
use checkout_repository::Repository;
use job_queue::{JobStore, JobStoreConfig};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use workflow_engine::{LoggingNotifier, WorkflowEngine};

use crate::config::Config;
use crate::health::AppState;
use crate::metrics::Metrics;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Arc::new(Config::from_env());

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&config.database_url)
        .await
        .context("connecting to postgres")?;

    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .context("running database migrations")?;

    let job_store = JobStore::connect(
        &config.redis_url,
        JobStoreConfig {
            prefix: config.job_prefix.clone(),
            max_retries: config.max_retries,
        },
    )
    .await
    .context("connecting to redis job store")?;

    let recovered = job_store
        .sweep_stale_in_flight(config.max_claim_age)
        .await
        .context("sweeping stale in-flight claims")?;
    if recovered > 0 {
        tracing::warn!(recovered, "recovered stale in-flight jobs at startup");
    }

    let gateway_config = GatewayConfig::from_env().context("loading card gateway config")?;
    let gateway: Arc<dyn card_gateway::CardGateway> =
        Arc::new(HttpCardGateway::new(gateway_config).context("building card gateway client")?);

    let repo = Repository::new(pool.clone());
    let notifier = Arc::new(LoggingNotifier);

    let engine = Arc::new(WorkflowEngine::new(
        gateway,
        repo,
        job_store.clone(),
        notifier,
    ));

    let metrics = Arc::new(Metrics::new());

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let mut worker_handles = Vec::with_capacity(config.worker_count);
    for worker_id in 0..config.worker_count {
        let handle = tokio::spawn(worker_loop::run(
            worker_id,
            job_store.clone(),
            engine.clone(),
            config.clone(),
            metrics.clone(),
            shutdown_tx.subscribe(),
        ));
        worker_handles.push(handle);
    }

    let promoter_handle = tokio::spawn(promoter::run(
        job_store.clone(),
        config.clone(),
        shutdown_tx.subscribe(),
    ));

    let app_state = AppState {
        pool,
        job_store: job_store.clone(),
        metrics: metrics.clone(),
    };
    let app = health::router(app_state);
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .context("binding health/metrics listener")?;

    tracing::info!(host = %config.host, port = config.port, worker_count = config.worker_count, "worker starting");

    let mut shutdown_signal = shutdown_tx.subscribe();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = shutdown_signal.recv().await;
    });
    let server_handle = tokio::spawn(server);

    shutdown_requested().await;
    tracing::info!("shutdown requested, draining http server and in-flight jobs");
    let _ = shutdown_tx.send(());

    // 30s budget for the http server to drain in-flight requests.
    if tokio::time::timeout(std::time::Duration::from_secs(30), server_handle)
        .await
        .is_err()
    {
        tracing::warn!("health server did not drain within the shutdown budget");
    }

    // Give in-flight jobs a short grace period to finish before the process exits.
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    for handle in worker_handles {
        handle.abort();
    }
    promoter_handle.abort();

    tracing::info!("worker shut down");
    Ok(())
}

async fn shutdown_requested() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl_c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
