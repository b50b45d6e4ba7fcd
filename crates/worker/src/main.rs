use std::sync::Arc;
use std::time::Duration;

use stockpile_cache::{ProgressStore, RedisProgressStore};
use stockpile_events::{WebhookNotifier, WebhookSender};
use stockpile_pipeline::ImportOrchestrator;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockpile_worker::{DeliveryRunner, ImportRunner, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockpile_worker=debug,stockpile_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env();
    tracing::info!(?config, "Loaded worker configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = stockpile_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    stockpile_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database connection pool created");

    // --- Progress store ---
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/0".into());
    let progress: Arc<dyn ProgressStore> = Arc::new(
        RedisProgressStore::connect(&redis_url)
            .await
            .expect("Failed to connect to Redis"),
    );
    tracing::info!("Progress store connected");

    // --- Pipeline wiring ---
    let notifier = Arc::new(WebhookNotifier::postgres(pool.clone()));
    let orchestrator = Arc::new(ImportOrchestrator::new(
        pool.clone(),
        Arc::clone(&progress),
        Arc::clone(&notifier),
    ));

    // --- Runners ---
    let cancel = CancellationToken::new();

    let import_runner = ImportRunner::new(pool.clone(), orchestrator, &config);
    let import_cancel = cancel.clone();
    let import_handle = tokio::spawn(async move {
        import_runner.run(import_cancel).await;
    });

    let delivery_runner = DeliveryRunner::new(pool.clone(), WebhookSender::new(), &config);
    let delivery_cancel = cancel.clone();
    let delivery_handle = tokio::spawn(async move {
        delivery_runner.run(delivery_cancel).await;
    });

    tracing::info!("Worker started (import runner, delivery runner)");

    // --- Shutdown ---
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping runners");
    cancel.cancel();

    let _ = tokio::time::timeout(Duration::from_secs(30), import_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), delivery_handle).await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the worker shuts
/// down cleanly whether stopped interactively or by a process manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
