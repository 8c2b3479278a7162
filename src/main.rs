use std::sync::Arc;

use anyhow::Result;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mastery_system::{
    api::{create_router, AppState},
    config::{Config, LoggingConfig},
    database::Database,
    log_system_event,
    notifications::TracingNotifier,
    study_service::StudyService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    // Initialize logging with optional file output
    let _guard = setup_logging(&config.logging)?;

    config.validate()?;

    log_system_event!(startup, component = "server", "Starting Mastery System server");

    // Initialize database
    let db = Database::new(&config.database.url).await?;
    info!("Database initialized successfully");

    let study_service = StudyService::new(db, config.mastery.clone(), Arc::new(TracingNotifier));
    let state = AppState { study_service };

    let app = create_router(state).layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log_system_event!(shutdown, component = "server", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

fn setup_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    use std::fs;
    use tracing_subscriber::fmt;

    let env_filter = EnvFilter::try_new(&logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info,mastery_system=debug"));

    // Configure console output
    let console_layer = logging.console_enabled.then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(true)
    });

    // Configure file output with daily rotation (no ANSI colors for files)
    let mut guard = None;
    let mut file_layer = None;
    if logging.file_enabled {
        match fs::create_dir_all(&logging.log_directory) {
            Ok(()) => {
                let file_appender = tracing_appender::rolling::daily(&logging.log_directory, "mastery-system.log");
                let (non_blocking_file, worker_guard) = tracing_appender::non_blocking(file_appender);
                guard = Some(worker_guard);
                file_layer = Some(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true)
                        .with_ansi(false)
                        .with_writer(non_blocking_file),
                );
            }
            Err(e) => eprintln!("Warning: Could not create log directory '{}': {}", logging.log_directory, e),
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if guard.is_some() {
        info!(
            "Logging initialized - writing to {}/mastery-system.log with daily rotation",
            logging.log_directory
        );
    }

    Ok(guard)
}
