//! Event sign-up platform server.
//!
//! Serves the notification stream, runs the reminder scheduler and exports
//! Prometheus metrics. See [`signup_web::config`] for the environment
//! variables.

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use signup_core::environment::{EmailTransport, SystemClock, UserDirectory};
use signup_notifications::email::{ConsoleEmailTransport, SmtpEmailTransport};
use signup_notifications::{FeedStore, InMemoryFeedStore};
use signup_postgres::{PostgresFeedStore, PostgresRegistrationStore, PostgresUserDirectory};
use signup_registration::{InMemoryRegistrationStore, RegistrationStore, ReminderScheduler};
use signup_web::config::{Config, EmailTransportKind, StorageBackend, StorageConfig};
use signup_web::{AppState, Backends, SeededUserDirectory};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Stores = (
    Arc<dyn RegistrationStore>,
    Arc<dyn FeedStore>,
    Arc<dyn UserDirectory>,
);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signup=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        storage = ?config.storage.backend,
        email = ?config.email.transport,
        delivery = ?config.email.dispatch.email_delivery,
        "Configuration loaded"
    );

    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.server.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    signup_registration::metrics::register_registration_metrics();
    signup_notifications::metrics::register_notification_metrics();
    info!(address = %metrics_addr, "Metrics exporter listening");

    let (registrations, feed, directory) = open_stores(&config.storage).await?;
    let email: Arc<dyn EmailTransport> = match config.email.transport {
        EmailTransportKind::Console => Arc::new(ConsoleEmailTransport::new()),
        EmailTransportKind::Smtp => Arc::new(
            SmtpEmailTransport::new(&config.email.smtp).context("Invalid SMTP settings")?,
        ),
    };

    let state = AppState::assemble(
        Backends {
            registrations,
            feed,
            directory,
            email,
            clock: Arc::new(SystemClock),
        },
        config.email.dispatch,
        config.realtime.connection_buffer,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reminders = tokio::spawn(
        ReminderScheduler::new(state.coordinator.clone(), config.reminders)
            .run(wait_for(shutdown_rx)),
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, signup_web::router(state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("Server error")?;

    if let Err(e) = reminders.await {
        warn!(error = %e, "Reminder scheduler ended abnormally");
    }
    info!("Server stopped");
    Ok(())
}

async fn open_stores(storage: &StorageConfig) -> anyhow::Result<Stores> {
    match storage.backend {
        StorageBackend::Memory => {
            let directory = match &storage.users_file {
                Some(path) => SeededUserDirectory::load(path)
                    .await
                    .with_context(|| format!("Failed to load users from {path}"))?,
                None => SeededUserDirectory::default(),
            };
            if directory.is_empty() {
                warn!("In-memory storage without USERS_FILE: notifications reach nobody");
            }
            info!(users = directory.len(), "Using in-memory storage");
            Ok((
                Arc::new(InMemoryRegistrationStore::new()),
                Arc::new(InMemoryFeedStore::new()),
                Arc::new(directory),
            ))
        }
        StorageBackend::Postgres => {
            let pool = signup_postgres::connect(&storage.database_url, storage.max_connections)
                .await
                .context("Failed to connect to PostgreSQL")?;
            signup_postgres::run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;
            info!(max_connections = storage.max_connections, "Using PostgreSQL storage");
            Ok((
                Arc::new(PostgresRegistrationStore::new(pool.clone())),
                Arc::new(PostgresFeedStore::new(pool.clone())),
                Arc::new(PostgresUserDirectory::new(pool)),
            ))
        }
    }
}

async fn wait_for(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal, shutting down gracefully..."),
        () = terminate => info!("Received SIGTERM signal, shutting down gracefully..."),
    }
}
