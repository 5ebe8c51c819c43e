//! Drop commerce HTTP server.
//!
//! Wires the `PostgreSQL` store, the Stripe gateway and the engine services
//! behind the Axum router, runs the reservation sweeper in the background
//! and exposes Prometheus metrics on a separate listener.

mod config;

use anyhow::Context;
use config::Config;
use drop_commerce_core::admission::DropAdmissionEngine;
use drop_commerce_core::checkout::{CheckoutService, OrderDraftBuilder};
use drop_commerce_core::environment::{Clock, SystemClock};
use drop_commerce_core::payment::PaymentGateway;
use drop_commerce_core::sweeper::ReservationSweeper;
use drop_commerce_postgres::PgStore;
use drop_commerce_stripe::StripeClient;
use drop_commerce_web::{AppState, router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting drop commerce server");

    let config = Config::from_env();
    let engine_config = Arc::new(config.engine_config());
    info!(
        bind = %config.bind_address(),
        vat_rate = %engine_config.vat_rate,
        reservation_ttl_minutes = engine_config.reservation_ttl.num_minutes(),
        stripe_configured = config.stripe.secret_key.is_some(),
        "Configuration loaded"
    );

    install_metrics(&config)?;

    info!("Connecting to database...");
    let store = PgStore::connect(&config.postgres.url, &config.postgres.pool_settings())
        .await
        .context("Failed to connect to PostgreSQL")?;
    store.migrate().await.context("Failed to apply migrations")?;
    info!("Database ready");

    let gateway: Option<Arc<dyn PaymentGateway>> = config.stripe.secret_key.clone().map(|key| {
        let client = StripeClient::new(key);
        let client = match &config.stripe.api_base {
            Some(base) => client.with_api_base(base.as_str()),
            None => client,
        };
        Arc::new(client) as Arc<dyn PaymentGateway>
    });
    if gateway.is_none() {
        warn!("STRIPE_SECRET_KEY not set, checkout will answer 503");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let drafts = OrderDraftBuilder::new(store.clone(), Arc::clone(&clock), Arc::clone(&engine_config));
    let checkout = CheckoutService::new(drafts, store.clone(), gateway);
    let admission = DropAdmissionEngine::new(store.clone(), Arc::clone(&clock), &engine_config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = ReservationSweeper::new(store.clone(), clock, engine_config.sweep_batch_size);
    let sweep_period = Duration::from_secs(config.engine.sweep_interval_secs);
    let sweeper_handle = tokio::spawn(async move {
        sweeper.run_on_interval(sweep_period, shutdown_rx).await;
    });
    info!(interval_secs = config.engine.sweep_interval_secs, "Reservation sweeper started");

    let app = router(AppState::new(checkout, admission, store));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    let _ = shutdown_tx.send(true);
    let grace = Duration::from_secs(config.server.shutdown_timeout);
    if tokio::time::timeout(grace, sweeper_handle).await.is_err() {
        warn!(timeout_secs = config.server.shutdown_timeout, "Sweeper did not stop in time");
    }

    info!("Server stopped");
    Ok(())
}

/// Install the Prometheus recorder and its scrape listener.
fn install_metrics(config: &Config) -> anyhow::Result<()> {
    let addr: SocketAddr = config
        .metrics_address()
        .parse()
        .with_context(|| format!("Invalid metrics address {}", config.metrics_address()))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    drop_commerce_core::metrics::register_metrics();

    info!(%addr, "Metrics available at http://{addr}/metrics");
    Ok(())
}

/// Graceful shutdown signal handler.
///
/// Waits for:
/// - Ctrl+C (SIGINT)
/// - SIGTERM (in production environments)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
