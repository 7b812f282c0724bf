//! Reimbursement Workflow - API Server Binary
//!
//! This binary starts the HTTP API server for the reimbursement workflow.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin reimbursement-api
//!
//! # Run with environment variables
//! API_PORT=8080 API_JWT_SECRET=... API_SEED_DEMO=true cargo run --bin reimbursement-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_JWT_SECRET` - JWT signing secret (required in production)
//! * `API_JWT_EXPIRATION_SECS` - JWT token expiration in seconds (default: 3600)
//! * `API_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)
//! * `API_SEED_DEMO` - Seed a demo request at startup (default: false)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use core_kernel::{Clock, Currency, EventId, SystemClock, UserId};
use domain_reimbursement::ports::memory::{InMemoryReimbursementStore, InMemoryRequestPort};
use domain_reimbursement::{Expense, Request, WorkflowService};
use interface_api::{config::ApiConfig, create_router};

/// Main entry point for the API server.
///
/// Initializes logging, loads configuration, wires the workflow service to
/// the in-memory adapters and starts the HTTP server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("loading API configuration")?;

    init_tracing(&config.log_level);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        "Starting reimbursement API server"
    );

    let store = Arc::new(InMemoryReimbursementStore::new());
    let requests = Arc::new(InMemoryRequestPort::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    if config.seed_demo {
        seed_demo_request(&requests, clock.as_ref()).await;
    }

    let service = Arc::new(WorkflowService::new(store, requests, clock));
    let app = create_router(service, config.clone());

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("invalid server address {}", config.server_addr()))?;

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Stores one request with two expenses so the API can be tried without
/// the system that normally owns requests
async fn seed_demo_request(requests: &InMemoryRequestPort, clock: &dyn Clock) {
    let mut request = Request::new(UserId::new(), EventId::new(), clock.now());

    let mut flight = Expense::new("Flight", Currency::EUR);
    flight.estimated_amount = Some(Decimal::new(38990, 2));
    let mut hotel = Expense::new("Hotel", Currency::EUR);
    hotel.estimated_amount = Some(Decimal::new(29700, 2));
    request.expenses.push(flight);
    request.expenses.push(hotel);

    tracing::info!(
        request_id = %request.id,
        user_id = %request.user_id,
        "Seeded demo request"
    );
    requests.put(request).await;
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// This enables graceful shutdown of the server, allowing in-flight
/// requests to complete before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
