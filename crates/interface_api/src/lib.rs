//! HTTP API Layer
//!
//! This crate provides the REST API for the reimbursement workflow using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers for reimbursements and health checks
//! - **Middleware**: Authentication, actor resolution, tracing, audit logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: Consistent error responses mapped from domain errors
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let app = create_router(service, config);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware as axum_middleware,
};
use tower_http::trace::TraceLayer;
use tower_http::cors::{CorsLayer, Any};

use domain_reimbursement::WorkflowService;

use crate::config::ApiConfig;
use crate::middleware::{auth_middleware, audit_middleware};
use crate::handlers::{health, reimbursements};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WorkflowService>,
    pub config: ApiConfig,
}

/// Creates the main API router
///
/// # Arguments
///
/// * `service` - Workflow service wired to its adapters
/// * `config` - API configuration
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(service: Arc<WorkflowService>, config: ApiConfig) -> Router {
    let state = AppState { service, config };

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let reimbursement_routes = Router::new()
        .route(
            "/",
            post(reimbursements::create_reimbursement).get(reimbursements::list_reimbursements),
        )
        .route(
            "/:id",
            get(reimbursements::get_reimbursement).patch(reimbursements::update_reimbursement),
        )
        .route("/:id/editable", get(reimbursements::editable))
        .route("/:id/events", get(reimbursements::available_events))
        .route("/:id/events/:event", post(reimbursements::fire_event))
        .route("/:id/expenses/sum", get(reimbursements::expenses_sum));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/reimbursements", reimbursement_routes)
        .layer(axum_middleware::from_fn_with_state(state.clone(), audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
