//! Axum HTTP boundary for the drop commerce engine.
//!
//! The handlers only translate between HTTP and the engine: they parse the
//! request, call one engine operation and map the result (or the
//! [`EngineError`](drop_commerce_core::EngineError)) to a response.
//!
//! # Routes
//!
//! ```text
//! GET  /health                      liveness
//! GET  /ready                       datastore reachable
//! POST /api/checkout                reserve, draft, create payment intent
//! POST /api/drops/:drop_id/queue    join a drop queue
//! GET  /api/drops/:drop_id/queue    ticket status (?ticketId=)
//! ```
//!
//! Errors are answered as `{"code": "...", "message": "..."}` with the
//! engine's status code.
//!
//! # Example
//!
//! ```ignore
//! use drop_commerce_web::{AppState, router};
//!
//! let state = AppState::new(checkout, admission, store);
//! let app = router(state);
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{CheckoutKey, ClientIp, IDEMPOTENCY_KEY_HEADER, UserAgent};
pub use state::AppState;

use axum::{
    Router,
    routing::{get, post},
};
use drop_commerce_core::store::Store;
use tower_http::trace::TraceLayer;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Build the storefront router over `state`.
pub fn router<S: Store>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::health::readiness::<S>))
        .route("/api/checkout", post(handlers::checkout::create_checkout::<S>))
        .route(
            "/api/drops/:drop_id/queue",
            post(handlers::queue::join_queue::<S>).get(handlers::queue::ticket_status::<S>),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
