//! Liveness and readiness probes.

use crate::error::AppError;
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use drop_commerce_core::store::Store;
use serde::Serialize;

/// Liveness probe. Answers `ok` without touching the datastore.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness response body.
#[derive(Debug, Serialize)]
pub struct Readiness {
    /// Always `"ready"` on success
    pub status: &'static str,
}

/// Readiness check: the datastore must answer.
///
/// # Status Codes
///
/// - 200 OK: datastore reachable
/// - 503 Service Unavailable: datastore unreachable
///
/// # Endpoint
///
/// ```text
/// GET /ready
/// ```
///
/// # Errors
///
/// Returns a 503 [`AppError`] when the ping fails.
pub async fn readiness<S: Store>(State(state): State<AppState<S>>) -> Result<Json<Readiness>, AppError> {
    state.store.ping().await.map_err(|e| {
        AppError::unavailable("Database unavailable").with_source(anyhow::Error::new(e))
    })?;

    Ok(Json(Readiness { status: "ready" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn liveness_answers_ok() {
        let (status, body) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }
}
