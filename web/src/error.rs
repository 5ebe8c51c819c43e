//! HTTP error mapping.
//!
//! [`AppError`] bridges [`EngineError`] and HTTP responses. Client errors
//! keep the engine's message; server errors are logged with their source
//! and answered with a generic message.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use drop_commerce_core::EngineError;
use serde::Serialize;
use std::fmt;

/// Error answered by a handler.
///
/// ```ignore
/// async fn handler(State(state): State<AppState<S>>) -> Result<Json<QueueTicketView>, AppError> {
///     let view = state.admission.get_ticket(drop_id, ticket_id).await?;
///     Ok(Json(view))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    /// Shown to the client
    message: String,
    /// Logged, never shown
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Error with an explicit status and machine-readable code.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying failure for the server log.
    #[must_use]
    pub fn with_source(self, source: anyhow::Error) -> Self {
        Self {
            source: Some(source),
            ..self
        }
    }

    /// 400 with code `BAD_REQUEST`.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// 503 with code `SERVICE_UNAVAILABLE`.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(AsRef::as_ref)
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = %self.status,
                code = self.code,
                message = %self.message,
                source = %self.source.as_ref().map_or_else(String::new, |e| format!("{e:#}")),
                "Request failed"
            );
        }

        let body = ErrorBody {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = err.code();

        let message = match err {
            EngineError::Storage(_) | EngineError::Invariant(_) => "An internal error occurred",
            EngineError::Payment(_) => "Payment provider error",
            _ => return Self::new(status, code, err.to_string()),
        };
        Self::new(status, code, message).with_source(anyhow::Error::new(err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drop_commerce_core::payment::PaymentGatewayError;
    use drop_commerce_core::types::VariantId;

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Cart is empty");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Cart is empty");
    }

    #[test]
    fn test_engine_client_errors_keep_message() {
        let variant = VariantId::new();
        let err = AppError::from(EngineError::OutOfStock(variant));
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, "OUT_OF_STOCK");
        assert_eq!(err.message, format!("Variant {variant} is out of stock"));

        let err = AppError::from(EngineError::forbidden("Drop has ended"));
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.message, "Drop has ended");
    }

    #[test]
    fn test_server_errors_hide_internals() {
        let err = AppError::from(EngineError::Storage("connection reset by peer".to_string()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "An internal error occurred");
        assert!(err.source.is_some());

        let err = AppError::from(EngineError::Payment(PaymentGatewayError::Network(
            "timed out".to_string(),
        )));
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert!(!err.message.contains("timed out"));
    }

    #[test]
    fn test_unconfigured_payments_are_unavailable() {
        let err = AppError::from(EngineError::PaymentUnavailable);
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code, "PAYMENT_UNAVAILABLE");
    }
}
