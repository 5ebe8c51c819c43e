//! Error types for the drop commerce engine.
//!
//! Every failure the engine can raise is an [`EngineError`]. Domain failures
//! carry the transport status they map to so the HTTP boundary never has to
//! guess; infrastructure failures collapse to 5xx.

use crate::payment::PaymentGatewayError;
use crate::types::VariantId;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the reservation and admission engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed or forbidden operation (empty cart, invalid quantity, drop
    /// missing / closed / not queueing).
    #[error("{message}")]
    Domain {
        /// Transport status (400, 403, 404, ...)
        status: u16,
        /// Client-facing message
        message: String,
    },

    /// A requested variant does not exist.
    #[error("Variant {0} not found")]
    VariantUnavailable(VariantId),

    /// Not enough unreserved stock for the requested quantity.
    #[error("Variant {0} is out of stock")]
    OutOfStock(VariantId),

    /// A checkout with this idempotency key is already active or completed.
    #[error("Duplicate checkout request")]
    IdempotencyConflict,

    /// No payment provider is configured.
    #[error("Payments are not configured")]
    PaymentUnavailable,

    /// The payment provider call failed.
    #[error("Payment provider error: {0}")]
    Payment(#[from] PaymentGatewayError),

    /// The datastore failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// An internal invariant did not hold.
    #[error("Invariant violated: {0}")]
    Invariant(String),
}

impl EngineError {
    /// 400 domain error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Domain {
            status: 400,
            message: message.into(),
        }
    }

    /// 403 domain error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Domain {
            status: 403,
            message: message.into(),
        }
    }

    /// 404 domain error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::Domain {
            status: 404,
            message: message.into(),
        }
    }

    /// Transport status this error maps to.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Domain { status, .. } => *status,
            Self::VariantUnavailable(_) => 404,
            Self::OutOfStock(_) | Self::IdempotencyConflict => 409,
            Self::PaymentUnavailable => 503,
            Self::Payment(_) => 502,
            Self::Storage(_) | Self::Invariant(_) => 500,
        }
    }

    /// Stable machine-readable code for API responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Domain { status, .. } => match *status {
                403 => "FORBIDDEN",
                404 => "NOT_FOUND",
                409 => "CONFLICT",
                _ => "BAD_REQUEST",
            },
            Self::VariantUnavailable(_) => "VARIANT_UNAVAILABLE",
            Self::OutOfStock(_) => "OUT_OF_STOCK",
            Self::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
            Self::PaymentUnavailable => "PAYMENT_UNAVAILABLE",
            Self::Payment(_) => "PAYMENT_PROVIDER_ERROR",
            Self::Storage(_) | Self::Invariant(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the failure is the caller's (4xx).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        let status = self.status_code();
        status >= 400 && status < 500
    }
}
