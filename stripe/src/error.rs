//! Error types for the Stripe client

use drop_commerce_core::payment::PaymentGatewayError;
use thiserror::Error;

/// Errors that can occur when talking to the Stripe API
#[derive(Debug, Error)]
pub enum StripeError {
    /// Missing `STRIPE_SECRET_KEY` environment variable
    #[error("Missing STRIPE_SECRET_KEY environment variable")]
    MissingApiKey,

    /// HTTP request failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Response parsing failed
    #[error("Response parsing failed: {0}")]
    ResponseParseFailed(String),

    /// Rate limited - too many requests
    #[error("Rate limited - too many requests")]
    RateLimited,

    /// Unauthorized - invalid secret key
    #[error("Unauthorized - invalid secret key")]
    Unauthorized,

    /// API returned an error
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from API
        message: String,
    },
}

impl From<StripeError> for PaymentGatewayError {
    fn from(err: StripeError) -> Self {
        match err {
            StripeError::MissingApiKey => Self::Unavailable(err.to_string()),
            StripeError::RequestFailed(message) => Self::Network(message),
            StripeError::ResponseParseFailed(message) => Self::InvalidResponse(message),
            StripeError::RateLimited => Self::Unavailable(err.to_string()),
            StripeError::Unauthorized => Self::Rejected {
                status: 401,
                message: err.to_string(),
            },
            StripeError::ApiError { status, message } if status >= 500 => {
                Self::Unavailable(format!("status {status}: {message}"))
            }
            StripeError::ApiError { status, message } => Self::Rejected { status, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_unavailable_and_client_errors_rejected() {
        let server = PaymentGatewayError::from(StripeError::ApiError {
            status: 502,
            message: "bad gateway".to_string(),
        });
        assert!(matches!(server, PaymentGatewayError::Unavailable(_)));

        let client = PaymentGatewayError::from(StripeError::ApiError {
            status: 402,
            message: "card_declined".to_string(),
        });
        assert_eq!(
            client,
            PaymentGatewayError::Rejected {
                status: 402,
                message: "card_declined".to_string()
            }
        );
    }

    #[test]
    fn transport_failures_are_network_errors() {
        let err = PaymentGatewayError::from(StripeError::RequestFailed("timed out".to_string()));
        assert_eq!(err, PaymentGatewayError::Network("timed out".to_string()));
    }
}
