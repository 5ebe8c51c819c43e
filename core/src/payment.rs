//! Payment Intent Bridge.
//!
//! A single outbound call to the payment provider. The provider's status
//! string is never stored as-is: [`map_provider_status`] translates it into
//! this system's [`PaymentStatus`].

use crate::types::{Address, Currency, PaymentStatus};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Payment gateway result
pub type GatewayResult<T> = Result<T, PaymentGatewayError>;

/// Payment gateway error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentGatewayError {
    /// The provider refused the request (4xx)
    #[error("Request rejected ({status}): {message}")]
    Rejected {
        /// HTTP status from the provider
        status: u16,
        /// Provider message
        message: String,
    },
    /// The provider is unavailable or failing (5xx, rate limited)
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
    /// Transport failure
    #[error("Network error: {0}")]
    Network(String),
    /// The provider answered with something we cannot read
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Request for a new payment intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntentRequest {
    /// Amount in minor units (cents)
    pub amount_minor: i64,
    /// Currency
    pub currency: Currency,
    /// Free-form metadata echoed back by the provider
    pub metadata: BTreeMap<String, String>,
    /// Forwarded as the provider idempotency key
    pub idempotency_key: String,
    /// Where the provider sends the receipt
    pub receipt_email: Option<String>,
    /// Statement description shown in the provider dashboard
    pub description: Option<String>,
    /// Recipient and destination of the order
    pub shipping: Option<ShippingDetails>,
}

/// Shipping block attached to a payment intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingDetails {
    /// Recipient name; the customer email when no name is known
    pub name: String,
    /// Contact phone
    pub phone: Option<String>,
    /// Destination address
    pub address: Address,
}

/// Provider intent as returned by the bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntent {
    /// Provider intent ID
    pub id: String,
    /// Raw provider status
    pub provider_status: String,
    /// Secret the storefront uses to confirm the payment client-side
    pub client_secret: Option<String>,
    /// Full provider response, stored for audit
    pub raw: serde_json::Value,
}

impl PaymentIntent {
    /// Provider status mapped into [`PaymentStatus`].
    #[must_use]
    pub fn status(&self) -> PaymentStatus {
        map_provider_status(&self.provider_status)
    }
}

/// Payment gateway trait
///
/// Abstraction over the payment provider. Implementations must be safe to
/// call with the same idempotency key more than once.
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent
    ///
    /// # Errors
    ///
    /// Returns error if the provider call fails
    fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<PaymentIntent>> + Send + '_>>;
}

/// Fixed lookup from provider status to [`PaymentStatus`].
#[must_use]
pub fn map_provider_status(status: &str) -> PaymentStatus {
    match status {
        "requires_action" => PaymentStatus::RequiresAction,
        "requires_confirmation" => PaymentStatus::RequiresConfirmation,
        "processing" => PaymentStatus::Processing,
        "requires_capture" => PaymentStatus::Authorized,
        "canceled" => PaymentStatus::Canceled,
        "succeeded" => PaymentStatus::Succeeded,
        _ => PaymentStatus::RequiresPaymentMethod,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_table() {
        let cases = [
            ("requires_action", PaymentStatus::RequiresAction),
            ("requires_confirmation", PaymentStatus::RequiresConfirmation),
            ("requires_payment_method", PaymentStatus::RequiresPaymentMethod),
            ("processing", PaymentStatus::Processing),
            ("requires_capture", PaymentStatus::Authorized),
            ("canceled", PaymentStatus::Canceled),
            ("succeeded", PaymentStatus::Succeeded),
        ];
        for (raw, expected) in cases {
            assert_eq!(map_provider_status(raw), expected, "{raw}");
        }
    }

    #[test]
    fn unknown_status_needs_payment_method() {
        assert_eq!(map_provider_status("on_hold"), PaymentStatus::RequiresPaymentMethod);
        assert_eq!(map_provider_status(""), PaymentStatus::RequiresPaymentMethod);
    }
}
