//! # Stripe Payment Intent client
//!
//! Payment Intent Bridge for the drop commerce engine, speaking the Stripe
//! form-encoded API.
//!
//! ## Example
//!
//! ```no_run
//! use drop_commerce_stripe::StripeClient;
//! use drop_commerce_core::payment::PaymentGateway;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Create client from STRIPE_SECRET_KEY environment variable
//! let client = StripeClient::from_env()?;
//! let gateway: Arc<dyn PaymentGateway> = Arc::new(client);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `POST /v1/payment_intents` with automatic payment methods
//! - Checkout idempotency key forwarded as `Idempotency-Key`
//! - Provider errors mapped into [`PaymentGatewayError`](drop_commerce_core::payment::PaymentGatewayError)

pub mod client;
pub mod error;
pub mod types;

// Re-export main types for convenience
pub use client::{DEFAULT_API_BASE, StripeClient};
pub use error::StripeError;
pub use types::{PaymentIntentObject, intent_form};
