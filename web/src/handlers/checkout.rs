//! Checkout endpoint.

use crate::error::AppError;
use crate::extractors::{CheckoutKey, IDEMPOTENCY_KEY_HEADER};
use crate::state::AppState;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use drop_commerce_core::checkout::{CheckoutReceipt, DraftRequest};
use drop_commerce_core::store::Store;
use drop_commerce_core::types::{Address, CheckoutItem, Currency, CustomerInput, OrderId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Checkout request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    /// Buyer
    pub customer: CustomerInput,
    /// Shipping address
    pub shipping_address: Address,
    /// Billing address, defaults to shipping
    #[serde(default)]
    pub billing_address: Option<Address>,
    /// Cart lines
    pub items: Vec<CheckoutItem>,
}

/// Checkout response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    /// Created order
    pub order_id: OrderId,
    /// Provider intent
    pub payment_intent_id: String,
    /// Secret for client-side confirmation
    pub client_secret: Option<String>,
    /// Amount due
    pub amount: Decimal,
    /// Currency
    pub currency: Currency,
    /// When the held stock is released
    pub reservation_expires_at: Option<DateTime<Utc>>,
}

impl From<CheckoutReceipt> for CheckoutResponse {
    fn from(receipt: CheckoutReceipt) -> Self {
        Self {
            order_id: receipt.order_id,
            payment_intent_id: receipt.payment_intent_id,
            client_secret: receipt.client_secret,
            amount: receipt.amount,
            currency: receipt.currency,
            reservation_expires_at: receipt.reservation_expires_at,
        }
    }
}

/// Start a checkout: reserve stock, create the order and the payment intent.
///
/// # Endpoint
///
/// ```text
/// POST /api/checkout
/// Idempotency-Key: <token>   (optional, generated when absent)
/// ```
///
/// Answers 201 with [`CheckoutResponse`] and echoes the key used in the
/// `Idempotency-Key` response header.
///
/// # Errors
///
/// - 400 malformed body, empty cart or invalid quantity
/// - 404 unknown variant
/// - 409 out of stock or duplicate checkout
/// - 502 payment provider failure
/// - 503 payments not configured
pub async fn create_checkout<S: Store>(
    State(state): State<AppState<S>>,
    CheckoutKey(key): CheckoutKey,
    body: Result<Json<CheckoutBody>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = body?;
    let echoed = HeaderValue::from_str(key.as_str()).ok();

    let receipt = state
        .checkout
        .checkout(DraftRequest {
            customer: body.customer,
            shipping_address: body.shipping_address,
            billing_address: body.billing_address,
            items: body.items,
            idempotency_key: key,
        })
        .await?;

    let mut response = (StatusCode::CREATED, Json(CheckoutResponse::from(receipt))).into_response();
    if let Some(value) = echoed {
        response.headers_mut().insert(IDEMPOTENCY_KEY_HEADER, value);
    }
    Ok(response)
}
