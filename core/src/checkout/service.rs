//! Checkout orchestration: draft, payment intent, attachment.

use super::draft::{DraftRequest, OrderDraftBuilder};
use crate::error::{EngineError, EngineResult};
use crate::metrics;
use crate::payment::{PaymentGateway, PaymentIntentRequest, ShippingDetails};
use crate::pricing;
use crate::store::{IntentAttachment, OrderStore, Store, UnitOfWork};
use crate::types::{Currency, OrderId, PaymentId, PaymentStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    /// Created order
    pub order_id: OrderId,
    /// Payment record
    pub payment_id: PaymentId,
    /// Provider intent ID
    pub payment_intent_id: String,
    /// Secret for client-side confirmation
    pub client_secret: Option<String>,
    /// Amount due
    pub amount: Decimal,
    /// Currency
    pub currency: Currency,
    /// Mapped provider status
    pub payment_status: PaymentStatus,
    /// Expiry of the checkout's reservations
    pub reservation_expires_at: Option<DateTime<Utc>>,
}

/// Runs a full checkout against the payment provider.
pub struct CheckoutService<S: Store> {
    drafts: OrderDraftBuilder<S>,
    store: S,
    gateway: Option<Arc<dyn PaymentGateway>>,
}

impl<S: Store> Clone for CheckoutService<S> {
    fn clone(&self) -> Self {
        Self {
            drafts: self.drafts.clone(),
            store: self.store.clone(),
            gateway: self.gateway.clone(),
        }
    }
}

impl<S: Store> CheckoutService<S> {
    /// Creates a checkout service. Without a gateway every checkout fails
    /// with [`EngineError::PaymentUnavailable`] before reserving anything.
    #[must_use]
    pub fn new(drafts: OrderDraftBuilder<S>, store: S, gateway: Option<Arc<dyn PaymentGateway>>) -> Self {
        Self {
            drafts,
            store,
            gateway,
        }
    }

    /// The draft builder this service uses.
    #[must_use]
    pub const fn drafts(&self) -> &OrderDraftBuilder<S> {
        &self.drafts
    }

    /// Draft the order, create the provider intent and attach it.
    ///
    /// If the provider call or the attachment fails the draft stays
    /// committed; a retry with the same key is refused by the idempotency
    /// check and the reservations are eventually reclaimed by the sweeper.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::PaymentUnavailable`] without a gateway, any
    /// draft error, [`EngineError::Payment`] when the provider fails, or a
    /// storage error.
    pub async fn checkout(&self, request: DraftRequest) -> EngineResult<CheckoutReceipt> {
        let Some(gateway) = &self.gateway else {
            metrics::record_checkout("unavailable");
            return Err(EngineError::PaymentUnavailable);
        };

        let key = request.idempotency_key.clone();
        let draft = match self.drafts.create_order_draft(request).await {
            Ok(draft) => draft,
            Err(err) => {
                metrics::record_checkout(match &err {
                    EngineError::IdempotencyConflict => "conflict",
                    EngineError::OutOfStock(_) => "out_of_stock",
                    e if e.is_client_error() => "rejected",
                    _ => "failed",
                });
                return Err(err);
            }
        };

        let metadata = BTreeMap::from([
            ("orderId".to_string(), draft.order.id.to_string()),
            ("checkoutKey".to_string(), key.to_string()),
        ]);
        let intent = gateway
            .create_payment_intent(PaymentIntentRequest {
                amount_minor: pricing::to_minor_units(draft.totals.total)?,
                currency: draft.order.currency,
                metadata,
                idempotency_key: key.to_string(),
                receipt_email: Some(draft.customer.email.clone()),
                description: Some(format!("Drop order #{}", draft.order.id)),
                shipping: Some(ShippingDetails {
                    name: draft.customer.name.clone().unwrap_or_else(|| draft.customer.email.clone()),
                    phone: draft.customer.phone.clone(),
                    address: draft.order.shipping_address.clone(),
                }),
            })
            .await
            .map_err(|e| {
                metrics::record_checkout("failed");
                tracing::error!(order_id = %draft.order.id, error = %e, "Payment intent creation failed");
                EngineError::from(e)
            })?;

        let status = intent.status();
        let mut tx = self.store.begin().await?;
        tx.attach_payment_intent(
            draft.payment.id,
            &IntentAttachment {
                payment_intent_id: intent.id.clone(),
                status,
                raw_response: intent.raw.clone(),
            },
        )
        .await?;
        tx.commit().await?;

        metrics::record_checkout("created");
        tracing::info!(
            order_id = %draft.order.id,
            payment_intent_id = %intent.id,
            payment_status = status.as_str(),
            "Checkout created"
        );

        Ok(CheckoutReceipt {
            order_id: draft.order.id,
            payment_id: draft.payment.id,
            payment_intent_id: intent.id,
            client_secret: intent.client_secret,
            amount: draft.totals.total,
            currency: draft.order.currency,
            payment_status: status,
            reservation_expires_at: draft.reservation_expires_at(),
        })
    }
}
