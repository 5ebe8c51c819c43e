//! Order Draft Builder.

use crate::config::EngineConfig;
use crate::environment::Clock;
use crate::error::{EngineError, EngineResult};
use crate::ledger;
use crate::metrics;
use crate::pricing::{self, LinePrice};
use crate::store::{OrderStore, ReservationStore, Store, UnitOfWork};
use crate::types::{
    Address, CheckoutItem, CustomerInput, IdempotencyKey, Order, OrderDraft, OrderId, OrderLine,
    OrderLineId, OrderStatus, Payment, PaymentId, PaymentStatus, Reservation, ReservationId,
    ReservationStatus, VariantId, VariantStock,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// Input of [`OrderDraftBuilder::create_order_draft`].
#[derive(Debug, Clone)]
pub struct DraftRequest {
    /// Buyer details, upserted by email
    pub customer: CustomerInput,
    /// Shipping address
    pub shipping_address: Address,
    /// Billing address; shipping is used when absent
    pub billing_address: Option<Address>,
    /// Cart lines, possibly with repeated variants
    pub items: Vec<CheckoutItem>,
    /// Checkout attempt token
    pub idempotency_key: IdempotencyKey,
}

/// Validate the cart and merge repeated variants, keeping first-seen order.
///
/// # Errors
///
/// Returns a 400 [`EngineError::Domain`] if the cart is empty, a quantity is
/// not positive, or merged quantities overflow.
pub fn collapse_items(items: &[CheckoutItem]) -> EngineResult<Vec<CheckoutItem>> {
    if items.is_empty() {
        return Err(EngineError::bad_request("Cart is empty"));
    }

    let mut merged: Vec<CheckoutItem> = Vec::with_capacity(items.len());
    let mut index: HashMap<VariantId, usize> = HashMap::new();
    for item in items {
        if item.quantity <= 0 {
            return Err(EngineError::bad_request(format!(
                "Invalid quantity for variant {}",
                item.variant_id
            )));
        }
        if let Some(&at) = index.get(&item.variant_id) {
            let line = &mut merged[at];
            line.quantity = line.quantity.checked_add(item.quantity).ok_or_else(|| {
                EngineError::bad_request(format!("Invalid quantity for variant {}", item.variant_id))
            })?;
        } else {
            index.insert(item.variant_id, merged.len());
            merged.push(*item);
        }
    }
    Ok(merged)
}

/// Builds order drafts: priced order, payment shell and reservations, all in
/// one unit of work.
pub struct OrderDraftBuilder<S: Store> {
    store: S,
    clock: Arc<dyn Clock>,
    config: Arc<EngineConfig>,
}

impl<S: Store> Clone for OrderDraftBuilder<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: Arc::clone(&self.clock),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S: Store> OrderDraftBuilder<S> {
    /// Creates a new builder
    #[must_use]
    pub fn new(store: S, clock: Arc<dyn Clock>, config: Arc<EngineConfig>) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Create an order draft.
    ///
    /// Either everything (customer upsert, order, lines, payment shell,
    /// inventory holds, reservation rows) is committed, or nothing is.
    ///
    /// # Errors
    ///
    /// - 400 domain error for an empty cart, a non-positive quantity or a cart
    ///   mixing currencies
    /// - [`EngineError::IdempotencyConflict`] if the key already has ACTIVE or
    ///   CONVERTED reservations
    /// - [`EngineError::VariantUnavailable`] for an unknown variant
    /// - [`EngineError::OutOfStock`] if any line cannot be reserved
    /// - storage errors
    #[tracing::instrument(
        skip_all,
        fields(idempotency_key = %request.idempotency_key, items = request.items.len())
    )]
    pub async fn create_order_draft(&self, request: DraftRequest) -> EngineResult<OrderDraft> {
        let items = collapse_items(&request.items)?;

        let mut tx = self.store.begin().await?;
        let draft = self.build(&mut tx, &request, &items).await?;
        tx.commit().await?;

        metrics::record_reservations_created(draft.reservations.len());
        tracing::info!(
            order_id = %draft.order.id,
            customer_id = %draft.customer.id,
            total = %draft.totals.total,
            reservations = draft.reservations.len(),
            "Order draft created"
        );
        Ok(draft)
    }

    async fn build(
        &self,
        tx: &mut S::Tx,
        request: &DraftRequest,
        items: &[CheckoutItem],
    ) -> EngineResult<OrderDraft> {
        let now = self.clock.now();
        let key = &request.idempotency_key;

        tx.lock_idempotency_key(key).await?;
        let existing = tx.reservations_by_key(key).await?;
        if existing.iter().any(|r| r.status.blocks_idempotency_key()) {
            tracing::warn!("Checkout key already has live reservations");
            return Err(EngineError::IdempotencyConflict);
        }

        let customer = tx.upsert_customer(&request.customer, now).await?;

        let ids: Vec<VariantId> = items.iter().map(|i| i.variant_id).collect();
        let stock: HashMap<VariantId, VariantStock> = tx
            .load_variants(&ids)
            .await?
            .into_iter()
            .map(|s| (s.variant.id, s))
            .collect();

        let mut priced: Vec<(&CheckoutItem, &VariantStock, LinePrice)> = Vec::with_capacity(items.len());
        for item in items {
            let found = stock
                .get(&item.variant_id)
                .ok_or(EngineError::VariantUnavailable(item.variant_id))?;
            if item.quantity > found.inventory.available() {
                tracing::warn!(variant_id = %item.variant_id, requested = item.quantity, "Line exceeds available stock");
                return Err(EngineError::OutOfStock(item.variant_id));
            }
            let price = pricing::price_line(found.variant.unit_price, item.quantity, self.config.vat_rate);
            priced.push((item, found, price));
        }

        let currency = priced
            .first()
            .map_or(self.config.default_currency, |(_, s, _)| s.variant.currency);
        if priced.iter().any(|(_, s, _)| s.variant.currency != currency) {
            return Err(EngineError::bad_request("Cart mixes currencies"));
        }

        let totals = pricing::sum_lines(priced.iter().map(|(_, _, p)| p));
        let order_id = OrderId::new();
        let order = Order {
            id: order_id,
            customer_id: customer.id,
            status: OrderStatus::PendingPayment,
            currency,
            subtotal_amount: totals.subtotal,
            discount_amount: Decimal::ZERO,
            tax_amount: totals.tax,
            shipping_amount: Decimal::ZERO,
            total_amount: totals.total,
            vat_rate: self.config.vat_rate,
            billing_address: request
                .billing_address
                .clone()
                .unwrap_or_else(|| request.shipping_address.clone()),
            shipping_address: request.shipping_address.clone(),
            created_at: now,
        };
        let lines: Vec<OrderLine> = priced
            .iter()
            .map(|(item, found, price)| OrderLine {
                id: OrderLineId::new(),
                order_id,
                variant_id: item.variant_id,
                quantity: item.quantity,
                unit_price: found.variant.unit_price,
                tax_rate: self.config.vat_rate,
                line_subtotal: price.subtotal,
                line_tax: price.tax,
                line_total: price.total,
            })
            .collect();
        tx.insert_order(&order, &lines).await?;

        let payment = Payment {
            id: PaymentId::new(),
            order_id,
            amount: totals.total,
            currency,
            status: PaymentStatus::RequiresPaymentMethod,
            payment_intent_id: None,
            created_at: now,
        };
        tx.insert_payment(&payment).await?;

        // Lock inventory rows in a stable order across concurrent checkouts.
        let mut to_reserve: Vec<&CheckoutItem> = items.iter().collect();
        to_reserve.sort_by_key(|i| i.variant_id);

        let expires_at = now + self.config.reservation_ttl;
        let mut reservations = Vec::with_capacity(to_reserve.len());
        for item in to_reserve {
            ledger::reserve_or_fail(tx, item.variant_id, item.quantity).await?;
            let reservation = Reservation {
                id: ReservationId::new(),
                variant_id: item.variant_id,
                customer_id: customer.id,
                quantity: item.quantity,
                status: ReservationStatus::Active,
                expires_at,
                idempotency_key: key.clone(),
                created_at: now,
            };
            tx.insert_reservation(&reservation).await?;
            reservations.push(reservation);
        }

        Ok(OrderDraft {
            order,
            lines,
            payment,
            customer,
            totals,
            reservations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(variant_id: VariantId, quantity: i32) -> CheckoutItem {
        CheckoutItem {
            variant_id,
            quantity,
        }
    }

    #[test]
    fn empty_cart_is_rejected() {
        let err = collapse_items(&[]).err();
        assert_eq!(err.map(|e| e.to_string()), Some("Cart is empty".to_string()));
    }

    #[test]
    fn non_positive_quantity_names_the_variant() {
        let v = VariantId::new();
        let err = collapse_items(&[item(v, 0)]).err();
        assert_eq!(
            err.map(|e| (e.status_code(), e.to_string())),
            Some((400, format!("Invalid quantity for variant {v}")))
        );
    }

    #[test]
    fn repeated_variants_are_summed_in_first_seen_order() {
        let a = VariantId::new();
        let b = VariantId::new();
        let merged = collapse_items(&[item(a, 1), item(b, 2), item(a, 3)]).unwrap_or_default();
        assert_eq!(merged, vec![item(a, 4), item(b, 2)]);
    }

    #[test]
    fn overflowing_merge_is_rejected() {
        let a = VariantId::new();
        assert!(collapse_items(&[item(a, i32::MAX), item(a, 1)]).is_err());
    }
}
