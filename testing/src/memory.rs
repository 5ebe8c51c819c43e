//! In-memory storage for engine tests.
//!
//! Each unit of work holds the store lock for its whole lifetime and works
//! on a private copy of the state; [`UnitOfWork::commit`] swaps the copy in.
//! Units of work are therefore fully serialisable, and dropping one leaves
//! the store exactly as it was.

use drop_commerce_core::EngineResult;
use drop_commerce_core::error::EngineError;
use drop_commerce_core::hashing::HashedSignals;
use drop_commerce_core::risk::TicketTrace;
use drop_commerce_core::store::{
    IntentAttachment, InventoryLedger, OrderStore, QueueStore, ReservationStore, Store, UnitOfWork,
};
use drop_commerce_core::types::{
    Customer, CustomerId, CustomerInput, Drop, DropId, IdempotencyKey, Inventory, Order, OrderId,
    OrderLine, Payment, PaymentId, QueueTicket, Reservation, ReservationId, ReservationStatus,
    TicketId, VariantId, VariantStock,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Everything the in-memory store holds.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    customers: Vec<Customer>,
    variants: HashMap<VariantId, VariantStock>,
    orders: HashMap<OrderId, (Order, Vec<OrderLine>)>,
    payments: HashMap<PaymentId, (Payment, Option<serde_json::Value>)>,
    reservations: Vec<Reservation>,
    drops: HashMap<DropId, Drop>,
    tickets: Vec<QueueTicket>,
}

/// In-memory implementation of every storage port.
///
/// # Example
///
/// ```
/// use drop_commerce_testing::{InMemoryStore, fixtures};
///
/// # async fn example() {
/// let store = InMemoryStore::new();
/// let stock = fixtures::variant("89.90", 3);
/// let id = stock.variant.id;
/// store.seed_variant(stock).await;
/// assert_eq!(store.inventory(id).await.map(|i| i.quantity_on_hand), Some(3));
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    offline: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unreachable datastore: `begin` and `ping` fail while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> EngineResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(EngineError::Storage("Failed to connect: store offline".to_string()));
        }
        Ok(())
    }

    /// Insert or replace a variant and its inventory row.
    pub async fn seed_variant(&self, stock: VariantStock) {
        self.state.lock().await.variants.insert(stock.variant.id, stock);
    }

    /// Insert or replace a drop.
    pub async fn seed_drop(&self, drop: Drop) {
        self.state.lock().await.drops.insert(drop.id, drop);
    }

    /// Insert a ticket as-is (no constraint checks).
    pub async fn seed_ticket(&self, ticket: QueueTicket) {
        self.state.lock().await.tickets.push(ticket);
    }

    /// Overwrite the reserved counter of a variant, bypassing the ledger.
    pub async fn force_reserved(&self, variant_id: VariantId, quantity_reserved: i32) {
        if let Some(stock) = self.state.lock().await.variants.get_mut(&variant_id) {
            stock.inventory.quantity_reserved = quantity_reserved;
        }
    }

    /// Current inventory of a variant.
    pub async fn inventory(&self, variant_id: VariantId) -> Option<Inventory> {
        self.state.lock().await.variants.get(&variant_id).map(|s| s.inventory)
    }

    /// All reservations, in insertion order.
    pub async fn reservations(&self) -> Vec<Reservation> {
        self.state.lock().await.reservations.clone()
    }

    /// All orders.
    pub async fn orders(&self) -> Vec<Order> {
        self.state.lock().await.orders.values().map(|(o, _)| o.clone()).collect()
    }

    /// Lines of one order.
    pub async fn order_lines(&self, order_id: OrderId) -> Vec<OrderLine> {
        self.state
            .lock()
            .await
            .orders
            .get(&order_id)
            .map(|(_, lines)| lines.clone())
            .unwrap_or_default()
    }

    /// All payments with their raw provider response.
    pub async fn payments(&self) -> Vec<(Payment, Option<serde_json::Value>)> {
        self.state.lock().await.payments.values().cloned().collect()
    }

    /// All customers.
    pub async fn customers(&self) -> Vec<Customer> {
        self.state.lock().await.customers.clone()
    }

    /// Tickets of one drop, in insertion order.
    pub async fn tickets(&self, drop_id: DropId) -> Vec<QueueTicket> {
        self.state
            .lock()
            .await
            .tickets
            .iter()
            .filter(|t| t.drop_id == drop_id)
            .cloned()
            .collect()
    }

    /// Sum of ACTIVE reservation quantities for a variant.
    pub async fn active_reserved(&self, variant_id: VariantId) -> i32 {
        self.state
            .lock()
            .await
            .reservations
            .iter()
            .filter(|r| r.variant_id == variant_id && r.status == ReservationStatus::Active)
            .map(|r| r.quantity)
            .sum()
    }
}

impl Store for InMemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> EngineResult<MemoryTx> {
        self.check_online()?;
        let guard = Arc::clone(&self.state).lock_owned().await;
        let work = guard.clone();
        Ok(MemoryTx { guard, work })
    }

    async fn ping(&self) -> EngineResult<()> {
        self.check_online()
    }
}

/// Unit of work over [`InMemoryStore`].
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

impl UnitOfWork for MemoryTx {
    async fn commit(self) -> EngineResult<()> {
        let Self { mut guard, work } = self;
        *guard = work;
        Ok(())
    }
}

impl InventoryLedger for MemoryTx {
    async fn try_reserve(&mut self, variant_id: VariantId, quantity: i32) -> EngineResult<bool> {
        let Some(stock) = self.work.variants.get_mut(&variant_id) else {
            return Ok(false);
        };
        let inventory = &mut stock.inventory;
        if inventory.quantity_reserved <= inventory.quantity_on_hand - quantity {
            inventory.quantity_reserved += quantity;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn release_reserved(&mut self, variant_id: VariantId, quantity: i32) -> EngineResult<()> {
        if let Some(stock) = self.work.variants.get_mut(&variant_id) {
            stock.inventory.quantity_reserved = (stock.inventory.quantity_reserved - quantity).max(0);
        }
        Ok(())
    }

    async fn inventory(&mut self, variant_id: VariantId) -> EngineResult<Option<Inventory>> {
        Ok(self.work.variants.get(&variant_id).map(|s| s.inventory))
    }
}

impl ReservationStore for MemoryTx {
    async fn lock_idempotency_key(&mut self, _key: &IdempotencyKey) -> EngineResult<()> {
        // The whole store is already locked by this unit of work.
        Ok(())
    }

    async fn reservations_by_key(&mut self, key: &IdempotencyKey) -> EngineResult<Vec<Reservation>> {
        Ok(self
            .work
            .reservations
            .iter()
            .filter(|r| &r.idempotency_key == key)
            .cloned()
            .collect())
    }

    async fn insert_reservation(&mut self, reservation: &Reservation) -> EngineResult<()> {
        if self.work.reservations.iter().any(|r| r.id == reservation.id) {
            return Err(EngineError::Storage(format!(
                "Failed to insert reservation: duplicate id {}",
                reservation.id
            )));
        }
        self.work.reservations.push(reservation.clone());
        Ok(())
    }

    async fn fetch_expired(&mut self, now: DateTime<Utc>, limit: i64) -> EngineResult<Vec<Reservation>> {
        let mut expired: Vec<Reservation> = self
            .work
            .reservations
            .iter()
            .filter(|r| r.status == ReservationStatus::Active && r.expires_at <= now)
            .cloned()
            .collect();
        expired.sort_by_key(|r| r.expires_at);
        expired.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(expired)
    }

    async fn transition_reservations(
        &mut self,
        ids: &[ReservationId],
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> EngineResult<Vec<Reservation>> {
        let mut moved = Vec::new();
        for reservation in &mut self.work.reservations {
            if reservation.status == from && ids.contains(&reservation.id) {
                reservation.status = to;
                moved.push(reservation.clone());
            }
        }
        Ok(moved)
    }
}

impl OrderStore for MemoryTx {
    async fn upsert_customer(&mut self, input: &CustomerInput, now: DateTime<Utc>) -> EngineResult<Customer> {
        if let Some(existing) = self.work.customers.iter_mut().find(|c| c.email == input.email) {
            existing.apply(input);
            return Ok(existing.clone());
        }
        let customer = Customer::from_input(input, now);
        self.work.customers.push(customer.clone());
        Ok(customer)
    }

    async fn load_variants(&mut self, ids: &[VariantId]) -> EngineResult<Vec<VariantStock>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.work.variants.get(id).cloned())
            .collect())
    }

    async fn insert_order(&mut self, order: &Order, lines: &[OrderLine]) -> EngineResult<()> {
        self.work.orders.insert(order.id, (order.clone(), lines.to_vec()));
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> EngineResult<()> {
        self.work.payments.insert(payment.id, (payment.clone(), None));
        Ok(())
    }

    async fn attach_payment_intent(
        &mut self,
        payment_id: PaymentId,
        attachment: &IntentAttachment,
    ) -> EngineResult<()> {
        let (payment, raw) = self
            .work
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| EngineError::Storage(format!("Failed to attach intent: payment {payment_id} missing")))?;
        payment.payment_intent_id = Some(attachment.payment_intent_id.clone());
        payment.status = attachment.status;
        *raw = Some(attachment.raw_response.clone());
        Ok(())
    }

    async fn find_payment(&mut self, payment_id: PaymentId) -> EngineResult<Option<Payment>> {
        Ok(self.work.payments.get(&payment_id).map(|(p, _)| p.clone()))
    }
}

impl QueueStore for MemoryTx {
    async fn find_drop(&mut self, drop_id: DropId) -> EngineResult<Option<Drop>> {
        Ok(self.work.drops.get(&drop_id).cloned())
    }

    async fn lock_drop(&mut self, drop_id: DropId) -> EngineResult<Option<Drop>> {
        Ok(self.work.drops.get(&drop_id).cloned())
    }

    async fn find_active_ticket(
        &mut self,
        drop_id: DropId,
        customer_id: CustomerId,
    ) -> EngineResult<Option<QueueTicket>> {
        Ok(self
            .work
            .tickets
            .iter()
            .find(|t| t.drop_id == drop_id && t.customer_id == customer_id && t.status.is_active())
            .cloned())
    }

    async fn recent_tickets(
        &mut self,
        drop_id: DropId,
        signals: &HashedSignals,
        since: DateTime<Utc>,
    ) -> EngineResult<Vec<TicketTrace>> {
        let same = |ours: &Option<String>, theirs: &Option<String>| {
            ours.is_some() && ours == theirs
        };
        Ok(self
            .work
            .tickets
            .iter()
            .filter(|t| t.drop_id == drop_id && t.created_at >= since)
            .filter(|t| {
                same(&signals.fingerprint_hash, &t.fingerprint_hash) || same(&signals.ip_hash, &t.ip_hash)
            })
            .map(|t| TicketTrace {
                customer_id: t.customer_id,
                fingerprint_hash: t.fingerprint_hash.clone(),
                ip_hash: t.ip_hash.clone(),
                created_at: t.created_at,
            })
            .collect())
    }

    async fn max_position(&mut self, drop_id: DropId) -> EngineResult<Option<i32>> {
        Ok(self
            .work
            .tickets
            .iter()
            .filter(|t| t.drop_id == drop_id)
            .filter_map(|t| t.position)
            .max())
    }

    async fn insert_ticket(&mut self, ticket: &QueueTicket) -> EngineResult<()> {
        let clash = self.work.tickets.iter().any(|t| {
            t.drop_id == ticket.drop_id
                && ((ticket.position.is_some() && t.position == ticket.position)
                    || (ticket.status.is_active()
                        && t.status.is_active()
                        && t.customer_id == ticket.customer_id))
        });
        if clash {
            return Err(EngineError::Storage(
                "Failed to insert ticket: unique constraint violated".to_string(),
            ));
        }
        self.work.tickets.push(ticket.clone());
        Ok(())
    }

    async fn find_ticket(&mut self, drop_id: DropId, ticket_id: TicketId) -> EngineResult<Option<QueueTicket>> {
        Ok(self
            .work
            .tickets
            .iter()
            .find(|t| t.drop_id == drop_id && t.id == ticket_id)
            .cloned())
    }
}
