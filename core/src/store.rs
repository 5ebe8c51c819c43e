//! Storage ports.
//!
//! The engine talks to persistence exclusively through these traits. A
//! [`Store`] hands out units of work ([`UnitOfWork`]); every multi-step write
//! path runs inside exactly one of them and either commits fully or, when the
//! unit is dropped without [`UnitOfWork::commit`], leaves no effect.
//!
//! Implementations must provide:
//!
//! - a linearizable conditional update for [`InventoryLedger::try_reserve`]
//!   that reports whether a row changed;
//! - row locking (or serializable isolation) for
//!   [`QueueStore::lock_drop`], so position assignment for one drop is
//!   serialised;
//! - status transitions guarded on the current status in
//!   [`ReservationStore::transition_reservations`], so a reservation can never
//!   be reclaimed twice.

use crate::error::EngineResult;
use crate::hashing::HashedSignals;
use crate::risk::TicketTrace;
use crate::types::{
    Customer, CustomerId, CustomerInput, Drop, DropId, IdempotencyKey, Inventory, Order,
    OrderLine, Payment, PaymentId, PaymentStatus, QueueTicket, Reservation, ReservationId,
    ReservationStatus, TicketId, VariantId, VariantStock,
};
use chrono::{DateTime, Utc};
use std::future::Future;

/// Source of units of work.
pub trait Store: Clone + Send + Sync + 'static {
    /// Unit of work type
    type Tx: UnitOfWork;

    /// Open a unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] if the datastore is unavailable.
    fn begin(&self) -> impl Future<Output = EngineResult<Self::Tx>> + Send;

    /// Check that the datastore answers. Stores without a remote backend
    /// are always reachable.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] if the datastore is unreachable.
    fn ping(&self) -> impl Future<Output = EngineResult<()>> + Send {
        async { Ok(()) }
    }
}

/// One atomic unit of work. Dropping it without committing rolls it back.
pub trait UnitOfWork: InventoryLedger + ReservationStore + OrderStore + QueueStore + Send {
    /// Make every write of this unit visible.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] if the commit fails; nothing
    /// is applied in that case.
    fn commit(self) -> impl Future<Output = EngineResult<()>> + Send;
}

/// Per-variant stock counters.
pub trait InventoryLedger {
    /// Increment `quantity_reserved` by `quantity` only if the result stays
    /// within `quantity_on_hand`. Returns whether the row changed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] on datastore failure.
    fn try_reserve(
        &mut self,
        variant_id: VariantId,
        quantity: i32,
    ) -> impl Future<Output = EngineResult<bool>> + Send;

    /// Decrement `quantity_reserved` by `quantity`, clamped at zero.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] on datastore failure.
    fn release_reserved(
        &mut self,
        variant_id: VariantId,
        quantity: i32,
    ) -> impl Future<Output = EngineResult<()>> + Send;

    /// Current counters for a variant.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] on datastore failure.
    fn inventory(
        &mut self,
        variant_id: VariantId,
    ) -> impl Future<Output = EngineResult<Option<Inventory>>> + Send;
}

/// Append-only reservation rows.
pub trait ReservationStore {
    /// Serialise units of work that use the same idempotency key: a second
    /// caller blocks here until the first one ends.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] on datastore failure.
    fn lock_idempotency_key(
        &mut self,
        key: &IdempotencyKey,
    ) -> impl Future<Output = EngineResult<()>> + Send;

    /// Every reservation tagged with `key`, any status.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] on datastore failure.
    fn reservations_by_key(
        &mut self,
        key: &IdempotencyKey,
    ) -> impl Future<Output = EngineResult<Vec<Reservation>>> + Send;

    /// Persist a new reservation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] on datastore failure.
    fn insert_reservation(
        &mut self,
        reservation: &Reservation,
    ) -> impl Future<Output = EngineResult<()>> + Send;

    /// Up to `limit` ACTIVE reservations with `expires_at <= now`, oldest
    /// first. Rows already claimed by a concurrent unit of work may be
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] on datastore failure.
    fn fetch_expired(
        &mut self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> impl Future<Output = EngineResult<Vec<Reservation>>> + Send;

    /// Move the given reservations from `from` to `to`. Rows not currently
    /// in `from` are left alone; only the rows that actually moved are
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] on datastore failure.
    fn transition_reservations(
        &mut self,
        ids: &[ReservationId],
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> impl Future<Output = EngineResult<Vec<Reservation>>> + Send;
}

/// Customers, catalog reads, orders and payments.
pub trait OrderStore {
    /// Create the customer keyed by email, or patch the present fields of
    /// the existing one.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] on datastore failure.
    fn upsert_customer(
        &mut self,
        input: &CustomerInput,
        now: DateTime<Utc>,
    ) -> impl Future<Output = EngineResult<Customer>> + Send;

    /// Variants (with inventory) for the given IDs. Unknown IDs are simply
    /// absent from the result.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] on datastore failure.
    fn load_variants(
        &mut self,
        ids: &[VariantId],
    ) -> impl Future<Output = EngineResult<Vec<VariantStock>>> + Send;

    /// Persist an order and its lines.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] on datastore failure.
    fn insert_order(
        &mut self,
        order: &Order,
        lines: &[OrderLine],
    ) -> impl Future<Output = EngineResult<()>> + Send;

    /// Persist a payment shell.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] on datastore failure.
    fn insert_payment(&mut self, payment: &Payment)
    -> impl Future<Output = EngineResult<()>> + Send;

    /// Record the provider intent on a payment.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] on datastore failure.
    fn attach_payment_intent(
        &mut self,
        payment_id: PaymentId,
        attachment: &IntentAttachment,
    ) -> impl Future<Output = EngineResult<()>> + Send;

    /// Load a payment.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] on datastore failure.
    fn find_payment(
        &mut self,
        payment_id: PaymentId,
    ) -> impl Future<Output = EngineResult<Option<Payment>>> + Send;
}

/// Drops and queue tickets.
pub trait QueueStore {
    /// Load a drop without locking.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] on datastore failure.
    fn find_drop(&mut self, drop_id: DropId)
    -> impl Future<Output = EngineResult<Option<Drop>>> + Send;

    /// Load a drop and hold its row lock until the unit of work ends.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] on datastore failure.
    fn lock_drop(&mut self, drop_id: DropId)
    -> impl Future<Output = EngineResult<Option<Drop>>> + Send;

    /// QUEUED or RELEASED ticket for this customer on this drop.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] on datastore failure.
    fn find_active_ticket(
        &mut self,
        drop_id: DropId,
        customer_id: CustomerId,
    ) -> impl Future<Output = EngineResult<Option<QueueTicket>>> + Send;

    /// Tickets of this drop created at or after `since` that share the
    /// fingerprint hash or the IP hash of `signals`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] on datastore failure.
    fn recent_tickets(
        &mut self,
        drop_id: DropId,
        signals: &HashedSignals,
        since: DateTime<Utc>,
    ) -> impl Future<Output = EngineResult<Vec<TicketTrace>>> + Send;

    /// Highest assigned position on this drop.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] on datastore failure.
    fn max_position(&mut self, drop_id: DropId)
    -> impl Future<Output = EngineResult<Option<i32>>> + Send;

    /// Persist a new ticket.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] on datastore failure,
    /// including a duplicate position.
    fn insert_ticket(&mut self, ticket: &QueueTicket)
    -> impl Future<Output = EngineResult<()>> + Send;

    /// Load a ticket of a drop.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Storage`] on datastore failure.
    fn find_ticket(
        &mut self,
        drop_id: DropId,
        ticket_id: TicketId,
    ) -> impl Future<Output = EngineResult<Option<QueueTicket>>> + Send;
}

/// Provider intent data written back onto a payment.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentAttachment {
    /// Provider intent ID
    pub payment_intent_id: String,
    /// Mapped status
    pub status: PaymentStatus,
    /// Raw provider response
    pub raw_response: serde_json::Value,
}
