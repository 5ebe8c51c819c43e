//! Post-checkout reservation transitions.
//!
//! A payment confirmation converts the checkout's holds into a sale; an
//! explicit abandon cancels them and returns the stock. Both are keyed by
//! the checkout idempotency key and only ever move ACTIVE rows.

use crate::error::{EngineError, EngineResult};
use crate::ledger;
use crate::metrics;
use crate::store::{ReservationStore, Store, UnitOfWork};
use crate::types::{IdempotencyKey, Reservation, ReservationId, ReservationStatus};

/// Converts or cancels the reservations of a checkout.
#[derive(Clone)]
pub struct ReservationLifecycle<S: Store> {
    store: S,
}

impl<S: Store> ReservationLifecycle<S> {
    /// Creates a new lifecycle service
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Move the checkout's ACTIVE reservations to CONVERTED.
    ///
    /// Stock stays reserved: converted units are sold, not released.
    /// Returns the rows that moved; calling it again returns an empty list.
    ///
    /// # Errors
    ///
    /// Returns a 404 domain error if the key has no reservations at all, or a
    /// storage error.
    #[tracing::instrument(skip_all, fields(idempotency_key = %key))]
    pub async fn convert_checkout(&self, key: &IdempotencyKey) -> EngineResult<Vec<Reservation>> {
        let mut tx = self.store.begin().await?;
        let converted = Self::transition(&mut tx, key, ReservationStatus::Converted).await?;
        tx.commit().await?;

        metrics::record_reservations_transitioned("converted", converted.len());
        tracing::info!(converted = converted.len(), "Checkout converted");
        Ok(converted)
    }

    /// Move the checkout's ACTIVE reservations to CANCELLED and credit the
    /// stock back.
    ///
    /// # Errors
    ///
    /// Returns a 404 domain error if the key has no reservations at all, or a
    /// storage error.
    #[tracing::instrument(skip_all, fields(idempotency_key = %key))]
    pub async fn cancel_checkout(&self, key: &IdempotencyKey) -> EngineResult<Vec<Reservation>> {
        let mut tx = self.store.begin().await?;
        let cancelled = Self::transition(&mut tx, key, ReservationStatus::Cancelled).await?;
        ledger::credit_back(&mut tx, &cancelled).await?;
        tx.commit().await?;

        metrics::record_reservations_transitioned("cancelled", cancelled.len());
        tracing::info!(cancelled = cancelled.len(), "Checkout cancelled");
        Ok(cancelled)
    }

    async fn transition(
        tx: &mut S::Tx,
        key: &IdempotencyKey,
        to: ReservationStatus,
    ) -> EngineResult<Vec<Reservation>> {
        tx.lock_idempotency_key(key).await?;
        let reservations = tx.reservations_by_key(key).await?;
        if reservations.is_empty() {
            return Err(EngineError::not_found(format!("No reservations for checkout {key}")));
        }

        let active: Vec<ReservationId> = reservations
            .iter()
            .filter(|r| r.status == ReservationStatus::Active)
            .map(|r| r.id)
            .collect();
        if active.is_empty() {
            return Ok(Vec::new());
        }
        tx.transition_reservations(&active, ReservationStatus::Active, to)
            .await
    }
}
