//! Expiry Sweeper.
//!
//! Reclaims ACTIVE reservations whose `expires_at` has passed: each batch is
//! one unit of work that marks the rows EXPIRED and credits the inventory
//! back per variant. The ACTIVE → EXPIRED transition is guarded on the
//! current status, so concurrent sweepers never reclaim a row twice.

use crate::environment::Clock;
use crate::error::EngineResult;
use crate::ledger;
use crate::metrics;
use crate::store::{ReservationStore, Store, UnitOfWork};
use crate::types::{ReservationId, ReservationStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Outcome of one [`ReservationSweeper::reclaim_expired`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Reservations moved to EXPIRED
    pub reclaimed: usize,
    /// Units credited back to inventory
    pub units_released: i64,
    /// Batches committed
    pub batches: usize,
}

/// Background reclamation of expired reservations.
pub struct ReservationSweeper<S: Store> {
    store: S,
    clock: Arc<dyn Clock>,
    batch_size: i64,
}

impl<S: Store> ReservationSweeper<S> {
    /// Creates a sweeper. `batch_size` below 1 is raised to 1.
    #[must_use]
    pub fn new(store: S, clock: Arc<dyn Clock>, batch_size: i64) -> Self {
        Self {
            store,
            clock,
            batch_size: batch_size.max(1),
        }
    }

    /// Reclaim every reservation expired as of now.
    ///
    /// # Errors
    ///
    /// Returns a storage error; batches committed before the failure stay
    /// committed.
    #[tracing::instrument(skip_all)]
    pub async fn reclaim_expired(&self) -> EngineResult<SweepReport> {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        loop {
            let mut tx = self.store.begin().await?;
            let batch = tx.fetch_expired(now, self.batch_size).await?;
            if batch.is_empty() {
                break;
            }

            let ids: Vec<ReservationId> = batch.iter().map(|r| r.id).collect();
            let expired = tx
                .transition_reservations(&ids, ReservationStatus::Active, ReservationStatus::Expired)
                .await?;
            ledger::credit_back(&mut tx, &expired).await?;
            tx.commit().await?;

            report.batches += 1;
            report.reclaimed += expired.len();
            report.units_released += expired.iter().map(|r| i64::from(r.quantity)).sum::<i64>();
        }

        metrics::record_reclaimed(report.reclaimed);
        metrics::record_reservations_transitioned("expired", report.reclaimed);
        if report.reclaimed > 0 {
            tracing::info!(
                reclaimed = report.reclaimed,
                units = report.units_released,
                batches = report.batches,
                "Expired reservations reclaimed"
            );
        }
        Ok(report)
    }

    /// Run [`Self::reclaim_expired`] every `period` until `shutdown` flips
    /// to `true` or its sender is dropped. Failed passes are logged and the
    /// loop carries on.
    pub async fn run_on_interval(&self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.reclaim_expired().await {
                        tracing::error!(error = %e, "Reservation sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Reservation sweeper stopping");
                        break;
                    }
                }
            }
        }
    }
}
