//! Drop Admission Engine.
//!
//! Issues queue tickets for a drop. Each join runs in one unit of work that
//! holds the drop row lock, so risk history and the position counter are
//! read and written without interleaving from other joins on the same drop.
//! Admitted tickets get positions `1..k` with no gaps or duplicates, in
//! admission order; rejected tickets get none.

use crate::config::EngineConfig;
use crate::environment::Clock;
use crate::error::{EngineError, EngineResult};
use crate::hashing::ClientSignals;
use crate::metrics;
use crate::risk::{RiskPolicy, RiskProbe};
use crate::store::{OrderStore, QueueStore, Store, UnitOfWork};
use crate::types::{CustomerInput, DropId, QueueTicket, QueueTicketView, TicketId, TicketStatus};
use std::sync::Arc;

/// Input of [`DropAdmissionEngine::join_queue`].
#[derive(Debug, Clone)]
pub struct JoinRequest {
    /// Drop to join
    pub drop_id: DropId,
    /// Customer, upserted by email
    pub customer: CustomerInput,
    /// Raw client signals, hashed before use
    pub signals: ClientSignals,
}

/// Risk-gated queue ticket issuance.
pub struct DropAdmissionEngine<S: Store> {
    store: S,
    clock: Arc<dyn Clock>,
    policy: Arc<RiskPolicy>,
    rejection_threshold: f64,
}

impl<S: Store> Clone for DropAdmissionEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: Arc::clone(&self.clock),
            policy: Arc::clone(&self.policy),
            rejection_threshold: self.rejection_threshold,
        }
    }
}

impl<S: Store> DropAdmissionEngine<S> {
    /// Engine with the storefront risk rules from `config`.
    #[must_use]
    pub fn new(store: S, clock: Arc<dyn Clock>, config: &EngineConfig) -> Self {
        Self::with_policy(
            store,
            clock,
            Arc::new(RiskPolicy::from_config(config)),
            config.risk_rejection_threshold,
        )
    }

    /// Engine with a custom rule list.
    #[must_use]
    pub fn with_policy(
        store: S,
        clock: Arc<dyn Clock>,
        policy: Arc<RiskPolicy>,
        rejection_threshold: f64,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
            rejection_threshold,
        }
    }

    /// Join a drop's queue.
    ///
    /// Re-joining while a QUEUED or RELEASED ticket exists returns that
    /// ticket unchanged.
    ///
    /// # Errors
    ///
    /// - 404 domain error if the drop does not exist
    /// - 403 domain error if the drop does not queue or has ended
    /// - storage errors
    #[tracing::instrument(skip_all, fields(drop_id = %request.drop_id))]
    pub async fn join_queue(&self, request: JoinRequest) -> EngineResult<QueueTicketView> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        let drop = tx
            .lock_drop(request.drop_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Drop not found"))?;
        if !drop.queue_enabled {
            return Err(EngineError::forbidden("Queue is not enabled for this drop"));
        }
        if drop.has_ended(now) {
            return Err(EngineError::forbidden("Drop has ended"));
        }

        let customer = tx.upsert_customer(&request.customer, now).await?;

        if let Some(existing) = tx.find_active_ticket(drop.id, customer.id).await? {
            tx.commit().await?;
            tracing::debug!(ticket_id = %existing.id, "Returning existing queue ticket");
            return Ok(QueueTicketView::new(&existing, &drop));
        }

        let signals = request.signals.hashed();
        let history = tx
            .recent_tickets(drop.id, &signals, now - self.policy.lookback())
            .await?;
        let assessment = self.policy.assess(&RiskProbe { signals: &signals, now }, &history);

        let (status, position) = if assessment.is_rejected(self.rejection_threshold) {
            (TicketStatus::Rejected, None)
        } else {
            let next = tx
                .max_position(drop.id)
                .await?
                .unwrap_or(0)
                .checked_add(1)
                .ok_or_else(|| EngineError::Invariant(format!("Queue position overflow on drop {}", drop.id)))?;
            (TicketStatus::Queued, Some(next))
        };

        let ticket = QueueTicket {
            id: TicketId::new(),
            drop_id: drop.id,
            customer_id: customer.id,
            status,
            position,
            risk_score: assessment.score,
            risk_reason: assessment.reason,
            fingerprint_hash: signals.fingerprint_hash,
            ip_hash: signals.ip_hash,
            user_agent_hash: signals.user_agent_hash,
            released_at: None,
            expires_at: None,
            created_at: now,
        };
        tx.insert_ticket(&ticket).await?;
        tx.commit().await?;

        metrics::record_queue_ticket(status);
        if status == TicketStatus::Rejected {
            tracing::warn!(
                ticket_id = %ticket.id,
                risk_score = ticket.risk_score,
                risk_reason = ticket.risk_reason.as_deref().unwrap_or_default(),
                "Queue join rejected"
            );
        } else {
            tracing::info!(ticket_id = %ticket.id, position = ?ticket.position, "Queue join admitted");
        }

        Ok(QueueTicketView::new(&ticket, &drop))
    }

    /// Read a ticket of a drop.
    ///
    /// # Errors
    ///
    /// Returns a 404 domain error if the drop or the ticket does not exist,
    /// or a storage error.
    pub async fn get_ticket(&self, drop_id: DropId, ticket_id: TicketId) -> EngineResult<QueueTicketView> {
        let mut tx = self.store.begin().await?;
        let drop = tx
            .find_drop(drop_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Drop not found"))?;
        let ticket = tx
            .find_ticket(drop_id, ticket_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Ticket not found"))?;
        Ok(QueueTicketView::new(&ticket, &drop))
    }
}
