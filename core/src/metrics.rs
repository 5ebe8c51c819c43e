//! Business metrics for the drop engine.
//!
//! Recorded through the `metrics` facade; without an installed recorder the
//! calls are no-ops.
//!
//! # Exported Metrics
//!
//! - `drops_reservations_total{status}` - Reservations by status (created, converted, cancelled, expired)
//! - `drops_reservations_reclaimed_total` - Expired reservations reclaimed by the sweeper
//! - `drops_queue_tickets_total{status}` - Queue tickets issued by status
//! - `drops_checkouts_total{outcome}` - Checkout attempts by outcome

use crate::types::TicketStatus;
use metrics::describe_counter;

/// Initialize and register all business metrics descriptions.
///
/// This should be called once at application startup, before any metrics are recorded.
pub fn register_metrics() {
    describe_counter!(
        "drops_reservations_total",
        "Total number of reservations by status (created, converted, cancelled, expired)"
    );
    describe_counter!(
        "drops_reservations_reclaimed_total",
        "Total number of expired reservations reclaimed by the sweeper"
    );
    describe_counter!(
        "drops_queue_tickets_total",
        "Total number of drop queue tickets issued by status"
    );
    describe_counter!(
        "drops_checkouts_total",
        "Total number of checkout attempts by outcome"
    );

    tracing::info!("Drop metrics registered");
}

/// Record reservations created by one checkout.
pub fn record_reservations_created(count: usize) {
    metrics::counter!("drops_reservations_total", "status" => "created").increment(count as u64);
}

/// Record reservations moved out of ACTIVE.
///
/// # Arguments
///
/// * `status` - Label of the new status (converted, cancelled, expired)
/// * `count` - Rows transitioned
pub fn record_reservations_transitioned(status: &'static str, count: usize) {
    metrics::counter!("drops_reservations_total", "status" => status).increment(count as u64);
}

/// Record a sweeper pass.
pub fn record_reclaimed(count: usize) {
    metrics::counter!("drops_reservations_reclaimed_total").increment(count as u64);
    tracing::debug!(count, "Recorded reclaimed metric");
}

/// Record a newly issued queue ticket.
pub fn record_queue_ticket(status: TicketStatus) {
    metrics::counter!("drops_queue_tickets_total", "status" => status.as_str()).increment(1);
}

/// Record a checkout outcome (created, conflict, out_of_stock, failed).
pub fn record_checkout(outcome: &'static str) {
    metrics::counter!("drops_checkouts_total", "outcome" => outcome).increment(1);
}
