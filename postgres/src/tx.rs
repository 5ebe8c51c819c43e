//! Unit of work over one PostgreSQL transaction.

use crate::rows::{
    self, CUSTOMER_COLUMNS, DROP_COLUMNS, PAYMENT_COLUMNS, RESERVATION_COLUMNS, TICKET_COLUMNS,
};
use chrono::{DateTime, Utc};
use drop_commerce_core::hashing::HashedSignals;
use drop_commerce_core::risk::TicketTrace;
use drop_commerce_core::store::{
    IntentAttachment, InventoryLedger, OrderStore, QueueStore, ReservationStore, UnitOfWork,
};
use drop_commerce_core::types::{
    Customer, CustomerId, CustomerInput, Drop, DropId, IdempotencyKey, Inventory, Order,
    OrderLine, Payment, PaymentId, QueueTicket, Reservation, ReservationId, ReservationStatus,
    TicketId, TicketStatus, VariantId, VariantStock,
};
use drop_commerce_core::{EngineError, EngineResult};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

fn storage(context: &'static str) -> impl FnOnce(sqlx::Error) -> EngineError {
    move |e| EngineError::Storage(format!("Failed to {context}: {e}"))
}

/// One open PostgreSQL transaction.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl PgTx {
    pub(crate) const fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }

    async fn fetch_drop(&mut self, drop_id: DropId, lock: bool) -> EngineResult<Option<Drop>> {
        let sql = format!(
            "SELECT {DROP_COLUMNS} FROM drops WHERE id = $1{}",
            if lock { " FOR UPDATE" } else { "" }
        );
        sqlx::query(&sql)
            .bind(drop_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(storage("load drop"))?
            .as_ref()
            .map(rows::drop)
            .transpose()
    }
}

impl UnitOfWork for PgTx {
    async fn commit(self) -> EngineResult<()> {
        self.tx.commit().await.map_err(storage("commit transaction"))
    }
}

impl InventoryLedger for PgTx {
    async fn try_reserve(&mut self, variant_id: VariantId, quantity: i32) -> EngineResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE inventory
            SET quantity_reserved = quantity_reserved + $2, updated_at = NOW()
            WHERE variant_id = $1 AND quantity_reserved <= quantity_on_hand - $2
            ",
        )
        .bind(variant_id.as_uuid())
        .bind(quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(storage("reserve inventory"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_reserved(&mut self, variant_id: VariantId, quantity: i32) -> EngineResult<()> {
        sqlx::query(
            r"
            UPDATE inventory
            SET quantity_reserved = GREATEST(0, quantity_reserved - $2), updated_at = NOW()
            WHERE variant_id = $1
            ",
        )
        .bind(variant_id.as_uuid())
        .bind(quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(storage("release inventory"))?;

        Ok(())
    }

    async fn inventory(&mut self, variant_id: VariantId) -> EngineResult<Option<Inventory>> {
        sqlx::query(
            r"
            SELECT variant_id, quantity_on_hand, quantity_reserved, min_threshold
            FROM inventory
            WHERE variant_id = $1
            ",
        )
        .bind(variant_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(storage("load inventory"))?
        .as_ref()
        .map(rows::inventory)
        .transpose()
    }
}

impl ReservationStore for PgTx {
    async fn lock_idempotency_key(&mut self, key: &IdempotencyKey) -> EngineResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(key.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(storage("lock idempotency key"))?;
        Ok(())
    }

    async fn reservations_by_key(&mut self, key: &IdempotencyKey) -> EngineResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE idempotency_key = $1 ORDER BY created_at, id"
        );
        let found = sqlx::query(&sql)
            .bind(key.as_str())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(storage("load reservations"))?;

        found.iter().map(rows::reservation).collect()
    }

    async fn insert_reservation(&mut self, reservation: &Reservation) -> EngineResult<()> {
        sqlx::query(
            r"
            INSERT INTO reservations
                (id, variant_id, customer_id, quantity, status, expires_at, idempotency_key, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(reservation.id.as_uuid())
        .bind(reservation.variant_id.as_uuid())
        .bind(reservation.customer_id.as_uuid())
        .bind(reservation.quantity)
        .bind(reservation.status.as_str())
        .bind(reservation.expires_at)
        .bind(reservation.idempotency_key.as_str())
        .bind(reservation.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(storage("insert reservation"))?;

        Ok(())
    }

    async fn fetch_expired(&mut self, now: DateTime<Utc>, limit: i64) -> EngineResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE status = $1 AND expires_at <= $2 \
             ORDER BY expires_at, id \
             LIMIT $3 \
             FOR UPDATE SKIP LOCKED"
        );
        let found = sqlx::query(&sql)
            .bind(ReservationStatus::Active.as_str())
            .bind(now)
            .bind(limit)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(storage("fetch expired reservations"))?;

        found.iter().map(rows::reservation).collect()
    }

    async fn transition_reservations(
        &mut self,
        ids: &[ReservationId],
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> EngineResult<Vec<Reservation>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let sql = format!(
            "UPDATE reservations SET status = $3, updated_at = NOW() \
             WHERE id = ANY($1) AND status = $2 \
             RETURNING {RESERVATION_COLUMNS}"
        );
        let moved = sqlx::query(&sql)
            .bind(ids)
            .bind(from.as_str())
            .bind(to.as_str())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(storage("transition reservations"))?;

        moved.iter().map(rows::reservation).collect()
    }
}

impl OrderStore for PgTx {
    async fn upsert_customer(&mut self, input: &CustomerInput, now: DateTime<Utc>) -> EngineResult<Customer> {
        let fresh = Customer::from_input(input, now);
        let sql = format!(
            "INSERT INTO customers (id, email, name, phone, vat_number, marketing_opt_in, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (email) DO UPDATE SET \
                 name = COALESCE(EXCLUDED.name, customers.name), \
                 phone = COALESCE(EXCLUDED.phone, customers.phone), \
                 vat_number = COALESCE(EXCLUDED.vat_number, customers.vat_number), \
                 marketing_opt_in = COALESCE($8, customers.marketing_opt_in), \
                 updated_at = NOW() \
             RETURNING {CUSTOMER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(fresh.id.as_uuid())
            .bind(&fresh.email)
            .bind(&fresh.name)
            .bind(&fresh.phone)
            .bind(&fresh.vat_number)
            .bind(fresh.marketing_opt_in)
            .bind(fresh.created_at)
            .bind(input.marketing_opt_in)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(storage("upsert customer"))?;

        rows::customer(&row)
    }

    async fn load_variants(&mut self, ids: &[VariantId]) -> EngineResult<Vec<VariantStock>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let found = sqlx::query(
            r"
            SELECT v.id, v.sku, v.unit_price, v.currency,
                   i.variant_id, i.quantity_on_hand, i.quantity_reserved, i.min_threshold
            FROM variants v
            JOIN inventory i ON i.variant_id = v.id
            WHERE v.id = ANY($1)
            ",
        )
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(storage("load variants"))?;

        found.iter().map(rows::variant_stock).collect()
    }

    async fn insert_order(&mut self, order: &Order, lines: &[OrderLine]) -> EngineResult<()> {
        let billing = serde_json::to_value(&order.billing_address)
            .map_err(|e| EngineError::Storage(format!("Failed to encode billing address: {e}")))?;
        let shipping = serde_json::to_value(&order.shipping_address)
            .map_err(|e| EngineError::Storage(format!("Failed to encode shipping address: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO orders
                (id, customer_id, status, currency, subtotal_amount, discount_amount, tax_amount,
                 shipping_amount, total_amount, vat_rate, billing_address, shipping_address, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(order.id.as_uuid())
        .bind(order.customer_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.currency.as_str())
        .bind(order.subtotal_amount)
        .bind(order.discount_amount)
        .bind(order.tax_amount)
        .bind(order.shipping_amount)
        .bind(order.total_amount)
        .bind(order.vat_rate)
        .bind(billing)
        .bind(shipping)
        .bind(order.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(storage("insert order"))?;

        for line in lines {
            sqlx::query(
                r"
                INSERT INTO order_lines
                    (id, order_id, variant_id, quantity, unit_price, tax_rate,
                     line_subtotal, line_tax, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ",
            )
            .bind(line.id.as_uuid())
            .bind(line.order_id.as_uuid())
            .bind(line.variant_id.as_uuid())
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.tax_rate)
            .bind(line.line_subtotal)
            .bind(line.line_tax)
            .bind(line.line_total)
            .execute(&mut *self.tx)
            .await
            .map_err(storage("insert order line"))?;
        }

        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> EngineResult<()> {
        sqlx::query(
            r"
            INSERT INTO payments (id, order_id, amount, currency, status, payment_intent_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(payment.id.as_uuid())
        .bind(payment.order_id.as_uuid())
        .bind(payment.amount)
        .bind(payment.currency.as_str())
        .bind(payment.status.as_str())
        .bind(&payment.payment_intent_id)
        .bind(payment.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(storage("insert payment"))?;

        Ok(())
    }

    async fn attach_payment_intent(
        &mut self,
        payment_id: PaymentId,
        attachment: &IntentAttachment,
    ) -> EngineResult<()> {
        let result = sqlx::query(
            r"
            UPDATE payments
            SET payment_intent_id = $2, status = $3, raw_response = $4, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(payment_id.as_uuid())
        .bind(&attachment.payment_intent_id)
        .bind(attachment.status.as_str())
        .bind(&attachment.raw_response)
        .execute(&mut *self.tx)
        .await
        .map_err(storage("attach payment intent"))?;

        if result.rows_affected() == 0 {
            return Err(EngineError::Invariant(format!("Payment {payment_id} vanished")));
        }
        Ok(())
    }

    async fn find_payment(&mut self, payment_id: PaymentId) -> EngineResult<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1");
        sqlx::query(&sql)
            .bind(payment_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(storage("load payment"))?
            .as_ref()
            .map(rows::payment)
            .transpose()
    }
}

impl QueueStore for PgTx {
    async fn find_drop(&mut self, drop_id: DropId) -> EngineResult<Option<Drop>> {
        self.fetch_drop(drop_id, false).await
    }

    async fn lock_drop(&mut self, drop_id: DropId) -> EngineResult<Option<Drop>> {
        self.fetch_drop(drop_id, true).await
    }

    async fn find_active_ticket(
        &mut self,
        drop_id: DropId,
        customer_id: CustomerId,
    ) -> EngineResult<Option<QueueTicket>> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM queue_tickets \
             WHERE drop_id = $1 AND customer_id = $2 AND status IN ($3, $4) \
             ORDER BY created_at \
             LIMIT 1"
        );
        sqlx::query(&sql)
            .bind(drop_id.as_uuid())
            .bind(customer_id.as_uuid())
            .bind(TicketStatus::Queued.as_str())
            .bind(TicketStatus::Released.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(storage("load active ticket"))?
            .as_ref()
            .map(rows::ticket)
            .transpose()
    }

    async fn recent_tickets(
        &mut self,
        drop_id: DropId,
        signals: &HashedSignals,
        since: DateTime<Utc>,
    ) -> EngineResult<Vec<TicketTrace>> {
        if signals.fingerprint_hash.is_none() && signals.ip_hash.is_none() {
            return Ok(Vec::new());
        }
        let found = sqlx::query(
            r"
            SELECT customer_id, fingerprint_hash, ip_hash, created_at
            FROM queue_tickets
            WHERE drop_id = $1
              AND created_at >= $2
              AND (fingerprint_hash = $3 OR ip_hash = $4)
            ",
        )
        .bind(drop_id.as_uuid())
        .bind(since)
        .bind(&signals.fingerprint_hash)
        .bind(&signals.ip_hash)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(storage("load recent tickets"))?;

        found.iter().map(rows::trace).collect()
    }

    async fn max_position(&mut self, drop_id: DropId) -> EngineResult<Option<i32>> {
        let (max,): (Option<i32>,) =
            sqlx::query_as("SELECT MAX(position) FROM queue_tickets WHERE drop_id = $1")
                .bind(drop_id.as_uuid())
                .fetch_one(&mut *self.tx)
                .await
                .map_err(storage("read max queue position"))?;
        Ok(max)
    }

    async fn insert_ticket(&mut self, ticket: &QueueTicket) -> EngineResult<()> {
        sqlx::query(
            r"
            INSERT INTO queue_tickets
                (id, drop_id, customer_id, status, position, risk_score, risk_reason,
                 fingerprint_hash, ip_hash, user_agent_hash, released_at, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(ticket.id.as_uuid())
        .bind(ticket.drop_id.as_uuid())
        .bind(ticket.customer_id.as_uuid())
        .bind(ticket.status.as_str())
        .bind(ticket.position)
        .bind(ticket.risk_score)
        .bind(&ticket.risk_reason)
        .bind(&ticket.fingerprint_hash)
        .bind(&ticket.ip_hash)
        .bind(&ticket.user_agent_hash)
        .bind(ticket.released_at)
        .bind(ticket.expires_at)
        .bind(ticket.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    tracing::warn!(drop_id = %ticket.drop_id, "queue ticket unique constraint violated");
                    return EngineError::Storage(
                        "Failed to insert ticket: unique constraint violated".to_string(),
                    );
                }
            }
            EngineError::Storage(format!("Failed to insert ticket: {e}"))
        })?;

        Ok(())
    }

    async fn find_ticket(&mut self, drop_id: DropId, ticket_id: TicketId) -> EngineResult<Option<QueueTicket>> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM queue_tickets WHERE drop_id = $1 AND id = $2");
        sqlx::query(&sql)
            .bind(drop_id.as_uuid())
            .bind(ticket_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(storage("load ticket"))?
            .as_ref()
            .map(rows::ticket)
            .transpose()
    }
}
