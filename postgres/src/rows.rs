//! Column lists and row decoding.

use drop_commerce_core::risk::TicketTrace;
use drop_commerce_core::types::{
    Currency, Customer, CustomerId, Drop, DropId, IdempotencyKey, Inventory, Payment, PaymentId,
    PaymentStatus, ProductId, QueueTicket, Reservation, ReservationId, ReservationStatus,
    TicketId, TicketStatus, Variant, VariantId, VariantStock, OrderId,
};
use drop_commerce_core::{EngineError, EngineResult};
use sqlx::postgres::PgRow;
use sqlx::{Decode, Postgres, Row, Type};
use uuid::Uuid;

pub const CUSTOMER_COLUMNS: &str =
    "id, email, name, phone, vat_number, marketing_opt_in, created_at";

pub const RESERVATION_COLUMNS: &str =
    "id, variant_id, customer_id, quantity, status, expires_at, idempotency_key, created_at";

pub const PAYMENT_COLUMNS: &str =
    "id, order_id, amount, currency, status, payment_intent_id, created_at";

pub const DROP_COLUMNS: &str = "id, product_id, start_at, end_at, queue_enabled, \
     per_customer_limit, reserve_minutes, captcha_required";

pub const TICKET_COLUMNS: &str = "id, drop_id, customer_id, status, position, risk_score, \
     risk_reason, fingerprint_hash, ip_hash, user_agent_hash, released_at, expires_at, created_at";

fn get<'r, T>(row: &'r PgRow, column: &str) -> EngineResult<T>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| EngineError::Storage(format!("Failed to decode column {column}: {e}")))
}

fn id(row: &PgRow, column: &str) -> EngineResult<Uuid> {
    get(row, column)
}

pub fn inventory(row: &PgRow) -> EngineResult<Inventory> {
    Ok(Inventory {
        variant_id: VariantId::from_uuid(id(row, "variant_id")?),
        quantity_on_hand: get(row, "quantity_on_hand")?,
        quantity_reserved: get(row, "quantity_reserved")?,
        min_threshold: get(row, "min_threshold")?,
    })
}

pub fn variant_stock(row: &PgRow) -> EngineResult<VariantStock> {
    let currency: String = get(row, "currency")?;
    Ok(VariantStock {
        variant: Variant {
            id: VariantId::from_uuid(id(row, "id")?),
            sku: get(row, "sku")?,
            unit_price: get(row, "unit_price")?,
            currency: Currency::parse(&currency)?,
        },
        inventory: inventory(row)?,
    })
}

pub fn customer(row: &PgRow) -> EngineResult<Customer> {
    Ok(Customer {
        id: CustomerId::from_uuid(id(row, "id")?),
        email: get(row, "email")?,
        name: get(row, "name")?,
        phone: get(row, "phone")?,
        vat_number: get(row, "vat_number")?,
        marketing_opt_in: get(row, "marketing_opt_in")?,
        created_at: get(row, "created_at")?,
    })
}

pub fn reservation(row: &PgRow) -> EngineResult<Reservation> {
    let status: String = get(row, "status")?;
    let key: String = get(row, "idempotency_key")?;
    Ok(Reservation {
        id: ReservationId::from_uuid(id(row, "id")?),
        variant_id: VariantId::from_uuid(id(row, "variant_id")?),
        customer_id: CustomerId::from_uuid(id(row, "customer_id")?),
        quantity: get(row, "quantity")?,
        status: ReservationStatus::parse(&status)?,
        expires_at: get(row, "expires_at")?,
        idempotency_key: IdempotencyKey::new(key)?,
        created_at: get(row, "created_at")?,
    })
}

pub fn payment(row: &PgRow) -> EngineResult<Payment> {
    let currency: String = get(row, "currency")?;
    let status: String = get(row, "status")?;
    Ok(Payment {
        id: PaymentId::from_uuid(id(row, "id")?),
        order_id: OrderId::from_uuid(id(row, "order_id")?),
        amount: get(row, "amount")?,
        currency: Currency::parse(&currency)?,
        status: PaymentStatus::parse(&status)?,
        payment_intent_id: get(row, "payment_intent_id")?,
        created_at: get(row, "created_at")?,
    })
}

pub fn drop(row: &PgRow) -> EngineResult<Drop> {
    Ok(Drop {
        id: DropId::from_uuid(id(row, "id")?),
        product_id: ProductId::from_uuid(id(row, "product_id")?),
        start_at: get(row, "start_at")?,
        end_at: get(row, "end_at")?,
        queue_enabled: get(row, "queue_enabled")?,
        per_customer_limit: get(row, "per_customer_limit")?,
        reserve_minutes: get(row, "reserve_minutes")?,
        captcha_required: get(row, "captcha_required")?,
    })
}

pub fn ticket(row: &PgRow) -> EngineResult<QueueTicket> {
    let status: String = get(row, "status")?;
    Ok(QueueTicket {
        id: TicketId::from_uuid(id(row, "id")?),
        drop_id: DropId::from_uuid(id(row, "drop_id")?),
        customer_id: CustomerId::from_uuid(id(row, "customer_id")?),
        status: TicketStatus::parse(&status)?,
        position: get(row, "position")?,
        risk_score: get(row, "risk_score")?,
        risk_reason: get(row, "risk_reason")?,
        fingerprint_hash: get(row, "fingerprint_hash")?,
        ip_hash: get(row, "ip_hash")?,
        user_agent_hash: get(row, "user_agent_hash")?,
        released_at: get(row, "released_at")?,
        expires_at: get(row, "expires_at")?,
        created_at: get(row, "created_at")?,
    })
}

pub fn trace(row: &PgRow) -> EngineResult<TicketTrace> {
    Ok(TicketTrace {
        customer_id: CustomerId::from_uuid(id(row, "customer_id")?),
        fingerprint_hash: get(row, "fingerprint_hash")?,
        ip_hash: get(row, "ip_hash")?,
        created_at: get(row, "created_at")?,
    })
}
