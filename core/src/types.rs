//! Domain types for the drop commerce engine.
//!
//! Identifiers, value objects and the records the engine reads and writes:
//! variants with their inventory rows, orders, payments, reservations, drops
//! and queue tickets. Monetary values are always [`Decimal`], never floats.

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create the identifier from a `Uuid`
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

entity_id!(
    /// Unique identifier for a sellable variant (one size of one colourway)
    VariantId
);
entity_id!(
    /// Unique identifier for a customer
    CustomerId
);
entity_id!(
    /// Unique identifier for an order
    OrderId
);
entity_id!(
    /// Unique identifier for an order line item
    OrderLineId
);
entity_id!(
    /// Unique identifier for a payment record
    PaymentId
);
entity_id!(
    /// Unique identifier for an inventory reservation
    ReservationId
);
entity_id!(
    /// Unique identifier for a product (owner of variants and drops)
    ProductId
);
entity_id!(
    /// Unique identifier for a drop
    DropId
);
entity_id!(
    /// Unique identifier for a drop queue ticket
    TicketId
);

/// Caller-supplied (or server-generated) token tying a checkout attempt to
/// the reservations it created.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Maximum accepted key length.
    pub const MAX_LEN: usize = 255;

    /// Wrap a caller-supplied key.
    ///
    /// # Errors
    ///
    /// Returns a 400 domain error if the key is blank or longer than
    /// [`Self::MAX_LEN`].
    pub fn new(key: impl Into<String>) -> Result<Self, EngineError> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(EngineError::bad_request("Idempotency key must not be empty"));
        }
        if trimmed.len() > Self::MAX_LEN {
            return Err(EngineError::bad_request(format!(
                "Idempotency key must be at most {} characters",
                Self::MAX_LEN
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Generate a fresh server-side key.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = EngineError;

    fn try_from(key: String) -> Result<Self, Self::Error> {
        Self::new(key)
    }
}

impl From<IdempotencyKey> for String {
    fn from(key: IdempotencyKey) -> Self {
        key.0
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// Settlement currency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Euro
    Eur,
    /// US dollar
    Usd,
    /// Pound sterling
    Gbp,
}

impl Currency {
    /// ISO 4217 code, upper case.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eur => "EUR",
            Self::Usd => "USD",
            Self::Gbp => "GBP",
        }
    }

    /// Lower-case code as payment providers expect it.
    #[must_use]
    pub const fn provider_code(&self) -> &'static str {
        match self {
            Self::Eur => "eur",
            Self::Usd => "usd",
            Self::Gbp => "gbp",
        }
    }

    /// Parse an ISO 4217 code (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns a storage error for unknown codes.
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        match s.to_ascii_uppercase().as_str() {
            "EUR" => Ok(Self::Eur),
            "USD" => Ok(Self::Usd),
            "GBP" => Ok(Self::Gbp),
            other => Err(EngineError::Storage(format!("Invalid currency: {other}"))),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of an inventory reservation.
///
/// ```text
/// ACTIVE ──► CONVERTED   (payment confirmed)
///    │
///    ├─────► EXPIRED     (sweeper, TTL elapsed)
///    └─────► CANCELLED   (checkout abandoned explicitly)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    /// Holding stock
    Active,
    /// Turned into a sale
    Converted,
    /// Reclaimed by the sweeper
    Expired,
    /// Released by the customer or an operator
    Cancelled,
}

impl ReservationStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Converted => "CONVERTED",
            Self::Expired => "EXPIRED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parse status from database string.
    ///
    /// # Errors
    ///
    /// Returns error if the string doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "CONVERTED" => Ok(Self::Converted),
            "EXPIRED" => Ok(Self::Expired),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(EngineError::Storage(format!("Invalid reservation status: {s}"))),
        }
    }

    /// Statuses that block reuse of an idempotency key.
    #[must_use]
    pub const fn blocks_idempotency_key(&self) -> bool {
        matches!(self, Self::Active | Self::Converted)
    }
}

/// Order status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Draft created, waiting for the customer to pay
    PendingPayment,
    /// Payment captured
    Paid,
    /// Abandoned or cancelled
    Cancelled,
}

impl OrderStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPayment => "PENDING_PAYMENT",
            Self::Paid => "PAID",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parse status from database string.
    ///
    /// # Errors
    ///
    /// Returns error if the string doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        match s {
            "PENDING_PAYMENT" => Ok(Self::PendingPayment),
            "PAID" => Ok(Self::Paid),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(EngineError::Storage(format!("Invalid order status: {s}"))),
        }
    }
}

/// Payment status as tracked by this system (never the provider's raw value).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// No payment method attached yet
    RequiresPaymentMethod,
    /// Waiting for confirmation
    RequiresConfirmation,
    /// Customer action (3DS etc.) required
    RequiresAction,
    /// Provider is processing
    Processing,
    /// Authorised, awaiting capture
    Authorized,
    /// Captured
    Succeeded,
    /// Cancelled at the provider
    Canceled,
}

impl PaymentStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RequiresPaymentMethod => "REQUIRES_PAYMENT_METHOD",
            Self::RequiresConfirmation => "REQUIRES_CONFIRMATION",
            Self::RequiresAction => "REQUIRES_ACTION",
            Self::Processing => "PROCESSING",
            Self::Authorized => "AUTHORIZED",
            Self::Succeeded => "SUCCEEDED",
            Self::Canceled => "CANCELED",
        }
    }

    /// Parse status from database string.
    ///
    /// # Errors
    ///
    /// Returns error if the string doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        match s {
            "REQUIRES_PAYMENT_METHOD" => Ok(Self::RequiresPaymentMethod),
            "REQUIRES_CONFIRMATION" => Ok(Self::RequiresConfirmation),
            "REQUIRES_ACTION" => Ok(Self::RequiresAction),
            "PROCESSING" => Ok(Self::Processing),
            "AUTHORIZED" => Ok(Self::Authorized),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "CANCELED" => Ok(Self::Canceled),
            _ => Err(EngineError::Storage(format!("Invalid payment status: {s}"))),
        }
    }
}

/// Queue ticket status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    /// Admitted, waiting for release
    Queued,
    /// Released to buy
    Released,
    /// Refused by the risk rules
    Rejected,
    /// Release window lapsed
    Expired,
}

impl TicketStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Released => "RELEASED",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
        }
    }

    /// Parse status from database string.
    ///
    /// # Errors
    ///
    /// Returns error if the string doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        match s {
            "QUEUED" => Ok(Self::Queued),
            "RELEASED" => Ok(Self::Released),
            "REJECTED" => Ok(Self::Rejected),
            "EXPIRED" => Ok(Self::Expired),
            _ => Err(EngineError::Storage(format!("Invalid ticket status: {s}"))),
        }
    }

    /// Active tickets make a re-join idempotent.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Released)
    }
}

// ============================================================================
// Customers and addresses
// ============================================================================

/// Customer details supplied at checkout or queue join.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInput {
    /// Email, the natural key
    pub email: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// VAT registration number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat_number: Option<String>,
    /// Marketing consent; `None` leaves an existing value untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing_opt_in: Option<bool>,
}

impl CustomerInput {
    /// Input with only an email set.
    #[must_use]
    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }
}

/// Persisted customer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Customer ID
    pub id: CustomerId,
    /// Unique email
    pub email: String,
    /// Display name
    pub name: Option<String>,
    /// Phone number
    pub phone: Option<String>,
    /// VAT registration number
    pub vat_number: Option<String>,
    /// Marketing consent
    pub marketing_opt_in: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// Build a new customer record from input.
    #[must_use]
    pub fn from_input(input: &CustomerInput, now: DateTime<Utc>) -> Self {
        Self {
            id: CustomerId::new(),
            email: input.email.clone(),
            name: input.name.clone(),
            phone: input.phone.clone(),
            vat_number: input.vat_number.clone(),
            marketing_opt_in: input.marketing_opt_in.unwrap_or(false),
            created_at: now,
        }
    }

    /// Patch mutable fields that are present in `input`.
    pub fn apply(&mut self, input: &CustomerInput) {
        if let Some(name) = &input.name {
            self.name = Some(name.clone());
        }
        if let Some(phone) = &input.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(vat_number) = &input.vat_number {
            self.vat_number = Some(vat_number.clone());
        }
        if let Some(opt_in) = input.marketing_opt_in {
            self.marketing_opt_in = opt_in;
        }
    }
}

/// Postal address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// First address line
    pub line1: String,
    /// Second address line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    /// City
    pub city: String,
    /// Region / state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Postal code
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 country code
    pub country: String,
}

// ============================================================================
// Catalog and inventory
// ============================================================================

/// A sellable variant as seen by the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    /// Variant ID
    pub id: VariantId,
    /// Stock keeping unit
    pub sku: String,
    /// Unit price, VAT exclusive
    pub unit_price: Decimal,
    /// Price currency
    pub currency: Currency,
}

/// Derived availability label. Informational only; never used to decide a
/// reservation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Comfortably above the threshold
    InStock,
    /// At or below the low-stock threshold
    LowStock,
    /// Nothing left to sell
    SoldOut,
}

/// Per-variant stock counters.
///
/// Invariant: `0 <= quantity_reserved <= quantity_on_hand`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    /// Variant this row belongs to
    pub variant_id: VariantId,
    /// Authoritative physical stock
    pub quantity_on_hand: i32,
    /// Sum of live holds
    pub quantity_reserved: i32,
    /// Low-stock threshold
    pub min_threshold: i32,
}

impl Inventory {
    /// Units that can still be reserved.
    #[must_use]
    pub const fn available(&self) -> i32 {
        self.quantity_on_hand - self.quantity_reserved
    }

    /// Storefront label for this stock level.
    #[must_use]
    pub const fn availability(&self) -> Availability {
        let available = self.available();
        if available <= 0 {
            Availability::SoldOut
        } else if available <= self.min_threshold {
            Availability::LowStock
        } else {
            Availability::InStock
        }
    }
}

/// A variant loaded together with its inventory row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantStock {
    /// Catalog data
    pub variant: Variant,
    /// Counters at load time
    pub inventory: Inventory,
}

// ============================================================================
// Orders, payments, reservations
// ============================================================================

/// One requested cart line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    /// Variant to buy
    pub variant_id: VariantId,
    /// Requested units (must be positive)
    pub quantity: i32,
}

/// Order header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Order ID
    pub id: OrderId,
    /// Buyer
    pub customer_id: CustomerId,
    /// Status
    pub status: OrderStatus,
    /// Order currency
    pub currency: Currency,
    /// Sum of line subtotals
    pub subtotal_amount: Decimal,
    /// Discounts (always zero for drop checkouts)
    pub discount_amount: Decimal,
    /// Sum of line taxes
    pub tax_amount: Decimal,
    /// Shipping charge (always zero for drop checkouts)
    pub shipping_amount: Decimal,
    /// Grand total
    pub total_amount: Decimal,
    /// VAT rate applied to every line
    pub vat_rate: Decimal,
    /// Billing address
    pub billing_address: Address,
    /// Shipping address
    pub shipping_address: Address,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Priced order line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    /// Line ID
    pub id: OrderLineId,
    /// Parent order
    pub order_id: OrderId,
    /// Variant sold
    pub variant_id: VariantId,
    /// Units
    pub quantity: i32,
    /// Unit price at checkout time
    pub unit_price: Decimal,
    /// VAT rate
    pub tax_rate: Decimal,
    /// `unit_price × quantity`
    pub line_subtotal: Decimal,
    /// VAT, rounded to 2 places
    pub line_tax: Decimal,
    /// Subtotal plus tax
    pub line_total: Decimal,
}

/// Payment record attached to an order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Payment ID
    pub id: PaymentId,
    /// Order being paid
    pub order_id: OrderId,
    /// Amount due
    pub amount: Decimal,
    /// Currency
    pub currency: Currency,
    /// Mapped provider status
    pub status: PaymentStatus,
    /// Provider intent ID, set after the bridge call
    pub payment_intent_id: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Hold on `quantity` units of one variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    /// Reservation ID
    pub id: ReservationId,
    /// Variant held
    pub variant_id: VariantId,
    /// Holder
    pub customer_id: CustomerId,
    /// Units held
    pub quantity: i32,
    /// Lifecycle status
    pub status: ReservationStatus,
    /// When the sweeper may reclaim the hold
    pub expires_at: DateTime<Utc>,
    /// Checkout attempt this hold belongs to
    pub idempotency_key: IdempotencyKey,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Order-level money totals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    /// Sum of line subtotals
    pub subtotal: Decimal,
    /// Sum of line taxes
    pub tax: Decimal,
    /// Sum of line totals
    pub total: Decimal,
}

/// Everything one checkout attempt created, atomically.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderDraft {
    /// Order header
    pub order: Order,
    /// Priced lines
    pub lines: Vec<OrderLine>,
    /// Payment shell
    pub payment: Payment,
    /// Upserted customer
    pub customer: Customer,
    /// Money totals
    pub totals: OrderTotals,
    /// One active hold per distinct variant
    pub reservations: Vec<Reservation>,
}

impl OrderDraft {
    /// Expiry shared by the draft's reservations.
    #[must_use]
    pub fn reservation_expires_at(&self) -> Option<DateTime<Utc>> {
        self.reservations.first().map(|r| r.expires_at)
    }
}

// ============================================================================
// Drops and queue tickets
// ============================================================================

/// Time-boxed release of a product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drop {
    /// Drop ID
    pub id: DropId,
    /// Product being released
    pub product_id: ProductId,
    /// Opening time
    pub start_at: DateTime<Utc>,
    /// Closing time; open-ended when `None`
    pub end_at: Option<DateTime<Utc>>,
    /// Whether buyers must queue
    pub queue_enabled: bool,
    /// Units one customer may buy
    pub per_customer_limit: i32,
    /// Minutes a released buyer may hold stock
    pub reserve_minutes: i32,
    /// Whether a captcha is required to join
    pub captcha_required: bool,
}

impl Drop {
    /// Whether the drop has closed at `now`.
    #[must_use]
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_at.is_some_and(|end| end < now)
    }
}

/// A customer's admission record for one drop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueTicket {
    /// Ticket ID
    pub id: TicketId,
    /// Drop joined
    pub drop_id: DropId,
    /// Ticket holder
    pub customer_id: CustomerId,
    /// Status
    pub status: TicketStatus,
    /// 1-based queue position, admitted tickets only
    pub position: Option<i32>,
    /// Risk score in `[0, 1]`
    pub risk_score: f64,
    /// Rule that produced the score
    pub risk_reason: Option<String>,
    /// SHA-256 of the client fingerprint
    pub fingerprint_hash: Option<String>,
    /// SHA-256 of the client IP
    pub ip_hash: Option<String>,
    /// SHA-256 of the user agent
    pub user_agent_hash: Option<String>,
    /// When the ticket was released to buy
    pub released_at: Option<DateTime<Utc>>,
    /// When a released ticket lapses
    pub expires_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Drop fields exposed alongside a ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropSummary {
    /// Drop ID
    pub id: DropId,
    /// Opening time
    pub start_at: DateTime<Utc>,
    /// Closing time
    pub end_at: Option<DateTime<Utc>>,
    /// Minutes per released buyer
    pub reserve_minutes: i32,
}

/// Queue ticket as returned to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueTicketView {
    /// Ticket ID
    pub ticket_id: TicketId,
    /// Status
    pub status: TicketStatus,
    /// Position, admitted tickets only
    pub position: Option<i32>,
    /// `(position - 1) × max(reserve_minutes, 1)`
    pub estimated_wait_minutes: Option<i64>,
    /// Release time
    pub released_at: Option<DateTime<Utc>>,
    /// Expiry of a released ticket
    pub expires_at: Option<DateTime<Utc>>,
    /// Risk score
    pub risk_score: f64,
    /// Risk reason
    pub risk_reason: Option<String>,
    /// Drop summary
    #[serde(rename = "drop")]
    pub drop_summary: DropSummary,
}

impl QueueTicketView {
    /// Project a ticket and its drop into the client view.
    #[must_use]
    pub fn new(ticket: &QueueTicket, drop: &Drop) -> Self {
        Self {
            ticket_id: ticket.id,
            status: ticket.status,
            position: ticket.position,
            estimated_wait_minutes: estimated_wait_minutes(ticket.position, drop.reserve_minutes),
            released_at: ticket.released_at,
            expires_at: ticket.expires_at,
            risk_score: ticket.risk_score,
            risk_reason: ticket.risk_reason.clone(),
            drop_summary: DropSummary {
                id: drop.id,
                start_at: drop.start_at,
                end_at: drop.end_at,
                reserve_minutes: drop.reserve_minutes,
            },
        }
    }
}

/// Wait estimate for a queue position.
#[must_use]
pub fn estimated_wait_minutes(position: Option<i32>, reserve_minutes: i32) -> Option<i64> {
    position.map(|p| (i64::from(p) - 1) * i64::from(reserve_minutes.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_rejects_blank() {
        assert!(IdempotencyKey::new("   ").is_err());
        assert!(IdempotencyKey::new("x".repeat(256)).is_err());
        assert_eq!(IdempotencyKey::new(" abc ").map(|k| k.0).ok(), Some("abc".to_string()));
    }

    #[test]
    fn idempotency_key_deserialization_validates() {
        assert!(serde_json::from_str::<IdempotencyKey>("\"   \"").is_err());
        assert!(serde_json::from_str::<IdempotencyKey>(&format!("\"{}\"", "k".repeat(256))).is_err());

        let key = serde_json::from_str::<IdempotencyKey>("\" order-7 \"");
        assert_eq!(key.as_ref().map(IdempotencyKey::as_str).ok(), Some("order-7"));
        assert_eq!(key.and_then(|k| serde_json::to_string(&k)).ok().as_deref(), Some("\"order-7\""));
    }

    #[test]
    fn status_round_trips_through_database_strings() {
        for status in [
            ReservationStatus::Active,
            ReservationStatus::Converted,
            ReservationStatus::Expired,
            ReservationStatus::Cancelled,
        ] {
            assert_eq!(ReservationStatus::parse(status.as_str()).ok(), Some(status));
        }
        assert!(TicketStatus::parse("WAITING").is_err());
    }

    #[test]
    fn only_active_and_converted_block_a_key() {
        assert!(ReservationStatus::Active.blocks_idempotency_key());
        assert!(ReservationStatus::Converted.blocks_idempotency_key());
        assert!(!ReservationStatus::Expired.blocks_idempotency_key());
        assert!(!ReservationStatus::Cancelled.blocks_idempotency_key());
    }

    #[test]
    fn customer_patch_only_touches_present_fields() {
        let now = Utc::now();
        let mut customer = Customer::from_input(
            &CustomerInput {
                email: "a@example.com".into(),
                name: Some("Ada".into()),
                phone: Some("+351900000000".into()),
                vat_number: None,
                marketing_opt_in: Some(true),
            },
            now,
        );

        customer.apply(&CustomerInput {
            email: "a@example.com".into(),
            name: Some("Ada L.".into()),
            ..CustomerInput::default()
        });

        assert_eq!(customer.name.as_deref(), Some("Ada L."));
        assert_eq!(customer.phone.as_deref(), Some("+351900000000"));
        assert!(customer.marketing_opt_in);
    }

    #[test]
    fn availability_label_follows_threshold() {
        let mut inventory = Inventory {
            variant_id: VariantId::new(),
            quantity_on_hand: 10,
            quantity_reserved: 0,
            min_threshold: 3,
        };
        assert_eq!(inventory.availability(), Availability::InStock);
        inventory.quantity_reserved = 7;
        assert_eq!(inventory.availability(), Availability::LowStock);
        inventory.quantity_reserved = 10;
        assert_eq!(inventory.availability(), Availability::SoldOut);
    }

    #[test]
    fn wait_estimate_uses_at_least_one_minute_per_slot() {
        assert_eq!(estimated_wait_minutes(Some(1), 10), Some(0));
        assert_eq!(estimated_wait_minutes(Some(4), 10), Some(30));
        assert_eq!(estimated_wait_minutes(Some(3), 0), Some(2));
        assert_eq!(estimated_wait_minutes(None, 10), None);
    }
}
