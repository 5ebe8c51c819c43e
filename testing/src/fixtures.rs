//! Fixture builders and a harness wiring the engine services to an
//! [`InMemoryStore`].

use crate::gateway::MockPaymentGateway;
use crate::memory::InMemoryStore;
use crate::mocks::{ManualClock, epoch};
use chrono::Duration;
use drop_commerce_core::EngineConfig;
use drop_commerce_core::admission::{DropAdmissionEngine, JoinRequest};
use drop_commerce_core::checkout::{CheckoutService, DraftRequest, OrderDraftBuilder, ReservationLifecycle};
use drop_commerce_core::environment::Clock;
use drop_commerce_core::hashing::ClientSignals;
use drop_commerce_core::sweeper::ReservationSweeper;
use drop_commerce_core::types::{
    Address, CheckoutItem, Currency, CustomerInput, Drop, DropId, IdempotencyKey, Inventory, ProductId,
    Variant, VariantId, VariantStock,
};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

/// A variant priced at `price` (e.g. `"120.00"`, EUR) with `on_hand` units
/// and nothing reserved.
#[must_use]
pub fn variant(price: &str, on_hand: i32) -> VariantStock {
    let id = VariantId::new();
    VariantStock {
        variant: Variant {
            id,
            sku: format!("SKU-{}", &id.to_string()[..8]),
            unit_price: Decimal::from_str(price).unwrap_or_default(),
            currency: Currency::Eur,
        },
        inventory: Inventory {
            variant_id: id,
            quantity_on_hand: on_hand,
            quantity_reserved: 0,
            min_threshold: 2,
        },
    }
}

/// A Lisbon shipping address.
#[must_use]
pub fn address() -> Address {
    Address {
        line1: "Rua Augusta 100".to_string(),
        line2: None,
        city: "Lisboa".to_string(),
        region: None,
        postal_code: "1100-053".to_string(),
        country: "PT".to_string(),
    }
}

/// Customer input with only an email.
#[must_use]
pub fn customer(email: &str) -> CustomerInput {
    CustomerInput::with_email(email)
}

/// Checkout request for `buyer@example.com` with the given key and lines.
///
/// An empty `key` produces a generated key.
#[must_use]
pub fn draft_request(key: &str, lines: &[(VariantId, i32)]) -> DraftRequest {
    DraftRequest {
        customer: customer("buyer@example.com"),
        shipping_address: address(),
        billing_address: None,
        items: lines
            .iter()
            .map(|&(variant_id, quantity)| CheckoutItem {
                variant_id,
                quantity,
            })
            .collect(),
        idempotency_key: IdempotencyKey::new(key).unwrap_or_else(|_| IdempotencyKey::generate()),
    }
}

/// An open, queueing drop that started at the fixture epoch and has no end.
#[must_use]
pub fn open_drop() -> Drop {
    Drop {
        id: DropId::new(),
        product_id: ProductId::new(),
        start_at: epoch(),
        end_at: None,
        queue_enabled: true,
        per_customer_limit: 1,
        reserve_minutes: 10,
        captcha_required: false,
    }
}

/// Join request with the given email, fingerprint and IP.
#[must_use]
pub fn join_request(drop_id: DropId, email: &str, fingerprint: Option<&str>, ip: Option<&str>) -> JoinRequest {
    JoinRequest {
        drop_id,
        customer: customer(email),
        signals: ClientSignals {
            fingerprint: fingerprint.map(str::to_string),
            ip: ip.map(str::to_string),
            user_agent: Some("Mozilla/5.0 (fixture)".to_string()),
        },
    }
}

/// In-memory store, a manual clock at the fixture epoch and the default
/// engine configuration, with constructors for every engine service.
#[derive(Clone)]
pub struct Harness {
    /// Shared store
    pub store: InMemoryStore,
    /// Shared clock
    pub clock: ManualClock,
    /// Engine configuration
    pub config: Arc<EngineConfig>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    /// Harness with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Harness with a custom configuration
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            store: InMemoryStore::new(),
            clock: ManualClock::new(epoch()),
            config: Arc::new(config),
        }
    }

    fn clock(&self) -> Arc<dyn Clock> {
        Arc::new(self.clock.clone())
    }

    /// Seed a variant and return its ID.
    pub async fn seed_variant(&self, price: &str, on_hand: i32) -> VariantId {
        let stock = variant(price, on_hand);
        let id = stock.variant.id;
        self.store.seed_variant(stock).await;
        id
    }

    /// Seed an open drop and return it.
    pub async fn seed_open_drop(&self) -> Drop {
        let drop = open_drop();
        self.store.seed_drop(drop.clone()).await;
        drop
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Order draft builder
    #[must_use]
    pub fn builder(&self) -> OrderDraftBuilder<InMemoryStore> {
        OrderDraftBuilder::new(self.store.clone(), self.clock(), Arc::clone(&self.config))
    }

    /// Checkout service with the given gateway
    #[must_use]
    pub fn checkout(&self, gateway: Option<&MockPaymentGateway>) -> CheckoutService<InMemoryStore> {
        CheckoutService::new(
            self.builder(),
            self.store.clone(),
            gateway.map(MockPaymentGateway::shared),
        )
    }

    /// Expiry sweeper
    #[must_use]
    pub fn sweeper(&self) -> ReservationSweeper<InMemoryStore> {
        ReservationSweeper::new(self.store.clone(), self.clock(), self.config.sweep_batch_size)
    }

    /// Reservation lifecycle
    #[must_use]
    pub fn lifecycle(&self) -> ReservationLifecycle<InMemoryStore> {
        ReservationLifecycle::new(self.store.clone())
    }

    /// Drop admission engine with the storefront risk rules
    #[must_use]
    pub fn admission(&self) -> DropAdmissionEngine<InMemoryStore> {
        DropAdmissionEngine::new(self.store.clone(), self.clock(), &self.config)
    }
}
