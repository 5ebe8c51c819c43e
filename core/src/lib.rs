//! # Drop Commerce Core
//!
//! Reservation and admission engine for limited-quantity sneaker drops.
//!
//! This crate owns the hard part of the storefront: selling scarce stock to
//! many concurrent buyers without overselling, and admitting customers into a
//! drop's release queue.
//!
//! ## Components
//!
//! - **Inventory Ledger** ([`ledger`]): atomic conditional reservation on the
//!   per-variant `reserved` counter.
//! - **Order Draft Builder** ([`checkout::OrderDraftBuilder`]): priced order,
//!   payment shell and reservations inside one unit of work.
//! - **Checkout** ([`checkout::CheckoutService`]): draft + Payment Intent
//!   Bridge + attachment of the provider intent.
//! - **Expiry Sweeper** ([`sweeper::ReservationSweeper`]): returns stock held
//!   by abandoned reservations to the sellable pool.
//! - **Drop Admission Engine** ([`admission::DropAdmissionEngine`]): risk-gated
//!   queue ticket issuance with gapless positions.
//!
//! ## Storage
//!
//! The engine never touches a database directly. All persistence goes through
//! the [`store::Store`] port, whose units of work must give linearizable
//! per-row conditional updates. Implementations live in
//! `drop-commerce-postgres` (production) and `drop-commerce-testing`
//! (in-memory, for tests).
//!
//! ## Example
//!
//! ```ignore
//! use drop_commerce_core::checkout::{OrderDraftBuilder, DraftRequest};
//!
//! let builder = OrderDraftBuilder::new(store, clock, config);
//! let draft = builder.create_order_draft(request).await?;
//! println!("order {} holds {} reservations", draft.order.id, draft.reservations.len());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod admission;
pub mod checkout;
pub mod config;
pub mod error;
pub mod hashing;
pub mod ledger;
pub mod metrics;
pub mod payment;
pub mod pricing;
pub mod risk;
pub mod store;
pub mod sweeper;
pub mod types;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use rust_decimal::Decimal;

/// Environment module - injected dependencies.
///
/// All time-dependent decisions (reservation expiry, risk windows, drop
/// closing) read the time through [`environment::Clock`] so tests can pin it.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use drop_commerce_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
