//! # Drop Commerce Testing
//!
//! Testing utilities for the drop commerce engine.
//!
//! This crate provides:
//! - [`InMemoryStore`]: a serialisable in-memory implementation of every
//!   storage port
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - [`MockPaymentGateway`]: records intent requests, answers like a provider
//! - Fixture builders and a [`Harness`] wiring the engine services together
//! - proptest strategies
//!
//! ## Example
//!
//! ```ignore
//! use drop_commerce_testing::{Harness, fixtures};
//!
//! #[tokio::test]
//! async fn checkout_reserves_stock() {
//!     let harness = Harness::new();
//!     let variant = harness.seed_variant("120.00", 5).await;
//!
//!     let draft = harness
//!         .builder()
//!         .create_order_draft(fixtures::draft_request("key-1", &[(variant, 2)]))
//!         .await?;
//!
//!     assert_eq!(harness.store.inventory(variant).await.map(|i| i.quantity_reserved), Some(2));
//! }
//! ```

mod gateway;
mod memory;

pub mod fixtures;

pub use fixtures::Harness;
pub use gateway::MockPaymentGateway;
pub use memory::{InMemoryStore, MemoryTx};

use chrono::{DateTime, Utc};
use drop_commerce_core::environment::Clock;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use chrono::Duration;
    use std::sync::{Arc, PoisonError, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use drop_commerce_testing::mocks::FixedClock;
    /// use drop_commerce_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can hold one handle and give
    /// another to the engine.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Start at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.write().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute time
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.write().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// The reference instant used by fixtures: 2025-01-01 00:00:00 UTC
    #[must_use]
    pub fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(epoch())
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;

    /// Stock level for a variant.
    pub fn stock() -> impl Strategy<Value = i32> {
        0..40i32
    }

    /// A sequence of reservation requests, each asking for 1..=8 units.
    pub fn reservation_requests() -> impl Strategy<Value = Vec<i32>> {
        prop::collection::vec(1..=8i32, 1..24)
    }

    /// Which requests succeed when applied in order against `on_hand`
    /// under the conditional update: a request succeeds iff it still fits.
    #[must_use]
    pub fn expected_outcomes(on_hand: i32, requests: &[i32]) -> Vec<bool> {
        let mut reserved = 0;
        requests
            .iter()
            .map(|&q| {
                let fits = reserved + q <= on_hand;
                if fits {
                    reserved += q;
                }
                fits
            })
            .collect()
    }
}

/// Install a `tracing` subscriber writing to the test output. Safe to call
/// from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, epoch, test_clock};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(epoch());
        let handle = clock.clone();
        handle.advance(Duration::minutes(5));
        assert_eq!(clock.now(), epoch() + Duration::minutes(5));
    }

    #[test]
    fn expected_outcomes_skip_requests_that_do_not_fit() {
        assert_eq!(
            properties::expected_outcomes(5, &[3, 3, 2]),
            vec![true, false, true]
        );
    }
}
