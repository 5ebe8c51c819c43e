//! Engine configuration.
//!
//! Tunables for pricing, reservation expiry, sweeping and risk scoring. The
//! server binary builds one from the environment; tests use
//! [`EngineConfig::default`] and override single fields with the `with_*`
//! helpers.

use crate::types::Currency;
use chrono::Duration;
use rust_decimal::Decimal;

/// Reservation and admission engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// VAT rate applied to every order line (default 0.23)
    pub vat_rate: Decimal,
    /// Currency assumed when a cart has no priced lines (default EUR)
    pub default_currency: Currency,
    /// Lifetime of a reservation created at checkout (default 15 minutes)
    pub reservation_ttl: Duration,
    /// Rows reclaimed per sweeper transaction (default 200)
    pub sweep_batch_size: i64,
    /// Risk score at or above which a queue join is rejected (default 0.85)
    pub risk_rejection_threshold: f64,
    /// Look-back window for fingerprint reuse (default 10 minutes)
    pub fingerprint_window: Duration,
    /// Look-back window for per-IP join counting (default 30 minutes)
    pub ip_window: Duration,
    /// Joins from one IP tolerated inside `ip_window` (default 5)
    pub ip_ticket_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            vat_rate: Decimal::new(23, 2),
            default_currency: Currency::Eur,
            reservation_ttl: Duration::minutes(15),
            sweep_batch_size: 200,
            risk_rejection_threshold: 0.85,
            fingerprint_window: Duration::minutes(10),
            ip_window: Duration::minutes(30),
            ip_ticket_limit: 5,
        }
    }
}

impl EngineConfig {
    /// Override the VAT rate.
    #[must_use]
    pub fn with_vat_rate(mut self, vat_rate: Decimal) -> Self {
        self.vat_rate = vat_rate;
        self
    }

    /// Override the reservation lifetime.
    #[must_use]
    pub fn with_reservation_ttl(mut self, ttl: Duration) -> Self {
        self.reservation_ttl = ttl;
        self
    }

    /// Override the sweeper batch size. Values below 1 are raised to 1.
    #[must_use]
    pub fn with_sweep_batch_size(mut self, batch_size: i64) -> Self {
        self.sweep_batch_size = batch_size.max(1);
        self
    }

    /// Override the risk rejection threshold.
    #[must_use]
    pub fn with_risk_rejection_threshold(mut self, threshold: f64) -> Self {
        self.risk_rejection_threshold = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_storefront_settings() {
        let config = EngineConfig::default();
        assert_eq!(config.vat_rate.to_string(), "0.23");
        assert_eq!(config.reservation_ttl, Duration::minutes(15));
        assert_eq!(config.sweep_batch_size, 200);
        assert!((config.risk_rejection_threshold - 0.85).abs() < f64::EPSILON);
        assert_eq!(config.ip_ticket_limit, 5);
    }

    #[test]
    fn batch_size_never_drops_below_one() {
        assert_eq!(EngineConfig::default().with_sweep_batch_size(0).sweep_batch_size, 1);
    }
}
