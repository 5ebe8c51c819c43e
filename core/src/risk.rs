//! Risk scoring for drop queue joins.
//!
//! A [`RiskPolicy`] is an ordered list of [`RiskRule`]s. Each rule looks at
//! the hashed signals of the join attempt and at recent ticket history for
//! the same drop, and may return a [`RiskSignal`]. The policy keeps the
//! highest score together with the reason of the rule that produced it; on a
//! tie the earlier rule wins.
//!
//! # Example
//!
//! ```
//! use drop_commerce_core::risk::{RiskPolicy, RiskProbe};
//! use drop_commerce_core::hashing::HashedSignals;
//! use drop_commerce_core::EngineConfig;
//! use chrono::Utc;
//!
//! let policy = RiskPolicy::from_config(&EngineConfig::default());
//! let signals = HashedSignals::default();
//! let assessment = policy.assess(&RiskProbe { signals: &signals, now: Utc::now() }, &[]);
//! assert_eq!(assessment.score, 0.0);
//! ```

use crate::config::EngineConfig;
use crate::hashing::HashedSignals;
use crate::types::CustomerId;
use chrono::{DateTime, Duration, Utc};

/// Reason recorded for fingerprint reuse.
pub const DUPLICATE_FINGERPRINT: &str = "duplicate_fingerprint";
/// Reason recorded for too many joins from one IP.
pub const IP_RATE_LIMIT: &str = "ip_rate_limit";

/// Recent ticket as seen by risk rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketTrace {
    /// Ticket holder
    pub customer_id: CustomerId,
    /// Hashed fingerprint
    pub fingerprint_hash: Option<String>,
    /// Hashed IP
    pub ip_hash: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// The join attempt under evaluation.
#[derive(Debug, Clone, Copy)]
pub struct RiskProbe<'a> {
    /// Hashed client signals
    pub signals: &'a HashedSignals,
    /// Evaluation time
    pub now: DateTime<Utc>,
}

/// Output of one rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskSignal {
    /// Score in `[0, 1]`
    pub score: f64,
    /// Machine-readable reason
    pub reason: String,
}

/// Combined outcome of a policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    /// Highest rule score, 0 when nothing fired
    pub score: f64,
    /// Reason of the rule that produced `score`
    pub reason: Option<String>,
}

impl RiskAssessment {
    /// No rule fired.
    #[must_use]
    pub const fn clear() -> Self {
        Self {
            score: 0.0,
            reason: None,
        }
    }

    /// Whether the attempt must be rejected at `threshold` (inclusive).
    #[must_use]
    pub fn is_rejected(&self, threshold: f64) -> bool {
        self.score >= threshold
    }
}

/// A single heuristic.
///
/// Rules are synchronous: the engine loads history once, for the widest
/// look-back of the policy, and hands it to every rule.
pub trait RiskRule: Send + Sync {
    /// Rule name for logs
    fn name(&self) -> &'static str;

    /// How far back this rule needs to see.
    fn lookback(&self) -> Duration;

    /// Evaluate the probe against history (tickets of the same drop).
    fn evaluate(&self, probe: &RiskProbe<'_>, history: &[TicketTrace]) -> Option<RiskSignal>;
}

/// Flags a fingerprint already seen on this drop inside the window.
#[derive(Debug, Clone)]
pub struct DuplicateFingerprintRule {
    window: Duration,
    score: f64,
}

impl DuplicateFingerprintRule {
    /// Rule with the given window and the standard 0.90 score.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self { window, score: 0.90 }
    }
}

impl RiskRule for DuplicateFingerprintRule {
    fn name(&self) -> &'static str {
        DUPLICATE_FINGERPRINT
    }

    fn lookback(&self) -> Duration {
        self.window
    }

    fn evaluate(&self, probe: &RiskProbe<'_>, history: &[TicketTrace]) -> Option<RiskSignal> {
        let fingerprint = probe.signals.fingerprint_hash.as_deref()?;
        let since = probe.now - self.window;
        history
            .iter()
            .any(|t| t.created_at >= since && t.fingerprint_hash.as_deref() == Some(fingerprint))
            .then(|| RiskSignal {
                score: self.score,
                reason: DUPLICATE_FINGERPRINT.to_string(),
            })
    }
}

/// Flags an IP with more than `limit` joins on this drop inside the window.
#[derive(Debug, Clone)]
pub struct IpRateLimitRule {
    window: Duration,
    limit: usize,
    score: f64,
}

impl IpRateLimitRule {
    /// Rule with the given window and limit and the standard 0.95 score.
    #[must_use]
    pub const fn new(window: Duration, limit: usize) -> Self {
        Self {
            window,
            limit,
            score: 0.95,
        }
    }
}

impl RiskRule for IpRateLimitRule {
    fn name(&self) -> &'static str {
        IP_RATE_LIMIT
    }

    fn lookback(&self) -> Duration {
        self.window
    }

    fn evaluate(&self, probe: &RiskProbe<'_>, history: &[TicketTrace]) -> Option<RiskSignal> {
        let ip = probe.signals.ip_hash.as_deref()?;
        let since = probe.now - self.window;
        let recent = history
            .iter()
            .filter(|t| t.created_at >= since && t.ip_hash.as_deref() == Some(ip))
            .count();
        (recent > self.limit).then(|| RiskSignal {
            score: self.score,
            reason: IP_RATE_LIMIT.to_string(),
        })
    }
}

/// Ordered list of rules combined by maximum score.
pub struct RiskPolicy {
    rules: Vec<Box<dyn RiskRule>>,
}

impl std::fmt::Debug for RiskPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|r| r.name()))
            .finish()
    }
}

impl RiskPolicy {
    /// Policy with no rules; every join scores 0.
    #[must_use]
    pub const fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The storefront rules: fingerprint reuse, then IP rate.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::empty()
            .with_rule(DuplicateFingerprintRule::new(config.fingerprint_window))
            .with_rule(IpRateLimitRule::new(config.ip_window, config.ip_ticket_limit))
    }

    /// Append a rule. Earlier rules win ties.
    #[must_use]
    pub fn with_rule(mut self, rule: impl RiskRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Widest look-back over all rules.
    #[must_use]
    pub fn lookback(&self) -> Duration {
        self.rules
            .iter()
            .map(|r| r.lookback())
            .max()
            .unwrap_or_else(Duration::zero)
    }

    /// Run every rule and keep the maximum.
    #[must_use]
    pub fn assess(&self, probe: &RiskProbe<'_>, history: &[TicketTrace]) -> RiskAssessment {
        let mut assessment = RiskAssessment::clear();
        for rule in &self.rules {
            if let Some(signal) = rule.evaluate(probe, history) {
                tracing::debug!(rule = rule.name(), score = signal.score, "Risk rule fired");
                if signal.score > assessment.score {
                    assessment = RiskAssessment {
                        score: signal.score,
                        reason: Some(signal.reason),
                    };
                }
            }
        }
        assessment
    }
}
