//! One-way hashing of client signals.
//!
//! Fingerprints, IP addresses and user agents are hashed with SHA-256 before
//! they are stored, compared or logged. Raw values never leave this module.

use sha2::{Digest, Sha256};
use std::fmt;

/// Lower-case hex SHA-256 digest of `value`.
#[must_use]
pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash an optional signal. Blank values count as absent.
#[must_use]
pub fn hash_signal(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(sha256_hex)
}

/// Raw client signals captured by the transport layer.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ClientSignals {
    /// Device fingerprint supplied by the storefront script
    pub fingerprint: Option<String>,
    /// Client IP address
    pub ip: Option<String>,
    /// `User-Agent` header
    pub user_agent: Option<String>,
}

impl fmt::Debug for ClientSignals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSignals")
            .field("fingerprint", &self.fingerprint.as_ref().map(|_| "<redacted>"))
            .field("ip", &self.ip.as_ref().map(|_| "<redacted>"))
            .field("user_agent", &self.user_agent.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ClientSignals {
    /// Hash every present signal.
    #[must_use]
    pub fn hashed(&self) -> HashedSignals {
        HashedSignals {
            fingerprint_hash: hash_signal(self.fingerprint.as_deref()),
            ip_hash: hash_signal(self.ip.as_deref()),
            user_agent_hash: hash_signal(self.user_agent.as_deref()),
        }
    }
}

/// Client signals after hashing; safe to persist and log.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HashedSignals {
    /// SHA-256 of the fingerprint
    pub fingerprint_hash: Option<String>,
    /// SHA-256 of the IP
    pub ip_hash: Option<String>,
    /// SHA-256 of the user agent
    pub user_agent_hash: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_hex_sha256() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn blank_signals_are_absent() {
        assert_eq!(hash_signal(Some("  ")), None);
        assert_eq!(hash_signal(None), None);
        assert_eq!(hash_signal(Some(" abc ")), Some(sha256_hex("abc")));
    }

    #[test]
    fn debug_output_never_contains_raw_values() {
        let signals = ClientSignals {
            fingerprint: Some("fp-secret".into()),
            ip: Some("203.0.113.9".into()),
            user_agent: None,
        };
        let rendered = format!("{signals:?}");
        assert!(!rendered.contains("fp-secret"));
        assert!(!rendered.contains("203.0.113.9"));
    }
}
