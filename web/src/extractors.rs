//! Custom Axum extractors.
//!
//! - `CheckoutKey`: `Idempotency-Key` header, or a generated key
//! - `ClientIp`: client IP from proxy headers
//! - `UserAgent`: `User-Agent` header
//!
//! The raw IP and user agent only travel as far as the admission engine,
//! which hashes them before storage or comparison.

use crate::error::AppError;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use drop_commerce_core::types::IdempotencyKey;

/// Header carrying the caller's checkout token.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Idempotency key of a checkout request.
///
/// Taken from the `Idempotency-Key` header; a fresh UUID is generated when
/// the header is absent. A blank, oversized or non-ASCII header is a 400.
#[derive(Debug, Clone)]
pub struct CheckoutKey(pub IdempotencyKey);

#[async_trait]
impl<S> FromRequestParts<S> for CheckoutKey
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(IDEMPOTENCY_KEY_HEADER) else {
            return Ok(Self(IdempotencyKey::generate()));
        };
        let raw = value
            .to_str()
            .map_err(|_| AppError::bad_request("Idempotency-Key must be visible ASCII"))?;

        Ok(Self(IdempotencyKey::new(raw)?))
    }
}

/// Client IP address as sent by the edge proxy.
///
/// # Priority
///
/// 1. `X-Forwarded-For` (first entry in the list)
/// 2. `X-Real-IP`
///
/// `None` when neither header carries a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(extract_client_ip(&parts.headers)))
    }
}

fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let first_forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    first_forwarded
        .or_else(|| {
            headers
                .get("X-Real-IP")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
        })
        .map(str::to_string)
}

/// `User-Agent` header, if present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgent(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for UserAgent
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get("User-Agent")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(Self(user_agent))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)] // Test code can use expect
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode, header};

    fn parts_with(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, ()) = builder.body(()).expect("Valid request").into_parts();
        parts
    }

    #[tokio::test]
    async fn test_client_ip_takes_first_forwarded_entry() {
        let mut parts = parts_with(&[("X-Forwarded-For", "203.0.113.1, 198.51.100.1")]);
        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(ip.as_deref(), Some("203.0.113.1"));
    }

    #[tokio::test]
    async fn test_client_ip_from_x_real_ip() {
        let mut parts = parts_with(&[("X-Real-IP", "198.51.100.42")]);
        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(ip.as_deref(), Some("198.51.100.42"));
    }

    #[tokio::test]
    async fn test_client_ip_absent() {
        let mut parts = parts_with(&[]);
        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(ip, None);
    }

    #[tokio::test]
    async fn test_user_agent_from_header() {
        let mut parts = parts_with(&[(header::USER_AGENT.as_str(), "Mozilla/5.0 (Test)")]);
        let UserAgent(agent) = UserAgent::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(agent.as_deref(), Some("Mozilla/5.0 (Test)"));
    }

    #[tokio::test]
    async fn test_checkout_key_from_header_or_generated() {
        let mut parts = parts_with(&[(IDEMPOTENCY_KEY_HEADER, " cart-42 ")]);
        let CheckoutKey(key) = CheckoutKey::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");
        assert_eq!(key.as_str(), "cart-42");

        let mut parts = parts_with(&[]);
        let CheckoutKey(generated) = CheckoutKey::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");
        assert_eq!(generated.as_str().len(), 36);
    }

    #[tokio::test]
    async fn test_blank_checkout_key_is_rejected() {
        let mut parts = parts_with(&[(IDEMPOTENCY_KEY_HEADER, "   ")]);
        let err = CheckoutKey::from_request_parts(&mut parts, &())
            .await
            .expect_err("blank key");

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
