//! Stripe API client implementation

use crate::{
    error::StripeError,
    types::{ErrorEnvelope, PaymentIntentObject, intent_form},
};
use drop_commerce_core::payment::{
    GatewayResult, PaymentGateway, PaymentIntent, PaymentIntentRequest,
};
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Production API base URL
pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Stripe API client
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    api_base: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a new client with the secret key from the environment
    ///
    /// # Errors
    ///
    /// Returns `StripeError::MissingApiKey` if `STRIPE_SECRET_KEY` is not set
    pub fn from_env() -> Result<Self, StripeError> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(StripeError::MissingApiKey)?;

        Ok(Self::new(secret_key))
    }

    /// Create a new client with an explicit secret key
    #[must_use]
    pub fn new(secret_key: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            secret_key,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Point the client at another API base (mock servers, proxies)
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Create a payment intent
    ///
    /// Returns the parsed intent together with the raw response body.
    ///
    /// # Errors
    ///
    /// Returns errors for network failures, API errors, or parsing failures
    pub async fn create_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<(PaymentIntentObject, serde_json::Value), StripeError> {
        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&intent_form(request))
            .send()
            .await
            .map_err(|e| StripeError::RequestFailed(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let raw = response
                    .json::<serde_json::Value>()
                    .await
                    .map_err(|e| StripeError::ResponseParseFailed(e.to_string()))?;
                let intent = serde_json::from_value::<PaymentIntentObject>(raw.clone())
                    .map_err(|e| StripeError::ResponseParseFailed(e.to_string()))?;
                Ok((intent, raw))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(StripeError::RateLimited),
            StatusCode::UNAUTHORIZED => Err(StripeError::Unauthorized),
            status => {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ErrorEnvelope>(&body)
                    .ok()
                    .and_then(ErrorEnvelope::describe)
                    .unwrap_or(body);
                Err(StripeError::ApiError {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

impl PaymentGateway for StripeClient {
    fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<PaymentIntent>> + Send + '_>> {
        Box::pin(async move {
            match self.create_intent(&request).await {
                Ok((intent, raw)) => {
                    tracing::info!(
                        payment_intent_id = %intent.id,
                        status = %intent.status,
                        "payment intent created"
                    );
                    Ok(PaymentIntent {
                        id: intent.id,
                        provider_status: intent.status,
                        client_secret: intent.client_secret,
                        raw,
                    })
                }
                Err(err) => {
                    tracing::warn!(error = %err, "payment intent creation failed");
                    Err(err.into())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = StripeClient::new("sk_test_123".to_string());
        assert_eq!(client.secret_key, "sk_test_123");
        assert_eq!(client.api_base, "https://api.stripe.com");
    }

    #[test]
    fn test_api_base_override_drops_trailing_slash() {
        let client = StripeClient::new("sk_test_123".to_string()).with_api_base("http://localhost:12111/");
        assert_eq!(client.api_base, "http://localhost:12111");
    }

    #[test]
    fn test_debug_hides_secret() {
        let client = StripeClient::new("sk_test_123".to_string());
        assert!(!format!("{client:?}").contains("sk_test_123"));
    }
}
