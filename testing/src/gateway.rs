//! Mock payment gateway.

use drop_commerce_core::payment::{
    GatewayResult, PaymentGateway, PaymentGatewayError, PaymentIntent, PaymentIntentRequest,
};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Recorded {
    requests: Vec<PaymentIntentRequest>,
    by_key: HashMap<String, PaymentIntent>,
}

/// Mock payment gateway
///
/// Answers like a provider: one intent per idempotency key (a replayed key
/// returns the same intent), configurable status, optional failure. Every
/// request is recorded for assertions.
#[derive(Clone, Debug)]
pub struct MockPaymentGateway {
    status: String,
    failure: Option<PaymentGatewayError>,
    recorded: Arc<Mutex<Recorded>>,
}

impl MockPaymentGateway {
    /// Creates a gateway whose intents start in `requires_payment_method`
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: "requires_payment_method".to_string(),
            failure: None,
            recorded: Arc::new(Mutex::new(Recorded::default())),
        }
    }

    /// Report `status` on every new intent
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Fail every call with `error`
    #[must_use]
    pub fn failing(mut self, error: PaymentGatewayError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared(&self) -> Arc<dyn PaymentGateway> {
        Arc::new(self.clone())
    }

    /// Requests received so far
    pub async fn requests(&self) -> Vec<PaymentIntentRequest> {
        self.recorded.lock().await.requests.clone()
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentGateway for MockPaymentGateway {
    fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<PaymentIntent>> + Send + '_>> {
        Box::pin(async move {
            let mut recorded = self.recorded.lock().await;
            recorded.requests.push(request.clone());

            if let Some(error) = &self.failure {
                return Err(error.clone());
            }
            if let Some(existing) = recorded.by_key.get(&request.idempotency_key) {
                return Ok(existing.clone());
            }

            let id = format!("pi_mock_{}", recorded.by_key.len() + 1);
            let client_secret = format!("{id}_secret");
            let intent = PaymentIntent {
                raw: serde_json::json!({
                    "id": id,
                    "object": "payment_intent",
                    "amount": request.amount_minor,
                    "currency": request.currency.provider_code(),
                    "status": self.status,
                    "client_secret": client_secret,
                    "metadata": request.metadata,
                }),
                id,
                provider_status: self.status.clone(),
                client_secret: Some(client_secret),
            };
            recorded.by_key.insert(request.idempotency_key.clone(), intent.clone());
            Ok(intent)
        })
    }
}
