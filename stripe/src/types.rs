//! Wire types for the Payment Intents API.

use drop_commerce_core::payment::PaymentIntentRequest;
use serde::Deserialize;

/// The subset of a Stripe `payment_intent` object the bridge reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntentObject {
    /// Intent ID (`pi_…`)
    pub id: String,
    /// Provider status string
    pub status: String,
    /// Secret for client-side confirmation
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Amount in minor units
    #[serde(default)]
    pub amount: Option<i64>,
    /// Lower-case currency code
    #[serde(default)]
    pub currency: Option<String>,
}

/// Error envelope returned with non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl ErrorEnvelope {
    /// Most specific human-readable description available.
    pub(crate) fn describe(self) -> Option<String> {
        match (self.error.code, self.error.message) {
            (Some(code), Some(message)) => Some(format!("{code}: {message}")),
            (None, Some(message)) => Some(message),
            (Some(code), None) => Some(code),
            (None, None) => None,
        }
    }
}

/// Form body for `POST /v1/payment_intents`.
#[must_use]
pub fn intent_form(request: &PaymentIntentRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("amount".to_string(), request.amount_minor.to_string()),
        ("currency".to_string(), request.currency.provider_code().to_string()),
        ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
    ];
    form.extend(
        request
            .metadata
            .iter()
            .map(|(key, value)| (format!("metadata[{key}]"), value.clone())),
    );
    if let Some(email) = &request.receipt_email {
        form.push(("receipt_email".to_string(), email.clone()));
    }
    if let Some(description) = &request.description {
        form.push(("description".to_string(), description.clone()));
    }
    if let Some(shipping) = &request.shipping {
        let address = &shipping.address;
        let fields = [
            ("shipping[name]", Some(&shipping.name)),
            ("shipping[phone]", shipping.phone.as_ref()),
            ("shipping[address][line1]", Some(&address.line1)),
            ("shipping[address][line2]", address.line2.as_ref()),
            ("shipping[address][city]", Some(&address.city)),
            ("shipping[address][state]", address.region.as_ref()),
            ("shipping[address][postal_code]", Some(&address.postal_code)),
            ("shipping[address][country]", Some(&address.country)),
        ];
        form.extend(
            fields
                .into_iter()
                .filter_map(|(key, value)| value.map(|v| (key.to_string(), v.clone()))),
        );
    }
    form
}

#[cfg(test)]
#[allow(clippy::expect_used)] // Test code can use expect
mod tests {
    use super::*;
    use drop_commerce_core::payment::ShippingDetails;
    use drop_commerce_core::types::{Address, Currency};
    use std::collections::BTreeMap;

    #[test]
    fn form_carries_amount_currency_and_metadata() {
        let request = PaymentIntentRequest {
            amount_minor: 38_129,
            currency: Currency::Eur,
            metadata: BTreeMap::from([
                ("checkoutKey".to_string(), "key-1".to_string()),
                ("orderId".to_string(), "order-1".to_string()),
            ]),
            idempotency_key: "key-1".to_string(),
            receipt_email: Some("buyer@example.com".to_string()),
            description: None,
            shipping: None,
        };

        let form = intent_form(&request);

        assert_eq!(form[0], ("amount".to_string(), "38129".to_string()));
        assert_eq!(form[1], ("currency".to_string(), "eur".to_string()));
        assert!(form.contains(&("metadata[orderId]".to_string(), "order-1".to_string())));
        assert!(form.contains(&("metadata[checkoutKey]".to_string(), "key-1".to_string())));
        assert_eq!(
            form.last(),
            Some(&("receipt_email".to_string(), "buyer@example.com".to_string()))
        );
    }

    #[test]
    fn form_flattens_shipping_and_skips_absent_fields() {
        let request = PaymentIntentRequest {
            amount_minor: 100,
            currency: Currency::Eur,
            metadata: BTreeMap::new(),
            idempotency_key: "key-2".to_string(),
            receipt_email: None,
            description: Some("Drop order #42".to_string()),
            shipping: Some(ShippingDetails {
                name: "Ana Silva".to_string(),
                phone: None,
                address: Address {
                    line1: "Rua Augusta 100".to_string(),
                    line2: None,
                    city: "Lisboa".to_string(),
                    region: Some("Lisboa".to_string()),
                    postal_code: "1100-053".to_string(),
                    country: "PT".to_string(),
                },
            }),
        };

        let form = intent_form(&request);
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("description"), Some("Drop order #42"));
        assert_eq!(get("shipping[name]"), Some("Ana Silva"));
        assert_eq!(get("shipping[address][line1]"), Some("Rua Augusta 100"));
        assert_eq!(get("shipping[address][state]"), Some("Lisboa"));
        assert_eq!(get("shipping[address][postal_code]"), Some("1100-053"));
        assert_eq!(get("shipping[address][country]"), Some("PT"));
        assert_eq!(get("shipping[phone]"), None);
        assert_eq!(get("shipping[address][line2]"), None);
        assert_eq!(get("receipt_email"), None);
    }

    #[test]
    fn error_envelope_prefers_code_and_message() {
        let envelope: ErrorEnvelope = serde_json::from_str(
            r#"{"error":{"type":"card_error","code":"card_declined","message":"Your card was declined."}}"#,
        )
        .expect("envelope");
        assert_eq!(
            envelope.describe().as_deref(),
            Some("card_declined: Your card was declined.")
        );
    }
}
