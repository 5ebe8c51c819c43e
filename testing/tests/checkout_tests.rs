//! Order draft and checkout tests against the in-memory store.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use chrono::Duration;
use drop_commerce_core::EngineError;
use drop_commerce_core::payment::PaymentGatewayError;
use drop_commerce_core::types::{
    Address, Currency, CustomerInput, OrderStatus, PaymentStatus, ReservationStatus,
};
use drop_commerce_testing::{Harness, MockPaymentGateway, epoch, fixtures};
use rust_decimal::Decimal;
use std::str::FromStr;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[tokio::test]
async fn draft_prices_lines_and_reserves_stock() {
    let harness = Harness::new();
    let shoes = harness.seed_variant("100.00", 10).await;
    let socks = harness.seed_variant("9.99", 10).await;

    let draft = harness
        .builder()
        .create_order_draft(fixtures::draft_request("key-1", &[(shoes, 3), (socks, 1)]))
        .await
        .expect("draft");

    assert_eq!(draft.order.status, OrderStatus::PendingPayment);
    assert_eq!(draft.order.currency, Currency::Eur);
    assert_eq!(draft.totals.subtotal, dec("309.99"));
    // 69.00 + round2(2.2977)
    assert_eq!(draft.totals.tax, dec("71.30"));
    assert_eq!(draft.totals.total, dec("381.29"));
    assert_eq!(draft.order.discount_amount, Decimal::ZERO);
    assert_eq!(draft.order.shipping_amount, Decimal::ZERO);
    assert_eq!(draft.order.vat_rate, dec("0.23"));
    assert_eq!(draft.payment.amount, draft.totals.total);
    assert_eq!(draft.payment.status, PaymentStatus::RequiresPaymentMethod);
    assert_eq!(draft.payment.payment_intent_id, None);

    assert_eq!(draft.reservations.len(), 2);
    for reservation in &draft.reservations {
        assert_eq!(reservation.status, ReservationStatus::Active);
        assert_eq!(reservation.expires_at, epoch() + Duration::minutes(15));
        assert_eq!(reservation.idempotency_key.as_str(), "key-1");
    }
    assert_eq!(draft.reservation_expires_at(), Some(epoch() + Duration::minutes(15)));

    assert_eq!(harness.store.inventory(shoes).await.unwrap().quantity_reserved, 3);
    assert_eq!(harness.store.inventory(socks).await.unwrap().quantity_reserved, 1);

    let lines = harness.store.order_lines(draft.order.id).await;
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].line_tax, dec("69.00"));
    assert_eq!(lines[1].line_tax, dec("2.30"));
}

#[tokio::test]
async fn duplicate_cart_lines_are_collapsed() {
    let harness = Harness::new();
    let shoes = harness.seed_variant("50.00", 10).await;

    let draft = harness
        .builder()
        .create_order_draft(fixtures::draft_request("key-dup", &[(shoes, 1), (shoes, 2)]))
        .await
        .expect("draft");

    assert_eq!(draft.lines.len(), 1);
    assert_eq!(draft.lines[0].quantity, 3);
    assert_eq!(draft.reservations.len(), 1);
    assert_eq!(harness.store.inventory(shoes).await.unwrap().quantity_reserved, 3);
}

#[tokio::test]
async fn invalid_carts_are_rejected_before_touching_storage() {
    let harness = Harness::new();
    let shoes = harness.seed_variant("50.00", 10).await;

    let empty = harness
        .builder()
        .create_order_draft(fixtures::draft_request("empty", &[]))
        .await
        .unwrap_err();
    assert_eq!(empty.status_code(), 400);
    assert_eq!(empty.to_string(), "Cart is empty");

    let negative = harness
        .builder()
        .create_order_draft(fixtures::draft_request("neg", &[(shoes, -1)]))
        .await
        .unwrap_err();
    assert_eq!(negative.to_string(), format!("Invalid quantity for variant {shoes}"));

    assert!(harness.store.customers().await.is_empty());
    assert!(harness.store.orders().await.is_empty());
}

#[tokio::test]
async fn unknown_variant_fails_with_no_side_effects() {
    let harness = Harness::new();
    let shoes = harness.seed_variant("50.00", 10).await;
    let ghost = drop_commerce_core::types::VariantId::new();

    let err = harness
        .builder()
        .create_order_draft(fixtures::draft_request("ghost", &[(shoes, 1), (ghost, 1)]))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::VariantUnavailable(id) if id == ghost));
    assert_eq!(err.status_code(), 404);
    assert!(harness.store.orders().await.is_empty());
    assert!(harness.store.customers().await.is_empty());
    assert_eq!(harness.store.inventory(shoes).await.unwrap().quantity_reserved, 0);
}

#[tokio::test]
async fn out_of_stock_rolls_back_every_line() {
    let harness = Harness::new();
    let plenty = harness.seed_variant("10.00", 10).await;
    let scarce = harness.seed_variant("10.00", 1).await;

    let err = harness
        .builder()
        .create_order_draft(fixtures::draft_request("partial", &[(plenty, 4), (scarce, 2)]))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::OutOfStock(id) if id == scarce));
    assert_eq!(err.status_code(), 409);
    assert_eq!(harness.store.inventory(plenty).await.unwrap().quantity_reserved, 0);
    assert_eq!(harness.store.inventory(scarce).await.unwrap().quantity_reserved, 0);
    assert!(harness.store.reservations().await.is_empty());
    assert!(harness.store.orders().await.is_empty());
    assert!(harness.store.payments().await.is_empty());
}

#[tokio::test]
async fn oversized_line_is_out_of_stock_after_a_partial_sale() {
    let harness = Harness::new();
    let variant = harness.seed_variant("10.00", 5).await;
    harness
        .builder()
        .create_order_draft(fixtures::draft_request("a", &[(variant, 1)]))
        .await
        .expect("first draft");

    let err = harness
        .builder()
        .create_order_draft(fixtures::draft_request("b", &[(variant, i32::MAX)]))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::OutOfStock(id) if id == variant));
    assert_eq!(err.status_code(), 409);
    assert_eq!(harness.store.inventory(variant).await.unwrap().quantity_reserved, 1);
    assert_eq!(harness.store.orders().await.len(), 1);
    assert_eq!(harness.store.payments().await.len(), 1);
}

#[tokio::test]
async fn mixed_currencies_are_rejected() {
    let harness = Harness::new();
    let eur = harness.seed_variant("10.00", 10).await;
    let mut usd_stock = fixtures::variant("10.00", 10);
    usd_stock.variant.currency = Currency::Usd;
    let usd = usd_stock.variant.id;
    harness.store.seed_variant(usd_stock).await;

    let err = harness
        .builder()
        .create_order_draft(fixtures::draft_request("fx", &[(eur, 1), (usd, 1)]))
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 400);
    assert_eq!(harness.store.inventory(eur).await.unwrap().quantity_reserved, 0);
}

#[tokio::test]
async fn two_concurrent_checkouts_for_five_units_sell_only_three() {
    let harness = Harness::new();
    let variant = harness.seed_variant("180.00", 5).await;

    let first = {
        let builder = harness.builder();
        tokio::spawn(async move {
            builder
                .create_order_draft(fixtures::draft_request("attempt-a", &[(variant, 3)]))
                .await
        })
    };
    let second = {
        let builder = harness.builder();
        tokio::spawn(async move {
            builder
                .create_order_draft(fixtures::draft_request("attempt-b", &[(variant, 3)]))
                .await
        })
    };
    let outcomes = [first.await.unwrap(), second.await.unwrap()];

    let created: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
    let refused: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().err()).collect();
    assert_eq!(created.len(), 1);
    assert_eq!(refused.len(), 1);
    assert!(matches!(refused[0], EngineError::OutOfStock(id) if *id == variant));
    assert_eq!(created[0].reservations[0].quantity, 3);

    assert_eq!(harness.store.inventory(variant).await.unwrap().quantity_reserved, 3);
    assert_eq!(harness.store.orders().await.len(), 1);
}

#[tokio::test]
async fn same_key_twice_creates_one_order() {
    let harness = Harness::new();
    let variant = harness.seed_variant("60.00", 10).await;
    let builder = harness.builder();

    builder
        .create_order_draft(fixtures::draft_request("retry-me", &[(variant, 2)]))
        .await
        .expect("first attempt");
    let err = builder
        .create_order_draft(fixtures::draft_request("retry-me", &[(variant, 2)]))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::IdempotencyConflict));
    assert_eq!(err.status_code(), 409);
    assert_eq!(harness.store.orders().await.len(), 1);
    assert_eq!(harness.store.reservations().await.len(), 1);
    assert_eq!(harness.store.inventory(variant).await.unwrap().quantity_reserved, 2);
}

#[tokio::test]
async fn same_key_concurrently_creates_one_order() {
    let harness = Harness::new();
    let variant = harness.seed_variant("60.00", 100).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let builder = harness.builder();
            tokio::spawn(async move {
                builder
                    .create_order_draft(fixtures::draft_request("double-submit", &[(variant, 1)]))
                    .await
            })
        })
        .collect();
    let outcomes = futures::future::join_all(handles).await;

    let created = outcomes.iter().filter(|o| matches!(o, Ok(Ok(_)))).count();
    let conflicts = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(Err(EngineError::IdempotencyConflict))))
        .count();
    assert_eq!(created, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(harness.store.orders().await.len(), 1);
    assert_eq!(harness.store.inventory(variant).await.unwrap().quantity_reserved, 1);
}

#[tokio::test]
async fn customer_is_upserted_by_email() {
    let harness = Harness::new();
    let variant = harness.seed_variant("60.00", 10).await;
    let builder = harness.builder();

    let mut first = fixtures::draft_request("c-1", &[(variant, 1)]);
    first.customer = CustomerInput {
        email: "buyer@example.com".into(),
        name: Some("Rui".into()),
        phone: Some("+351911111111".into()),
        vat_number: None,
        marketing_opt_in: Some(true),
    };
    let a = builder.create_order_draft(first).await.expect("first");

    let mut second = fixtures::draft_request("c-2", &[(variant, 1)]);
    second.customer = CustomerInput {
        email: "buyer@example.com".into(),
        vat_number: Some("PT123456789".into()),
        ..CustomerInput::default()
    };
    let b = builder.create_order_draft(second).await.expect("second");

    assert_eq!(a.customer.id, b.customer.id);
    let customers = harness.store.customers().await;
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0].name.as_deref(), Some("Rui"));
    assert_eq!(customers[0].vat_number.as_deref(), Some("PT123456789"));
    assert!(customers[0].marketing_opt_in);
}

#[tokio::test]
async fn billing_address_defaults_to_shipping() {
    let harness = Harness::new();
    let variant = harness.seed_variant("60.00", 10).await;

    let draft = harness
        .builder()
        .create_order_draft(fixtures::draft_request("addr-1", &[(variant, 1)]))
        .await
        .expect("draft");
    assert_eq!(draft.order.billing_address, draft.order.shipping_address);

    let billing = Address {
        line1: "Avenida da Liberdade 1".into(),
        ..fixtures::address()
    };
    let mut request = fixtures::draft_request("addr-2", &[(variant, 1)]);
    request.billing_address = Some(billing.clone());
    let draft = harness.builder().create_order_draft(request).await.expect("draft");
    assert_eq!(draft.order.billing_address, billing);
    assert_eq!(draft.order.shipping_address, fixtures::address());
}

#[tokio::test]
async fn checkout_creates_intent_and_attaches_it() {
    let harness = Harness::new();
    let variant = harness.seed_variant("100.00", 10).await;
    let gateway = MockPaymentGateway::new().with_status("requires_capture");

    let receipt = harness
        .checkout(Some(&gateway))
        .checkout(fixtures::draft_request("pay-1", &[(variant, 3)]))
        .await
        .expect("checkout");

    assert_eq!(receipt.amount, dec("369.00"));
    assert_eq!(receipt.currency, Currency::Eur);
    assert_eq!(receipt.payment_status, PaymentStatus::Authorized);
    assert_eq!(receipt.client_secret.as_deref(), Some("pi_mock_1_secret"));
    assert_eq!(receipt.reservation_expires_at, Some(epoch() + Duration::minutes(15)));

    let requests = gateway.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].amount_minor, 36_900);
    assert_eq!(requests[0].currency.provider_code(), "eur");
    assert_eq!(requests[0].idempotency_key, "pay-1");
    assert_eq!(requests[0].receipt_email.as_deref(), Some("buyer@example.com"));
    assert_eq!(
        requests[0].metadata.get("orderId"),
        Some(&receipt.order_id.to_string())
    );
    assert_eq!(requests[0].metadata.get("checkoutKey").map(String::as_str), Some("pay-1"));
    assert_eq!(
        requests[0].description,
        Some(format!("Drop order #{}", receipt.order_id))
    );
    let shipping = requests[0].shipping.as_ref().expect("shipping block");
    assert_eq!(shipping.name, "buyer@example.com");
    assert_eq!(shipping.phone, None);
    assert_eq!(shipping.address, fixtures::address());

    let payments = harness.store.payments().await;
    let (payment, raw) = &payments[0];
    assert_eq!(payment.payment_intent_id.as_deref(), Some(receipt.payment_intent_id.as_str()));
    assert_eq!(payment.status, PaymentStatus::Authorized);
    assert_eq!(raw.as_ref().and_then(|r| r["status"].as_str()), Some("requires_capture"));
}

#[tokio::test]
async fn checkout_without_provider_is_unavailable_and_reserves_nothing() {
    let harness = Harness::new();
    let variant = harness.seed_variant("100.00", 10).await;

    let err = harness
        .checkout(None)
        .checkout(fixtures::draft_request("no-provider", &[(variant, 1)]))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::PaymentUnavailable));
    assert_eq!(err.status_code(), 503);
    assert!(harness.store.orders().await.is_empty());
    assert_eq!(harness.store.inventory(variant).await.unwrap().quantity_reserved, 0);
}

#[tokio::test]
async fn provider_failure_keeps_draft_and_blocks_retry() {
    let harness = Harness::new();
    let variant = harness.seed_variant("100.00", 10).await;
    let gateway = MockPaymentGateway::new().failing(PaymentGatewayError::Unavailable("down".into()));
    let service = harness.checkout(Some(&gateway));

    let err = service
        .checkout(fixtures::draft_request("flaky", &[(variant, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Payment(_)));
    assert_eq!(err.status_code(), 502);

    assert_eq!(harness.store.orders().await.len(), 1);
    assert_eq!(harness.store.inventory(variant).await.unwrap().quantity_reserved, 1);

    let retry = service
        .checkout(fixtures::draft_request("flaky", &[(variant, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(retry, EngineError::IdempotencyConflict));
    assert_eq!(harness.store.inventory(variant).await.unwrap().quantity_reserved, 1);
}

#[tokio::test]
async fn converting_keeps_stock_sold_and_blocks_the_key() {
    let harness = Harness::new();
    let variant = harness.seed_variant("100.00", 10).await;
    harness
        .builder()
        .create_order_draft(fixtures::draft_request("paid", &[(variant, 2)]))
        .await
        .expect("draft");
    let key = drop_commerce_core::types::IdempotencyKey::new("paid").unwrap();

    let converted = harness.lifecycle().convert_checkout(&key).await.expect("convert");
    assert_eq!(converted.len(), 1);
    assert_eq!(converted[0].status, ReservationStatus::Converted);
    assert_eq!(harness.store.inventory(variant).await.unwrap().quantity_reserved, 2);

    assert!(harness.lifecycle().convert_checkout(&key).await.unwrap().is_empty());

    harness.advance(Duration::hours(1));
    assert_eq!(harness.sweeper().reclaim_expired().await.unwrap().reclaimed, 0);

    let err = harness
        .builder()
        .create_order_draft(fixtures::draft_request("paid", &[(variant, 2)]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::IdempotencyConflict));
}

#[tokio::test]
async fn cancelling_returns_stock_and_frees_the_key() {
    let harness = Harness::new();
    let variant = harness.seed_variant("100.00", 4).await;
    harness
        .builder()
        .create_order_draft(fixtures::draft_request("abandon", &[(variant, 4)]))
        .await
        .expect("draft");
    let key = drop_commerce_core::types::IdempotencyKey::new("abandon").unwrap();

    let cancelled = harness.lifecycle().cancel_checkout(&key).await.expect("cancel");
    assert_eq!(cancelled.len(), 1);
    assert_eq!(harness.store.inventory(variant).await.unwrap().quantity_reserved, 0);

    let again = harness
        .builder()
        .create_order_draft(fixtures::draft_request("abandon", &[(variant, 4)]))
        .await
        .expect("key is free once cancelled");
    assert_eq!(again.reservations[0].quantity, 4);
}

#[tokio::test]
async fn lifecycle_on_unknown_key_is_not_found() {
    let harness = Harness::new();
    let key = drop_commerce_core::types::IdempotencyKey::new("never-used").unwrap();

    let err = harness.lifecycle().cancel_checkout(&key).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
}
