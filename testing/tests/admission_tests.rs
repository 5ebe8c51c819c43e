//! Drop admission engine tests.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use chrono::Duration;
use drop_commerce_core::admission::DropAdmissionEngine;
use drop_commerce_core::hashing::sha256_hex;
use drop_commerce_core::risk::{
    DUPLICATE_FINGERPRINT, IP_RATE_LIMIT, RiskPolicy, RiskProbe, RiskRule, RiskSignal, TicketTrace,
};
use drop_commerce_core::types::{DropId, TicketId, TicketStatus};
use drop_commerce_testing::{Harness, InMemoryStore, epoch, fixtures};
use std::sync::Arc;

struct FixedScore(f64);

impl RiskRule for FixedScore {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn lookback(&self) -> Duration {
        Duration::minutes(1)
    }

    fn evaluate(&self, _probe: &RiskProbe<'_>, _history: &[TicketTrace]) -> Option<RiskSignal> {
        Some(RiskSignal {
            score: self.0,
            reason: "fixed".to_string(),
        })
    }
}

fn engine_with_score(harness: &Harness, score: f64) -> DropAdmissionEngine<InMemoryStore> {
    DropAdmissionEngine::with_policy(
        harness.store.clone(),
        Arc::new(harness.clock.clone()),
        Arc::new(RiskPolicy::empty().with_rule(FixedScore(score))),
        harness.config.risk_rejection_threshold,
    )
}

#[tokio::test]
async fn first_join_is_queued_at_position_one() {
    let harness = Harness::new();
    let drop = harness.seed_open_drop().await;

    let ticket = harness
        .admission()
        .join_queue(fixtures::join_request(drop.id, "c@example.com", Some("fp-1"), Some("198.51.100.7")))
        .await
        .expect("join");

    assert_eq!(ticket.status, TicketStatus::Queued);
    assert_eq!(ticket.position, Some(1));
    assert_eq!(ticket.estimated_wait_minutes, Some(0));
    assert_eq!(ticket.risk_score, 0.0);
    assert_eq!(ticket.risk_reason, None);
    assert_eq!(ticket.drop_summary.id, drop.id);
    assert_eq!(ticket.drop_summary.reserve_minutes, 10);

    let stored = harness.store.tickets(drop.id).await;
    assert_eq!(stored[0].fingerprint_hash.as_deref(), Some(sha256_hex("fp-1").as_str()));
    assert_eq!(stored[0].ip_hash.as_deref(), Some(sha256_hex("198.51.100.7").as_str()));
    assert!(stored[0].user_agent_hash.is_some());
}

#[tokio::test]
async fn reused_fingerprint_within_ten_minutes_is_rejected() {
    let harness = Harness::new();
    let drop = harness.seed_open_drop().await;
    let engine = harness.admission();

    let first = engine
        .join_queue(fixtures::join_request(drop.id, "c@example.com", Some("F"), None))
        .await
        .unwrap();
    assert_eq!(first.position, Some(1));

    harness.advance(Duration::minutes(5));
    let second = engine
        .join_queue(fixtures::join_request(drop.id, "other@example.com", Some("F"), None))
        .await
        .unwrap();

    assert_eq!(second.status, TicketStatus::Rejected);
    assert!((second.risk_score - 0.90).abs() < f64::EPSILON);
    assert_eq!(second.risk_reason.as_deref(), Some(DUPLICATE_FINGERPRINT));
    assert_eq!(second.position, None);
    assert_eq!(second.estimated_wait_minutes, None);
}

#[tokio::test]
async fn fingerprint_reuse_after_the_window_is_admitted() {
    let harness = Harness::new();
    let drop = harness.seed_open_drop().await;
    let engine = harness.admission();

    engine
        .join_queue(fixtures::join_request(drop.id, "c@example.com", Some("F"), None))
        .await
        .unwrap();
    harness.advance(Duration::minutes(11));
    let later = engine
        .join_queue(fixtures::join_request(drop.id, "other@example.com", Some("F"), None))
        .await
        .unwrap();

    assert_eq!(later.status, TicketStatus::Queued);
    assert_eq!(later.position, Some(2));
}

#[tokio::test]
async fn fingerprint_on_another_drop_does_not_count() {
    let harness = Harness::new();
    let first_drop = harness.seed_open_drop().await;
    let second_drop = harness.seed_open_drop().await;
    let engine = harness.admission();

    engine
        .join_queue(fixtures::join_request(first_drop.id, "c@example.com", Some("F"), None))
        .await
        .unwrap();
    let other = engine
        .join_queue(fixtures::join_request(second_drop.id, "d@example.com", Some("F"), None))
        .await
        .unwrap();

    assert_eq!(other.status, TicketStatus::Queued);
    assert_eq!(other.position, Some(1));
}

#[tokio::test]
async fn more_than_five_joins_from_one_ip_are_rejected() {
    let harness = Harness::new();
    let drop = harness.seed_open_drop().await;
    let engine = harness.admission();

    for i in 0..6 {
        let ticket = engine
            .join_queue(fixtures::join_request(
                drop.id,
                &format!("bot{i}@example.com"),
                Some(&format!("fp-{i}")),
                Some("203.0.113.50"),
            ))
            .await
            .unwrap();
        assert_eq!(ticket.status, TicketStatus::Queued, "join {i}");
        harness.advance(Duration::minutes(1));
    }

    let seventh = engine
        .join_queue(fixtures::join_request(drop.id, "bot6@example.com", Some("fp-6"), Some("203.0.113.50")))
        .await
        .unwrap();

    assert_eq!(seventh.status, TicketStatus::Rejected);
    assert!((seventh.risk_score - 0.95).abs() < f64::EPSILON);
    assert_eq!(seventh.risk_reason.as_deref(), Some(IP_RATE_LIMIT));
}

#[tokio::test]
async fn ip_rule_upgrades_fingerprint_score() {
    let harness = Harness::new();
    let drop = harness.seed_open_drop().await;
    let engine = harness.admission();

    for i in 0..6 {
        engine
            .join_queue(fixtures::join_request(
                drop.id,
                &format!("u{i}@example.com"),
                if i == 0 { Some("shared") } else { None },
                Some("203.0.113.99"),
            ))
            .await
            .unwrap();
    }

    let ticket = engine
        .join_queue(fixtures::join_request(drop.id, "late@example.com", Some("shared"), Some("203.0.113.99")))
        .await
        .unwrap();

    assert!((ticket.risk_score - 0.95).abs() < f64::EPSILON);
    assert_eq!(ticket.risk_reason.as_deref(), Some(IP_RATE_LIMIT));
}

#[tokio::test]
async fn score_exactly_at_threshold_is_rejected() {
    let harness = Harness::new();
    let drop = harness.seed_open_drop().await;

    let ticket = engine_with_score(&harness, 0.85)
        .join_queue(fixtures::join_request(drop.id, "edge@example.com", None, None))
        .await
        .unwrap();

    assert_eq!(ticket.status, TicketStatus::Rejected);
    assert_eq!(ticket.position, None);
}

#[tokio::test]
async fn score_just_below_threshold_is_queued() {
    let harness = Harness::new();
    let drop = harness.seed_open_drop().await;

    let ticket = engine_with_score(&harness, 0.849_99)
        .join_queue(fixtures::join_request(drop.id, "edge@example.com", None, None))
        .await
        .unwrap();

    assert_eq!(ticket.status, TicketStatus::Queued);
    assert_eq!(ticket.position, Some(1));
    assert_eq!(ticket.risk_reason.as_deref(), Some("fixed"));
}

#[tokio::test]
async fn rejoining_returns_the_same_ticket() {
    let harness = Harness::new();
    let drop = harness.seed_open_drop().await;
    let engine = harness.admission();

    let first = engine
        .join_queue(fixtures::join_request(drop.id, "again@example.com", Some("fp"), None))
        .await
        .unwrap();
    harness.advance(Duration::minutes(2));
    let second = engine
        .join_queue(fixtures::join_request(drop.id, "again@example.com", Some("fp"), None))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(harness.store.tickets(drop.id).await.len(), 1);
}

#[tokio::test]
async fn missing_disabled_and_ended_drops_are_refused() {
    let harness = Harness::new();
    let engine = harness.admission();

    let missing = engine
        .join_queue(fixtures::join_request(DropId::new(), "x@example.com", None, None))
        .await
        .unwrap_err();
    assert_eq!(missing.status_code(), 404);

    let mut disabled = fixtures::open_drop();
    disabled.queue_enabled = false;
    harness.store.seed_drop(disabled.clone()).await;
    let err = engine
        .join_queue(fixtures::join_request(disabled.id, "x@example.com", None, None))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);

    let mut ended = fixtures::open_drop();
    ended.end_at = Some(epoch() - Duration::minutes(1));
    harness.store.seed_drop(ended.clone()).await;
    let err = engine
        .join_queue(fixtures::join_request(ended.id, "x@example.com", None, None))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);

    assert!(harness.store.customers().await.is_empty());
}

#[tokio::test]
async fn concurrent_joins_get_gapless_positions_in_admission_order() {
    let harness = Harness::new();
    let drop = harness.seed_open_drop().await;

    let handles: Vec<_> = (0..25)
        .map(|i| {
            let engine = harness.admission();
            let request = fixtures::join_request(
                drop.id,
                &format!("fan{i}@example.com"),
                Some(&format!("device-{i}")),
                Some(&format!("192.0.2.{i}")),
            );
            tokio::spawn(async move { engine.join_queue(request).await })
        })
        .collect();
    for outcome in futures::future::join_all(handles).await {
        assert_eq!(outcome.unwrap().unwrap().status, TicketStatus::Queued);
    }

    let positions: Vec<i32> = harness
        .store
        .tickets(drop.id)
        .await
        .iter()
        .filter_map(|t| t.position)
        .collect();
    assert_eq!(positions, (1..=25).collect::<Vec<_>>());
}

#[tokio::test]
async fn rejected_joins_do_not_consume_positions() {
    let harness = Harness::new();
    let drop = harness.seed_open_drop().await;
    let engine = harness.admission();

    engine
        .join_queue(fixtures::join_request(drop.id, "a@example.com", Some("dup"), None))
        .await
        .unwrap();
    engine
        .join_queue(fixtures::join_request(drop.id, "b@example.com", Some("dup"), None))
        .await
        .unwrap();
    let third = engine
        .join_queue(fixtures::join_request(drop.id, "c@example.com", Some("unique"), None))
        .await
        .unwrap();

    assert_eq!(third.position, Some(2));
}

#[tokio::test]
async fn ticket_status_query_derives_wait_estimate() {
    let harness = Harness::new();
    let drop = harness.seed_open_drop().await;
    let engine = harness.admission();

    let mut last = None;
    for i in 0..3 {
        last = Some(
            engine
                .join_queue(fixtures::join_request(drop.id, &format!("q{i}@example.com"), None, None))
                .await
                .unwrap(),
        );
    }
    let third = last.unwrap();

    let view = engine.get_ticket(drop.id, third.ticket_id).await.expect("ticket");
    assert_eq!(view.position, Some(3));
    assert_eq!(view.estimated_wait_minutes, Some(20));

    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["ticketId"], serde_json::json!(third.ticket_id));
    assert_eq!(json["estimatedWaitMinutes"], 20);
    assert_eq!(json["status"], "QUEUED");
    assert_eq!(json["drop"]["reserveMinutes"], 10);
    assert!(json["drop"]["endAt"].is_null());
}

#[tokio::test]
async fn ticket_lookup_is_scoped_to_its_drop() {
    let harness = Harness::new();
    let drop = harness.seed_open_drop().await;
    let other = harness.seed_open_drop().await;
    let engine = harness.admission();

    let ticket = engine
        .join_queue(fixtures::join_request(drop.id, "s@example.com", None, None))
        .await
        .unwrap();

    assert_eq!(
        engine.get_ticket(other.id, ticket.ticket_id).await.unwrap_err().status_code(),
        404
    );
    assert_eq!(
        engine.get_ticket(drop.id, TicketId::new()).await.unwrap_err().status_code(),
        404
    );
    assert_eq!(
        engine.get_ticket(DropId::new(), ticket.ticket_id).await.unwrap_err().status_code(),
        404
    );
}
