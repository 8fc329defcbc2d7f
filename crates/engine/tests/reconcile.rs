use chrono::{DateTime, Duration, TimeZone, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};

use engine::{
    EmailEvent, EmailStatus, Engine, EngineError, IgnoreReason, ReconcileOutcome, WebhookPayload,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

async fn engine_with_file_db() -> (Engine, std::path::PathBuf) {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("engine_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();

    (engine, path)
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
}

fn webhook(event_type: &str, message_id: &str, at: DateTime<Utc>) -> WebhookPayload {
    WebhookPayload {
        event_type: event_type.to_string(),
        message_id: message_id.to_string(),
        recipient: "alice@example.com".to_string(),
        error: None,
        created_at: Some(at.to_rfc3339()),
    }
}

fn raw(payload: &WebhookPayload) -> Vec<u8> {
    format!(
        r#"{{"type":"{}","data":{{"email_id":"{}"}}}}"#,
        payload.event_type, payload.message_id
    )
    .into_bytes()
}

async fn apply(engine: &Engine, payload: &WebhookPayload) -> ReconcileOutcome {
    engine.handle_event(&raw(payload), payload).await.unwrap()
}

#[tokio::test]
async fn unknown_event_type_is_acknowledged_without_writes() {
    let (engine, _db) = engine_with_db().await;

    let outcome = apply(&engine, &webhook("email.opened", "msg-1", base_time())).await;

    assert_eq!(
        outcome,
        ReconcileOutcome::Ignored(IgnoreReason::UnknownEventType("email.opened".to_string()))
    );
    assert!(engine.events_for("msg-1").await.unwrap().is_empty());
    assert_eq!(engine.message("msg-1").await.unwrap(), None);
}

#[tokio::test]
async fn blank_recipient_is_acknowledged_without_writes() {
    let (engine, _db) = engine_with_db().await;
    let mut payload = webhook("email.bounced", "msg-1", base_time());
    payload.recipient = "  ".to_string();

    let outcome = apply(&engine, &payload).await;

    assert_eq!(
        outcome,
        ReconcileOutcome::Ignored(IgnoreReason::MissingRecipient)
    );
    assert!(engine.events_for("msg-1").await.unwrap().is_empty());
    assert!(engine.suppressions().await.unwrap().is_empty());
}

#[tokio::test]
async fn first_event_seeds_message_row() {
    let (engine, _db) = engine_with_db().await;

    let outcome = apply(&engine, &webhook("email.delivered", "msg-1", base_time())).await;

    let ReconcileOutcome::Applied(applied) = outcome else {
        panic!("event should be applied");
    };
    assert!(applied.advanced);
    assert!(!applied.suppressed);

    let message = engine.message("msg-1").await.unwrap().unwrap();
    assert_eq!(message.status, EmailStatus::Delivered);
    assert_eq!(message.recipient, "alice@example.com");
    assert_eq!(message.last_event_at, base_time());
    assert_eq!(message.last_error, None);
}

#[tokio::test]
async fn replaying_an_event_is_idempotent() {
    let (engine, _db) = engine_with_db().await;
    let payload = webhook("email.delivered", "msg-1", base_time());

    apply(&engine, &payload).await;
    let message_once = engine.message("msg-1").await.unwrap();
    let ledger_once = engine.events_for("msg-1").await.unwrap();

    for _ in 0..3 {
        let ReconcileOutcome::Applied(applied) = apply(&engine, &payload).await else {
            panic!("replay should still be applied");
        };
        assert!(!applied.advanced);
    }

    assert_eq!(engine.message("msg-1").await.unwrap(), message_once);
    let ledger = engine.events_for("msg-1").await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger, ledger_once);
}

#[tokio::test]
async fn status_never_regresses_whatever_the_arrival_order() {
    let (engine, _db) = engine_with_db().await;
    let kinds = ["email.bounced", "email.delivered", "email.sent"];
    let orders = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    for (n, order) in orders.iter().enumerate() {
        let message_id = format!("msg-{n}");
        for (offset, index) in order.iter().enumerate() {
            let at = base_time() + Duration::seconds(offset as i64);
            apply(&engine, &webhook(kinds[*index], &message_id, at)).await;
        }

        let message = engine.message(&message_id).await.unwrap().unwrap();
        assert_eq!(message.status, EmailStatus::Bounced, "order {order:?}");
        assert_eq!(engine.events_for(&message_id).await.unwrap().len(), 3);
    }
}

#[tokio::test]
async fn last_event_at_converges_to_latest_observation() {
    let (engine, _db) = engine_with_db().await;
    let offsets = [5, 1, 3];
    let kinds = ["email.sent", "email.delivered", "email.bounced"];

    for (kind, offset) in kinds.iter().zip(offsets) {
        let at = base_time() + Duration::seconds(offset);
        apply(&engine, &webhook(kind, "msg-1", at)).await;
    }

    let message = engine.message("msg-1").await.unwrap().unwrap();
    assert_eq!(message.last_event_at, base_time() + Duration::seconds(5));
    assert_eq!(message.status, EmailStatus::Bounced);
}

#[tokio::test]
async fn stale_duplicate_still_refreshes_last_event_at() {
    let (engine, _db) = engine_with_db().await;

    apply(&engine, &webhook("email.bounced", "msg-1", base_time())).await;
    let later = base_time() + Duration::minutes(10);
    let ReconcileOutcome::Applied(applied) =
        apply(&engine, &webhook("email.delivered", "msg-1", later)).await
    else {
        panic!("delivered should be applied");
    };

    assert!(!applied.advanced);
    assert_eq!(applied.message.status, EmailStatus::Bounced);
    assert_eq!(applied.message.last_event_at, later);
}

#[tokio::test]
async fn ledger_keeps_one_row_per_event_type() {
    let (engine, _db) = engine_with_db().await;

    apply(&engine, &webhook("email.delivered", "msg-1", base_time())).await;
    let mut bounce = webhook("email.bounced", "msg-1", base_time() + Duration::seconds(1));
    bounce.error = Some("mailbox unavailable".to_string());
    apply(&engine, &bounce).await;

    let later = base_time() + Duration::seconds(30);
    bounce.created_at = Some(later.to_rfc3339());
    bounce.error = Some("mailbox does not exist".to_string());
    apply(&engine, &bounce).await;

    let ledger = engine.events_for("msg-1").await.unwrap();
    assert_eq!(ledger.len(), 2);

    let delivered = ledger
        .iter()
        .find(|e| e.event_type == "email.delivered")
        .unwrap();
    assert_eq!(delivered.occurred_at, base_time());
    assert_eq!(delivered.error_text, None);

    let bounced = ledger
        .iter()
        .find(|e| e.event_type == "email.bounced")
        .unwrap();
    assert_eq!(bounced.occurred_at, later);
    assert_eq!(bounced.error_text.as_deref(), Some("mailbox does not exist"));
    assert_eq!(bounced.raw_payload, raw(&bounce));
}

#[tokio::test]
async fn last_error_is_only_replaced_by_non_blank_text() {
    let (engine, _db) = engine_with_db().await;

    let mut failed = webhook("email.failed", "msg-1", base_time());
    failed.error = Some("550 rejected".to_string());
    apply(&engine, &failed).await;

    let mut bounce = webhook("email.bounced", "msg-1", base_time() + Duration::seconds(1));
    bounce.error = Some("   ".to_string());
    apply(&engine, &bounce).await;

    let message = engine.message("msg-1").await.unwrap().unwrap();
    assert_eq!(message.status, EmailStatus::Bounced);
    assert_eq!(message.last_error.as_deref(), Some("550 rejected"));
}

#[tokio::test]
async fn first_bounce_suppresses_recipient_once() {
    let (engine, _db) = engine_with_db().await;

    let ReconcileOutcome::Applied(applied) =
        apply(&engine, &webhook("email.bounced", "msg-1", base_time())).await
    else {
        panic!("bounce should be applied");
    };
    assert!(applied.suppressed);

    let ReconcileOutcome::Applied(applied) = apply(
        &engine,
        &webhook("email.delivered", "msg-1", base_time() + Duration::seconds(1)),
    )
    .await
    else {
        panic!("delivered should be applied");
    };
    assert!(!applied.suppressed);

    let ReconcileOutcome::Applied(applied) = apply(
        &engine,
        &webhook("email.bounced", "msg-1", base_time() + Duration::seconds(2)),
    )
    .await
    else {
        panic!("repeat bounce should be applied");
    };
    assert!(!applied.suppressed);

    let suppressions = engine.suppressions().await.unwrap();
    assert_eq!(suppressions.len(), 1);
    assert_eq!(suppressions[0].recipient, "alice@example.com");
    assert_eq!(suppressions[0].reason, EmailStatus::Bounced);
    assert_eq!(suppressions[0].provider_message_id, "msg-1");
}

#[tokio::test]
async fn later_cause_only_refreshes_causing_message() {
    let (engine, _db) = engine_with_db().await;

    apply(&engine, &webhook("email.bounced", "msg-1", base_time())).await;
    let first = engine.suppression("alice@example.com").await.unwrap().unwrap();

    apply(
        &engine,
        &webhook("email.complained", "msg-2", base_time() + Duration::hours(1)),
    )
    .await;

    let suppressions = engine.suppressions().await.unwrap();
    assert_eq!(suppressions.len(), 1);
    assert_eq!(suppressions[0].reason, EmailStatus::Bounced);
    assert_eq!(suppressions[0].provider_message_id, "msg-2");
    assert_eq!(suppressions[0].created_at, first.created_at);
}

#[tokio::test]
async fn failed_delivery_does_not_suppress() {
    let (engine, _db) = engine_with_db().await;

    apply(&engine, &webhook("email.failed", "msg-1", base_time())).await;

    assert!(!engine.is_suppressed("alice@example.com").await.unwrap());
    assert_eq!(
        engine.message("msg-1").await.unwrap().unwrap().status,
        EmailStatus::Failed
    );
}

#[tokio::test]
async fn suppression_lookup_ignores_case_and_whitespace() {
    let (engine, _db) = engine_with_db().await;
    let mut payload = webhook("email.complained", "msg-1", base_time());
    payload.recipient = "Alice@Example.com".to_string();

    apply(&engine, &payload).await;

    assert!(engine.is_suppressed(" alice@example.COM").await.unwrap());
    let suppression = engine.suppression("alice@example.com").await.unwrap().unwrap();
    assert_eq!(suppression.reason, EmailStatus::Complained);
}

#[tokio::test]
async fn suppress_rejects_non_terminal_reasons() {
    let (engine, _db) = engine_with_db().await;

    let err = engine
        .suppress("alice@example.com", EmailStatus::Delivered, "msg-1")
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InvalidStatus(_)));
    assert!(!err.is_retryable());
    assert!(engine.suppressions().await.unwrap().is_empty());
}

#[tokio::test]
async fn merge_status_rejects_blank_message_id() {
    let (engine, _db) = engine_with_db().await;

    let err = engine
        .merge_status("  ", "alice@example.com", EmailStatus::Sent, base_time(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InvalidPayload(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_merges_converge_to_highest_rank() {
    let (engine, path) = engine_with_file_db().await;

    for round in 0..10 {
        let message_id = format!("msg-{round}");
        let delivered = {
            let engine = engine.clone();
            let message_id = message_id.clone();
            tokio::spawn(async move {
                engine
                    .merge_status(
                        &message_id,
                        "alice@example.com",
                        EmailStatus::Delivered,
                        base_time() + Duration::seconds(1),
                        None,
                    )
                    .await
            })
        };
        let bounced = {
            let engine = engine.clone();
            let message_id = message_id.clone();
            tokio::spawn(async move {
                engine
                    .merge_status(
                        &message_id,
                        "alice@example.com",
                        EmailStatus::Bounced,
                        base_time(),
                        Some("mailbox unavailable"),
                    )
                    .await
            })
        };

        let delivered = delivered.await.unwrap().unwrap();
        let bounced = bounced.await.unwrap().unwrap();
        assert!(bounced.advanced, "bounce always outranks what it finds");
        assert!(delivered.advanced || delivered.message.status == EmailStatus::Bounced);

        let message = engine.message(&message_id).await.unwrap().unwrap();
        assert_eq!(message.status, EmailStatus::Bounced);
        assert_eq!(message.last_event_at, base_time() + Duration::seconds(1));
        assert_eq!(message.last_error.as_deref(), Some("mailbox unavailable"));
    }

    drop(engine);
    let _ = std::fs::remove_file(path);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_deliveries_suppress_exactly_once() {
    let (engine, path) = engine_with_file_db().await;
    let kinds = ["email.delivered", "email.bounced", "email.bounced", "email.sent"];

    let mut handles = Vec::new();
    for (offset, kind) in kinds.iter().enumerate() {
        let engine = engine.clone();
        let payload = webhook(kind, "msg-1", base_time() + Duration::seconds(offset as i64));
        handles.push(tokio::spawn(async move {
            engine.handle_event(&raw(&payload), &payload).await
        }));
    }

    let mut suppressed = 0;
    for handle in handles {
        if let ReconcileOutcome::Applied(applied) = handle.await.unwrap().unwrap() {
            suppressed += usize::from(applied.suppressed);
        }
    }

    assert_eq!(suppressed, 1);
    assert_eq!(engine.suppressions().await.unwrap().len(), 1);
    assert_eq!(engine.events_for("msg-1").await.unwrap().len(), 3);
    let message = engine.message("msg-1").await.unwrap().unwrap();
    assert_eq!(message.status, EmailStatus::Bounced);
    assert_eq!(message.last_event_at, base_time() + Duration::seconds(3));

    drop(engine);
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn failed_suppression_rolls_back_ledger_and_status() {
    let (engine, db) = engine_with_db().await;
    db.execute_unprepared("DROP TABLE email_suppressions")
        .await
        .unwrap();
    let payload = webhook("email.bounced", "msg-1", base_time());

    let err = engine
        .handle_event(&raw(&payload), &payload)
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert!(engine.events_for("msg-1").await.unwrap().is_empty());
    assert_eq!(engine.message("msg-1").await.unwrap(), None);
}

#[tokio::test]
async fn record_event_upserts_on_message_and_type() {
    let (engine, _db) = engine_with_db().await;
    let mut event = EmailEvent {
        provider_message_id: "msg-1".to_string(),
        event_type: "email.bounced".to_string(),
        recipient: "alice@example.com".to_string(),
        error_text: None,
        occurred_at: base_time(),
        raw_payload: b"first".to_vec(),
    };

    engine.record_event(&event).await.unwrap();
    event.occurred_at = base_time() + Duration::seconds(3);
    event.error_text = Some("mailbox unavailable".to_string());
    event.raw_payload = b"second".to_vec();
    engine.record_event(&event).await.unwrap();

    let ledger = engine.events_for("msg-1").await.unwrap();
    assert_eq!(ledger, vec![event.clone()]);
    // The ledger alone never creates a message row.
    assert_eq!(engine.message("msg-1").await.unwrap(), None);

    event.provider_message_id = "  ".to_string();
    assert_eq!(
        engine.record_event(&event).await.unwrap_err(),
        EngineError::InvalidPayload("provider message id must not be empty".to_string())
    );
}
