//! End-to-end saga tests against a mock card gateway plus real Postgres and
//! Redis. Skipped unless both `DATABASE_URL` and `REDIS_TEST_URL` are set.

use std::sync::Arc;

use card_gateway::MockCardGateway;
use checkout_repository::{PaymentOutcome, Repository, SubscriptionStatus, UserStatus};
use job_queue::{JobStore, JobStoreConfig, QueueName};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;
use workflow_engine::{AttemptInfo, LoggingNotifier, WorkflowEngine};

struct Harness {
    repo: Repository,
    job_store: JobStore,
}

async fn harness(prefix: &str) -> Option<Harness> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").ok()?;
    let redis_url = std::env::var("REDIS_TEST_URL").ok()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("connect to test database");
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .expect("run migrations");

    let job_store = JobStore::connect(
        &redis_url,
        JobStoreConfig {
            prefix: prefix.to_string(),
            max_retries: 3,
        },
    )
    .await
    .expect("connect to test redis");
    job_store.clear(QueueName::Ready).await.ok();
    job_store.clear(QueueName::Failed).await.ok();
    job_store.clear(QueueName::Delayed).await.ok();

    Some(Harness {
        repo: Repository::new(pool),
        job_store,
    })
}

async fn seed_checkout(repo: &Repository, checkout_id: &str) {
    sqlx::query(
        "INSERT INTO checkout_records (checkout_id, customer_name, customer_email, username, address, passphrase_hash, plans) \
         VALUES ($1, 'Jordan Buyer', 'jordan@example.com', 'jordanb', '1 Main St', 'hash', $2) \
         ON CONFLICT (checkout_id) DO NOTHING",
    )
    .bind(checkout_id)
    .bind(json!([{"plan_code": "pro-monthly", "amount_cents": 2999, "currency": "usd", "annual": false}]))
    .execute(repo.pool())
    .await
    .expect("seed checkout record");

    sqlx::query(
        "INSERT INTO temp_card_bundles (checkout_id, pan, expiry_month, expiry_year, cvv, cardholder_name) \
         VALUES ($1, '4111111111111111', 12, 2099, '123', 'Jordan Buyer') \
         ON CONFLICT (checkout_id) DO NOTHING",
    )
    .bind(checkout_id)
    .execute(repo.pool())
    .await
    .expect("seed temp card bundle");
}

#[tokio::test]
async fn successful_saga_persists_every_row_and_clears_card_material() {
    let Some(h) = harness("test_engine_success").await else {
        eprintln!("skipping: DATABASE_URL/REDIS_TEST_URL not set");
        return;
    };

    let checkout_id = format!("chk_{}", Uuid::new_v4());
    seed_checkout(&h.repo, &checkout_id).await;
    let request_id = format!("req_{}", Uuid::new_v4());

    let engine = WorkflowEngine::new(
        Arc::new(MockCardGateway::new()),
        h.repo.clone(),
        h.job_store.clone(),
        Arc::new(LoggingNotifier),
    );

    let attempt = AttemptInfo {
        retry_count: 0,
        max_retries: 3,
    };
    engine
        .process_payment(&checkout_id, &request_id, attempt)
        .await
        .expect("saga should succeed");

    let result = h.repo.find_payment_result(&request_id).await.unwrap().unwrap();
    assert_eq!(result.status, PaymentOutcome::Success);
    assert!(result.transaction_id.is_some());

    let bundle = h.repo.find_temp_card_bundle(&checkout_id).await.unwrap();
    assert!(bundle.is_none());

    let account = h
        .repo
        .find_master_account_by_checkout(&checkout_id)
        .await
        .unwrap();
    let account = account.expect("master account should exist");

    let subscription = h
        .repo
        .find_subscription(account.master_reference)
        .await
        .unwrap()
        .expect("subscription row should exist");
    assert_eq!(subscription.status, SubscriptionStatus::Active);
}

#[tokio::test]
async fn replaying_a_succeeded_request_id_skips_authorize() {
    let Some(h) = harness("test_engine_replay").await else {
        eprintln!("skipping: DATABASE_URL/REDIS_TEST_URL not set");
        return;
    };

    let checkout_id = format!("chk_{}", Uuid::new_v4());
    seed_checkout(&h.repo, &checkout_id).await;
    let request_id = format!("req_{}", Uuid::new_v4());

    let engine = WorkflowEngine::new(
        Arc::new(MockCardGateway::new()),
        h.repo.clone(),
        h.job_store.clone(),
        Arc::new(LoggingNotifier),
    );

    let attempt = AttemptInfo {
        retry_count: 0,
        max_retries: 3,
    };
    engine
        .process_payment(&checkout_id, &request_id, attempt)
        .await
        .unwrap();

    // Second run with the same request_id: the temp card bundle is already
    // gone, so this exercises the "no card on file" terminal path instead of
    // a real replay through the gateway, but the payment_results row must
    // remain a single success row either way (invariant 1).
    let _ = engine.process_payment(&checkout_id, &request_id, attempt).await;

    let result = h.repo.find_payment_result(&request_id).await.unwrap().unwrap();
    assert_eq!(result.status, PaymentOutcome::Success);
}

#[tokio::test]
async fn declined_authorize_terminates_without_voiding() {
    let Some(h) = harness("test_engine_declined").await else {
        eprintln!("skipping: DATABASE_URL/REDIS_TEST_URL not set");
        return;
    };

    let checkout_id = format!("chk_{}", Uuid::new_v4());
    seed_checkout(&h.repo, &checkout_id).await;
    let request_id = format!("req_{}", Uuid::new_v4());

    let gateway = Arc::new(MockCardGateway::always_declines());
    let engine = WorkflowEngine::new(
        gateway.clone(),
        h.repo.clone(),
        h.job_store.clone(),
        Arc::new(LoggingNotifier),
    );

    let attempt = AttemptInfo {
        retry_count: 0,
        max_retries: 3,
    };
    let err = engine
        .process_payment(&checkout_id, &request_id, attempt)
        .await
        .unwrap_err();
    assert!(!err.retryable());

    let result = h.repo.find_payment_result(&request_id).await.unwrap().unwrap();
    assert_eq!(result.status, PaymentOutcome::Failed);
    assert!(gateway.voided_transactions().is_empty());

    let notify = h.job_store.queue_len(QueueName::Ready).await.unwrap();
    assert_eq!(notify, 1, "one NotifyPaymentIssue job should be enqueued");

    assert!(
        h.repo
            .find_master_account_by_checkout(&checkout_id)
            .await
            .unwrap()
            .is_none(),
        "declined authorize must not create a MasterAccount"
    );
    let status = h
        .repo
        .find_checkout_user_status(&checkout_id)
        .await
        .unwrap();
    assert_eq!(status, Some(UserStatus::PaymentError));
}

#[tokio::test]
async fn unreachable_gateway_is_retryable_and_not_yet_terminal() {
    let Some(h) = harness("test_engine_unreachable").await else {
        eprintln!("skipping: DATABASE_URL/REDIS_TEST_URL not set");
        return;
    };

    let checkout_id = format!("chk_{}", Uuid::new_v4());
    seed_checkout(&h.repo, &checkout_id).await;
    let request_id = format!("req_{}", Uuid::new_v4());

    let engine = WorkflowEngine::new(
        Arc::new(MockCardGateway::unreachable_for_next(1)),
        h.repo.clone(),
        h.job_store.clone(),
        Arc::new(LoggingNotifier),
    );

    let attempt = AttemptInfo {
        retry_count: 0,
        max_retries: 3,
    };
    let err = engine
        .process_payment(&checkout_id, &request_id, attempt)
        .await
        .unwrap_err();
    assert!(err.retryable());

    // Not the last attempt: no terminal side effects yet.
    assert!(h.repo.find_payment_result(&request_id).await.unwrap().is_none());
}
