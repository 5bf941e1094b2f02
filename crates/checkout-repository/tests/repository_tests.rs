//! Integration tests against a real Postgres instance.
//!
//! Skipped unless `DATABASE_URL` is set, matching the integration test style
//! used elsewhere in this workspace.

use checkout_repository::{
    InvoicePeriod, PaymentMethod, PaymentOutcome, Repository, Subscription, SubscriptionStatus,
    TransactionRecord, User, UserStatus,
};
use serial_test::serial;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

async fn setup() -> Option<Repository> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").ok()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("connect to test database");

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .expect("run migrations");

    Some(Repository::new(pool))
}

async fn seed_checkout(repo: &Repository, checkout_id: &str) {
    sqlx::query(
        "INSERT INTO checkout_records (checkout_id, customer_name, customer_email, username, address, passphrase_hash, plans) \
         VALUES ($1, 'Jordan Buyer', 'jordan@example.com', 'jordanb', '1 Main St', 'hash', '{}') \
         ON CONFLICT (checkout_id) DO NOTHING",
    )
    .bind(checkout_id)
    .execute(repo.pool())
    .await
    .expect("seed checkout record");
}

#[tokio::test]
#[serial]
async fn persist_transaction_writes_every_row_or_none() {
    let Some(repo) = setup().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };

    let checkout_id = format!("chk_{}", Uuid::new_v4());
    seed_checkout(&repo, &checkout_id).await;
    let master_reference = Uuid::new_v4();

    let mut tx = repo.begin().await.unwrap();
    tx.save_master_account(master_reference, &checkout_id)
        .await
        .unwrap();
    tx.save_user(&User {
        master_reference,
        username: "jordanb".to_string(),
        email: "jordan@example.com".to_string(),
        passphrase_hash: "hash".to_string(),
        status: UserStatus::Active,
    })
    .await
    .unwrap();
    tx.save_payment_method(&PaymentMethod {
        master_reference,
        transaction_id: "T1".to_string(),
        cardholder_name: "Jordan Buyer".to_string(),
        pan_last_four: "1111".to_string(),
    })
    .await
    .unwrap();
    tx.save_invoice(
        master_reference,
        InvoicePeriod::Trial,
        0,
        chrono::Utc::now(),
    )
    .await
    .unwrap();
    tx.save_invoice(
        master_reference,
        InvoicePeriod::Future,
        2_999,
        chrono::Utc::now() + chrono::Duration::days(30),
    )
    .await
    .unwrap();
    tx.save_transaction_record(&TransactionRecord {
        transaction_id: "T1".to_string(),
        master_reference,
        checkout_id: checkout_id.clone(),
        amount_cents: 100,
        currency: "usd".to_string(),
        created_at: chrono::Utc::now(),
    })
    .await
    .unwrap();
    tx.save_subscription(&Subscription {
        master_reference,
        subscription_id: "sub_1".to_string(),
        plan_code: "pro-monthly".to_string(),
        status: SubscriptionStatus::Pending,
    })
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let found = repo
        .find_master_account_by_checkout(&checkout_id)
        .await
        .unwrap();
    assert!(found.is_some());
    assert_eq!(found.unwrap().master_reference, master_reference);

    let sub = repo.find_subscription(master_reference).await.unwrap();
    assert_eq!(sub.unwrap().status, SubscriptionStatus::Pending);
}

#[tokio::test]
#[serial]
async fn persist_transaction_is_idempotent_under_replay() {
    let Some(repo) = setup().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };

    let checkout_id = format!("chk_{}", Uuid::new_v4());
    seed_checkout(&repo, &checkout_id).await;
    let master_reference = Uuid::new_v4();

    for _ in 0..2 {
        let mut tx = repo.begin().await.unwrap();
        tx.save_master_account(master_reference, &checkout_id)
            .await
            .unwrap();
        tx.save_user(&User {
            master_reference,
            username: "jordanb".to_string(),
            email: "jordan@example.com".to_string(),
            passphrase_hash: "hash".to_string(),
            status: UserStatus::Active,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }

    let found = repo
        .find_master_account_by_checkout(&checkout_id)
        .await
        .unwrap();
    assert!(found.is_some());
}

#[tokio::test]
#[serial]
async fn upsert_payment_result_overwrites_on_replay() {
    let Some(repo) = setup().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };

    let checkout_id = format!("chk_{}", Uuid::new_v4());
    seed_checkout(&repo, &checkout_id).await;
    let request_id = format!("req_{}", Uuid::new_v4());

    repo.upsert_payment_result(
        &request_id,
        &checkout_id,
        PaymentOutcome::Failed,
        None,
        Some("gateway_unreachable"),
    )
    .await
    .unwrap();

    repo.upsert_payment_result(
        &request_id,
        &checkout_id,
        PaymentOutcome::Success,
        Some("T1"),
        None,
    )
    .await
    .unwrap();

    let result = repo.find_payment_result(&request_id).await.unwrap().unwrap();
    assert_eq!(result.status, PaymentOutcome::Success);
    assert_eq!(result.transaction_id.as_deref(), Some("T1"));
}
