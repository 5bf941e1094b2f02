use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row identified by `checkout_id`, created upstream of this core by the HTTP
/// layer. Immutable once the workflow begins processing it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CheckoutRecord {
    pub checkout_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub username: String,
    pub address: String,
    pub passphrase_hash: String,
    pub plans: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Card material, never persisted for longer than the workflow needs it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TempCardBundle {
    pub checkout_id: String,
    pub pan: String,
    pub expiry_month: i32,
    pub expiry_year: i32,
    pub cvv: String,
    pub cardholder_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum PaymentOutcome {
    Success,
    Failed,
}

/// The idempotency marker for one workflow run, keyed by `request_id`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentResult {
    pub request_id: String,
    pub checkout_id: String,
    pub status: PaymentOutcome,
    pub transaction_id: Option<String>,
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MasterAccount {
    pub master_reference: Uuid,
    pub checkout_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    PaymentError,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub master_reference: Uuid,
    pub username: String,
    pub email: String,
    pub passphrase_hash: String,
    pub status: UserStatus,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentMethod {
    pub master_reference: Uuid,
    pub transaction_id: String,
    pub cardholder_name: String,
    pub pan_last_four: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum InvoicePeriod {
    Trial,
    Future,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub master_reference: Uuid,
    pub period: InvoicePeriod,
    pub amount_cents: i64,
    pub due_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub master_reference: Uuid,
    pub checkout_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Canceled,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Subscription {
    pub master_reference: Uuid,
    pub subscription_id: String,
    pub plan_code: String,
    pub status: SubscriptionStatus,
}
