use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a successful (or declined) authorization attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorizeOutcome {
    pub transaction_id: String,
    pub authorized_amount_cents: i64,
    pub currency: String,
}

/// Result of voiding a previously authorized transaction. Voids are
/// idempotent at the gateway: voiding an already-voided transaction returns
/// the same outcome rather than an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoidOutcome {
    pub transaction_id: String,
    pub voided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BillingPlan {
    pub plan_code: String,
    pub amount_cents: i64,
    pub currency: String,
    pub interval: BillingInterval,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionOutcome {
    pub subscription_id: String,
    pub status: SubscriptionStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
}
