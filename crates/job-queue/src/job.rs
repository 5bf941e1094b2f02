use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Typed job payloads, one variant per job type.
///
/// The wire form still carries a `type` discriminator and a `data` object
/// (see [`JobEnvelope`]) for backward compatibility with producers that only
/// know about the untyped map; everything inside this process works with the
/// typed variants below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum JobPayload {
    /// Run the full Authorize → Void → Subscribe → Persist → Notify saga.
    ProcessPayment {
        checkout_id: String,
        request_id: String,
    },
    /// Authorize-only, used by compensations and diagnostics.
    AuthorizeOnly {
        checkout_id: String,
        request_id: String,
    },
    /// Void a previously-authorized transaction (compensation).
    VoidTransaction { transaction_id: String },
    /// Create a recurring-billing subscription for an already-authorized checkout.
    CreateSubscription {
        checkout_id: String,
        transaction_id: String,
    },
    /// Persist the domain entities for an already-subscribed checkout.
    CreateAccount {
        checkout_id: String,
        transaction_id: String,
    },
    /// Retired duplicate of `ProcessPayment` from the source platform; accepted
    /// on the wire for backward compatibility and normalized to
    /// `ProcessPayment` by the dead-letter requeue path (see DESIGN.md).
    DelayedPayment {
        checkout_id: String,
        request_id: String,
    },
    /// Compensation enqueued when Persist exhausts its retries after a
    /// subscription was already created upstream.
    CancelSubscription { subscription_id: String },
    /// Customer-facing notification enqueued exactly once, on the saga's
    /// last attempt before it terminates as a failure.
    NotifyPaymentIssue {
        checkout_id: String,
        reason: String,
    },
}

impl JobPayload {
    pub fn type_name(&self) -> &'static str {
        match self {
            JobPayload::ProcessPayment { .. } => "process_payment",
            JobPayload::AuthorizeOnly { .. } => "authorize_only",
            JobPayload::VoidTransaction { .. } => "void_transaction",
            JobPayload::CreateSubscription { .. } => "create_subscription",
            JobPayload::CreateAccount { .. } => "create_account",
            JobPayload::DelayedPayment { .. } => "delayed_payment",
            JobPayload::CancelSubscription { .. } => "cancel_subscription",
            JobPayload::NotifyPaymentIssue { .. } => "notify_payment_issue",
        }
    }

    /// Normalize the retired `delayed_payment` job type into the authoritative
    /// `process_payment` saga entry point.
    pub fn normalized(self) -> JobPayload {
        match self {
            JobPayload::DelayedPayment {
                checkout_id,
                request_id,
            } => JobPayload::ProcessPayment {
                checkout_id,
                request_id,
            },
            other => other,
        }
    }
}

/// A job as it lives in the queue: identity plus lifecycle bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobEnvelope {
    pub id: Uuid,
    #[serde(flatten)]
    pub payload: JobPayload,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
}

impl JobEnvelope {
    pub fn new(payload: JobPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload: payload.normalized(),
            created_at: Utc::now(),
            retry_count: 0,
            last_error: None,
            failed_at: None,
            next_attempt_at: None,
            claimed_at: None,
        }
    }
}

/// A job handed to a worker by [`crate::store::JobStore::claim`].
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub envelope: JobEnvelope,
}

impl ClaimedJob {
    pub fn id(&self) -> Uuid {
        self.envelope.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_payment_round_trips_through_json() {
        let envelope = JobEnvelope::new(JobPayload::ProcessPayment {
            checkout_id: "c1".into(),
            request_id: "r1".into(),
        });

        let json = serde_json::to_string(&envelope).unwrap();
        let back: JobEnvelope = serde_json::from_str(&json).unwrap();

        assert_eq!(envelope, back);
        assert_eq!(back.payload.type_name(), "process_payment");
    }

    #[test]
    fn delayed_payment_normalizes_to_process_payment_on_construction() {
        let envelope = JobEnvelope::new(JobPayload::DelayedPayment {
            checkout_id: "c1".into(),
            request_id: "r1".into(),
        });

        assert_eq!(envelope.payload.type_name(), "process_payment");
    }

    #[test]
    fn wire_envelope_carries_type_and_data_discriminator() {
        let envelope = JobEnvelope::new(JobPayload::VoidTransaction {
            transaction_id: "T1".into(),
        });
        let value: serde_json::Value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["type"], "void_transaction");
        assert_eq!(value["data"]["transaction_id"], "T1");
    }
}
