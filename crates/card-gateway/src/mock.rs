use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::card::Card;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::CardGateway;
use crate::types::{
    AuthorizeOutcome, BillingPlan, SubscriptionOutcome, SubscriptionStatus, VoidOutcome,
};

/// In-memory gateway for tests and local development. Always succeeds
/// unless configured otherwise, mirroring the always-succeeds shape of the
/// development-mode payment processor this workspace has historically used.
pub struct MockCardGateway {
    force_decline: bool,
    force_unreachable: Mutex<u32>,
    voided: Mutex<Vec<String>>,
}

impl MockCardGateway {
    pub fn new() -> Self {
        MockCardGateway {
            force_decline: false,
            force_unreachable: Mutex::new(0),
            voided: Mutex::new(Vec::new()),
        }
    }

    pub fn always_declines() -> Self {
        MockCardGateway {
            force_decline: true,
            force_unreachable: Mutex::new(0),
            voided: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next `n` calls with `GatewayUnreachable`, then succeed.
    /// Used to exercise the worker's retry path deterministically.
    pub fn unreachable_for_next(n: u32) -> Self {
        MockCardGateway {
            force_decline: false,
            force_unreachable: Mutex::new(n),
            voided: Mutex::new(Vec::new()),
        }
    }

    pub fn voided_transactions(&self) -> Vec<String> {
        self.voided.lock().unwrap().clone()
    }

    fn take_unreachable(&self) -> bool {
        let mut remaining = self.force_unreachable.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            true
        } else {
            false
        }
    }
}

impl Default for MockCardGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CardGateway for MockCardGateway {
    async fn authorize(
        &self,
        card: &Card,
        amount_cents: i64,
        currency: &str,
        _request_id: &str,
    ) -> GatewayResult<AuthorizeOutcome> {
        card.validate()?;

        if self.take_unreachable() {
            return Err(GatewayError::GatewayUnreachable(
                "mock gateway unreachable".to_string(),
            ));
        }
        if self.force_decline {
            return Err(GatewayError::GatewayDeclined {
                code: "do_not_honor".to_string(),
                message: "mock gateway configured to decline".to_string(),
            });
        }

        Ok(AuthorizeOutcome {
            transaction_id: format!("mock_txn_{}", Uuid::new_v4().simple()),
            authorized_amount_cents: amount_cents,
            currency: currency.to_string(),
        })
    }

    async fn void(&self, transaction_id: &str, _request_id: &str) -> GatewayResult<VoidOutcome> {
        if self.take_unreachable() {
            return Err(GatewayError::GatewayUnreachable(
                "mock gateway unreachable".to_string(),
            ));
        }

        self.voided.lock().unwrap().push(transaction_id.to_string());
        Ok(VoidOutcome {
            transaction_id: transaction_id.to_string(),
            voided_at: chrono::Utc::now(),
        })
    }

    async fn create_subscription(
        &self,
        card: &Card,
        plan: &BillingPlan,
        _request_id: &str,
    ) -> GatewayResult<SubscriptionOutcome> {
        card.validate()?;

        if self.take_unreachable() {
            return Err(GatewayError::GatewayUnreachable(
                "mock gateway unreachable".to_string(),
            ));
        }
        if self.force_decline {
            return Err(GatewayError::GatewayDeclined {
                code: "do_not_honor".to_string(),
                message: "mock gateway configured to decline".to_string(),
            });
        }

        Ok(SubscriptionOutcome {
            subscription_id: format!("mock_sub_{}_{}", plan.plan_code, Uuid::new_v4().simple()),
            status: SubscriptionStatus::Active,
        })
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        _request_id: &str,
    ) -> GatewayResult<()> {
        if self.take_unreachable() {
            return Err(GatewayError::GatewayUnreachable(
                "mock gateway unreachable".to_string(),
            ));
        }
        tracing::info!(subscription_id, "mock subscription canceled");
        Ok(())
    }
}
