use async_trait::async_trait;

use crate::card::Card;
use crate::error::GatewayResult;
use crate::types::{AuthorizeOutcome, BillingPlan, SubscriptionOutcome, VoidOutcome};

/// Abstraction over the upstream card processor. The workflow engine is
/// generic over this trait so tests and local development run against
/// `MockCardGateway` while the worker binary wires up `HttpCardGateway`.
#[async_trait]
pub trait CardGateway: Send + Sync {
    async fn authorize(
        &self,
        card: &Card,
        amount_cents: i64,
        currency: &str,
        request_id: &str,
    ) -> GatewayResult<AuthorizeOutcome>;

    async fn void(&self, transaction_id: &str, request_id: &str) -> GatewayResult<VoidOutcome>;

    async fn create_subscription(
        &self,
        card: &Card,
        plan: &BillingPlan,
        request_id: &str,
    ) -> GatewayResult<SubscriptionOutcome>;

    /// Cancels a subscription, used as the compensating action when Persist
    /// exhausts its retries after Subscribe already succeeded. Idempotent:
    /// canceling an already-canceled subscription must not raise
    /// `GatewayState`.
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        request_id: &str,
    ) -> GatewayResult<()>;
}
