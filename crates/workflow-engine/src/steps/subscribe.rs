use card_gateway::{BillingPlan, Card, CardGateway, SubscriptionOutcome};

use crate::error::WorkflowResult;

/// Returns the full outcome (not just the id) so the caller can carry the
/// gateway's reported status through to the activation step after Persist.
pub async fn run(
    gateway: &dyn CardGateway,
    card: &Card,
    plan: &BillingPlan,
    request_id: &str,
) -> WorkflowResult<SubscriptionOutcome> {
    let outcome = gateway.create_subscription(card, plan, request_id).await?;
    tracing::info!(
        request_id,
        subscription_id = %outcome.subscription_id,
        status = ?outcome.status,
        "subscribe succeeded"
    );
    Ok(outcome)
}
