use card_gateway::{Card, CardGateway};
use checkout_repository::{PaymentOutcome, Repository};

use crate::error::WorkflowResult;

/// Outcome of the Authorize step, after the idempotency check.
pub enum AuthorizeStepOutcome {
    /// A fresh authorization was performed.
    Authorized { transaction_id: String },
    /// `PaymentResult` already recorded success for this `request_id`;
    /// the step is skipped entirely, no gateway call is made.
    AlreadySucceeded { transaction_id: String },
}

pub async fn run(
    gateway: &dyn CardGateway,
    repo: &Repository,
    card: &Card,
    amount_cents: i64,
    currency: &str,
    request_id: &str,
) -> WorkflowResult<AuthorizeStepOutcome> {
    if let Some(existing) = repo.find_payment_result(request_id).await? {
        if existing.status == PaymentOutcome::Success {
            if let Some(transaction_id) = existing.transaction_id {
                tracing::info!(request_id, %transaction_id, "authorize skipped: already succeeded");
                return Ok(AuthorizeStepOutcome::AlreadySucceeded { transaction_id });
            }
        }
    }

    let outcome = gateway
        .authorize(card, amount_cents, currency, request_id)
        .await?;

    tracing::info!(
        request_id,
        transaction_id = %outcome.transaction_id,
        amount_cents,
        "authorize succeeded"
    );

    Ok(AuthorizeStepOutcome::Authorized {
        transaction_id: outcome.transaction_id,
    })
}
