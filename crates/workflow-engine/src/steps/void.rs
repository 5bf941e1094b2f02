use card_gateway::{CardGateway, GatewayError};

use crate::error::WorkflowResult;

/// Voids an authorization. Treats "already voided" as success, per the
/// gateway's stated idempotency contract.
pub async fn run(
    gateway: &dyn CardGateway,
    transaction_id: &str,
    request_id: &str,
) -> WorkflowResult<()> {
    match gateway.void(transaction_id, request_id).await {
        Ok(_) => {
            tracing::info!(transaction_id, "void succeeded");
            Ok(())
        }
        Err(GatewayError::GatewayState(_)) => {
            tracing::info!(transaction_id, "void treated as success: already voided");
            Ok(())
        }
        Err(other) => Err(other.into()),
    }
}
