use async_trait::async_trait;

/// The customer-facing notification side channel (e.g. transactional
/// email). Send failures here are logged but never fail the saga — see the
/// NotifyPending step in the state machine.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_success(&self, email: &str, checkout_id: &str) -> Result<(), String>;

    async fn notify_payment_issue(&self, checkout_id: &str, reason: &str) -> Result<(), String>;
}

/// Default notifier for tests and local development: logs instead of
/// sending, mirroring the mock-processor pattern used by the gateway and
/// repository collaborators.
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify_success(&self, email: &str, checkout_id: &str) -> Result<(), String> {
        tracing::info!(email, checkout_id, "notify: payment succeeded (logged only)");
        Ok(())
    }

    async fn notify_payment_issue(&self, checkout_id: &str, reason: &str) -> Result<(), String> {
        tracing::info!(checkout_id, reason, "notify: payment processing issue (logged only)");
        Ok(())
    }
}
