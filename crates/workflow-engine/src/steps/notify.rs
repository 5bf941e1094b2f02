use crate::notifier::Notifier;

/// Always returns success to the caller: notification failures are logged
/// but never turn a completed workflow back into a failure.
pub async fn run(notifier: &dyn Notifier, email: &str, checkout_id: &str) {
    if let Err(err) = notifier.notify_success(email, checkout_id).await {
        tracing::warn!(checkout_id, error = %err, "notify failed, ignoring");
    }
}
