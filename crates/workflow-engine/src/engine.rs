use std::sync::Arc;

use card_gateway::{BillingInterval, BillingPlan, Card, CardGateway};
use checkout_repository::{PaymentOutcome, Repository};
use job_queue::{JobPayload, JobStore};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{WorkflowError, WorkflowResult};
use crate::ids::master_reference_for;
use crate::notifier::Notifier;
use crate::steps;
use crate::steps::authorize::AuthorizeStepOutcome;

/// Maps the gateway's own subscription status onto the persisted domain
/// enum; the two are separate types because the gateway's is a wire
/// contract and the repository's carries the `pending` state Persist
/// writes before this mapping is ever consulted.
fn to_repo_subscription_status(
    status: card_gateway::SubscriptionStatus,
) -> checkout_repository::SubscriptionStatus {
    match status {
        card_gateway::SubscriptionStatus::Active => checkout_repository::SubscriptionStatus::Active,
        card_gateway::SubscriptionStatus::Canceled => {
            checkout_repository::SubscriptionStatus::Canceled
        }
    }
}

/// Authorization "ping" amount in cents, fixed by convention — see §4.B.
const AUTHORIZE_PING_AMOUNT_CENTS: i64 = 100;

/// Which attempt of a job this call represents, used to decide whether a
/// failure is terminal and whether the one-time notification job fires.
#[derive(Debug, Clone, Copy)]
pub struct AttemptInfo {
    pub retry_count: u32,
    pub max_retries: u32,
}

impl AttemptInfo {
    fn is_last_attempt(&self, retryable: bool) -> bool {
        !retryable || self.retry_count + 1 >= self.max_retries
    }
}

#[derive(Debug, Deserialize)]
struct SelectedPlan {
    plan_code: String,
    amount_cents: i64,
    #[serde(default = "default_currency")]
    currency: String,
    #[serde(default)]
    annual: bool,
}

fn default_currency() -> String {
    "usd".to_string()
}

fn billing_plan_from(plans: &serde_json::Value) -> WorkflowResult<BillingPlan> {
    let selected: Vec<SelectedPlan> = serde_json::from_value(plans.clone())
        .map_err(|e| WorkflowError::DbConflict(format!("malformed plans blob: {e}")))?;

    let plan = selected
        .into_iter()
        .next()
        .ok_or_else(|| WorkflowError::DbConflict("checkout has no selected plan".to_string()))?;

    Ok(BillingPlan {
        plan_code: plan.plan_code,
        amount_cents: plan.amount_cents,
        currency: plan.currency,
        interval: if plan.annual {
            BillingInterval::Yearly
        } else {
            BillingInterval::Monthly
        },
    })
}

/// Drives the Authorize -> Void -> Subscribe -> Persist -> Notify saga for
/// one checkout. Stateless aside from its collaborators; safe to share
/// across worker tasks.
pub struct WorkflowEngine {
    gateway: Arc<dyn CardGateway>,
    repo: Repository,
    job_store: JobStore,
    notifier: Arc<dyn Notifier>,
}

impl WorkflowEngine {
    pub fn new(
        gateway: Arc<dyn CardGateway>,
        repo: Repository,
        job_store: JobStore,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        WorkflowEngine {
            gateway,
            repo,
            job_store,
            notifier,
        }
    }

    /// Runs the full saga for `checkout_id`/`request_id`. On success, every
    /// domain row is persisted and the customer has been (best-effort)
    /// notified. On failure, the returned error's `retryable()` tells the
    /// caller whether to schedule a delayed retry or dead-letter the job.
    pub async fn process_payment(
        &self,
        checkout_id: &str,
        request_id: &str,
        attempt: AttemptInfo,
    ) -> WorkflowResult<()> {
        let checkout = self.repo.find_checkout(checkout_id).await?;

        let card = match self.repo.find_temp_card_bundle(checkout_id).await? {
            Some(bundle) => Card {
                pan: bundle.pan,
                cvv: bundle.cvv,
                expiry_month: bundle.expiry_month as u32,
                expiry_year: bundle.expiry_year as u32,
                cardholder_name: bundle.cardholder_name,
            },
            None => {
                // No card on file: either already cleaned up by a prior
                // successful run, or the checkout never got one. Either way
                // there is nothing this attempt can do.
                return self
                    .terminal_failure(
                        &checkout.checkout_id,
                        request_id,
                        WorkflowError::DbConflict("temp card bundle missing".to_string()),
                        attempt,
                    )
                    .await;
            }
        };

        let plan = match billing_plan_from(&checkout.plans) {
            Ok(plan) => plan,
            Err(err) => return self.terminal_failure(checkout_id, request_id, err, attempt).await,
        };

        let transaction_id = match steps::authorize::run(
            self.gateway.as_ref(),
            &self.repo,
            &card,
            AUTHORIZE_PING_AMOUNT_CENTS,
            &plan.currency,
            request_id,
        )
        .await
        {
            Ok(AuthorizeStepOutcome::Authorized { transaction_id }) => transaction_id,
            Ok(AuthorizeStepOutcome::AlreadySucceeded { transaction_id }) => {
                // A prior run already completed Subscribe/Persist/activation for
                // this request_id; there is no fresh gateway status to carry
                // through, but the saga's end state for a success replay is
                // always an active subscription.
                return self
                    .finish_success(
                        &checkout,
                        &card,
                        &plan,
                        request_id,
                        &transaction_id,
                        card_gateway::SubscriptionStatus::Active,
                    )
                    .await;
            }
            Err(err) => return self.terminal_failure(checkout_id, request_id, err, attempt).await,
        };

        if let Err(err) = steps::void::run(self.gateway.as_ref(), &transaction_id, request_id).await {
            return self
                .fail_after_authorize(&checkout, request_id, &transaction_id, err, attempt)
                .await;
        }

        let subscription_outcome =
            match steps::subscribe::run(self.gateway.as_ref(), &card, &plan, request_id).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    // Auth already voided; no further compensation needed.
                    return self.terminal_failure(checkout_id, request_id, err, attempt).await;
                }
            };

        let persist_input = steps::persist::PersistInput {
            checkout: &checkout,
            request_id,
            transaction_id: &transaction_id,
            subscription_id: &subscription_outcome.subscription_id,
            plan_code: &plan.plan_code,
            amount_cents: plan.amount_cents,
            currency: &plan.currency,
            cardholder_name: &card.cardholder_name,
            pan_last_four: last_four(&card.pan),
        };

        if let Err(err) = steps::persist::run(&self.repo, persist_input).await {
            return self
                .fail_after_subscribe(
                    &checkout,
                    request_id,
                    &subscription_outcome.subscription_id,
                    err,
                    attempt,
                )
                .await;
        }

        self.finish_success(
            &checkout,
            &card,
            &plan,
            request_id,
            &transaction_id,
            subscription_outcome.status,
        )
        .await
    }

    async fn finish_success(
        &self,
        checkout: &checkout_repository::CheckoutRecord,
        _card: &Card,
        _plan: &BillingPlan,
        request_id: &str,
        transaction_id: &str,
        subscription_status: card_gateway::SubscriptionStatus,
    ) -> WorkflowResult<()> {
        self.repo
            .upsert_payment_result(
                request_id,
                &checkout.checkout_id,
                PaymentOutcome::Success,
                Some(transaction_id),
                None,
            )
            .await?;
        self.repo
            .update_subscription_status(
                master_reference_for(request_id),
                to_repo_subscription_status(subscription_status),
            )
            .await?;
        self.repo
            .delete_temp_card_bundle(&checkout.checkout_id)
            .await?;

        steps::notify::run(
            self.notifier.as_ref(),
            &checkout.customer_email,
            &checkout.checkout_id,
        )
        .await;

        Ok(())
    }

    /// Authorize succeeded but a later step failed. The authorization must
    /// be voided before the job terminates, regardless of whether the
    /// triggering error itself is retryable.
    async fn fail_after_authorize(
        &self,
        checkout: &checkout_repository::CheckoutRecord,
        request_id: &str,
        transaction_id: &str,
        err: WorkflowError,
        attempt: AttemptInfo,
    ) -> WorkflowResult<()> {
        if attempt.is_last_attempt(err.retryable()) {
            if let Err(void_err) =
                steps::void::run(self.gateway.as_ref(), transaction_id, request_id).await
            {
                tracing::error!(
                    checkout_id = %checkout.checkout_id,
                    transaction_id,
                    error = %void_err,
                    "compensating void failed; enqueueing void_transaction job"
                );
                self.job_store
                    .enqueue(JobPayload::VoidTransaction {
                        transaction_id: transaction_id.to_string(),
                    })
                    .await
                    .map_err(|e| WorkflowError::DbUnreachable(e.to_string()))?;
            }
        }

        self.terminal_failure(&checkout.checkout_id, request_id, err, attempt).await
    }

    /// Subscribe succeeded but Persist failed and retries are exhausted: the
    /// subscription must be canceled so the customer is not billed for an
    /// account that was never created.
    async fn fail_after_subscribe(
        &self,
        checkout: &checkout_repository::CheckoutRecord,
        request_id: &str,
        subscription_id: &str,
        err: WorkflowError,
        attempt: AttemptInfo,
    ) -> WorkflowResult<()> {
        if attempt.is_last_attempt(err.retryable()) {
            self.job_store
                .enqueue(JobPayload::CancelSubscription {
                    subscription_id: subscription_id.to_string(),
                })
                .await
                .map_err(|e| WorkflowError::DbUnreachable(e.to_string()))?;
        }

        self.terminal_failure(&checkout.checkout_id, request_id, err, attempt).await
    }

    /// Shared terminal-failure bookkeeping: PaymentResult, user status,
    /// TempCardBundle cleanup, and the one-time notification job — all gated
    /// on this actually being the last attempt.
    async fn terminal_failure(
        &self,
        checkout_id: &str,
        request_id: &str,
        err: WorkflowError,
        attempt: AttemptInfo,
    ) -> WorkflowResult<()> {
        if attempt.is_last_attempt(err.retryable()) {
            self.repo
                .upsert_payment_result(
                    request_id,
                    checkout_id,
                    PaymentOutcome::Failed,
                    None,
                    Some(&err.to_string()),
                )
                .await?;

            if let Some(account) = self.repo.find_master_account_by_checkout(checkout_id).await? {
                self.repo.mark_user_inactive(account.master_reference).await?;
            } else {
                // Persist never ran: no MasterAccount/users row to flag, so
                // the payment_error status is recorded against the checkout
                // itself instead.
                self.repo.mark_checkout_payment_error(checkout_id).await?;
            }

            self.repo.delete_temp_card_bundle(checkout_id).await?;

            self.job_store
                .enqueue(JobPayload::NotifyPaymentIssue {
                    checkout_id: checkout_id.to_string(),
                    reason: err.to_string(),
                })
                .await
                .map_err(|e| WorkflowError::DbUnreachable(e.to_string()))?;
        }

        Err(err)
    }

    /// Standalone compensation job: void an authorization outside the main
    /// saga run (e.g. enqueued after a crash left the saga's own void step
    /// unresolved).
    pub async fn void_transaction(&self, transaction_id: &str) -> WorkflowResult<()> {
        steps::void::run(self.gateway.as_ref(), transaction_id, transaction_id).await
    }

    /// Standalone compensation job: cancel a subscription left active after
    /// Persist exhausted its retries.
    pub async fn cancel_subscription(&self, subscription_id: &str) -> WorkflowResult<()> {
        self.gateway
            .cancel_subscription(subscription_id, subscription_id)
            .await?;
        tracing::info!(subscription_id, "compensating cancel_subscription completed");
        Ok(())
    }

    /// Standalone, non-saga notification job enqueued on terminal failure.
    pub async fn notify_payment_issue(&self, checkout_id: &str, reason: &str) -> WorkflowResult<()> {
        if let Err(err) = self.notifier.notify_payment_issue(checkout_id, reason).await {
            tracing::warn!(checkout_id, error = %err, "notify_payment_issue failed, ignoring");
        }
        Ok(())
    }

    /// Diagnostic entry point: runs Authorize alone, without Void/Subscribe/
    /// Persist/Notify. Used for manual re-validation of a checkout's card.
    pub async fn authorize_only(&self, checkout_id: &str, request_id: &str) -> WorkflowResult<String> {
        let checkout = self.repo.find_checkout(checkout_id).await?;
        let bundle = self
            .repo
            .find_temp_card_bundle(checkout_id)
            .await?
            .ok_or_else(|| WorkflowError::DbConflict("temp card bundle missing".to_string()))?;
        let card = Card {
            pan: bundle.pan,
            cvv: bundle.cvv,
            expiry_month: bundle.expiry_month as u32,
            expiry_year: bundle.expiry_year as u32,
            cardholder_name: bundle.cardholder_name,
        };
        let plan = billing_plan_from(&checkout.plans)?;

        match steps::authorize::run(
            self.gateway.as_ref(),
            &self.repo,
            &card,
            AUTHORIZE_PING_AMOUNT_CENTS,
            &plan.currency,
            request_id,
        )
        .await?
        {
            AuthorizeStepOutcome::Authorized { transaction_id }
            | AuthorizeStepOutcome::AlreadySucceeded { transaction_id } => Ok(transaction_id),
        }
    }

    /// Diagnostic entry point: create a subscription for an
    /// already-authorized checkout, without running Persist/Notify.
    pub async fn create_subscription_only(
        &self,
        checkout_id: &str,
        request_id: &str,
    ) -> WorkflowResult<String> {
        let checkout = self.repo.find_checkout(checkout_id).await?;
        let bundle = self
            .repo
            .find_temp_card_bundle(checkout_id)
            .await?
            .ok_or_else(|| WorkflowError::DbConflict("temp card bundle missing".to_string()))?;
        let card = Card {
            pan: bundle.pan,
            cvv: bundle.cvv,
            expiry_month: bundle.expiry_month as u32,
            expiry_year: bundle.expiry_year as u32,
            cardholder_name: bundle.cardholder_name,
        };
        let plan = billing_plan_from(&checkout.plans)?;
        let outcome = steps::subscribe::run(self.gateway.as_ref(), &card, &plan, request_id).await?;
        Ok(outcome.subscription_id)
    }

    /// Diagnostic entry point: persist domain rows for an
    /// already-subscribed checkout, without running Notify.
    pub async fn create_account_only(
        &self,
        checkout_id: &str,
        transaction_id: &str,
        request_id: &str,
    ) -> WorkflowResult<Uuid> {
        let checkout = self.repo.find_checkout(checkout_id).await?;
        let bundle = self
            .repo
            .find_temp_card_bundle(checkout_id)
            .await?
            .ok_or_else(|| WorkflowError::DbConflict("temp card bundle missing".to_string()))?;
        let plan = billing_plan_from(&checkout.plans)?;
        // CreateAccount carries only checkout_id/transaction_id; the
        // subscription was already established by an earlier CreateSubscription
        // job and is not re-derivable here, so Persist records a placeholder
        // that a reconciliation pass can correct from the gateway's records.
        let subscription_id = format!("sub_for_{transaction_id}");

        let persist_input = steps::persist::PersistInput {
            checkout: &checkout,
            request_id,
            transaction_id,
            subscription_id: &subscription_id,
            plan_code: &plan.plan_code,
            amount_cents: plan.amount_cents,
            currency: &plan.currency,
            cardholder_name: &bundle.cardholder_name,
            pan_last_four: last_four(&bundle.pan),
        };

        steps::persist::run(&self.repo, persist_input).await
    }
}

fn last_four(pan: &str) -> &str {
    let len = pan.len();
    if len >= 4 {
        &pan[len - 4..]
    } else {
        pan
    }
}
