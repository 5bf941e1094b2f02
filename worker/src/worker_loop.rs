use std::sync::Arc;
use std::time::Duration;

use job_queue::{ClaimedJob, JobPayload, JobStore};
use tokio::sync::broadcast;
use workflow_engine::{AttemptInfo, WorkflowEngine, WorkflowError};

use crate::config::Config;
use crate::metrics::Metrics;

/// One cooperative claim -> process -> complete/fail loop. Workers share no
/// mutable state; coordination happens entirely through the job store.
pub async fn run(
    worker_id: usize,
    job_store: JobStore,
    engine: Arc<WorkflowEngine>,
    config: Arc<Config>,
    metrics: Arc<Metrics>,
    mut shutdown: broadcast::Receiver<()>,
) {
    tracing::info!(worker_id, "worker loop starting");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!(worker_id, "worker loop received shutdown signal");
                break;
            }
            claimed = job_store.claim(config.claim_timeout) => {
                match claimed {
                    Ok(Some(job)) => process_one(worker_id, &job_store, &engine, &config, &metrics, job).await,
                    Ok(None) => continue,
                    Err(err) => {
                        tracing::warn!(worker_id, error = %err, "claim failed, backing off");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }

    tracing::info!(worker_id, "worker loop stopped");
}

async fn process_one(
    worker_id: usize,
    job_store: &JobStore,
    engine: &WorkflowEngine,
    config: &Config,
    metrics: &Metrics,
    job: ClaimedJob,
) {
    let job_id = job.id();
    let job_type = job.envelope.payload.type_name();
    let attempt = AttemptInfo {
        retry_count: job.envelope.retry_count,
        max_retries: config.max_retries,
    };

    let span = tracing::info_span!("process_job", worker_id, %job_id, job_type);
    let _enter = span.enter();

    let outcome: Result<(), WorkflowError> = match &job.envelope.payload {
        JobPayload::ProcessPayment {
            checkout_id,
            request_id,
        } => engine.process_payment(checkout_id, request_id, attempt).await,

        JobPayload::VoidTransaction { transaction_id } => {
            engine.void_transaction(transaction_id).await
        }

        JobPayload::CancelSubscription { subscription_id } => {
            engine.cancel_subscription(subscription_id).await
        }

        JobPayload::NotifyPaymentIssue { checkout_id, reason } => {
            engine.notify_payment_issue(checkout_id, reason).await
        }

        JobPayload::AuthorizeOnly {
            checkout_id,
            request_id,
        } => engine.authorize_only(checkout_id, request_id).await.map(|_| ()),

        JobPayload::CreateSubscription {
            checkout_id,
            transaction_id: _,
        } => engine
            .create_subscription_only(checkout_id, &job_id.to_string())
            .await
            .map(|_| ()),

        JobPayload::CreateAccount {
            checkout_id,
            transaction_id,
        } => engine
            .create_account_only(checkout_id, transaction_id, &job_id.to_string())
            .await
            .map(|_| ()),

        JobPayload::DelayedPayment { .. } => {
            unreachable!("DelayedPayment normalizes to ProcessPayment on claim")
        }
    };

    match outcome {
        Ok(()) => {
            metrics.jobs_total.with_label_values(&["success"]).inc();
            if let Err(e) = job_store.complete(&job).await {
                tracing::warn!(worker_id, %job_id, error = %e, "failed to mark job complete");
            }
        }
        Err(err) => {
            metrics.jobs_total.with_label_values(&["failure"]).inc();
            let retryable = err.retryable();
            let message = err.to_string();
            let result = if retryable {
                job_store.fail(job, message).await
            } else {
                job_store.fail_final(job, message).await
            };
            if let Err(e) = result {
                tracing::warn!(worker_id, %job_id, error = %e, "failed to record job failure");
            }
        }
    }
}
