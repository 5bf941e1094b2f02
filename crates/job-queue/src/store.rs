use std::time::Duration;

use chrono::{DateTime, Utc};
use redis::{aio::ConnectionManager, AsyncCommands, Script};
use uuid::Uuid;

use crate::backoff::backoff_for_retry;
use crate::error::{JobStoreError, JobStoreResult};
use crate::job::{ClaimedJob, JobEnvelope, JobPayload};

/// Configuration for one queue family (one logical job queue).
#[derive(Debug, Clone)]
pub struct JobStoreConfig {
    /// Key prefix; the four Redis structures are derived from it.
    pub prefix: String,
    /// Retries before a job is moved to the dead-letter list.
    pub max_retries: u32,
}

impl Default for JobStoreConfig {
    fn default() -> Self {
        Self {
            prefix: "payment_jobs".to_string(),
            max_retries: 3,
        }
    }
}

/// The four named Redis structures a queue family is built from, exposed for
/// operator tooling (`jobctl stats` / `jobctl clear`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueName {
    Ready,
    Processing,
    Failed,
    Delayed,
}

impl std::str::FromStr for QueueName {
    type Err = JobStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(QueueName::Ready),
            "processing" | "in_flight" => Ok(QueueName::Processing),
            "failed" => Ok(QueueName::Failed),
            "delayed" => Ok(QueueName::Delayed),
            other => Err(JobStoreError::UnknownQueue(other.to_string())),
        }
    }
}

/// Durable job queue backed by Redis lists and a sorted set.
///
/// See SPEC_FULL.md §4.A for the full contract. `JobStore` is cheap to clone
/// (the underlying `ConnectionManager` is itself a shared, reconnecting
/// handle), so each worker task holds its own clone.
#[derive(Clone)]
pub struct JobStore {
    conn: ConnectionManager,
    config: JobStoreConfig,
}

const PROMOTE_DUE_SCRIPT: &str = r#"
local delayed_key = KEYS[1]
local ready_key = KEYS[2]
local now = tonumber(ARGV[1])
local due = redis.call('ZRANGEBYSCORE', delayed_key, '-inf', now)
local promoted = 0
for _, member in ipairs(due) do
    -- ZREM returns 1 only for the caller that actually removed the member,
    -- so concurrent promoters never both push the same job.
    if redis.call('ZREM', delayed_key, member) == 1 then
        redis.call('RPUSH', ready_key, member)
        promoted = promoted + 1
    end
end
return promoted
"#;

impl JobStore {
    pub async fn connect(redis_url: &str, config: JobStoreConfig) -> JobStoreResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn, config })
    }

    fn key(&self, queue: QueueName) -> String {
        match queue {
            QueueName::Ready => self.config.prefix.clone(),
            QueueName::Processing => format!("{}:processing", self.config.prefix),
            QueueName::Failed => format!("{}:failed", self.config.prefix),
            QueueName::Delayed => format!("{}:delayed", self.config.prefix),
        }
    }

    /// Append a new job to the tail of the ready list.
    pub async fn enqueue(&self, payload: JobPayload) -> JobStoreResult<Uuid> {
        let envelope = JobEnvelope::new(payload);
        let id = envelope.id;
        let json = serde_json::to_string(&envelope)?;

        let mut conn = self.conn.clone();
        let _: () = conn.rpush(self.key(QueueName::Ready), json).await?;

        tracing::info!(job_id = %id, job_type = envelope.payload.type_name(), "job enqueued");
        Ok(id)
    }

    /// Blocking head-pop from the ready list, bounded by `timeout`.
    ///
    /// Returns `Ok(None)` on timeout; the in-flight mirror write is
    /// best-effort — a failure there is logged but never fails the claim,
    /// since the worker already owns the job and must still process it.
    pub async fn claim(&self, timeout: Duration) -> JobStoreResult<Option<ClaimedJob>> {
        let mut conn = self.conn.clone();
        let ready_key = self.key(QueueName::Ready);

        let popped: Option<(String, String)> = conn
            .blpop(&ready_key, timeout.as_secs_f64())
            .await?;

        let Some((_key, json)) = popped else {
            return Ok(None);
        };

        let mut envelope: JobEnvelope = serde_json::from_str(&json)?;
        envelope.claimed_at = Some(Utc::now());
        envelope.payload = envelope.payload.clone().normalized();

        let processing_json = serde_json::to_string(&envelope)?;
        if let Err(e) = conn
            .rpush::<_, _, ()>(self.key(QueueName::Processing), &processing_json)
            .await
        {
            tracing::warn!(job_id = %envelope.id, error = %e, "failed to mirror claim into in-flight list");
        }

        Ok(Some(ClaimedJob { envelope }))
    }

    /// Remove a completed job's envelope from the in-flight list. Idempotent.
    pub async fn complete(&self, job: &ClaimedJob) -> JobStoreResult<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(&job.envelope)?;
        let _: i64 = conn
            .lrem(self.key(QueueName::Processing), 1, json)
            .await?;

        tracing::info!(job_id = %job.id(), "job completed");
        Ok(())
    }

    /// Record a failure, remove the job from the in-flight list, and either
    /// schedule a delayed retry or move it to the dead-letter list.
    pub async fn fail(&self, job: ClaimedJob, error: impl Into<String>) -> JobStoreResult<()> {
        let mut conn = self.conn.clone();
        let error = error.into();

        let in_flight_json = serde_json::to_string(&job.envelope)?;
        let _: i64 = conn
            .lrem(self.key(QueueName::Processing), 1, in_flight_json)
            .await?;

        let mut envelope = job.envelope;
        envelope.retry_count += 1;
        envelope.last_error = Some(error);
        envelope.failed_at = Some(Utc::now());
        envelope.claimed_at = None;

        if envelope.retry_count < self.config.max_retries {
            let delay = backoff_for_retry(envelope.retry_count);
            let next_attempt = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
            envelope.next_attempt_at = Some(next_attempt);

            let score = next_attempt.timestamp() as f64;
            let json = serde_json::to_string(&envelope)?;
            let _: () = conn
                .zadd(self.key(QueueName::Delayed), json, score)
                .await?;

            tracing::warn!(
                job_id = %envelope.id,
                retry_count = envelope.retry_count,
                next_attempt_at = %next_attempt,
                "job failed, scheduled for delayed retry"
            );
        } else {
            let json = serde_json::to_string(&envelope)?;
            let _: () = conn.rpush(self.key(QueueName::Failed), json).await?;

            tracing::error!(
                job_id = %envelope.id,
                retry_count = envelope.retry_count,
                "job exhausted retries, moved to dead-letter queue"
            );
        }

        Ok(())
    }

    /// Record a non-retryable failure and move the job straight to the
    /// dead-letter list, bypassing the retry-count check in [`Self::fail`].
    /// Used for error kinds the workflow engine has already classified as
    /// final (e.g. `CardInvalid`, `GatewayDeclined`) where re-running the
    /// same step would only reproduce the same outcome.
    pub async fn fail_final(&self, job: ClaimedJob, error: impl Into<String>) -> JobStoreResult<()> {
        let mut conn = self.conn.clone();
        let error = error.into();

        let in_flight_json = serde_json::to_string(&job.envelope)?;
        let _: i64 = conn
            .lrem(self.key(QueueName::Processing), 1, in_flight_json)
            .await?;

        let mut envelope = job.envelope;
        envelope.retry_count += 1;
        envelope.last_error = Some(error);
        envelope.failed_at = Some(Utc::now());
        envelope.claimed_at = None;

        let json = serde_json::to_string(&envelope)?;
        let _: () = conn.rpush(self.key(QueueName::Failed), json).await?;

        tracing::error!(job_id = %envelope.id, "job failed final, moved to dead-letter queue");
        Ok(())
    }

    /// Atomically move all delayed jobs whose score is <= `now` into the
    /// ready list. Safe to call concurrently from multiple promoters.
    pub async fn promote_due(&self, now: DateTime<Utc>) -> JobStoreResult<usize> {
        let mut conn = self.conn.clone();
        let script = Script::new(PROMOTE_DUE_SCRIPT);

        let promoted: i64 = script
            .key(self.key(QueueName::Delayed))
            .key(self.key(QueueName::Ready))
            .arg(now.timestamp())
            .invoke_async(&mut conn)
            .await?;

        if promoted > 0 {
            tracing::debug!(promoted, "promoted delayed jobs to ready queue");
        }

        Ok(promoted as usize)
    }

    /// Find a job in the dead-letter list by id, reset its retry count, and
    /// push it back onto the ready list.
    pub async fn requeue_from_failed(&self, id: Uuid) -> JobStoreResult<()> {
        let mut conn = self.conn.clone();
        let failed_key = self.key(QueueName::Failed);

        let entries: Vec<String> = conn.lrange(&failed_key, 0, -1).await?;
        for raw in entries {
            let mut envelope: JobEnvelope = match serde_json::from_str(&raw) {
                Ok(e) => e,
                Err(_) => continue,
            };

            if envelope.id != id {
                continue;
            }

            let removed: i64 = conn.lrem(&failed_key, 1, &raw).await?;
            if removed == 0 {
                // Another operator call won the race; nothing left to requeue.
                return Ok(());
            }

            envelope.retry_count = 0;
            envelope.last_error = None;
            envelope.failed_at = None;
            envelope.next_attempt_at = None;

            let json = serde_json::to_string(&envelope)?;
            let _: () = conn.rpush(self.key(QueueName::Ready), json).await?;

            tracing::info!(job_id = %id, "job requeued from dead-letter list");
            return Ok(());
        }

        Err(JobStoreError::NotFound(id))
    }

    /// Return in-flight envelopes older than `max_age` to the ready list.
    /// Intended to run once at worker startup to recover claims leaked by an
    /// ungraceful shutdown.
    pub async fn sweep_stale_in_flight(&self, max_age: Duration) -> JobStoreResult<usize> {
        let mut conn = self.conn.clone();
        let processing_key = self.key(QueueName::Processing);
        let threshold = Utc::now() - chrono::Duration::from_std(max_age).unwrap_or_default();

        let entries: Vec<String> = conn.lrange(&processing_key, 0, -1).await?;
        let mut recovered = 0usize;

        for raw in entries {
            let envelope: JobEnvelope = match serde_json::from_str(&raw) {
                Ok(e) => e,
                Err(_) => continue,
            };

            let stale = envelope
                .claimed_at
                .map(|claimed_at| claimed_at < threshold)
                .unwrap_or(false);

            if !stale {
                continue;
            }

            let removed: i64 = conn.lrem(&processing_key, 1, &raw).await?;
            if removed == 0 {
                continue;
            }

            let mut requeued = envelope;
            requeued.claimed_at = None;
            let json = serde_json::to_string(&requeued)?;
            let _: () = conn.rpush(self.key(QueueName::Ready), json).await?;
            recovered += 1;

            tracing::warn!(job_id = %requeued.id, "recovered stale in-flight claim");
        }

        Ok(recovered)
    }

    /// Length of one of the four named structures, for `jobctl stats`.
    pub async fn queue_len(&self, queue: QueueName) -> JobStoreResult<usize> {
        let mut conn = self.conn.clone();
        let key = self.key(queue);
        let len: usize = match queue {
            QueueName::Delayed => conn.zcard(key).await?,
            _ => conn.llen(key).await?,
        };
        Ok(len)
    }

    /// Remove every member of one named queue (operator-only; used by
    /// `jobctl clear`).
    pub async fn clear(&self, queue: QueueName) -> JobStoreResult<()> {
        let mut conn = self.conn.clone();
        let key = self.key(queue);
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
