use std::time::Duration;

/// Typed startup configuration. Every field is read once at process start;
/// a missing required variable is a fatal configuration error, not a
/// repairable runtime condition.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub host: String,
    pub port: u16,
    pub worker_count: usize,
    pub max_retries: u32,
    pub claim_timeout: Duration,
    pub promoter_interval: Duration,
    pub max_claim_age: Duration,
    pub job_prefix: String,
}

impl Config {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let redis_url = std::env::var("REDIS_URL").expect("REDIS_URL must be set");
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8089".to_string())
            .parse()
            .expect("PORT must be a valid u16");

        let worker_count = std::env::var("WORKER_COUNT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .map(|n| n.clamp(2, 8))
            .unwrap_or_else(default_worker_count);

        let max_retries: u32 = std::env::var("MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);

        let claim_timeout = Duration::from_secs(
            std::env::var("CLAIM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        );

        let promoter_interval = Duration::from_secs(
            std::env::var("PROMOTER_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        );

        let max_claim_age = Duration::from_secs(
            std::env::var("MAX_CLAIM_AGE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
        );

        let job_prefix =
            std::env::var("JOB_QUEUE_PREFIX").unwrap_or_else(|_| "payment_jobs".to_string());

        Config {
            database_url,
            redis_url,
            host,
            port,
            worker_count,
            max_retries,
            claim_timeout,
            promoter_interval,
            max_claim_age,
            job_prefix,
        }
    }
}

/// Auto-clamp to [2..8] based on available cores when `WORKER_COUNT` is
/// unset, matching the server's cooperative-pool sizing rule.
fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .clamp(2, 8)
}
