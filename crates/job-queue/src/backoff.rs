use std::time::Duration;

/// Exponential backoff with jitter: `min(cap, base * 2^n) + uniform(0, 1s)`,
/// floored at one second.
///
/// `n` is the retry attempt that just failed (1-indexed — the first failure
/// schedules the first retry).
pub fn backoff_for_retry(retry_count: u32) -> Duration {
    const CAP_SECS: u64 = 300;
    let base = 1u64.checked_shl(retry_count).unwrap_or(CAP_SECS);
    let capped = base.min(CAP_SECS).max(1);
    let jitter_millis = (fastrand::f64() * 1000.0) as u64;
    Duration::from_secs(capped) + Duration::from_millis(jitter_millis)
}
