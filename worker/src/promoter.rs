use std::sync::Arc;

use chrono::Utc;
use job_queue::JobStore;
use tokio::sync::broadcast;

use crate::config::Config;

/// Ticks on `config.promoter_interval` and moves delayed jobs whose backoff
/// has elapsed back onto the ready list. A failed tick just waits for the
/// next one; `promote_due` is idempotent so nothing is lost.
pub async fn run(job_store: JobStore, config: Arc<Config>, mut shutdown: broadcast::Receiver<()>) {
    let mut interval = tokio::time::interval(config.promoter_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::info!("promoter starting");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("promoter received shutdown signal");
                break;
            }
            _ = interval.tick() => {
                match job_store.promote_due(Utc::now()).await {
                    Ok(promoted) if promoted > 0 => {
                        tracing::info!(promoted, "promoted delayed jobs");
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(error = %err, "promote_due failed, will retry next tick");
                    }
                }
            }
        }
    }

    tracing::info!("promoter stopped");
}
