use std::io::Write as _;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use job_queue::{JobStore, JobStoreConfig, QueueName};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "jobctl")]
#[command(about = "Operator CLI for the payment job queue")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Redis connection string; defaults to REDIS_URL.
    #[arg(long, env = "REDIS_URL")]
    redis_url: String,

    /// Queue key prefix; defaults to JOB_QUEUE_PREFIX or "payment_jobs".
    #[arg(long, env = "JOB_QUEUE_PREFIX", default_value = "payment_jobs")]
    prefix: String,
}

#[derive(Subcommand)]
enum Command {
    /// Move a job from the dead-letter list back onto the ready list.
    RequeueFailed {
        /// Job id (UUID) as it appears in `jobctl stats`.
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Delete every member of a named queue (ready, processing, failed, delayed).
    Clear {
        queue: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Print the length of every named queue.
    Stats,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let job_store = JobStore::connect(
        &cli.redis_url,
        JobStoreConfig {
            prefix: cli.prefix,
            max_retries: 3,
        },
    )
    .await
    .context("connecting to the job store")?;

    match cli.command {
        Command::RequeueFailed { id, yes } => requeue_failed(&job_store, &id, yes).await,
        Command::Clear { queue, yes } => clear(&job_store, &queue, yes).await,
        Command::Stats => stats(&job_store).await,
    }
}

async fn requeue_failed(job_store: &JobStore, id: &str, yes: bool) -> anyhow::Result<ExitCode> {
    let job_id = Uuid::parse_str(id).context("id must be a valid UUID")?;

    if !yes && !confirm(&format!("Requeue failed job {job_id}?")) {
        println!("aborted");
        return Ok(ExitCode::from(1));
    }

    job_store
        .requeue_from_failed(job_id)
        .await
        .context("requeueing job")?;

    println!("requeued {job_id}");
    Ok(ExitCode::SUCCESS)
}

async fn clear(job_store: &JobStore, queue: &str, yes: bool) -> anyhow::Result<ExitCode> {
    let queue_name = QueueName::from_str(queue).context("unknown queue name")?;

    if !yes && !confirm(&format!("Clear every job in '{queue}'? This cannot be undone.")) {
        println!("aborted");
        return Ok(ExitCode::from(1));
    }

    job_store.clear(queue_name).await.context("clearing queue")?;
    println!("cleared {queue}");
    Ok(ExitCode::SUCCESS)
}

async fn stats(job_store: &JobStore) -> anyhow::Result<ExitCode> {
    for (label, queue) in [
        ("ready", QueueName::Ready),
        ("processing", QueueName::Processing),
        ("failed", QueueName::Failed),
        ("delayed", QueueName::Delayed),
    ] {
        let len = job_store.queue_len(queue).await.context("reading queue length")?;
        println!("{label:<12} {len}");
    }
    Ok(ExitCode::SUCCESS)
}

fn confirm(prompt: &str) -> bool {
    print!("{prompt} [y/N] ");
    let _ = std::io::stdout().flush();

    let mut input = String::new();
    if std::io::stdin().read_line(&mut input).is_err() {
        return false;
    }

    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}
