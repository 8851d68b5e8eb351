//! ETL runner binary entrypoint.

use std::time::Duration;

use tracing_subscriber::EnvFilter;

use etl_common::config::RunnerConfig;
use etl_notifier::EmailNotifier;
use etl_runner::job::NotebookJob;
use etl_runner::retry::RetryPolicy;
use etl_runner::runner::RetryingJobRunner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "etl_runner=info,etl_notifier=info".into()),
        )
        .json()
        .init();

    // Load and validate configuration
    let config = RunnerConfig::from_env()?;
    config.validate()?;

    let policy = RetryPolicy::fixed(
        config.job_max_attempts,
        Duration::from_secs(config.job_retry_interval_secs),
    )?;

    let runner = RetryingJobRunner::new(
        NotebookJob::from_config(&config),
        EmailNotifier::new(config.smtp.clone()),
        policy,
        config.alert_recipient.clone(),
    )
    .with_notify_mode(config.notify_mode);

    tracing::info!(
        notebook = %config.notebook_url,
        max_attempts = config.job_max_attempts,
        retry_interval_secs = config.job_retry_interval_secs,
        "ETL runner starting"
    );

    // A failed job is reported, not treated as a process failure.
    runner.run_and_report().await;

    Ok(())
}
