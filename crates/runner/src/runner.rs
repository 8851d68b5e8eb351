//! Retrying job runner — executes one job under a retry policy and alerts on failure.
//!
//! Attempt(n) either succeeds (done) or fails. A failure with attempts left
//! waits for the policy delay and moves to Attempt(n + 1); a failure on the
//! last attempt ends the run and the last job error is returned.
//!
//! With [`NotifyMode::EveryAttempt`] the notifier runs synchronously on every
//! failure, before the retry policy sees the error, so three consecutive
//! failures produce three alerts. [`NotifyMode::OnExhaustion`] sends a single
//! alert once the attempts are used up.
//!
//! Every call to [`RetryingJobRunner::run`] is a separate run with its own
//! run id, so one runner can be reused for repeated runs.

use chrono::Utc;
use tracing::Instrument;
use uuid::Uuid;

use etl_common::types::{Notification, NotifyMode};
use etl_notifier::Notifier;

use crate::job::{Job, JobError, JobOutput};
use crate::retry::{RetryPolicy, retry};

/// Subject line of every failure alert.
pub const FAILURE_SUBJECT: &str = "ETL Pipeline Failure";

pub struct RetryingJobRunner<J, N> {
    job: J,
    notifier: N,
    policy: RetryPolicy,
    notify_mode: NotifyMode,
    recipient: String,
}

impl<J: Job, N: Notifier> RetryingJobRunner<J, N> {
    pub fn new(job: J, notifier: N, policy: RetryPolicy, recipient: impl Into<String>) -> Self {
        Self {
            job,
            notifier,
            policy,
            notify_mode: NotifyMode::default(),
            recipient: recipient.into(),
        }
    }

    pub fn with_notify_mode(mut self, notify_mode: NotifyMode) -> Self {
        self.notify_mode = notify_mode;
        self
    }

    /// Run the job until it succeeds or the retry policy gives up.
    pub async fn run(&self) -> Result<JobOutput, JobError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "etl_run",
            run_id = %run_id,
            job = %self.job.name(),
            notify_mode = %self.notify_mode
        );

        async {
            let result = retry(&self.policy, |attempt| async move {
                tracing::info!(attempt, "Starting ETL attempt");

                let err = match self.job.run().await {
                    Ok(output) => return Ok(output),
                    Err(e) => e,
                };

                if self.notify_mode == NotifyMode::EveryAttempt {
                    let attempt_line =
                        format!("Attempt: {attempt} of {}", self.policy.max_attempts());
                    let notification = self.failure_notification(run_id, &err, &attempt_line);
                    self.notifier.notify(&notification).await;
                }

                Err(err)
            })
            .await;

            if let Err(err) = &result
                && self.notify_mode == NotifyMode::OnExhaustion
            {
                let attempt_line =
                    format!("Attempts: all {} attempts failed", self.policy.max_attempts());
                let notification = self.failure_notification(run_id, err, &attempt_line);
                self.notifier.notify(&notification).await;
            }

            result
        }
        .instrument(span)
        .await
    }

    /// Run the job and log the final outcome instead of returning it.
    ///
    /// Returns `true` if the job eventually succeeded. Exhausted retries are
    /// logged at error level and never surface as an `Err`.
    pub async fn run_and_report(&self) -> bool {
        match self.run().await {
            Ok(output) => {
                tracing::info!(
                    job = %self.job.name(),
                    output = %output.output_path.display(),
                    "ETL task finished"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    job = %self.job.name(),
                    error = %e,
                    "ETL task failed after retries"
                );
                false
            }
        }
    }

    fn failure_notification(
        &self,
        run_id: Uuid,
        error: &JobError,
        attempt_line: &str,
    ) -> Notification {
        let body = format!(
            "The ETL pipeline failed with error: {error}\n\n\
             Job: {job}\n\
             {attempt_line}\n\
             Run: {run_id}\n\
             Time: {time}",
            job = self.job.name(),
            time = Utc::now().to_rfc3339(),
        );
        Notification::new(FAILURE_SUBJECT, body, self.recipient.clone())
    }
}
