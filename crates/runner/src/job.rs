//! External jobs executed by the runner.
//!
//! [`NotebookJob`] fetches a notebook, stages it locally and hands it to a
//! notebook executor (papermill by default), which writes the executed
//! notebook to the output path.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;

use etl_common::config::RunnerConfig;

/// Maximum number of stderr lines carried in an executor error.
const STDERR_TAIL_LINES: usize = 20;

/// Result artifact of a successful job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutput {
    pub output_path: PathBuf,
}

/// Job execution failure.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Failed to fetch notebook from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid notebook: {0}")]
    InvalidNotebook(String),

    #[error("Failed to start executor '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Notebook executor exited with {status}: {stderr}")]
    Executor { status: String, stderr: String },
}

/// A single named unit of external work.
#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<JobOutput, JobError>;
}

/// Runs a notebook through an external executor.
pub struct NotebookJob {
    name: String,
    /// http(s) URL or local path
    source: String,
    input_path: PathBuf,
    output_path: PathBuf,
    executor: String,
    executor_args: Vec<String>,
    client: reqwest::Client,
}

impl NotebookJob {
    pub fn new(
        source: impl Into<String>,
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        let source = source.into();
        let name = source
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or("notebook")
            .to_string();

        Self {
            name,
            source,
            input_path: input_path.into(),
            output_path: output_path.into(),
            executor: "papermill".to_string(),
            executor_args: Vec::new(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(
            config.notebook_url.clone(),
            config.notebook_input_path.clone(),
            config.notebook_output_path.clone(),
        )
        .with_executor(
            config.notebook_executor.clone(),
            config.notebook_executor_args.clone(),
        )
    }

    /// Use a different executor program. `args` go before the input/output paths.
    pub fn with_executor(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.executor = program.into();
        self.executor_args = args;
        self
    }

    fn is_remote(&self) -> bool {
        self.source.starts_with("http://") || self.source.starts_with("https://")
    }

    /// Retrieve the raw notebook document.
    async fn fetch(&self) -> Result<Vec<u8>, JobError> {
        if !self.is_remote() {
            return tokio::fs::read(&self.source)
                .await
                .map_err(|source| JobError::Io {
                    path: PathBuf::from(&self.source),
                    source,
                });
        }

        let fetch_err = |source| JobError::Fetch {
            url: self.source.clone(),
            source,
        };

        let response = self
            .client
            .get(&self.source)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(fetch_err)?;

        let body = response.bytes().await.map_err(fetch_err)?;
        tracing::debug!(url = %self.source, bytes = body.len(), "Fetched notebook");
        Ok(body.to_vec())
    }

    /// Run the executor on the staged notebook.
    async fn execute(&self) -> Result<(), JobError> {
        let output = tokio::process::Command::new(&self.executor)
            .args(&self.executor_args)
            .arg(&self.input_path)
            .arg(&self.output_path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| JobError::Spawn {
                program: self.executor.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(JobError::Executor {
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Job for NotebookJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<JobOutput, JobError> {
        let notebook = self.fetch().await?;
        validate_notebook(&notebook)?;

        tokio::fs::write(&self.input_path, &notebook)
            .await
            .map_err(|source| JobError::Io {
                path: self.input_path.clone(),
                source,
            })?;

        tracing::info!(
            job = %self.name,
            executor = %self.executor,
            output = %self.output_path.display(),
            "Executing notebook"
        );
        self.execute().await?;

        tracing::info!(job = %self.name, "ETL task completed successfully");
        Ok(JobOutput {
            output_path: self.output_path.clone(),
        })
    }
}

/// Reject payloads that are not notebook documents (e.g. an HTML error page).
fn validate_notebook(raw: &[u8]) -> Result<(), JobError> {
    let doc: serde_json::Value = serde_json::from_slice(raw)
        .map_err(|e| JobError::InvalidNotebook(format!("not valid JSON: {e}")))?;

    match doc.get("cells") {
        Some(serde_json::Value::Array(_)) => Ok(()),
        _ => Err(JobError::InvalidNotebook(
            "document has no 'cells' array".to_string(),
        )),
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
