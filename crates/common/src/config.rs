use std::path::PathBuf;

use lettre::message::Mailbox;

use crate::error::AppError;
use crate::types::{NotifyMode, SchemaMode};

/// SMTP submission settings for failure alerts.
#[derive(Clone)]
pub struct SmtpConfig {
    /// Submission host; STARTTLS is always negotiated
    pub host: String,

    /// Submission port (default: 587)
    pub port: u16,

    /// Login user for the SMTP session
    pub username: String,

    /// Login password for the SMTP session
    pub password: String,

    /// Sender address (default: the SMTP username)
    pub from: String,

    /// Connect and command timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Configuration for the ETL runner binary, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Notebook to execute: an http(s) URL or a local path
    pub notebook_url: String,

    /// Where the fetched notebook is staged before execution
    pub notebook_input_path: PathBuf,

    /// Where the executed notebook is written
    pub notebook_output_path: PathBuf,

    /// Notebook executor program (default: papermill)
    pub notebook_executor: String,

    /// Extra arguments placed before the input/output paths.
    ///
    /// `NOTEBOOK_EXECUTOR_ARGS` is split on whitespace with no shell quoting,
    /// so a single argument cannot contain a space (`-p name "a b"` becomes
    /// four arguments, quotes included).
    pub notebook_executor_args: Vec<String>,

    /// Total attempts including the first one (default: 3)
    pub job_max_attempts: u32,

    /// Fixed wait between attempts in seconds (default: 5)
    pub job_retry_interval_secs: u64,

    /// Alert on every failed attempt or once on exhaustion
    pub notify_mode: NotifyMode,

    /// Alert recipient address
    pub alert_recipient: String,

    pub smtp: SmtpConfig,
}

/// Configuration for the warehouse schema initializer binary.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Warehouse connection string, e.g. `sqlite://warehouse.db`
    pub database_url: String,

    /// Maximum number of connections in the pool (default: 5)
    pub db_max_connections: u32,

    /// Recreate (drop tables, create-if-absent views) or migrate
    pub schema_mode: SchemaMode,
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<String> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("{key} environment variable is required"))
}

fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
    expected: &str,
) -> anyhow::Result<T> {
    lookup(key)
        .unwrap_or_else(|| default.to_string())
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{key} must be a valid {expected}"))
}

impl RunnerConfig {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let username = required(&lookup, "SMTP_USERNAME")?;

        Ok(Self {
            notebook_url: required(&lookup, "NOTEBOOK_URL")?,
            notebook_input_path: lookup("NOTEBOOK_INPUT_PATH")
                .unwrap_or_else(|| "input_notebook.ipynb".to_string())
                .into(),
            notebook_output_path: lookup("NOTEBOOK_OUTPUT_PATH")
                .unwrap_or_else(|| "output_notebook.ipynb".to_string())
                .into(),
            notebook_executor: lookup("NOTEBOOK_EXECUTOR")
                .unwrap_or_else(|| "papermill".to_string()),
            notebook_executor_args: lookup("NOTEBOOK_EXECUTOR_ARGS")
                .map(|args| args.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            job_max_attempts: parsed(&lookup, "JOB_MAX_ATTEMPTS", "3", "u32")?,
            job_retry_interval_secs: parsed(&lookup, "JOB_RETRY_INTERVAL_SECS", "5", "u64")?,
            notify_mode: lookup("NOTIFY_MODE")
                .map(|v| v.parse::<NotifyMode>())
                .transpose()
                .map_err(|e: String| anyhow::anyhow!("NOTIFY_MODE: {e}"))?
                .unwrap_or_default(),
            alert_recipient: required(&lookup, "EMAIL_TO")?,
            smtp: SmtpConfig {
                host: required(&lookup, "SMTP_HOST")?,
                port: parsed(&lookup, "SMTP_PORT", "587", "u16")?,
                password: required(&lookup, "SMTP_PASSWORD")?,
                from: lookup("EMAIL_FROM").unwrap_or_else(|| username.clone()),
                username,
                timeout_secs: parsed(&lookup, "SMTP_TIMEOUT_SECS", "30", "u64")?,
            },
        })
    }

    /// Check invariants that the environment parser cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.job_max_attempts == 0 {
            return Err(AppError::Config(
                "JOB_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if self.notebook_executor.trim().is_empty() {
            return Err(AppError::Config(
                "NOTEBOOK_EXECUTOR must not be empty".to_string(),
            ));
        }
        if self.notebook_input_path == self.notebook_output_path {
            return Err(AppError::Config(
                "NOTEBOOK_INPUT_PATH and NOTEBOOK_OUTPUT_PATH must differ".to_string(),
            ));
        }
        if self.smtp.port == 0 {
            return Err(AppError::Config("SMTP_PORT must not be 0".to_string()));
        }
        for (key, addr) in [
            ("EMAIL_TO", &self.alert_recipient),
            ("EMAIL_FROM", &self.smtp.from),
        ] {
            if let Err(e) = addr.parse::<Mailbox>() {
                return Err(AppError::Config(format!(
                    "{key} must be an email address, got '{addr}': {e}"
                )));
            }
        }
        Ok(())
    }
}

impl WarehouseConfig {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            database_url: required(&lookup, "DATABASE_URL")?,
            db_max_connections: parsed(&lookup, "DB_MAX_CONNECTIONS", "5", "u32")?,
            schema_mode: parsed(&lookup, "WAREHOUSE_SCHEMA_MODE", "recreate", "schema mode")?,
        })
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.db_max_connections == 0 {
            return Err(AppError::Config(
                "DB_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn runner_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("NOTEBOOK_URL", "https://example.com/etl/load.ipynb"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USERNAME", "alerts@example.com"),
            ("SMTP_PASSWORD", "hunter2"),
            ("EMAIL_TO", "ops@example.com"),
        ]
    }

    #[test]
    fn test_runner_defaults() {
        let config = RunnerConfig::from_lookup(lookup_from(&runner_env())).unwrap();
        assert_eq!(config.job_max_attempts, 3);
        assert_eq!(config.job_retry_interval_secs, 5);
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.smtp.from, "alerts@example.com");
        assert_eq!(config.notify_mode, NotifyMode::EveryAttempt);
        assert_eq!(config.notebook_executor, "papermill");
        assert!(config.notebook_executor_args.is_empty());
        assert_eq!(
            config.notebook_output_path,
            PathBuf::from("output_notebook.ipynb")
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_runner_overrides() {
        let mut env = runner_env();
        env.push(("NOTIFY_MODE", "on_exhaustion"));
        env.push(("JOB_MAX_ATTEMPTS", "5"));
        env.push(("NOTEBOOK_EXECUTOR_ARGS", "--log-output -k python3"));
        env.push(("EMAIL_FROM", "etl@example.com"));

        let config = RunnerConfig::from_lookup(lookup_from(&env)).unwrap();
        assert_eq!(config.notify_mode, NotifyMode::OnExhaustion);
        assert_eq!(config.job_max_attempts, 5);
        assert_eq!(
            config.notebook_executor_args,
            vec!["--log-output", "-k", "python3"]
        );
        assert_eq!(config.smtp.from, "etl@example.com");
    }

    #[test]
    fn test_runner_missing_required() {
        let env: Vec<_> = runner_env()
            .into_iter()
            .filter(|(k, _)| *k != "SMTP_PASSWORD")
            .collect();
        let err = RunnerConfig::from_lookup(lookup_from(&env)).unwrap_err();
        assert!(err.to_string().contains("SMTP_PASSWORD"));
    }

    #[test]
    fn test_runner_rejects_bad_numbers() {
        let mut env = runner_env();
        env.push(("SMTP_PORT", "not-a-port"));
        let err = RunnerConfig::from_lookup(lookup_from(&env)).unwrap_err();
        assert!(err.to_string().contains("SMTP_PORT"));
    }

    #[test]
    fn test_runner_validate_zero_attempts() {
        let mut env = runner_env();
        env.push(("JOB_MAX_ATTEMPTS", "0"));
        let config = RunnerConfig::from_lookup(lookup_from(&env)).unwrap();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_executor_args_split_on_whitespace_without_quoting() {
        let mut env = runner_env();
        env.push(("NOTEBOOK_EXECUTOR_ARGS", "  -p region \"North East\"\t-k python3 "));

        let config = RunnerConfig::from_lookup(lookup_from(&env)).unwrap();
        assert_eq!(
            config.notebook_executor_args,
            vec!["-p", "region", "\"North", "East\"", "-k", "python3"]
        );
    }

    #[test]
    fn test_runner_validate_rejects_malformed_addresses() {
        for bad in ["ops@", "@example.com", "ops.example.com"] {
            let mut env = runner_env();
            env.push(("EMAIL_TO", bad));
            let config = RunnerConfig::from_lookup(lookup_from(&env)).unwrap();
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("EMAIL_TO"), "accepted '{bad}'");
        }

        let mut env = runner_env();
        env.push(("EMAIL_FROM", "alerts@"));
        let config = RunnerConfig::from_lookup(lookup_from(&env)).unwrap();
        assert!(config.validate().unwrap_err().to_string().contains("EMAIL_FROM"));
    }

    #[test]
    fn test_runner_validate_accepts_named_sender() {
        let mut env = runner_env();
        env.push(("EMAIL_FROM", "ETL Alerts <alerts@example.com>"));
        let config = RunnerConfig::from_lookup(lookup_from(&env)).unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_smtp_debug_redacts_password() {
        let config = RunnerConfig::from_lookup(lookup_from(&runner_env())).unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_warehouse_config() {
        let config = WarehouseConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite://warehouse.db"),
            ("WAREHOUSE_SCHEMA_MODE", "migrate"),
        ]))
        .unwrap();
        assert_eq!(config.schema_mode, SchemaMode::Migrate);
        assert_eq!(config.db_max_connections, 5);
        config.validate().unwrap();

        assert!(WarehouseConfig::from_lookup(lookup_from(&[])).is_err());
    }
}
