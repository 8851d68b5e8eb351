/// A plain-text alert ready for delivery. Built per failure and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    /// Recipient mailbox, e.g. `ops@example.com`
    pub recipient: String,
}

impl Notification {
    pub fn new(
        subject: impl Into<String>,
        body: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            recipient: recipient.into(),
        }
    }
}

/// When the job runner sends failure alerts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NotifyMode {
    /// One alert per failed attempt, including the last one.
    #[default]
    EveryAttempt,
    /// A single alert once every attempt has failed.
    OnExhaustion,
}

impl std::fmt::Display for NotifyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyMode::EveryAttempt => write!(f, "every_attempt"),
            NotifyMode::OnExhaustion => write!(f, "on_exhaustion"),
        }
    }
}

impl std::str::FromStr for NotifyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "every_attempt" => Ok(NotifyMode::EveryAttempt),
            "on_exhaustion" => Ok(NotifyMode::OnExhaustion),
            other => Err(format!(
                "unknown notify mode '{other}' (expected every_attempt or on_exhaustion)"
            )),
        }
    }
}

/// How the warehouse schema is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchemaMode {
    /// Drop and recreate tables, create views only if absent. Destroys table data.
    #[default]
    Recreate,
    /// Apply versioned, additive migrations. Never drops data.
    Migrate,
}

impl std::fmt::Display for SchemaMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaMode::Recreate => write!(f, "recreate"),
            SchemaMode::Migrate => write!(f, "migrate"),
        }
    }
}

impl std::str::FromStr for SchemaMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recreate" => Ok(SchemaMode::Recreate),
            "migrate" => Ok(SchemaMode::Migrate),
            other => Err(format!(
                "unknown schema mode '{other}' (expected recreate or migrate)"
            )),
        }
    }
}
