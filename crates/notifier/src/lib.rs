//! Failure alert delivery.
//!
//! Delivery is best-effort: a [`Notifier`] never reports failure to its caller,
//! so an alert that cannot be sent can never mask the error being reported.

pub mod email;

use async_trait::async_trait;
use thiserror::Error;

use etl_common::types::Notification;

pub use email::EmailNotifier;

/// Sink for failure alerts.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one alert. Failures are logged and absorbed.
    async fn notify(&self, notification: &Notification);
}

/// Why an alert could not be delivered.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid address '{address}': {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("Message build error: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}
