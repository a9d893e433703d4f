//! Notification sink: tells submitters what happened to their documents.
//!
//! Delivery is fire-and-forget. The pipeline goes through [`deliver`], which
//! logs failures instead of propagating them.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod messages;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification channel closed")]
    Closed,

    #[error("Failed to notify {submitter}: {reason}")]
    Delivery { submitter: String, reason: String },
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, submitter_id: &str, message: &str) -> Result<(), NotifyError>;
}

/// Sends a message and logs, rather than returns, any failure.
pub async fn deliver(sink: &dyn NotificationSink, submitter_id: &str, message: &str) {
    if let Err(e) = sink.notify(submitter_id, message).await {
        tracing::warn!(submitter = submitter_id, error = %e, "Notification dropped");
    }
}

/// Writes notifications to the log. Used when nobody is listening.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn notify(&self, submitter_id: &str, message: &str) -> Result<(), NotifyError> {
        tracing::info!(submitter = submitter_id, "{}", message);
        Ok(())
    }
}

/// A notification addressed to one submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub submitter_id: String,
    pub message: String,
}

/// Forwards notifications into a channel for a front end to drain.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn notify(&self, submitter_id: &str, message: &str) -> Result<(), NotifyError> {
        self.tx
            .send(Notification {
                submitter_id: submitter_id.to_string(),
                message: message.to_string(),
            })
            .map_err(|_| NotifyError::Closed)
    }
}
