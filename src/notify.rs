//! Status notification seam
//!
//! After a document is saved, a status message can be published for
//! downstream consumers (the publishing service listens on a direct exchange
//! keyed by routing key). Nothing here depends on a broker: a broker client
//! implements [`StatusNotifier`], the default does nothing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::NotifyError;

pub const EXCHANGE: &str = "doc_publish";
pub const STATUS_ROUTING_KEY: &str = "statusQ";

/// Message published after a successful save
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub exchange: String,
    pub routing_key: String,
    pub iri: String,
    pub state: String,
    pub timestamp: String,
}

#[async_trait]
pub trait StatusNotifier: Send + Sync {
    /// Publish a message. Failures are reported but never abort the
    /// operation that triggered them.
    async fn notify(&self, message: StatusMessage) -> Result<(), NotifyError>;

    /// Routing key status messages are published under
    fn routing_key(&self) -> &str {
        STATUS_ROUTING_KEY
    }
}

/// Notifier that drops every message
#[derive(Debug, Default, Clone)]
pub struct NoopNotifier;

#[async_trait]
impl StatusNotifier for NoopNotifier {
    async fn notify(&self, message: StatusMessage) -> Result<(), NotifyError> {
        tracing::trace!(iri = %message.iri, "Status notification disabled");
        Ok(())
    }
}

/// In-process notifier over a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: broadcast::Sender<StatusMessage>,
    routing_key: String,
}

impl ChannelNotifier {
    pub fn new(capacity: usize, routing_key: impl Into<String>) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            routing_key: routing_key.into(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusMessage> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl StatusNotifier for ChannelNotifier {
    async fn notify(&self, message: StatusMessage) -> Result<(), NotifyError> {
        self.sender
            .send(message)
            .map(|_| ())
            .map_err(|_| NotifyError::NoSubscribers(self.routing_key.clone()))
    }

    fn routing_key(&self) -> &str {
        &self.routing_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> StatusMessage {
        StatusMessage {
            exchange: EXCHANGE.into(),
            routing_key: STATUS_ROUTING_KEY.into(),
            iri: "/akn/ke/act/1".into(),
            state: "draft".into(),
            timestamp: "2018-05-11T10:00:00Z".into(),
        }
    }

    #[tokio::test]
    async fn test_channel_delivers() {
        let notifier = ChannelNotifier::new(4, "statusQ");
        let mut rx = notifier.subscribe();
        notifier.notify(message()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().iri, "/akn/ke/act/1");
    }

    #[tokio::test]
    async fn test_channel_without_subscribers_reports_error() {
        let notifier = ChannelNotifier::new(4, "statusQ");
        assert!(matches!(
            notifier.notify(message()).await,
            Err(NotifyError::NoSubscribers(key)) if key == "statusQ"
        ));
        assert!(NoopNotifier.notify(message()).await.is_ok());
    }
}
