//! The [`Transport`] trait: the seam to the underlying pub/sub client.

use thiserror::Error as ThisError;
use tokio::sync::mpsc::Receiver;

pub mod broker;
pub use broker::Broker;

/// A publish/subscribe transport connecting the two ends of a session.
///
/// Implementations are assumed to deliver each published message at most
/// once, in no particular order. `publish` must be safe to call concurrently
/// from multiple tasks without external locking.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Publishes a payload on the given topic. Fire-and-forget: returns as
    /// soon as the transport accepts the message, with no acknowledgment
    /// awaited.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Subscribes to a topic, returning the receiving half of a channel on
    /// which payloads for that topic are delivered.
    async fn subscribe(&self, topic: &str) -> Result<Receiver<Vec<u8>>, TransportError>;
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    #[error("The transport is no longer connected")]
    Disconnected,
    #[error("Unspecified transport error")]
    Other,
}
