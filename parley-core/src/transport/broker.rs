//! An in-process publish/subscribe hub.

use super::{Transport, TransportError};
use crate::FxDashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, Receiver, Sender};

/// How many undelivered payloads a subscriber may accumulate before further
/// publishes to it are dropped.
const SUBSCRIBER_QUEUE_SIZE: usize = 64;

/// An in-memory [`Transport`] connecting subscribers within one process.
///
/// Topics are exact strings with no wildcard matching and no retained
/// messages. A publish is fanned out to every subscriber current at that
/// moment; a subscriber that has gone away or fallen behind simply misses the
/// message, matching the at-most-once assumption the rest of the crate is
/// built on.
///
/// Clones share the same hub.
#[derive(Debug, Clone, Default)]
pub struct Broker {
    topics: Arc<FxDashMap<String, Vec<Sender<Vec<u8>>>>>,
}

impl Broker {
    /// Creates a new hub with no topics.
    pub fn new() -> Broker {
        Default::default()
    }
}

#[async_trait::async_trait]
impl Transport for Broker {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if let Some(mut subscribers) = self.topics.get_mut(topic) {
            subscribers.retain(|subscriber| !subscriber.is_closed());
            for subscriber in subscribers.iter() {
                // A full queue counts as a lost message, not an error.
                let _ = subscriber.try_send(payload.clone());
            }
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Receiver<Vec<u8>>, TransportError> {
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_QUEUE_SIZE);
        self.topics.entry(topic.to_string()).or_default().push(sender);
        Ok(receiver)
    }
}
