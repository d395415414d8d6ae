//! The wire [`Envelope`] and its codec.

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// The structured unit of data exchanged over the pub/sub transport.
///
/// Envelopes are serialized as JSON. Decoding tolerates unknown extra fields
/// so that newer peers can add fields without breaking older ones, and the
/// identity fields default to empty when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Correlation token assigned by the sender. Uniqueness is the sender's
    /// business; nothing here enforces it globally.
    #[serde(default)]
    pub uuid: String,
    /// The command this envelope carries.
    #[serde(default)]
    pub cmd: String,
    /// The command payload.
    #[serde(default)]
    pub data: String,
    /// The responder's address. Populated on the handshake ack only.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip: String,
    /// The responder's protocol version. Populated on the handshake ack only.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

impl Envelope {
    /// Creates an envelope carrying a command and payload.
    pub fn new(
        uuid: impl Into<String>,
        cmd: impl Into<String>,
        data: impl Into<String>,
    ) -> Envelope {
        Self {
            uuid: uuid.into(),
            cmd: cmd.into(),
            data: data.into(),
            ip: String::new(),
            version: String::new(),
        }
    }

    /// Serializes the envelope for the transport.
    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Parses an envelope out of a transport payload.
    pub fn decode(payload: &[u8]) -> Result<Envelope, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Whether any consumer should act on this envelope. An empty token,
    /// command, or payload marks it as noise to be dropped silently.
    pub fn is_relevant(&self) -> bool {
        !self.uuid.is_empty() && !self.cmd.is_empty() && !self.data.is_empty()
    }
}

#[derive(Debug, ThisError)]
pub enum DecodeError {
    #[error("The payload was not a valid envelope: {0}")]
    Malformed(#[from] serde_json::Error),
}
