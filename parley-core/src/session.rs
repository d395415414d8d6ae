//! The [`Session`] engine: handshake state machine and inbound dispatch.

use crate::{
    envelope::Envelope,
    transport::{Transport, TransportError},
};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error as ThisError;
use tokio::{sync::mpsc, time::timeout};
use uuid::Uuid;

/// The single active inbound handler on a [`Session`].
///
/// Exactly one handler is active at a time. Replacing it takes effect for the
/// next dispatched envelope; an envelope already being dispatched is handled
/// by whichever handler was active when dispatch picked it up.
#[async_trait::async_trait]
pub trait Receive: Send + Sync {
    async fn receive(&self, envelope: Envelope);
}

/// Tunables for the handshake loop.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Command transmitted, with an empty payload, to probe for a responder.
    pub probe_cmd: String,
    /// Command a responder acknowledges the probe with.
    pub ack_cmd: String,
    /// How long to wait for an ack before transmitting the probe again.
    pub retry_timeout: Duration,
    /// Version string this end declares.
    pub version: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            probe_cmd: "whoami".to_string(),
            ack_cmd: "shell".to_string(),
            retry_timeout: Duration::from_secs(5),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Handshake progress of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshaking,
    Established,
}

/// Address and version a responder declares on its handshake ack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub ip: String,
    pub version: String,
}

/// One logical conversation between an initiator and a responder over a pair
/// of pub/sub topics.
///
/// A session is created with [`open`](Session::open), which subscribes to the
/// receive topic and spawns the dispatch task. It lives until the process
/// exits; there is no reconnection machinery beyond the handshake retry loop.
pub struct Session {
    transport: Arc<dyn Transport>,
    tx_topic: String,
    rx_topic: String,
    token: String,
    config: SessionConfig,
    handler: RwLock<Option<Arc<dyn Receive>>>,
    state: RwLock<SessionState>,
}

impl Session {
    /// Subscribes to `rx_topic`, spawns the inbound dispatch task, and
    /// returns the session in the `Handshaking` state.
    pub async fn open(
        transport: Arc<dyn Transport>,
        tx_topic: impl Into<String>,
        rx_topic: impl Into<String>,
        config: SessionConfig,
    ) -> Result<Arc<Session>, TransportError> {
        let rx_topic = rx_topic.into();
        let receiver = transport.subscribe(&rx_topic).await?;
        let session = Arc::new(Self {
            transport,
            tx_topic: tx_topic.into(),
            rx_topic,
            token: Uuid::new_v4().to_string(),
            config,
            handler: RwLock::new(None),
            state: RwLock::new(SessionState::Handshaking),
        });
        tokio::spawn(Self::dispatch(session.clone(), receiver));
        Ok(session)
    }

    /// Delivers every well-formed inbound envelope to the handler active at
    /// dispatch time. Malformed payloads are dropped without further effect.
    async fn dispatch(session: Arc<Session>, mut receiver: mpsc::Receiver<Vec<u8>>) {
        while let Some(payload) = receiver.recv().await {
            let envelope = match Envelope::decode(&payload) {
                Ok(envelope) => envelope,
                Err(e) => {
                    tracing::trace!(error = %e, "dropping malformed envelope");
                    continue;
                }
            };
            // Clone the active handler under the lock, invoke outside it, so
            // a swap cannot race the dispatch already in flight.
            let handler = session.handler.read().unwrap().clone();
            if let Some(handler) = handler {
                handler.receive(envelope).await;
            }
        }
        tracing::debug!(rx_topic = %session.rx_topic, "receive topic closed, dispatch ending");
    }

    /// Replaces the single active inbound handler. Takes effect for the next
    /// dispatched envelope.
    pub fn set_receive_callback(&self, handler: Arc<dyn Receive>) {
        *self.handler.write().unwrap() = Some(handler);
    }

    /// Encodes and publishes an envelope on the transmit topic, stamped with
    /// this session's correlation token. Fire-and-forget.
    pub async fn transmit(&self, cmd: &str, data: &str) -> Result<(), TransportError> {
        self.transmit_envelope(Envelope::new(self.token.clone(), cmd, data))
            .await
    }

    /// Publishes a caller-built envelope, stamping the session token if the
    /// caller left it empty.
    pub async fn transmit_envelope(&self, mut envelope: Envelope) -> Result<(), TransportError> {
        if envelope.uuid.is_empty() {
            envelope.uuid = self.token.clone();
        }
        self.transport
            .publish(&self.tx_topic, envelope.encode())
            .await
    }

    /// Runs the handshake: transmits the probe command and waits up to the
    /// retry timeout for an acknowledgment, retrying indefinitely. On
    /// success the active handler is swapped to `steady` and the session
    /// transitions to `Established` exactly once.
    ///
    /// This suspends the calling task only; inbound dispatch keeps running
    /// throughout.
    pub async fn establish(
        &self,
        steady: Arc<dyn Receive>,
    ) -> Result<PeerInfo, EstablishError> {
        let (ack_sender, mut ack_receiver) = mpsc::channel(1);
        self.set_receive_callback(Arc::new(AckListener {
            ack_cmd: self.config.ack_cmd.clone(),
            ack: ack_sender,
        }));
        loop {
            tracing::info!(probe = %self.config.probe_cmd, "probing for responder");
            self.transmit(&self.config.probe_cmd, "").await?;
            match timeout(self.config.retry_timeout, ack_receiver.recv()).await {
                Ok(Some(peer)) => {
                    self.set_receive_callback(steady);
                    *self.state.write().unwrap() = SessionState::Established;
                    tracing::info!(ip = %peer.ip, version = %peer.version, "connected");
                    return Ok(peer);
                }
                Ok(None) => return Err(EstablishError::Closed),
                Err(_) => tracing::info!("handshake timed out, retrying"),
            }
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.read().unwrap()
    }

    pub fn tx_topic(&self) -> &str {
        &self.tx_topic
    }

    pub fn rx_topic(&self) -> &str {
        &self.rx_topic
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum EstablishError {
    #[error("{0}")]
    Transport(#[from] TransportError),
    #[error("The session closed before a responder acknowledged the probe")]
    Closed,
}

/// Handshake-phase handler: watches for the ack and hands the responder's
/// identity to the waiting [`establish`](Session::establish) call.
struct AckListener {
    ack_cmd: String,
    ack: mpsc::Sender<PeerInfo>,
}

#[async_trait::async_trait]
impl Receive for AckListener {
    async fn receive(&self, envelope: Envelope) {
        if envelope.uuid.is_empty() || envelope.cmd != self.ack_cmd || envelope.data.is_empty() {
            return;
        }
        // A duplicate ack finds the channel full or closed; either way the
        // transition happens once.
        let _ = self.ack.try_send(PeerInfo {
            ip: envelope.ip,
            version: envelope.version,
        });
    }
}

/// The answering side of the handshake: acknowledges probe commands with this
/// end's identity and delegates everything else to an inner handler.
pub struct Responder {
    session: Arc<Session>,
    inner: Arc<dyn Receive>,
    ip: String,
}

impl Responder {
    pub fn new(session: Arc<Session>, inner: Arc<dyn Receive>, ip: impl Into<String>) -> Responder {
        Self {
            session,
            inner,
            ip: ip.into(),
        }
    }
}

#[async_trait::async_trait]
impl Receive for Responder {
    async fn receive(&self, envelope: Envelope) {
        // The probe deliberately carries an empty payload, so only the token
        // and command are required here.
        if envelope.uuid.is_empty() || envelope.cmd.is_empty() {
            return;
        }
        if envelope.cmd == self.session.config().probe_cmd {
            let mut ack = Envelope::new(
                "",
                self.session.config().ack_cmd.clone(),
                "ready",
            );
            ack.ip = self.ip.clone();
            ack.version = self.session.config().version.clone();
            if let Err(e) = self.session.transmit_envelope(ack).await {
                tracing::error!(error = %e, "failed to acknowledge probe");
            }
            return;
        }
        self.inner.receive(envelope).await;
    }
}
