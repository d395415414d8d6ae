//! One bridged outbound TCP connection and its forwarding task.

use crate::{session::Session, FxDashMap};
use std::sync::{Arc, Mutex, RwLock};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    task::JoinHandle,
};

/// Lifecycle of a [`SubConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubConnectionState {
    Open,
    Closing,
    Closed,
}

impl std::fmt::Display for SubConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubConnectionState::Open => write!(f, "open"),
            SubConnectionState::Closing => write!(f, "closing"),
            SubConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// An outbound TCP connection multiplexed over a shared [`Session`].
///
/// Owned exclusively by the bridge's address map. The read half lives in a
/// spawned forwarding task; the write half stays here for inbound payload.
pub struct SubConnection {
    address: String,
    port: u16,
    state: RwLock<SubConnectionState>,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    forward: Mutex<Option<JoinHandle<()>>>,
}

impl SubConnection {
    /// Opens the outbound connection and returns the sub-connection along
    /// with the read half for the caller to spawn a forwarding task on.
    pub(super) async fn open(
        address: &str,
        port: u16,
    ) -> std::io::Result<(Arc<SubConnection>, OwnedReadHalf)> {
        let stream = TcpStream::connect((address, port)).await?;
        let (reader, writer) = stream.into_split();
        let sub = Arc::new(Self {
            address: address.to_string(),
            port,
            state: RwLock::new(SubConnectionState::Open),
            writer: tokio::sync::Mutex::new(writer),
            forward: Mutex::new(None),
        });
        Ok((sub, reader))
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn state(&self) -> SubConnectionState {
        *self.state.read().unwrap()
    }

    fn set_state(&self, state: SubConnectionState) {
        *self.state.write().unwrap() = state;
    }

    pub(super) fn attach_forward(&self, handle: JoinHandle<()>) {
        *self.forward.lock().unwrap() = Some(handle);
    }

    /// Writes one line of inbound payload to the remote endpoint.
    pub(super) async fn write_line(&self, text: &str) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(text.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    }

    /// Tears the connection down: stops the forwarding task and releases the
    /// underlying handle.
    pub(super) async fn shut_down(&self) {
        self.set_state(SubConnectionState::Closing);
        if let Some(handle) = self.forward.lock().unwrap().take() {
            handle.abort();
        }
        let _ = self.writer.lock().await.shutdown().await;
        self.set_state(SubConnectionState::Closed);
    }

    /// Forwards everything the remote endpoint sends back out through the
    /// shared session, tagged with this sub-connection's endpoint so the
    /// remote shell user can tell streams apart. Runs until the socket
    /// closes or the transport fails; a peer-initiated close removes the
    /// entry from the map and announces itself.
    pub(super) async fn forward(
        sub: Arc<SubConnection>,
        mut reader: OwnedReadHalf,
        session: Arc<Session>,
        reply_cmd: String,
        connections: Arc<FxDashMap<String, Arc<SubConnection>>>,
    ) {
        let tag = format!("[{}]", sub.endpoint());
        let mut buffer = [0u8; 2048];
        loop {
            match reader.read(&mut buffer).await {
                Ok(0) => break,
                Ok(read) => {
                    let chunk = String::from_utf8_lossy(&buffer[..read]);
                    let payload = format!("{tag} {chunk}");
                    if let Err(e) = session.transmit(&reply_cmd, &payload).await {
                        tracing::error!(endpoint = %sub.endpoint(), error = %e,
                            "transport failure while forwarding, stopping");
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(endpoint = %sub.endpoint(), error = %e,
                        "sub-connection read failed");
                    break;
                }
            }
        }
        sub.set_state(SubConnectionState::Closed);
        // Only remove the entry if it is still this connection; a newer one
        // may have reused the address after a disconnect.
        let removed = connections
            .remove_if(sub.address(), |_, existing| Arc::ptr_eq(existing, &sub))
            .is_some();
        if removed {
            let _ = session
                .transmit(&reply_cmd, &format!("{tag} connection closed"))
                .await;
        }
    }
}
