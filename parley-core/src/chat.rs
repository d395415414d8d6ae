//! The interactive front-end: a line-oriented read loop over a [`Session`].

use crate::{
    envelope::Envelope,
    session::{EstablishError, PeerInfo, Receive, Session},
    shutdown::Shutdown,
    transport::TransportError,
};
use std::sync::Arc;
use thiserror::Error as ThisError;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};

/// Marker rendered after every piece of output to invite the next command.
pub const PROMPT: &str = "> ";

/// Drives a shell-like conversation: establishes the session, then feeds
/// each input line to [`Session::transmit`] while a render handler writes
/// inbound data and the prompt to the output sink.
///
/// The input and output capabilities are injected; wiring stdin and stdout
/// happens only at the outermost composition point.
pub struct Chat<R, W> {
    session: Arc<Session>,
    input: R,
    output: Arc<Mutex<W>>,
    shutdown: Shutdown,
}

impl<R, W> Chat<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(session: Arc<Session>, input: R, output: W, shutdown: Shutdown) -> Chat<R, W> {
        Self {
            session,
            input,
            output: Arc::new(Mutex::new(output)),
            shutdown,
        }
    }

    /// Establishes the session, prints the login banner, and runs the read
    /// loop until the input stream ends. The end of input is the end of the
    /// session: the loop stops cleanly and trips the shutdown handle.
    pub async fn run(mut self) -> Result<(), ChatError> {
        let render = Arc::new(Render {
            output: self.output.clone(),
        });
        let peer = self.session.establish(render).await?;
        {
            let mut output = self.output.lock().await;
            output
                .write_all(login_banner(&self.session, &peer).as_bytes())
                .await?;
            output.write_all(PROMPT.as_bytes()).await?;
            output.flush().await?;
        }

        let mut line = String::new();
        loop {
            line.clear();
            let read = self.input.read_line(&mut line).await?;
            if read == 0 {
                tracing::info!("input ended, closing session");
                break;
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                let mut output = self.output.lock().await;
                output.write_all(PROMPT.as_bytes()).await?;
                output.flush().await?;
            } else {
                self.session.transmit(line, "").await?;
            }
        }
        self.shutdown.shut_down();
        Ok(())
    }
}

fn login_banner(session: &Session, peer: &PeerInfo) -> String {
    format!(
        "-------------------------------------------------\r\n\
         |  parley shell client\r\n\
         |\r\n\
         |  IP: {}\r\n\
         |  SERVER VER: {} - CLIENT VER: {}\r\n\
         |  TX: {}\r\n\
         |  RX: {}\r\n\
         |\r\n\
         -------------------------------------------------\r\n",
        peer.ip,
        peer.version,
        session.config().version,
        session.tx_topic(),
        session.rx_topic(),
    )
}

/// Steady-state handler: renders inbound payloads followed by the prompt.
struct Render<W> {
    output: Arc<Mutex<W>>,
}

#[async_trait::async_trait]
impl<W> Receive for Render<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn receive(&self, envelope: Envelope) {
        if !envelope.is_relevant() {
            return;
        }
        let text = envelope.data.strip_suffix('\n').unwrap_or(&envelope.data);
        // A failed render must not take down the dispatch task.
        let mut output = self.output.lock().await;
        let _ = output.write_all(text.as_bytes()).await;
        let _ = output.write_all(b"\n").await;
        let _ = output.write_all(PROMPT.as_bytes()).await;
        let _ = output.flush().await;
    }
}

#[derive(Debug, ThisError)]
pub enum ChatError {
    #[error("{0}")]
    Establish(#[from] EstablishError),
    #[error("{0}")]
    Transport(#[from] TransportError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}
