//! The [`Bridge`] multiplexer: many outbound connections over one session.

use crate::{
    envelope::Envelope,
    session::{Receive, Session},
    FxDashMap,
};
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

pub mod command;
pub use command::Command;

mod sub_connection;
pub use sub_connection::{SubConnection, SubConnectionState};

use command::{error_text, help_text};

/// Multiplexes independent outbound TCP connections over a single
/// [`Session`].
///
/// The bridge is installed as the session's steady-state handler on the
/// answering side. Each inbound command line is either a control command
/// (`list`, `connect`, `disconnect`, `help`), payload addressed to an open
/// sub-connection by its address, or an error. Replies and forwarded
/// sub-connection output all leave through the one shared session; forwarded
/// output is tagged `[address:port]` so the remote user can tell streams
/// apart.
pub struct Bridge {
    name: String,
    session: Arc<Session>,
    connections: Arc<FxDashMap<String, Arc<SubConnection>>>,
}

impl Bridge {
    /// Creates a bridge known to its users by `name` (the invocation name
    /// substituted into help and error replies).
    pub fn new(name: impl Into<String>, session: Arc<Session>) -> Arc<Bridge> {
        Arc::new(Self {
            name: name.into(),
            session,
            connections: Arc::new(FxDashMap::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interprets one command line. Returns the reply to transmit, or `None`
    /// when the line was payload successfully forwarded to a sub-connection.
    pub async fn handle_command(&self, line: &str) -> Option<String> {
        match Command::parse(line) {
            Command::List => Some(self.list()),
            Command::Connect { address, port } => Some(self.connect(address, &port).await),
            Command::Disconnect { address } => Some(self.disconnect(address).await),
            Command::Help => Some(help_text(&self.name)),
            Command::Unknown => self.forward_line(line).await,
        }
    }

    /// Enumerates sub-connections, sorted by address so the output is
    /// deterministic.
    fn list(&self) -> String {
        let mut entries: Vec<(String, String)> = self
            .connections
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    format!("{} {}", entry.value().endpoint(), entry.value().state()),
                )
            })
            .collect();
        if entries.is_empty() {
            return "no active connections".to_string();
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
            .into_iter()
            .map(|(_, line)| line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn connect(&self, address: String, port: &str) -> String {
        let port: u16 = match port.parse() {
            Ok(port) => port,
            Err(_) => return format!("invalid port '{port}'"),
        };
        if self.connections.contains_key(&address) {
            return format!("already connected to {address}");
        }
        let (sub, reader) = match SubConnection::open(&address, port).await {
            Ok(opened) => opened,
            Err(e) => {
                tracing::debug!(%address, port, error = %e, "outbound connect failed");
                return format!("connect to {address}:{port} failed: {e}");
            }
        };
        let inserted = match self.connections.entry(address.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(sub.clone());
                true
            }
        };
        if !inserted {
            // Lost a race with a concurrent connect for the same address.
            sub.shut_down().await;
            return format!("already connected to {address}");
        }
        let handle = tokio::spawn(SubConnection::forward(
            sub.clone(),
            reader,
            self.session.clone(),
            self.name.clone(),
            self.connections.clone(),
        ));
        sub.attach_forward(handle);
        tracing::info!(endpoint = %sub.endpoint(), "sub-connection opened");
        format!("connected to {}", sub.endpoint())
    }

    async fn disconnect(&self, address: Option<String>) -> String {
        let address = match address {
            Some(address) => address,
            // The bare form only makes sense with exactly one connection.
            None => {
                let mut keys: Vec<String> = self
                    .connections
                    .iter()
                    .map(|entry| entry.key().clone())
                    .collect();
                match keys.len() {
                    1 => keys.remove(0),
                    0 => return "no active connections".to_string(),
                    _ => return "several connections are open, specify an address".to_string(),
                }
            }
        };
        match self.connections.remove(&address) {
            Some((_, sub)) => {
                sub.shut_down().await;
                tracing::info!(endpoint = %sub.endpoint(), "sub-connection closed");
                format!("disconnected from {}", sub.endpoint())
            }
            None => format!("no connection for {address}"),
        }
    }

    /// Treats the line as `<address> <payload>` destined for an open
    /// sub-connection. Lines addressing nothing are rejected with the fixed
    /// unknown-command reply.
    async fn forward_line(&self, line: &str) -> Option<String> {
        let (target, payload) = match line.split_once(char::is_whitespace) {
            Some((target, payload)) => (target, payload.trim_start()),
            None => (line, ""),
        };
        let sub = self
            .connections
            .get(target)
            .map(|entry| entry.value().clone());
        match sub {
            Some(sub) => match sub.write_line(payload).await {
                Ok(()) => None,
                Err(e) => Some(format!("write to {} failed: {e}", sub.endpoint())),
            },
            None => Some(error_text(&self.name)),
        }
    }
}

#[async_trait::async_trait]
impl Receive for Bridge {
    async fn receive(&self, envelope: Envelope) {
        // The interactive client transmits each shell line as the command
        // with an empty payload, so the command line to interpret is `cmd`
        // and only the token and command are required to be present.
        if envelope.uuid.is_empty() || envelope.cmd.is_empty() {
            return;
        }
        if let Some(reply) = self.handle_command(&envelope.cmd).await {
            let reply = format!("{reply}\n");
            if let Err(e) = self.session.transmit(&envelope.cmd, &reply).await {
                tracing::error!(error = %e, "transport failure while replying");
            }
        }
    }
}
