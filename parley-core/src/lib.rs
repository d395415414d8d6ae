//! Shell-style sessions over an asynchronous publish/subscribe transport.
//!
//! A client obtains an interactive, shell-like conversation with a remote
//! responder without any direct socket between the two ends: every message
//! travels as an [`Envelope`] over a pair of pub/sub topics. The transport is
//! assumed to deliver each message at most once, in no particular order, so
//! the session layer tolerates duplicate, reordered, and lost messages.
//!
//! # Organization
//!
//! - [`Envelope`](envelope::Envelope) is the wire unit: a command, its
//!   payload, and a correlation token, serialized as JSON.
//! - [`Transport`](transport::Transport) is the seam to the underlying
//!   pub/sub client. [`Broker`](transport::Broker) is an in-process
//!   implementation used by tests and scenarios.
//! - [`Session`](session::Session) owns one conversation: the retry-until-ack
//!   handshake and the steady-state dispatch of inbound envelopes to the one
//!   active [`Receive`](session::Receive) handler.
//! - [`Chat`](chat::Chat) drives a line-oriented read loop over a session and
//!   renders inbound data plus a prompt.
//! - [`Bridge`](bridge::Bridge) multiplexes independent outbound TCP
//!   connections over a single session, demultiplexing inbound commands to
//!   the right sub-connection.

pub mod envelope;
pub use envelope::Envelope;

pub mod transport;
pub use transport::Transport;

pub mod session;
pub use session::{Receive, Session};

pub mod chat;
pub use chat::Chat;

pub mod bridge;
pub use bridge::Bridge;

pub mod shutdown;
pub use shutdown::Shutdown;

use std::hash::BuildHasherDefault;

/// A [`DashMap`](dashmap::DashMap) using the Fx hashing algorithm.
pub type FxDashMap<K, V> = dashmap::DashMap<K, V, BuildHasherDefault<rustc_hash::FxHasher>>;
