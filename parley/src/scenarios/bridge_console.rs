use parley_core::{
    bridge::Bridge,
    chat::Chat,
    session::{Responder, Session, SessionConfig},
    shutdown::Shutdown,
    transport::Broker,
};
use std::sync::Arc;
use tokio::io::BufReader;

/// Runs an interactive console against an in-process bridge.
///
/// One session hosts a connection multiplexer that answers `list`, `connect`,
/// and `disconnect` commands and forwards anything else to its open TCP
/// endpoints. The other drives a shell front-end over stdin and stdout. The
/// scenario ends on end of input or Ctrl-C.
pub async fn bridge_console() {
    let broker = Arc::new(Broker::new());

    let bridge_session = Session::open(
        broker.clone(),
        "console/down",
        "console/up",
        SessionConfig::default(),
    )
    .await
    .unwrap();
    let bridge = Bridge::new("telnet", bridge_session.clone());
    bridge_session.set_receive_callback(Arc::new(Responder::new(
        bridge_session.clone(),
        bridge,
        "127.0.0.1",
    )));

    let session = Session::open(
        broker.clone(),
        "console/up",
        "console/down",
        SessionConfig::default(),
    )
    .await
    .unwrap();
    let shutdown = Shutdown::new();
    let mut at_shutdown = shutdown.receiver();
    let chat = Chat::new(
        session,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        shutdown,
    );
    let chat_task = tokio::spawn(chat.run());

    tokio::select! {
        _ = at_shutdown.recv() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, shutting down");
        }
    }
    chat_task.abort();
}
