use parley_core::{
    chat::Chat,
    envelope::Envelope,
    session::{Receive, Responder, Session, SessionConfig},
    shutdown::Shutdown,
    transport::Broker,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::{io::BufReader, time::sleep};

/// Runs a scripted shell exchange.
///
/// A responder and a front-end share the in-process broker. The front-end
/// feeds two canned command lines through the session; the responder
/// acknowledges each one and the replies render to stdout. The scenario ends
/// when the scripted input runs out.
pub async fn shell_echo() {
    let broker = Arc::new(Broker::new());
    let commands_seen = Arc::new(AtomicUsize::new(0));

    // The responder listens on the topic the front-end transmits on.
    let responder_session = Session::open(
        broker.clone(),
        "shell/down",
        "shell/up",
        SessionConfig::default(),
    )
    .await
    .unwrap();
    let echo = Arc::new(Echo {
        session: responder_session.clone(),
        commands_seen: commands_seen.clone(),
    });
    responder_session.set_receive_callback(Arc::new(Responder::new(
        responder_session.clone(),
        echo,
        "127.0.0.1",
    )));

    let session = Session::open(
        broker.clone(),
        "shell/up",
        "shell/down",
        SessionConfig::default(),
    )
    .await
    .unwrap();
    let script: &[u8] = b"uptime\nwho\n";
    let chat = Chat::new(
        session,
        BufReader::new(script),
        tokio::io::stdout(),
        Shutdown::new(),
    );
    chat.run().await.unwrap();

    // Let the final replies render before tearing the broker down.
    sleep(Duration::from_millis(200)).await;
    assert_eq!(commands_seen.load(Ordering::SeqCst), 2);
}

/// Answers every command line with a canned acknowledgment.
struct Echo {
    session: Arc<Session>,
    commands_seen: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Receive for Echo {
    async fn receive(&self, envelope: Envelope) {
        if envelope.uuid.is_empty() || envelope.cmd.is_empty() {
            return;
        }
        self.commands_seen.fetch_add(1, Ordering::SeqCst);
        let reply = format!("{} ok\n", envelope.cmd);
        if let Err(e) = self.session.transmit(&envelope.cmd, &reply).await {
            tracing::error!(error = %e, "echo reply failed");
        }
    }
}
