use parley_core::{
    bridge::Bridge,
    chat::Chat,
    session::{Responder, Session, SessionConfig},
    shutdown::Shutdown,
    transport::Broker,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::{io::BufReader, net::TcpListener, time::sleep};

/// Runs a scripted bridge exchange.
///
/// A bridge answers one session while a scripted front-end drives it through
/// its whole command surface: connect to a local echo listener, list the
/// connection, forward a payload line, disconnect, and list again. All
/// replies and the tagged echo render to stdout.
pub async fn bridge_list() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });

    let broker = Arc::new(Broker::new());
    let bridge_session = Session::open(
        broker.clone(),
        "bridge/down",
        "bridge/up",
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
        "bridge/up",
        "bridge/down",
        SessionConfig::default(),
    )
    .await
    .unwrap();
    let script = format!(
        "help\nconnect 127.0.0.1 {port}\nlist\n127.0.0.1 ping\ndisconnect\nlist\n"
    );
    let chat = Chat::new(
        session,
        BufReader::new(script.as_bytes()),
        tokio::io::stdout(),
        Shutdown::new(),
    );
    chat.run().await.unwrap();

    // Let the tagged echo and the final listing render.
    sleep(Duration::from_millis(300)).await;
}
