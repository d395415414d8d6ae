//! Bridge lifecycle against real TCP endpoints on the loopback interface.

use parley_core::{
    bridge::Bridge,
    envelope::Envelope,
    session::{Session, SessionConfig},
    transport::{Broker, Transport},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, time::sleep};

const TX_TOPIC: &str = "bridge/tx";
const RX_TOPIC: &str = "bridge/rx";

/// A TCP server that echoes everything back, for the bridge to dial.
async fn spawn_echo_listener() -> u16 {
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
    port
}

/// A TCP server that hangs up as soon as a client connects.
async fn spawn_hangup_listener() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });
    port
}

async fn test_bridge(broker: Arc<Broker>) -> Arc<Bridge> {
    let session = Session::open(broker, TX_TOPIC, RX_TOPIC, SessionConfig::default())
        .await
        .unwrap();
    Bridge::new("telnet", session)
}

#[tokio::test]
async fn duplicate_connect_is_rejected() {
    let port = spawn_echo_listener().await;
    let bridge = test_bridge(Arc::new(Broker::new())).await;

    let first = bridge
        .handle_command(&format!("connect 127.0.0.1 {port}"))
        .await
        .unwrap();
    assert_eq!(first, format!("connected to 127.0.0.1:{port}"));

    let second = bridge
        .handle_command(&format!("connect 127.0.0.1 {port}"))
        .await
        .unwrap();
    assert_eq!(second, "already connected to 127.0.0.1");
}

#[tokio::test]
async fn list_is_sorted_and_idempotent() {
    let first_port = spawn_echo_listener().await;
    let second_port = spawn_echo_listener().await;
    let bridge = test_bridge(Arc::new(Broker::new())).await;

    bridge
        .handle_command(&format!("connect localhost {second_port}"))
        .await
        .unwrap();
    bridge
        .handle_command(&format!("connect 127.0.0.1 {first_port}"))
        .await
        .unwrap();

    let listing = bridge.handle_command("list").await.unwrap();
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], format!("127.0.0.1:{first_port} open"));
    assert_eq!(lines[1], format!("localhost:{second_port} open"));

    let again = bridge.handle_command("list").await.unwrap();
    assert_eq!(listing, again);
}

#[tokio::test]
async fn disconnect_of_unknown_address_leaves_the_map_unchanged() {
    let port = spawn_echo_listener().await;
    let bridge = test_bridge(Arc::new(Broker::new())).await;

    bridge
        .handle_command(&format!("connect 127.0.0.1 {port}"))
        .await
        .unwrap();
    let before = bridge.handle_command("list").await.unwrap();

    let reply = bridge.handle_command("disconnect 10.9.9.9").await.unwrap();
    assert_eq!(reply, "no connection for 10.9.9.9");

    let after = bridge.handle_command("list").await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn disconnect_closes_and_forgets_the_connection() {
    let port = spawn_echo_listener().await;
    let bridge = test_bridge(Arc::new(Broker::new())).await;

    bridge
        .handle_command(&format!("connect 127.0.0.1 {port}"))
        .await
        .unwrap();
    let reply = bridge.handle_command("disconnect").await.unwrap();
    assert_eq!(reply, format!("disconnected from 127.0.0.1:{port}"));

    assert_eq!(
        bridge.handle_command("list").await.unwrap(),
        "no active connections"
    );
}

#[tokio::test]
async fn concurrent_connects_for_distinct_addresses_both_succeed() {
    let first_port = spawn_echo_listener().await;
    let second_port = spawn_echo_listener().await;
    let bridge = test_bridge(Arc::new(Broker::new())).await;

    let first_cmd = format!("connect 127.0.0.1 {first_port}");
    let second_cmd = format!("connect localhost {second_port}");
    let (first, second) = tokio::join!(
        bridge.handle_command(&first_cmd),
        bridge.handle_command(&second_cmd),
    );
    assert!(first.unwrap().starts_with("connected to"));
    assert!(second.unwrap().starts_with("connected to"));

    let listing = bridge.handle_command("list").await.unwrap();
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("127.0.0.1:"));
    assert!(lines[1].starts_with("localhost:"));
}

#[tokio::test]
async fn refused_connect_is_an_error_reply_not_a_crash() {
    // Bind and drop to find a port nothing is listening on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let bridge = test_bridge(Arc::new(Broker::new())).await;

    let reply = bridge
        .handle_command(&format!("connect 127.0.0.1 {port}"))
        .await
        .unwrap();
    assert!(reply.starts_with(&format!("connect to 127.0.0.1:{port} failed")));
    assert_eq!(
        bridge.handle_command("list").await.unwrap(),
        "no active connections"
    );
}

#[tokio::test]
async fn forwarded_output_is_tagged_with_the_endpoint() {
    let port = spawn_echo_listener().await;
    let broker = Arc::new(Broker::new());
    let mut outbound = broker.subscribe(TX_TOPIC).await.unwrap();
    let bridge = test_bridge(broker).await;

    bridge
        .handle_command(&format!("connect 127.0.0.1 {port}"))
        .await
        .unwrap();
    // Payload addressed to the open sub-connection produces no reply of its
    // own; the echo comes back through the session, tagged.
    assert_eq!(
        bridge.handle_command("127.0.0.1 hello there").await,
        None
    );

    let envelope = Envelope::decode(&outbound.recv().await.unwrap()).unwrap();
    assert_eq!(envelope.cmd, "telnet");
    assert!(envelope.data.starts_with(&format!("[127.0.0.1:{port}] ")));
    assert!(envelope.data.contains("hello there"));
}

#[tokio::test]
async fn peer_initiated_close_removes_and_announces() {
    let port = spawn_hangup_listener().await;
    let broker = Arc::new(Broker::new());
    let mut outbound = broker.subscribe(TX_TOPIC).await.unwrap();
    let bridge = test_bridge(broker).await;

    bridge
        .handle_command(&format!("connect 127.0.0.1 {port}"))
        .await
        .unwrap();

    let envelope = Envelope::decode(&outbound.recv().await.unwrap()).unwrap();
    assert_eq!(
        envelope.data,
        format!("[127.0.0.1:{port}] connection closed")
    );
    assert_eq!(
        bridge.handle_command("list").await.unwrap(),
        "no active connections"
    );
}

#[tokio::test]
async fn command_envelopes_are_answered_through_the_session() {
    let broker = Arc::new(Broker::new());
    let mut outbound = broker.subscribe(TX_TOPIC).await.unwrap();
    let session = Session::open(broker.clone(), TX_TOPIC, RX_TOPIC, SessionConfig::default())
        .await
        .unwrap();
    let bridge = Bridge::new("telnet", session.clone());
    session.set_receive_callback(bridge);

    broker
        .publish(RX_TOPIC, Envelope::new("client", "list", "").encode())
        .await
        .unwrap();

    let reply = Envelope::decode(&outbound.recv().await.unwrap()).unwrap();
    assert_eq!(reply.cmd, "list");
    assert_eq!(reply.data, "no active connections\n");

    // Envelopes without a token cause no reply at all.
    broker
        .publish(RX_TOPIC, Envelope::new("", "list", "").encode())
        .await
        .unwrap();
    sleep(Duration::from_millis(100)).await;
    assert!(outbound.try_recv().is_err());
}
