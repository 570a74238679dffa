use anyhow::Result;
use std::net::SocketAddr;

use switchboard_protocol::{
    ConnectionId, NetEventType, NetworkEvent, Payload,
};

use crate::test_utils::{
    app, config, init_tracing, spawn_server, utf16_bytes, TestClient,
};

/// Listen on "room" with one peer and pair a second peer with it
/// under the client chosen id 42.
async fn pair(addr: SocketAddr) -> Result<(TestClient, TestClient)> {
    let url = format!("ws://{}/callapp", addr);

    let mut p1 = TestClient::connect(&url).await?;
    p1.send_event(NetworkEvent::with_text(
        NetEventType::ServerInitialized,
        ConnectionId::INVALID,
        "room",
    ))
    .await?;
    let event = p1.recv_event().await?;
    assert_eq!(NetEventType::ServerInitialized, event.event_type);
    assert_eq!(Some("room"), event.address());

    let mut p2 = TestClient::connect(&url).await?;
    p2.send_event(NetworkEvent::with_text(
        NetEventType::NewConnection,
        ConnectionId(42),
        "room",
    ))
    .await?;
    let event = p1.recv_event().await?;
    assert_eq!(NetEventType::NewConnection, event.event_type);
    assert_eq!(ConnectionId(16384), event.connection_id);
    let event = p2.recv_event().await?;
    assert_eq!(NetEventType::NewConnection, event.event_type);
    assert_eq!(ConnectionId(42), event.connection_id);

    Ok((p1, p2))
}

/// Test listening, connecting and relaying a reliable message.
#[tokio::test]
async fn relays_messages_between_paired_peers() -> Result<()> {
    init_tracing();
    let (addr, _handle) =
        spawn_server(config(vec![app("CallApp", "/callapp", false)]))
            .await?;
    let (mut p1, mut p2) = pair(addr).await?;

    let message = utf16_bytes("hi");
    p2.send_event(NetworkEvent::new(
        NetEventType::ReliableMessageReceived,
        ConnectionId(42),
        Payload::Binary(message.clone()),
    ))
    .await?;
    let event = p1.recv_event().await?;
    assert_eq!(
        NetEventType::ReliableMessageReceived,
        event.event_type
    );
    assert_eq!(ConnectionId(16384), event.connection_id);
    assert_eq!(Payload::Binary(message), event.payload);

    Ok(())
}

/// Test that a second listener on a taken address is refused.
#[tokio::test]
async fn duplicate_listen_is_denied() -> Result<()> {
    init_tracing();
    let (addr, _handle) =
        spawn_server(config(vec![app("CallApp", "/callapp", false)]))
            .await?;
    let url = format!("ws://{}/callapp", addr);

    let mut p1 = TestClient::connect(&url).await?;
    p1.send_event(NetworkEvent::with_text(
        NetEventType::ServerInitialized,
        ConnectionId::INVALID,
        "room",
    ))
    .await?;
    p1.recv_event().await?;

    let mut p3 = TestClient::connect(&url).await?;
    p3.send_event(NetworkEvent::with_text(
        NetEventType::ServerInitialized,
        ConnectionId::INVALID,
        "room",
    ))
    .await?;
    let event = p3.recv_event().await?;
    assert_eq!(NetEventType::ServerInitFailed, event.event_type);
    assert_eq!(Some("room"), event.address());
    p1.expect_silence().await;

    Ok(())
}

/// Test that a client initiated disconnect notifies both sides and
/// leaves both sessions usable.
#[tokio::test]
async fn disconnect_reaches_both_sides() -> Result<()> {
    init_tracing();
    let (addr, _handle) =
        spawn_server(config(vec![app("CallApp", "/callapp", false)]))
            .await?;
    let (mut p1, mut p2) = pair(addr).await?;

    p2.send_event(NetworkEvent::empty(
        NetEventType::Disconnected,
        ConnectionId(42),
    ))
    .await?;
    let event = p1.recv_event().await?;
    assert_eq!(NetEventType::Disconnected, event.event_type);
    assert_eq!(ConnectionId(16384), event.connection_id);
    let event = p2.recv_event().await?;
    assert_eq!(NetEventType::Disconnected, event.event_type);
    assert_eq!(ConnectionId(42), event.connection_id);

    // Both peers are still connected: pairing again works and the
    // listener hands out the next incoming id.
    p2.send_event(NetworkEvent::with_text(
        NetEventType::NewConnection,
        ConnectionId(43),
        "room",
    ))
    .await?;
    let event = p1.recv_event().await?;
    assert_eq!(NetEventType::NewConnection, event.event_type);
    assert_eq!(ConnectionId(16385), event.connection_id);
    let event = p2.recv_event().await?;
    assert_eq!(ConnectionId(43), event.connection_id);

    Ok(())
}

/// Test that an abrupt transport close is propagated to the paired
/// peer.
#[tokio::test]
async fn transport_close_propagates_disconnect() -> Result<()> {
    init_tracing();
    let (addr, _handle) =
        spawn_server(config(vec![app("CallApp", "/callapp", false)]))
            .await?;
    let (mut p1, p2) = pair(addr).await?;

    p2.close().await?;
    let event = p1.recv_event().await?;
    assert_eq!(NetEventType::Disconnected, event.event_type);
    assert_eq!(ConnectionId(16384), event.connection_id);

    Ok(())
}

/// Test that shared listeners are auto-connected to each other and
/// that outgoing connects to a shared address are refused.
#[tokio::test]
async fn shared_listeners_cross_connect() -> Result<()> {
    init_tracing();
    let (addr, _handle) = spawn_server(config(vec![app(
        "ConferenceApp",
        "/conferenceapp",
        true,
    )]))
    .await?;
    let url = format!("ws://{}/conferenceapp", addr);

    let mut p1 = TestClient::connect(&url).await?;
    p1.send_event(NetworkEvent::with_text(
        NetEventType::ServerInitialized,
        ConnectionId::INVALID,
        "r",
    ))
    .await?;
    let event = p1.recv_event().await?;
    assert_eq!(NetEventType::ServerInitialized, event.event_type);

    let mut p2 = TestClient::connect(&url).await?;
    p2.send_event(NetworkEvent::with_text(
        NetEventType::ServerInitialized,
        ConnectionId::INVALID,
        "r",
    ))
    .await?;
    let event = p2.recv_event().await?;
    assert_eq!(NetEventType::ServerInitialized, event.event_type);
    let event = p2.recv_event().await?;
    assert_eq!(NetEventType::NewConnection, event.event_type);
    assert_eq!(ConnectionId(16384), event.connection_id);
    let event = p1.recv_event().await?;
    assert_eq!(NetEventType::NewConnection, event.event_type);
    assert_eq!(ConnectionId(16384), event.connection_id);

    // Outgoing connect to a shared address is refused.
    let mut p3 = TestClient::connect(&url).await?;
    p3.send_event(NetworkEvent::with_text(
        NetEventType::NewConnection,
        ConnectionId(7),
        "r",
    ))
    .await?;
    let event = p3.recv_event().await?;
    assert_eq!(NetEventType::ConnectionFailed, event.event_type);
    assert_eq!(ConnectionId(7), event.connection_id);
    p1.expect_silence().await;
    p2.expect_silence().await;

    Ok(())
}
