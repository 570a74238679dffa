use anyhow::Result;

use switchboard_protocol::{
    ConnectionId, Frame, NetEventType, NetworkEvent,
    PROTOCOL_VERSION,
};

use crate::test_utils::{
    app, config, init_tracing, spawn_server, TestClient,
};

/// Test the version and heartbeat exchanges.
#[tokio::test]
async fn version_and_heartbeat_exchange() -> Result<()> {
    init_tracing();
    let (addr, _handle) =
        spawn_server(config(vec![app("CallApp", "/callapp", false)]))
            .await?;
    let url = format!("ws://{}/callapp", addr);

    let mut client = TestClient::connect(&url).await?;
    client.send(Frame::Version(1)).await?;
    assert_eq!(
        Frame::Version(PROTOCOL_VERSION),
        client.recv_frame().await?
    );

    client.send(Frame::Heartbeat).await?;
    assert_eq!(Frame::Heartbeat, client.recv_frame().await?);

    Ok(())
}

/// Test that a malformed frame tears the session down and notifies
/// the paired peer.
#[tokio::test]
async fn malformed_frame_closes_the_session() -> Result<()> {
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

    let mut p2 = TestClient::connect(&url).await?;
    p2.send_event(NetworkEvent::with_text(
        NetEventType::NewConnection,
        ConnectionId(42),
        "room",
    ))
    .await?;
    p1.recv_event().await?;
    p2.recv_event().await?;

    // Unknown event type 9.
    p2.send_raw(vec![9, 0, 0, 0]).await?;
    assert_eq!(Some(1000), p2.wait_close().await?);

    let event = p1.recv_event().await?;
    assert_eq!(NetEventType::Disconnected, event.event_type);
    assert_eq!(ConnectionId(16384), event.connection_id);

    Ok(())
}
