use anyhow::Result;

use switchboard_protocol::{
    ConnectionId, NetEventType, NetworkEvent,
};
use switchboard_server::ServerConfig;

use crate::test_utils::{
    app, init_tracing, register_token, spawn_server, TestClient,
};

fn guarded_config() -> ServerConfig {
    ServerConfig {
        apps: vec![app("CallApp", "/callapp", false)],
        admin_token: Some("admin-secret".to_owned()),
        ..Default::default()
    }
}

/// Test that sockets without a registered token are closed with a
/// policy violation.
#[tokio::test]
async fn socket_without_token_is_rejected() -> Result<()> {
    init_tracing();
    let (addr, _handle) = spawn_server(guarded_config()).await?;

    let url = format!("ws://{}/callapp", addr);
    let mut client = TestClient::connect(&url).await?;
    assert_eq!(Some(1008), client.wait_close().await?);

    let url = format!("ws://{}/callapp?userToken=unknown", addr);
    let mut client = TestClient::connect(&url).await?;
    assert_eq!(Some(1008), client.wait_close().await?);

    Ok(())
}

/// Test that a registered token admits the socket.
#[tokio::test]
async fn registered_token_is_admitted() -> Result<()> {
    init_tracing();
    let (addr, _handle) = spawn_server(guarded_config()).await?;

    assert_eq!(
        401,
        register_token(addr, "wrong-secret", "u1").await?
    );
    assert_eq!(
        200,
        register_token(addr, "admin-secret", "u1").await?
    );

    let url = format!("ws://{}/callapp?userToken=u1", addr);
    let mut client = TestClient::connect(&url).await?;
    client
        .send_event(NetworkEvent::with_text(
            NetEventType::ServerInitialized,
            ConnectionId::INVALID,
            "room",
        ))
        .await?;
    let event = client.recv_event().await?;
    assert_eq!(NetEventType::ServerInitialized, event.event_type);

    Ok(())
}
