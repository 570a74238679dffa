use axum::{
    extract::{
        ws::{
            close_code, CloseFrame, Message, WebSocket,
            WebSocketUpgrade,
        },
        Extension, MatchedPath, Query,
    },
    http::StatusCode,
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::IntervalStream;

use switchboard_protocol::{
    decode, encode, Frame, PROTOCOL_VERSION,
};

use crate::{
    connection::{Connection, Outbound, HEARTBEAT_INTERVAL},
    pool::Pool,
    server::State,
    session::SessionId,
};

/// Query parameters accepted on the websocket upgrade.
#[derive(Debug, Deserialize)]
pub(crate) struct UpgradeQuery {
    #[serde(rename = "userToken")]
    user_token: Option<String>,
}

/// Upgrade to a websocket connection.
pub(crate) async fn upgrade(
    Extension(state): Extension<State>,
    path: MatchedPath,
    Query(query): Query<UpgradeQuery>,
    ws: WebSocketUpgrade,
) -> std::result::Result<Response, StatusCode> {
    tracing::debug!(
        path = path.as_str(),
        "websocket upgrade request"
    );

    let Some(pool) = state.pools.get(path.as_str()) else {
        return Err(StatusCode::NOT_FOUND);
    };
    let pool = Arc::clone(pool);
    let admitted =
        state.is_admitted(query.user_token.as_deref()).await;

    let ws = ws.max_message_size(state.config.max_payload);
    Ok(ws.on_upgrade(move |socket| async move {
        if admitted {
            accept(socket, pool).await;
        } else {
            reject(socket).await;
        }
    }))
}

/// Close a socket that presented no valid user token.
async fn reject(mut socket: WebSocket) {
    tracing::debug!("closing socket, invalid token");
    let frame = CloseFrame {
        code: close_code::POLICY,
        reason: "Invalid token".into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

/// Wire an admitted socket into its pool.
async fn accept(socket: WebSocket, pool: Pool) {
    let (ws_writer, ws_reader) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();
    let connection = Connection::new(tx);

    tokio::spawn(write(ws_writer, rx));

    let session_id = {
        let mut pool = pool.lock().await;
        pool.add_session(connection.clone())
    };

    let reader = tokio::spawn(read(
        ws_reader,
        Arc::clone(&pool),
        session_id,
        connection.clone(),
    ));
    connection.set_reader(reader.abort_handle());

    let heartbeat = tokio::spawn(heartbeat(
        Arc::clone(&pool),
        session_id,
        connection.clone(),
    ));
    connection.set_heartbeat(heartbeat.abort_handle());
}

async fn write(
    mut sender: SplitSink<WebSocket, Message>,
    mut outgoing: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(command) = outgoing.recv().await {
        match command {
            Outbound::Frame(frame) => match encode(&frame).await {
                Ok(buffer) => {
                    if sender
                        .send(Message::Binary(buffer))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        "frame encoding failed"
                    );
                    break;
                }
            },
            Outbound::Ping => {
                if sender
                    .send(Message::Ping(Vec::new()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Outbound::Close(frame) => {
                let _ = sender.send(Message::Close(frame)).await;
                break;
            }
        }
    }
}

async fn read(
    mut receiver: SplitStream<WebSocket>,
    pool: Pool,
    session_id: SessionId,
    connection: Connection,
) {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Binary(buffer)) => {
                match decode(&buffer).await {
                    Ok(Frame::Heartbeat) => {
                        connection.send_frame(Frame::Heartbeat);
                    }
                    Ok(Frame::Version(version)) => {
                        tracing::debug!(
                            session = %session_id,
                            version,
                            "client protocol version"
                        );
                        connection.record_remote_version(version);
                        connection.send_frame(Frame::Version(
                            PROTOCOL_VERSION,
                        ));
                    }
                    Ok(Frame::Event(event)) => {
                        let mut pool = pool.lock().await;
                        pool.handle_event(session_id, event);
                    }
                    Ok(Frame::Noop) => {
                        tracing::error!(
                            session = %session_id,
                            "empty frame"
                        );
                        break;
                    }
                    Err(e) => {
                        tracing::error!(
                            session = %session_id,
                            error = %e,
                            "malformed frame"
                        );
                        break;
                    }
                }
            }
            Ok(Message::Text(_)) => {}
            Ok(Message::Ping(_)) => {}
            Ok(Message::Pong(_)) => connection.mark_pong(),
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::warn!(
                    session = %session_id,
                    error = %e,
                    "socket read error"
                );
                break;
            }
        }
    }
    pool.lock().await.close_session(session_id);
}

/// Declare the connection dead when no pong arrived since the
/// previous tick.
async fn heartbeat(
    pool: Pool,
    session_id: SessionId,
    connection: Connection,
) {
    let interval = tokio::time::interval(HEARTBEAT_INTERVAL);
    let mut stream = IntervalStream::new(interval);
    while stream.next().await.is_some() {
        if connection.is_disposed() {
            break;
        }
        if !connection.take_pong() {
            tracing::warn!(
                session = %session_id,
                "no pong since last tick, closing"
            );
            pool.lock().await.close_session(session_id);
            break;
        }
        connection.send_ping();
    }
}
