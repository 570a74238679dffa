//! Per-client session state machine.

use std::collections::HashMap;
use std::fmt;

use switchboard_protocol::{
    ConnectionId, NetEventType, NetworkEvent, SERVER_ASSIGNED_ID_BASE,
};

use crate::connection::Connection;

/// Handle naming a session inside its pool.
///
/// Pair maps store handles rather than references so that tearing a
/// session down simply invalidates its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SessionId(pub(crate) u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle states of a peer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    Uninitialized,
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
}

/// Server side state for one connected client.
pub(crate) struct PeerSession {
    pub(crate) id: SessionId,
    pub(crate) state: SessionState,
    pub(crate) connection: Connection,
    /// Pair map: local connection id to the peer on the other side.
    pub(crate) connections: HashMap<ConnectionId, SessionId>,
    pub(crate) next_incoming_id: i16,
    /// Address this session is listening on, if any.
    pub(crate) own_address: Option<String>,
}

impl PeerSession {
    pub(crate) fn new(id: SessionId, connection: Connection) -> Self {
        Self {
            id,
            state: SessionState::Uninitialized,
            connection,
            connections: HashMap::new(),
            next_incoming_id: SERVER_ASSIGNED_ID_BASE,
            own_address: None,
        }
    }

    /// Deliver an event to the client.
    ///
    /// Sends are permitted while Connected or Disconnecting, so that
    /// cleanup notifications still reach the client; a session that
    /// reached Disconnected stays silent.
    pub(crate) fn send_to_client(&self, event: NetworkEvent) {
        match self.state {
            SessionState::Connected
            | SessionState::Disconnecting => {
                self.connection.send_event(event);
            }
            _ => {
                tracing::debug!(
                    session = %self.id,
                    state = ?self.state,
                    event = ?event.event_type,
                    "dropping event for inactive session"
                );
            }
        }
    }

    /// Pair with `other` under a fresh server assigned id.
    pub(crate) fn accept_incoming_connection(
        &mut self,
        other: SessionId,
    ) -> ConnectionId {
        let id = ConnectionId(self.next_incoming_id);
        self.next_incoming_id =
            match self.next_incoming_id.checked_add(1) {
                Some(next) => next,
                None => {
                    tracing::error!(
                        session = %self.id,
                        "incoming connection ids exhausted, restarting at base"
                    );
                    SERVER_ASSIGNED_ID_BASE
                }
            };
        if self.connections.insert(id, other).is_some() {
            tracing::warn!(
                session = %self.id,
                connection = %id,
                "incoming id replaced an existing pairing"
            );
        }
        self.send_to_client(NetworkEvent::empty(
            NetEventType::NewConnection,
            id,
        ));
        id
    }

    /// Pair with `other` under the id the client chose for its
    /// connection attempt.
    pub(crate) fn accept_outgoing_connection(
        &mut self,
        other: SessionId,
        id: ConnectionId,
    ) {
        if self.connections.insert(id, other).is_some() {
            tracing::warn!(
                session = %self.id,
                connection = %id,
                "outgoing id replaced an existing pairing"
            );
        }
        self.send_to_client(NetworkEvent::empty(
            NetEventType::NewConnection,
            id,
        ));
    }

    /// Refuse a connection attempt.
    pub(crate) fn deny_connection(
        &self,
        address: &str,
        id: ConnectionId,
    ) {
        tracing::debug!(
            session = %self.id,
            address,
            connection = %id,
            "connection denied"
        );
        self.send_to_client(NetworkEvent::empty(
            NetEventType::ConnectionFailed,
            id,
        ));
    }

    /// Start listening on `address`.
    pub(crate) fn accept_listening(&mut self, address: &str) {
        self.own_address = Some(address.to_owned());
        self.send_to_client(NetworkEvent::with_text(
            NetEventType::ServerInitialized,
            ConnectionId::INVALID,
            address,
        ));
    }

    /// Refuse a listening request.
    pub(crate) fn deny_listening(&self, address: &str) {
        self.send_to_client(NetworkEvent::with_text(
            NetEventType::ServerInitFailed,
            ConnectionId::INVALID,
            address,
        ));
    }

    /// Local id `other` is known under in this session's pair map.
    ///
    /// Linear scan; pair maps are small.
    pub(crate) fn reverse_id(
        &self,
        other: SessionId,
    ) -> Option<ConnectionId> {
        self.connections
            .iter()
            .find_map(|(id, peer)| (*peer == other).then_some(*id))
    }
}
