//! Per-application registry of sessions and listening addresses.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use switchboard_protocol::{
    ConnectionId, NetEventType, NetworkEvent, MAX_ADDRESS_LENGTH,
};

use crate::{
    connection::Connection,
    session::{PeerSession, SessionId, SessionState},
};

/// Shared handle to a pool.
///
/// The mutex is the pool's serializer: at most one operation runs
/// against a pool and its sessions at any instant, which is what
/// keeps pair maps bidirectional without per-session locks.
pub(crate) type Pool = Arc<Mutex<PeerPool>>;

/// One address namespace and the sessions registered in it.
pub(crate) struct PeerPool {
    name: String,
    address_sharing: bool,
    sessions: HashMap<SessionId, PeerSession>,
    listeners: HashMap<String, Vec<SessionId>>,
    next_session_id: u64,
}

impl PeerPool {
    pub(crate) fn new(
        name: impl Into<String>,
        address_sharing: bool,
    ) -> Self {
        Self {
            name: name.into(),
            address_sharing,
            sessions: HashMap::new(),
            listeners: HashMap::new(),
            next_session_id: 0,
        }
    }

    /// Register a freshly admitted socket and return its session
    /// handle.
    pub(crate) fn add_session(
        &mut self,
        connection: Connection,
    ) -> SessionId {
        let id = SessionId(self.next_session_id);
        self.next_session_id += 1;
        let mut session = PeerSession::new(id, connection);
        session.state = SessionState::Connecting;
        self.sessions.insert(id, session);
        if let Some(session) = self.sessions.get_mut(&id) {
            session.state = SessionState::Connected;
        }
        tracing::debug!(
            pool = %self.name,
            session = %id,
            count = self.session_count(),
            "session connected"
        );
        id
    }

    /// Dispatch an event received from a client.
    pub(crate) fn handle_event(
        &mut self,
        sid: SessionId,
        event: NetworkEvent,
    ) {
        if !self.sessions.contains_key(&sid) {
            tracing::warn!(
                pool = %self.name,
                session = %sid,
                "event for unknown session"
            );
            return;
        }
        match event.event_type {
            NetEventType::NewConnection => match event.address() {
                Some(address) => self.on_connection_request(
                    sid,
                    address,
                    event.connection_id,
                ),
                None => tracing::warn!(
                    pool = %self.name,
                    session = %sid,
                    "connection request without an address"
                ),
            },
            NetEventType::Disconnected => {
                self.disconnect_pairing(sid, event.connection_id);
            }
            NetEventType::ServerInitialized => {
                match event.address() {
                    Some(address) => {
                        // A session listens on at most one address:
                        // drop any previous registration first.
                        let previous = self
                            .sessions
                            .get_mut(&sid)
                            .and_then(|s| s.own_address.take());
                        if let Some(previous) = previous {
                            self.remove_listener(sid, &previous);
                        }
                        self.on_listening_request(sid, address);
                    }
                    None => tracing::warn!(
                        pool = %self.name,
                        session = %sid,
                        "listening request without an address"
                    ),
                }
            }
            NetEventType::ServerClosed => {
                self.on_stop_listening(sid);
            }
            NetEventType::ReliableMessageReceived
            | NetEventType::UnreliableMessageReceived => {
                self.forward_message(sid, event);
            }
            _ => tracing::debug!(
                pool = %self.name,
                session = %sid,
                event = ?event.event_type,
                "ignoring client event"
            ),
        }
    }

    /// A session wants to listen on `address`.
    fn on_listening_request(&mut self, sid: SessionId, address: &str) {
        if !self.is_available(address) {
            if let Some(session) = self.sessions.get(&sid) {
                session.deny_listening(address);
            }
            return;
        }

        let existing = self
            .listeners
            .get(address)
            .cloned()
            .unwrap_or_default();
        self.listeners
            .entry(address.to_owned())
            .or_default()
            .push(sid);
        if let Some(session) = self.sessions.get_mut(&sid) {
            session.accept_listening(address);
        }
        tracing::debug!(
            pool = %self.name,
            session = %sid,
            address,
            "listening"
        );

        if self.address_sharing {
            // Auto-connect the new listener to every pre-existing
            // listener, the other side first for each pair.
            for other_id in existing {
                if other_id == sid {
                    continue;
                }
                if let Some(other) = self.sessions.get_mut(&other_id)
                {
                    other.accept_incoming_connection(sid);
                }
                if let Some(session) = self.sessions.get_mut(&sid) {
                    session.accept_incoming_connection(other_id);
                }
            }
        }
    }

    fn is_available(&self, address: &str) -> bool {
        address.encode_utf16().count() <= MAX_ADDRESS_LENGTH
            && (self.address_sharing
                || self
                    .listeners
                    .get(address)
                    .map_or(true, |list| list.is_empty()))
    }

    /// A session no longer listens on its address.
    fn on_stop_listening(&mut self, sid: SessionId) {
        let address = self
            .sessions
            .get_mut(&sid)
            .and_then(|s| s.own_address.take());
        match address {
            Some(address) => {
                self.remove_listener(sid, &address);
                if let Some(session) = self.sessions.get(&sid) {
                    session.send_to_client(NetworkEvent::empty(
                        NetEventType::ServerClosed,
                        ConnectionId::INVALID,
                    ));
                }
            }
            None => tracing::debug!(
                pool = %self.name,
                session = %sid,
                "stop listening without an address"
            ),
        }
    }

    fn remove_listener(&mut self, sid: SessionId, address: &str) {
        if let Some(list) = self.listeners.get_mut(address) {
            list.retain(|entry| *entry != sid);
            if list.is_empty() {
                self.listeners.remove(address);
            }
        }
    }

    /// A session wants to connect to whoever listens on `address`,
    /// under the id it chose for the attempt.
    fn on_connection_request(
        &mut self,
        sid: SessionId,
        address: &str,
        id: ConnectionId,
    ) {
        let listeners = self
            .listeners
            .get(address)
            .cloned()
            .unwrap_or_default();

        // An outgoing connect is only defined for exactly one
        // (foreign) listener; shared addresses auto-connect on
        // listen instead.
        let target = match listeners.as_slice() {
            [other] if *other != sid => Some(*other),
            _ => None,
        };
        let Some(other_id) = target else {
            if listeners.len() > 1 {
                tracing::debug!(
                    pool = %self.name,
                    session = %sid,
                    address,
                    "connect to a shared address denied"
                );
            }
            if let Some(session) = self.sessions.get(&sid) {
                session.deny_connection(address, id);
            }
            return;
        };

        if !self.sessions.contains_key(&other_id) {
            tracing::error!(
                pool = %self.name,
                address,
                listener = %other_id,
                "listener entry for a missing session"
            );
            if let Some(session) = self.sessions.get(&sid) {
                session.deny_connection(address, id);
            }
            return;
        }
        if let Some(other) = self.sessions.get_mut(&other_id) {
            other.accept_incoming_connection(sid);
        }
        if let Some(session) = self.sessions.get_mut(&sid) {
            session.accept_outgoing_connection(other_id, id);
        }
    }

    /// Relay a user message to the other side of a pairing.
    fn forward_message(
        &mut self,
        sid: SessionId,
        event: NetworkEvent,
    ) {
        let Some(session) = self.sessions.get(&sid) else {
            return;
        };
        let Some(other_id) =
            session.connections.get(&event.connection_id).copied()
        else {
            // The client may still be sending on a pairing it has
            // not yet learned is gone.
            tracing::debug!(
                pool = %self.name,
                session = %sid,
                connection = %event.connection_id,
                "message for an unknown pairing dropped"
            );
            return;
        };
        let Some(other) = self.sessions.get(&other_id) else {
            tracing::error!(
                pool = %self.name,
                session = %sid,
                peer = %other_id,
                "pair map references a missing session"
            );
            return;
        };
        let Some(remote_id) = other.reverse_id(sid) else {
            tracing::error!(
                pool = %self.name,
                session = %sid,
                peer = %other_id,
                "pair map is not bidirectional"
            );
            return;
        };
        other.send_to_client(NetworkEvent::new(
            event.event_type,
            remote_id,
            event.payload,
        ));
    }

    /// Tear down one pairing on both sides.
    fn disconnect_pairing(
        &mut self,
        sid: SessionId,
        local_id: ConnectionId,
    ) {
        let Some(session) = self.sessions.get_mut(&sid) else {
            return;
        };
        let Some(other_id) = session.connections.remove(&local_id)
        else {
            tracing::debug!(
                pool = %self.name,
                session = %sid,
                connection = %local_id,
                "disconnect for an unknown pairing"
            );
            return;
        };
        session.send_to_client(NetworkEvent::empty(
            NetEventType::Disconnected,
            local_id,
        ));

        match self.sessions.get_mut(&other_id) {
            Some(other) => match other.reverse_id(sid) {
                Some(remote_id) => {
                    other.connections.remove(&remote_id);
                    other.send_to_client(NetworkEvent::empty(
                        NetEventType::Disconnected,
                        remote_id,
                    ));
                }
                None => tracing::error!(
                    pool = %self.name,
                    session = %sid,
                    peer = %other_id,
                    "pair map is not bidirectional"
                ),
            },
            None => tracing::error!(
                pool = %self.name,
                session = %sid,
                peer = %other_id,
                "pair map references a missing session"
            ),
        }
    }

    /// Single cleanup funnel for every disconnect path: remote
    /// close, read error, malformed frame, missed heartbeat.
    ///
    /// Idempotent; a second trigger for the same session is a no-op.
    pub(crate) fn close_session(&mut self, sid: SessionId) {
        let Some(session) = self.sessions.get_mut(&sid) else {
            tracing::debug!(
                pool = %self.name,
                session = %sid,
                "cleanup for a session already removed"
            );
            return;
        };
        if matches!(
            session.state,
            SessionState::Disconnecting | SessionState::Disconnected
        ) {
            return;
        }
        session.state = SessionState::Disconnecting;

        // The teardown mutates the pair map, so iterate a snapshot.
        let pairings: Vec<ConnectionId> =
            session.connections.keys().copied().collect();
        for id in pairings {
            self.disconnect_pairing(sid, id);
        }

        let address = self
            .sessions
            .get_mut(&sid)
            .and_then(|s| s.own_address.take());
        if let Some(address) = address {
            self.remove_listener(sid, &address);
            if let Some(session) = self.sessions.get(&sid) {
                session.send_to_client(NetworkEvent::empty(
                    NetEventType::ServerClosed,
                    ConnectionId::INVALID,
                ));
            }
        }

        if let Some(session) = self.sessions.get_mut(&sid) {
            session.connection.dispose();
            session.state = SessionState::Disconnected;
        }
        self.sessions.remove(&sid);
        tracing::debug!(
            pool = %self.name,
            session = %sid,
            count = self.session_count(),
            "session disconnected"
        );
    }

    /// Number of registered sessions.
    pub(crate) fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
