use std::fmt;

/// Identifier for one peer-to-peer pairing from the local peer's
/// perspective.
///
/// The value is per-peer-local: the two sides of a pairing each use
/// their own id for it. Ids at or above
/// [SERVER_ASSIGNED_ID_BASE](crate::SERVER_ASSIGNED_ID_BASE) are
/// assigned by the server for incoming pairings; other values are
/// chosen by clients for outgoing connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub i16);

impl ConnectionId {
    /// Sentinel meaning "no connection", used by server lifecycle
    /// events such as `ServerInitialized`.
    pub const INVALID: ConnectionId = ConnectionId(-1);
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i16> for ConnectionId {
    fn from(value: i16) -> Self {
        Self(value)
    }
}

/// Event discriminants as they appear on the wire.
///
/// The numeric values are stable and shared with the deployed
/// browser, native and mobile clients.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetEventType {
    /// Placeholder; never produced by a well-behaved client.
    Invalid = 0,
    /// Unreliable user message for an established pairing.
    UnreliableMessageReceived = 1,
    /// Listening on an address started (server to client) or is
    /// requested (client to server).
    ServerInitialized = 2,
    /// Listening on an address was refused.
    ServerInitFailed = 3,
    /// Listening on an address stopped.
    ServerClosed = 4,
    /// A pairing was established (server to client) or an outgoing
    /// connection to an address is requested (client to server).
    NewConnection = 5,
    /// An outgoing connection attempt was refused.
    ConnectionFailed = 6,
    /// A pairing was torn down.
    Disconnected = 7,
    /// Reliable user message for an established pairing.
    ReliableMessageReceived = 8,
    /// Fatal error report.
    FatalError = 100,
    /// Warning report.
    Warning = 101,
    /// Log line report.
    Log = 102,
    /// Protocol version handshake; handled by the connection layer.
    MetaVersion = 103,
    /// Application level heartbeat; handled by the connection layer.
    MetaHeartbeat = 104,
}

impl NetEventType {
    /// Map a wire discriminant to an event type.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Invalid),
            1 => Some(Self::UnreliableMessageReceived),
            2 => Some(Self::ServerInitialized),
            3 => Some(Self::ServerInitFailed),
            4 => Some(Self::ServerClosed),
            5 => Some(Self::NewConnection),
            6 => Some(Self::ConnectionFailed),
            7 => Some(Self::Disconnected),
            8 => Some(Self::ReliableMessageReceived),
            100 => Some(Self::FatalError),
            101 => Some(Self::Warning),
            102 => Some(Self::Log),
            103 => Some(Self::MetaVersion),
            104 => Some(Self::MetaHeartbeat),
            _ => None,
        }
    }
}

impl From<NetEventType> for u8 {
    fn from(value: NetEventType) -> Self {
        value as u8
    }
}

/// Payload carried by a network event.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// No payload.
    #[default]
    None,
    /// Text payload, carried as UTF-16LE on the wire.
    Text(String),
    /// Opaque byte payload.
    Binary(Vec<u8>),
}

/// A single relayed event: type, connection id and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEvent {
    /// Event discriminant.
    ///
    /// Meta frames have dedicated [Frame] variants, so events never
    /// carry `MetaVersion` or `MetaHeartbeat` here.
    pub event_type: NetEventType,
    /// Pairing the event refers to, or [ConnectionId::INVALID] for
    /// server lifecycle events.
    pub connection_id: ConnectionId,
    /// Event payload.
    pub payload: Payload,
}

impl NetworkEvent {
    /// Create an event.
    pub fn new(
        event_type: NetEventType,
        connection_id: ConnectionId,
        payload: Payload,
    ) -> Self {
        Self {
            event_type,
            connection_id,
            payload,
        }
    }

    /// Create an event carrying a text payload.
    pub fn with_text(
        event_type: NetEventType,
        connection_id: ConnectionId,
        text: impl Into<String>,
    ) -> Self {
        Self::new(
            event_type,
            connection_id,
            Payload::Text(text.into()),
        )
    }

    /// Create an event with no payload.
    pub fn empty(
        event_type: NetEventType,
        connection_id: ConnectionId,
    ) -> Self {
        Self::new(event_type, connection_id, Payload::None)
    }

    /// Address carried in the payload, if the payload is text.
    pub fn address(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(value) => Some(value),
            _ => None,
        }
    }
}

/// Unit of transmission on the socket.
///
/// One frame is one binary websocket message. The meta frames are
/// consumed by the connection layer and never reach a peer session.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    #[default]
    #[doc(hidden)]
    Noop,
    /// Application level heartbeat, answered with a heartbeat.
    Heartbeat,
    /// Protocol version announcement, answered with the local
    /// version.
    Version(u8),
    /// An event for the peer session.
    Event(NetworkEvent),
}
