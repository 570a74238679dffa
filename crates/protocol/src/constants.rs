/// Protocol version sent in reply to a version handshake.
pub const PROTOCOL_VERSION: u8 = 2;

/// Oldest protocol version the server tolerates.
///
/// Version 1 clients never send meta frames so no special handling
/// is required beyond replying to the frames newer clients do send.
pub const MIN_PROTOCOL_VERSION: u8 = 1;

/// Maximum length of a listening address in UTF-16 code units.
pub const MAX_ADDRESS_LENGTH: usize = 256;

/// First connection id the server assigns to an incoming pairing.
///
/// Ids below this value (and negative ids other than the invalid
/// sentinel) are chosen by clients for outgoing connection attempts.
pub const SERVER_ASSIGNED_ID_BASE: i16 = 16384;
