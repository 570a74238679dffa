//! Wire types, binary encoding and helper functions for the
//! switchboard signaling relay.
//!
//! The frame layout is fixed by the deployed clients and must be
//! preserved bit-for-bit; see the [encoding] module for the layout.

#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod constants;
pub mod encoding;
mod error;
mod event;

pub use constants::*;
pub use encoding::{decode, encode};
pub use error::Error;
pub use event::*;

/// Result type for the wire protocol.
pub type Result<T> = std::result::Result<T, Error>;
