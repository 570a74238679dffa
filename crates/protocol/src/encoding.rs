//! Binary frame encoding.
//!
//! One frame is one binary websocket message:
//!
//! ```text
//! byte 0        : event type
//! MetaHeartbeat : no further bytes
//! MetaVersion   : byte 1 = protocol version (u8)
//! otherwise     : byte 1     = payload tag (0 none, 1 string, 2 bytes)
//!                 bytes 2..3 = signed 16-bit LE connection id
//!                 tag 1/2    : u32 LE byte length, then that many bytes
//! ```
//!
//! String payloads are UTF-16LE because the historical client is
//! .NET based. A leading byte order mark is accepted on decode and
//! never produced on encode.

use async_trait::async_trait;
use binary_stream::{
    futures::{BinaryReader, BinaryWriter, Decodable, Encodable},
    Endian, Options,
};
use futures::io::{AsyncRead, AsyncSeek, AsyncWrite};
use std::io::Result;

use crate::{ConnectionId, Error, Frame, NetEventType, NetworkEvent, Payload};

/// Maximum buffer size for encoding and decoding.
///
/// Backstop above the transport's configurable payload cap.
pub(crate) const MAX_BUFFER_SIZE: usize = 1024 * 1024 * 4;

pub(crate) fn encoding_error(
    e: impl std::error::Error + Send + Sync + 'static,
) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e)
}

/// Default binary encoding options.
fn encoding_options() -> Options {
    Options {
        endian: Endian::Little,
        max_buffer_size: Some(MAX_BUFFER_SIZE),
    }
}

/// Encode a frame to a binary buffer.
pub async fn encode(frame: &Frame) -> crate::Result<Vec<u8>> {
    Ok(binary_stream::futures::encode(frame, encoding_options())
        .await?)
}

/// Decode a frame from a binary buffer.
pub async fn decode(
    buffer: impl AsRef<[u8]>,
) -> crate::Result<Frame> {
    Ok(binary_stream::futures::decode(
        buffer.as_ref(),
        encoding_options(),
    )
    .await?)
}

fn encode_utf16_le(value: &str) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(value.len() * 2);
    for unit in value.encode_utf16() {
        buffer.extend_from_slice(&unit.to_le_bytes());
    }
    buffer
}

fn decode_utf16_le(bytes: &[u8]) -> std::result::Result<String, Error> {
    if bytes.len() % 2 != 0 {
        return Err(Error::OddStringPayload(bytes.len()));
    }
    let mut units = Vec::with_capacity(bytes.len() / 2);
    for pair in bytes.chunks_exact(2) {
        units.push(u16::from_le_bytes([pair[0], pair[1]]));
    }
    let units = match units.first() {
        Some(&0xFEFF) => &units[1..],
        _ => &units[..],
    };
    String::from_utf16(units)
        .map_err(|_| Error::InvalidStringPayload)
}

#[async_trait]
impl Encodable for Frame {
    async fn encode<W: AsyncWrite + AsyncSeek + Unpin + Send>(
        &self,
        writer: &mut BinaryWriter<W>,
    ) -> Result<()> {
        match self {
            Self::Heartbeat => {
                writer
                    .write_u8(NetEventType::MetaHeartbeat as u8)
                    .await?;
            }
            Self::Version(version) => {
                writer
                    .write_u8(NetEventType::MetaVersion as u8)
                    .await?;
                writer.write_u8(version).await?;
            }
            Self::Event(event) => {
                writer.write_u8(event.event_type as u8).await?;
                match &event.payload {
                    Payload::None => {
                        writer.write_u8(types::PAYLOAD_NONE).await?;
                        writer
                            .write_i16(event.connection_id.0)
                            .await?;
                    }
                    Payload::Text(value) => {
                        writer.write_u8(types::PAYLOAD_TEXT).await?;
                        writer
                            .write_i16(event.connection_id.0)
                            .await?;
                        let bytes = encode_utf16_le(value);
                        writer.write_u32(bytes.len() as u32).await?;
                        writer.write_bytes(&bytes).await?;
                    }
                    Payload::Binary(bytes) => {
                        writer
                            .write_u8(types::PAYLOAD_BINARY)
                            .await?;
                        writer
                            .write_i16(event.connection_id.0)
                            .await?;
                        writer.write_u32(bytes.len() as u32).await?;
                        writer.write_bytes(bytes).await?;
                    }
                }
            }
            Self::Noop => unreachable!(),
        }
        Ok(())
    }
}

#[async_trait]
impl Decodable for Frame {
    async fn decode<R: AsyncRead + AsyncSeek + Unpin + Send>(
        &mut self,
        reader: &mut BinaryReader<R>,
    ) -> Result<()> {
        let kind = reader.read_u8().await?;
        let event_type = NetEventType::from_u8(kind)
            .ok_or_else(|| {
                encoding_error(Error::UnknownEventType(kind))
            })?;
        match event_type {
            NetEventType::MetaHeartbeat => {
                *self = Frame::Heartbeat;
            }
            NetEventType::MetaVersion => {
                let version = reader.read_u8().await?;
                *self = Frame::Version(version);
            }
            _ => {
                let tag = reader.read_u8().await?;
                let connection_id =
                    ConnectionId(reader.read_i16().await?);
                let payload = match tag {
                    types::PAYLOAD_NONE => Payload::None,
                    types::PAYLOAD_TEXT => {
                        let length = reader.read_u32().await?;
                        let bytes = reader
                            .read_bytes(length as usize)
                            .await?;
                        Payload::Text(
                            decode_utf16_le(&bytes)
                                .map_err(encoding_error)?,
                        )
                    }
                    types::PAYLOAD_BINARY => {
                        let length = reader.read_u32().await?;
                        Payload::Binary(
                            reader
                                .read_bytes(length as usize)
                                .await?,
                        )
                    }
                    _ => {
                        return Err(encoding_error(
                            Error::UnknownPayloadTag(tag),
                        ))
                    }
                };
                *self = Frame::Event(NetworkEvent {
                    event_type,
                    connection_id,
                    payload,
                });
            }
        }
        Ok(())
    }
}

pub(crate) mod types {
    pub const PAYLOAD_NONE: u8 = 0;
    pub const PAYLOAD_TEXT: u8 = 1;
    pub const PAYLOAD_BINARY: u8 = 2;
}
