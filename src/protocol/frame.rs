//! Frames and packets.
//!
//! A [`RawFrame`] is a header plus undecoded payload bytes, as produced by
//! the [`FrameBuffer`](super::FrameBuffer). A [`Packet`] is the decoded,
//! method-resolved form callers work with.
//!
//! # Example
//!
//! ```
//! use blaze_client::codec::Struct;
//! use blaze_client::protocol::{FrameBuffer, FrameType, MethodRegistry, Packet};
//!
//! let registry = MethodRegistry::builtin();
//! let data = Struct::new().with("GID", 123456).unwrap();
//! let mut packet = Packet::request("Game.leaveGame", data);
//! packet.id = 7;
//!
//! let bytes = packet.encode(&registry).unwrap();
//! let frames = FrameBuffer::new().push(&bytes);
//! let decoded = Packet::decode(&frames[0], &registry).unwrap();
//!
//! assert_eq!(decoded.method, "Game.leaveGame");
//! assert_eq!(decoded.frame_type, FrameType::Command);
//! assert_eq!(decoded.data.get_int("GID"), Some(123456));
//! ```

use bytes::Bytes;

use super::methods::MethodRegistry;
use super::wire_format::{FrameType, Header, HEADER_SIZE, MAX_FRAME_ID};
use crate::codec::{decode_struct, encode_struct, Struct};
use crate::error::{BlazeError, Result};

/// A complete frame with its payload still encoded.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub header: Header,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl RawFrame {
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    #[inline]
    pub fn frame_type(&self) -> FrameType {
        self.header.frame_type
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.header.id
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// A decoded packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Symbolic method name, or `"component.command"` when unmapped.
    pub method: String,
    pub frame_type: FrameType,
    /// Correlation id. Assigned by the connection for outgoing requests.
    pub id: u32,
    /// Payload length as read from the header (0 for outgoing packets).
    pub length: u64,
    pub data: Struct,
}

impl Packet {
    pub fn new(method: impl Into<String>, frame_type: FrameType, id: u32, data: Struct) -> Self {
        Self {
            method: method.into(),
            frame_type,
            id,
            length: 0,
            data,
        }
    }

    /// A command packet with no id yet.
    pub fn request(method: impl Into<String>, data: Struct) -> Self {
        Self::new(method, FrameType::Command, 0, data)
    }

    /// Whether the server answered with an error frame.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.frame_type == FrameType::Error
    }

    /// Decode a raw frame, resolving its method name through `registry`.
    pub fn decode(frame: &RawFrame, registry: &MethodRegistry) -> Result<Self> {
        let header = &frame.header;
        let data = if header.frame_type.is_keepalive() || frame.payload.is_empty() {
            Struct::new()
        } else {
            decode_struct(&frame.payload)?
        };
        Ok(Self {
            method: registry.name_for(header.component, header.command, header.frame_type),
            frame_type: header.frame_type,
            id: header.id,
            length: header.length,
            data,
        })
    }

    /// Encode header and payload into one contiguous buffer.
    pub fn encode(&self, registry: &MethodRegistry) -> Result<Vec<u8>> {
        let (header, payload) = self.encode_parts(registry)?;
        Ok(build_frame(&header, &payload))
    }

    /// Encode into a header and a separate payload for vectored writes.
    pub fn encode_parts(&self, registry: &MethodRegistry) -> Result<(Header, Bytes)> {
        if self.id > MAX_FRAME_ID {
            return Err(BlazeError::Protocol(format!(
                "id {} does not fit in 24 bits",
                self.id
            )));
        }
        let (component, command) = registry.resolve(&self.method)?;
        let payload = if self.frame_type.is_keepalive() {
            Bytes::new()
        } else {
            encode_struct(&self.data)?
        };
        let header = Header::new(
            self.frame_type,
            component,
            command,
            self.id,
            payload.len() as u64,
        );
        Ok((header, payload))
    }
}

/// Build a complete frame as a single byte vector.
///
/// Use [`build_frame_parts`] for scatter/gather I/O.
pub fn build_frame(header: &Header, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}

/// Build frame parts for scatter/gather I/O.
pub fn build_frame_parts<'a>(header: &Header, payload: &'a [u8]) -> ([u8; HEADER_SIZE], &'a [u8]) {
    (header.encode(), payload)
}
