//! Wire format encoding and decoding.
//!
//! Implements the 16-byte frame header:
//! ```text
//! ┌───────────┬────────────┬───────────┬─────────┬─────────┬──────┬─────────┬──────────┐
//! │ Length lo │ Length hi  │ Component │ Command │ Id      │ Type │ Options │ Reserved │
//! │ 4 bytes   │ 2 bytes    │ 2 bytes   │ 2 bytes │ 3 bytes │ 1    │ 1       │ 1        │
//! │ uint32 BE │ uint16 BE  │ uint16 BE │ u16 BE  │ u24 BE  │      │         │          │
//! └───────────┴────────────┴───────────┴─────────┴─────────┴──────┴─────────┴──────────┘
//! ```
//!
//! The logical payload length is `lo + (hi << 32)`. The type byte holds the
//! frame type code in its top three bits.

use crate::error::{BlazeError, Result};

/// Header size in bytes (fixed, exactly 16).
pub const HEADER_SIZE: usize = 16;

/// Offset of the frame type byte.
pub const TYPE_OFFSET: usize = 13;

/// Default maximum payload size accepted from the server (16 MiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u64 = 16 * 1024 * 1024;

/// Largest length the two length fields can carry (48 bits).
pub const MAX_ENCODABLE_LENGTH: u64 = (1 << 48) - 1;

/// Largest correlation id the 3-byte id field can carry.
pub const MAX_FRAME_ID: u32 = 0x00FF_FFFF;

/// Keepalive frame: no length, no component, type byte set to Ping.
pub const PING_FRAME: [u8; HEADER_SIZE] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x80, 0, 0];

/// Frame type, stored as `code << 5` in the type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    Command,
    Result,
    Message,
    Error,
    Ping,
    Pong,
}

impl FrameType {
    /// The type byte as written on the wire.
    #[inline]
    pub fn to_byte(self) -> u8 {
        let code = match self {
            FrameType::Command => 0,
            FrameType::Result => 1,
            FrameType::Message => 2,
            FrameType::Error => 3,
            FrameType::Ping => 4,
            FrameType::Pong => 5,
        };
        code << 5
    }

    /// Parse a type byte. The low five bits are ignored.
    pub fn from_byte(byte: u8) -> Result<Self> {
        Ok(match byte >> 5 {
            0 => FrameType::Command,
            1 => FrameType::Result,
            2 => FrameType::Message,
            3 => FrameType::Error,
            4 => FrameType::Ping,
            5 => FrameType::Pong,
            _ => return Err(BlazeError::UnknownFrameType(byte)),
        })
    }

    /// Ping and pong frames carry no payload and no correlation id.
    #[inline]
    pub fn is_keepalive(self) -> bool {
        matches!(self, FrameType::Ping | FrameType::Pong)
    }
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Payload length in bytes.
    pub length: u64,
    pub frame_type: FrameType,
    pub component: u16,
    pub command: u16,
    /// Correlation id (24 bits on the wire).
    pub id: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(frame_type: FrameType, component: u16, command: u16, id: u32, length: u64) -> Self {
        Self {
            length,
            frame_type,
            component,
            command,
            id,
        }
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use blaze_client::protocol::{FrameType, Header};
    ///
    /// let header = Header::new(FrameType::Command, 4, 0x19, 7, 12);
    /// let bytes = header.encode();
    /// assert_eq!(bytes.len(), 16);
    /// assert_eq!(Header::decode(&bytes).unwrap(), header);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// Lengths above 48 bits and ids above 24 bits are truncated; callers
    /// keep both in range.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (16 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        let low = (self.length & 0xFFFF_FFFF) as u32;
        let high = ((self.length >> 32) & 0xFFFF) as u16;
        buf[0..4].copy_from_slice(&low.to_be_bytes());
        buf[4..6].copy_from_slice(&high.to_be_bytes());
        buf[6..8].copy_from_slice(&self.component.to_be_bytes());
        buf[8..10].copy_from_slice(&self.command.to_be_bytes());
        buf[10..13].copy_from_slice(&self.id.to_be_bytes()[1..4]);
        buf[TYPE_OFFSET] = self.frame_type.to_byte();
        buf[14] = 0;
        buf[15] = 0;
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Fails if the buffer is shorter than 16 bytes or the type byte is
    /// unknown.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(BlazeError::UnexpectedEof {
                offset: 0,
                needed: HEADER_SIZE,
                available: buf.len(),
            });
        }
        let low = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let high = u16::from_be_bytes([buf[4], buf[5]]);
        Ok(Self {
            length: u64::from(low) + (u64::from(high) << 32),
            frame_type: FrameType::from_byte(buf[TYPE_OFFSET])?,
            component: u16::from_be_bytes([buf[6], buf[7]]),
            command: u16::from_be_bytes([buf[8], buf[9]]),
            id: u32::from_be_bytes([0, buf[10], buf[11], buf[12]]),
        })
    }

    /// Total frame size (header + payload).
    #[inline]
    pub fn frame_len(&self) -> u64 {
        HEADER_SIZE as u64 + self.length
    }
}

/// Encode a header to bytes (standalone function).
#[inline]
pub fn encode_header(
    frame_type: FrameType,
    component: u16,
    command: u16,
    id: u32,
    length: u64,
) -> [u8; HEADER_SIZE] {
    Header::new(frame_type, component, command, id, length).encode()
}

/// Decode a header from bytes (standalone function).
#[inline]
pub fn decode_header(buf: &[u8]) -> Result<Header> {
    Header::decode(buf)
}
