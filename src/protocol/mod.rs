//! Protocol module - wire format, framing, and method names.
//!
//! - 16-byte header encoding/decoding
//! - Frame buffer for reassembling partial reads
//! - Packet type with registry-resolved method names

mod frame;
mod frame_buffer;
pub mod methods;
mod wire_format;

pub use frame::{build_frame, build_frame_parts, Packet, RawFrame};
pub use frame_buffer::FrameBuffer;
pub use methods::{MethodKind, MethodRegistry, MethodRegistryBuilder};
pub use wire_format::{
    decode_header, encode_header, FrameType, Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE,
    MAX_ENCODABLE_LENGTH, MAX_FRAME_ID, PING_FRAME, TYPE_OFFSET,
};
