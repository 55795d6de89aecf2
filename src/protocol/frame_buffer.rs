//! Frame buffer for reassembling frames from a byte stream.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Two states:
//! - `Idle`: no partial frame, need at least 16 header bytes
//! - `Accumulating`: header parsed, need N more payload bytes
//!
//! A header that cannot belong to a valid frame (unknown type byte, or a
//! payload larger than the configured maximum) means the stream is out of
//! sync. The buffered bytes are discarded with a warning and reassembly
//! starts over from the next read; nothing is returned as an error.
//!
//! # Example
//!
//! ```
//! use blaze_client::protocol::{FrameBuffer, PING_FRAME};
//!
//! let mut buffer = FrameBuffer::new();
//! assert!(buffer.push(&PING_FRAME[..10]).is_empty());
//! let frames = buffer.push(&PING_FRAME[10..]);
//! assert_eq!(frames.len(), 1);
//! assert!(buffer.is_empty());
//! ```

use bytes::{Buf, Bytes, BytesMut};

use super::frame::RawFrame;
use super::wire_format::{Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};

#[derive(Debug, Clone)]
enum State {
    Idle,
    Accumulating { header: Header, remaining: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
    max_payload_size: u64,
    dropped: u64,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings (64KB capacity,
    /// 16 MiB max payload).
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a new frame buffer with custom max payload size.
    pub fn with_max_payload(max_payload_size: u64) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::Idle,
            max_payload_size,
            dropped: 0,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Frames are returned in stream order. Partial data is kept for the
    /// next push.
    pub fn push(&mut self, data: &[u8]) -> Vec<RawFrame> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one() {
            frames.push(frame);
        }
        frames
    }

    fn try_extract_one(&mut self) -> Option<RawFrame> {
        match &self.state {
            State::Idle => {
                if self.buffer.len() < HEADER_SIZE {
                    return None;
                }

                let header = match Header::decode(&self.buffer[..HEADER_SIZE]) {
                    Ok(header) => header,
                    Err(e) => {
                        self.discard(&format!("bad header: {}", e));
                        return None;
                    }
                };

                let remaining = match usize::try_from(header.length) {
                    Ok(len) if header.length <= self.max_payload_size => len,
                    _ => {
                        self.discard(&format!(
                            "payload size {} exceeds maximum {}",
                            header.length, self.max_payload_size
                        ));
                        return None;
                    }
                };

                self.buffer.advance(HEADER_SIZE);

                if remaining == 0 {
                    return Some(RawFrame::new(header, Bytes::new()));
                }

                self.buffer.reserve(remaining.saturating_sub(self.buffer.len()));
                self.state = State::Accumulating { header, remaining };
                self.try_extract_one()
            }

            State::Accumulating { header, remaining } => {
                let remaining = *remaining;
                if self.buffer.len() < remaining {
                    return None;
                }

                let payload = self.buffer.split_to(remaining).freeze();
                let header = *header;
                self.state = State::Idle;
                Some(RawFrame::new(header, payload))
            }
        }
    }

    fn discard(&mut self, reason: &str) {
        tracing::warn!(
            "Discarding {} buffered bytes after stream desync: {}",
            self.buffer.len(),
            reason
        );
        self.dropped += 1;
        self.clear();
    }

    /// Number of buffered bytes not yet returned as frames.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Whether a header has been read and its payload is still incomplete.
    pub fn is_accumulating(&self) -> bool {
        matches!(self.state, State::Accumulating { .. })
    }

    /// How many times buffered data was discarded as corrupt.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::Idle;
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{FrameType, PING_FRAME, TYPE_OFFSET};

    fn make_frame_bytes(command: u16, id: u32, payload: &[u8]) -> Vec<u8> {
        let header = Header::new(FrameType::Result, 4, command, id, payload.len() as u64);
        let mut bytes = header.encode().to_vec();
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&make_frame_bytes(1, 42, b"hello"));

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header.command, 1);
        assert_eq!(frames[0].id(), 42);
        assert_eq!(frames[0].payload(), b"hello");
        assert!(buffer.is_empty());
        assert!(!buffer.is_accumulating());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();

        let mut combined = make_frame_bytes(1, 1, b"first");
        combined.extend_from_slice(&make_frame_bytes(2, 2, b"second"));
        combined.extend_from_slice(&PING_FRAME);
        combined.extend_from_slice(&make_frame_bytes(3, 3, b"third"));

        let frames = buffer.push(&combined);

        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0].payload(), b"first");
        assert_eq!(frames[1].payload(), b"second");
        assert_eq!(frames[2].frame_type(), FrameType::Ping);
        assert_eq!(frames[3].payload(), b"third");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_header() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = make_frame_bytes(1, 42, b"test");

        assert!(buffer.push(&frame_bytes[..5]).is_empty());
        assert!(!buffer.is_accumulating());

        let frames = buffer.push(&frame_bytes[5..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"test");
    }

    #[test]
    fn test_fragmented_payload() {
        let mut buffer = FrameBuffer::new();
        let payload = b"this is a longer payload that will be fragmented";
        let frame_bytes = make_frame_bytes(1, 42, payload);

        let partial_len = HEADER_SIZE + 10;
        assert!(buffer.push(&frame_bytes[..partial_len]).is_empty());
        assert!(buffer.is_accumulating());

        let frames = buffer.push(&frame_bytes[partial_len..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), payload);
        assert!(!buffer.is_accumulating());
    }

    #[test]
    fn test_byte_at_a_time_matches_single_chunk() {
        let mut stream = make_frame_bytes(1, 7, b"hi there");
        stream.extend_from_slice(&make_frame_bytes(2, 8, b""));
        stream.extend_from_slice(&make_frame_bytes(3, 9, &[0xAB; 300]));

        let whole = FrameBuffer::new().push(&stream);

        let mut buffer = FrameBuffer::new();
        let mut pieces = Vec::new();
        for byte in &stream {
            pieces.extend(buffer.push(&[*byte]));
        }

        assert_eq!(whole.len(), 3);
        assert_eq!(pieces.len(), whole.len());
        for (a, b) in whole.iter().zip(&pieces) {
            assert_eq!(a.header, b.header);
            assert_eq!(a.payload, b.payload);
        }
    }

    #[test]
    fn test_trailing_bytes_kept_for_next_frame() {
        let mut buffer = FrameBuffer::new();
        let first = make_frame_bytes(1, 1, b"first");
        let second = make_frame_bytes(2, 2, b"second");

        let mut data = first.clone();
        data.extend_from_slice(&second[..HEADER_SIZE + 2]);

        let frames = buffer.push(&data);
        assert_eq!(frames.len(), 1);
        assert!(buffer.is_accumulating());
        assert_eq!(buffer.len(), 2);

        let frames = buffer.push(&second[HEADER_SIZE + 2..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"second");
    }

    #[test]
    fn test_empty_payload_frames_consume_only_headers() {
        let mut buffer = FrameBuffer::new();
        let mut data = make_frame_bytes(1, 1, b"");
        data.extend_from_slice(&make_frame_bytes(2, 2, b""));
        data.extend_from_slice(&[0u8; 3]);

        let frames = buffer.push(&data);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].id(), 2);
        assert!(frames[1].payload().is_empty());
        assert!(!buffer.is_accumulating());
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_oversize_frame_is_discarded() {
        let mut buffer = FrameBuffer::with_max_payload(100);
        let header = Header::new(FrameType::Result, 1, 1, 1, 1000);

        assert!(buffer.push(&header.encode()).is_empty());
        assert!(buffer.is_empty());
        assert_eq!(buffer.dropped_frames(), 1);

        // Recovers on the next well-formed frame
        let frames = buffer.push(&make_frame_bytes(1, 2, b"ok"));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"ok");
    }

    #[test]
    fn test_unknown_frame_type_is_discarded() {
        let mut buffer = FrameBuffer::new();
        let mut bytes = make_frame_bytes(1, 1, b"junk");
        bytes[TYPE_OFFSET] = 0xE0;

        assert!(buffer.push(&bytes).is_empty());
        assert!(buffer.is_empty());
        assert_eq!(buffer.dropped_frames(), 1);
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = make_frame_bytes(1, 42, b"test");
        buffer.push(&frame_bytes[..HEADER_SIZE + 1]);
        assert!(buffer.is_accumulating());

        buffer.clear();
        assert!(!buffer.is_accumulating());
        assert!(buffer.is_empty());
    }
}
