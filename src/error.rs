//! Error types for blaze-client.

use std::time::Duration;

use thiserror::Error;

/// Main error type for all Blaze operations.
#[derive(Debug, Error)]
pub enum BlazeError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (redirector, settings).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error talking to the redirector.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// TLS configuration or handshake error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Host name could not be used as a TLS server name.
    #[error("Invalid server name: {0}")]
    InvalidServerName(String),

    /// Buffer ended before a value was complete.
    #[error("Unexpected end of buffer: needed {needed} bytes at offset {offset}, {available} available")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Unrecognized TDF type code.
    #[error("Unknown TDF type 0x{type_code:02x} at offset {offset}")]
    UnknownType { type_code: u8, offset: usize },

    /// Variable-length integer longer than 10 bytes.
    #[error("Malformed varint at offset {0}")]
    MalformedVarint(usize),

    /// Containers nested deeper than the decoder accepts.
    #[error("TDF nesting deeper than {limit} levels at offset {offset}")]
    NestingTooDeep { limit: usize, offset: usize },

    /// Tag contains characters outside the packable range.
    #[error("Invalid tag {0:?}: expected up to 4 characters in 0x20..=0x5F")]
    InvalidTag(String),

    /// Frame header carries an unknown frame type byte.
    #[error("Unknown frame type byte 0x{0:02x}")]
    UnknownFrameType(u8),

    /// Method name has no registry entry and is not a numeric `component.command` pair.
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// Protocol error (bad frame, wrong type, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Every correlation id is in use.
    #[error("No free correlation id: {0} requests in flight")]
    TooManyPending(usize),

    /// No response within the timeout. The connection stays open.
    #[error("Request {method} (id {id}) timed out after {timeout:?}")]
    Timeout {
        method: String,
        id: u32,
        timeout: Duration,
    },

    /// Redirector returned an error or an unusable response.
    #[error("Redirector error: {0}")]
    Redirector(String),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl BlazeError {
    /// Whether this error came from malformed wire data.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            BlazeError::UnexpectedEof { .. }
                | BlazeError::UnknownType { .. }
                | BlazeError::MalformedVarint(_)
                | BlazeError::NestingTooDeep { .. }
                | BlazeError::UnknownFrameType(_)
        )
    }
}

/// Result type alias using BlazeError.
pub type Result<T> = std::result::Result<T, BlazeError>;
