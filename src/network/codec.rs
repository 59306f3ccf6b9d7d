//! JSON codec for wire frames.
//!
//! Centralizes how events are turned into text frames and back, so every
//! transport adapter agrees on the format.
//!
//! # Examples
//!
//! ```
//! use rook_relay::network::codec::{decode_frame, encode_frame};
//! use rook_relay::protocol::{ClientEvent, ServerEvent, PlayerLeft};
//!
//! let event: ClientEvent<String> =
//!     decode_frame(r#"{"event":"joinGame","payload":{"code":"AB12CD"}}"#).unwrap();
//! assert!(matches!(event, ClientEvent::JoinGame(_)));
//!
//! let out: ServerEvent<String> = ServerEvent::PlayerLeft(PlayerLeft { message: "bye".into() });
//! let frame = encode_frame(&out).unwrap();
//! assert!(frame.starts_with(r#"{"event":"playerLeft""#));
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

use crate::protocol::{ClientEvent, ServerEvent};

/// Represents what operation was being performed when a codec error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecOperation {
    /// Encoding an outbound event frame.
    EncodeFrame,
    /// Decoding an inbound event frame.
    DecodeFrame,
    /// Appending an encoded value to a byte buffer.
    AppendToBuffer,
    /// A generic encoding operation.
    Encode,
    /// A generic decoding operation.
    Decode,
}

impl fmt::Display for CodecOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EncodeFrame => write!(f, "encoding event frame"),
            Self::DecodeFrame => write!(f, "decoding event frame"),
            Self::AppendToBuffer => write!(f, "appending to buffer"),
            Self::Encode => write!(f, "encoding"),
            Self::Decode => write!(f, "decoding"),
        }
    }
}

/// Errors that can occur during encoding or decoding.
///
/// Messages are kept as strings because `serde_json` reports failures as
/// formatted text (with line and column), not as structured data.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    /// The encoding operation failed.
    EncodeError {
        /// The underlying serializer message.
        message: String,
        /// The operation that was being performed.
        operation: CodecOperation,
    },
    /// The decoding operation failed.
    DecodeError {
        /// The underlying deserializer message.
        message: String,
        /// The operation that was being performed.
        operation: CodecOperation,
    },
}

impl CodecError {
    /// Creates a new encode error with the given message and operation.
    pub fn encode(message: impl Into<String>, operation: CodecOperation) -> Self {
        Self::EncodeError {
            message: message.into(),
            operation,
        }
    }

    /// Creates a new decode error with the given message and operation.
    pub fn decode(message: impl Into<String>, operation: CodecOperation) -> Self {
        Self::DecodeError {
            message: message.into(),
            operation,
        }
    }

    /// The operation that failed.
    #[must_use]
    pub const fn operation(&self) -> CodecOperation {
        match self {
            Self::EncodeError { operation, .. } | Self::DecodeError { operation, .. } => *operation,
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EncodeError { message, operation } => {
                write!(f, "encoding failed while {operation}: {message}")
            },
            Self::DecodeError { message, operation } => {
                write!(f, "decoding failed while {operation}: {message}")
            },
        }
    }
}

impl std::error::Error for CodecError {}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Encodes an outbound event as a text frame.
pub fn encode_frame<D: Serialize>(event: &ServerEvent<D>) -> CodecResult<String> {
    serde_json::to_string(event)
        .map_err(|e| CodecError::encode(e.to_string(), CodecOperation::EncodeFrame))
}

/// Decodes an inbound text frame.
///
/// ```
/// use rook_relay::network::codec::{decode_frame, CodecOperation};
/// use rook_relay::protocol::ClientEvent;
///
/// let err = decode_frame::<String>(r#"{"event":"resign"}"#).unwrap_err();
/// assert_eq!(err.operation(), CodecOperation::DecodeFrame);
/// ```
pub fn decode_frame<M: DeserializeOwned>(frame: &str) -> CodecResult<ClientEvent<M>> {
    serde_json::from_str(frame)
        .map_err(|e| CodecError::decode(e.to_string(), CodecOperation::DecodeFrame))
}

/// Encodes any serializable value as JSON text.
pub fn encode<T: Serialize>(value: &T) -> CodecResult<String> {
    serde_json::to_string(value).map_err(|e| CodecError::encode(e.to_string(), CodecOperation::Encode))
}

/// Decodes any deserializable value from JSON text.
pub fn decode<T: DeserializeOwned>(text: &str) -> CodecResult<T> {
    serde_json::from_str(text).map_err(|e| CodecError::decode(e.to_string(), CodecOperation::Decode))
}

/// Encodes a value by appending its JSON bytes to `buffer`, for hosts that
/// write frames into a reusable byte buffer.
///
/// Returns the number of bytes written. On failure the buffer is left as it was.
///
/// ```
/// use rook_relay::network::codec::encode_append;
///
/// let mut buffer = b"data: ".to_vec();
/// let written = encode_append(&[1, 2, 3], &mut buffer).unwrap();
/// assert_eq!(written, 7);
/// assert_eq!(buffer, b"data: [1,2,3]");
/// ```
pub fn encode_append<T: Serialize>(value: &T, buffer: &mut Vec<u8>) -> CodecResult<usize> {
    let start = buffer.len();
    match serde_json::to_writer(&mut *buffer, value) {
        Ok(()) => Ok(buffer.len() - start),
        Err(e) => {
            buffer.truncate(start);
            Err(CodecError::encode(
                e.to_string(),
                CodecOperation::AppendToBuffer,
            ))
        },
    }
}
