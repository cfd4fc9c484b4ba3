//! The three error kinds described in spec.md §7: connection, stream, and
//! transport errors. Connection and stream errors both carry a wire
//! [`ErrorCode`](crate::frame::ErrorCode); transport errors do not, since the
//! socket is already gone by the time one is observed.

use crate::frame::ErrorCode;

/// A connection-scoped failure. The engine responds by sending a single
/// GOAWAY with `code` (and `debug`, if non-empty) and closing the socket.
#[derive(Debug, Clone, thiserror::Error)]
#[error("connection error: {code:?}{}", .debug.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
pub struct ConnError {
    pub code: ErrorCode,
    pub debug: Option<String>,
}

impl ConnError {
    pub fn new(code: ErrorCode) -> Self {
        Self { code, debug: None }
    }

    pub fn with_debug(code: ErrorCode, debug: impl Into<String>) -> Self {
        Self {
            code,
            debug: Some(debug.into()),
        }
    }

    pub fn protocol(debug: impl Into<String>) -> Self {
        Self::with_debug(ErrorCode::ProtocolError, debug)
    }

    pub fn frame_size(debug: impl Into<String>) -> Self {
        Self::with_debug(ErrorCode::FrameSizeError, debug)
    }

    pub fn flow_control(debug: impl Into<String>) -> Self {
        Self::with_debug(ErrorCode::FlowControlError, debug)
    }

    pub fn compression(debug: impl Into<String>) -> Self {
        Self::with_debug(ErrorCode::CompressionError, debug)
    }

    pub fn enhance_your_calm(debug: impl Into<String>) -> Self {
        Self::with_debug(ErrorCode::EnhanceYourCalm, debug)
    }
}

/// A stream-scoped failure. The engine responds with a single RST_STREAM on
/// that stream; the connection and every other stream survive.
#[derive(Debug, Clone, thiserror::Error)]
#[error("stream error on {stream_id}: {code:?}")]
pub struct StreamError {
    pub stream_id: u32,
    pub code: ErrorCode,
}

impl StreamError {
    pub fn new(stream_id: u32, code: ErrorCode) -> Self {
        Self { stream_id, code }
    }

    pub fn protocol(stream_id: u32) -> Self {
        Self::new(stream_id, ErrorCode::ProtocolError)
    }

    pub fn stream_closed(stream_id: u32) -> Self {
        Self::new(stream_id, ErrorCode::StreamClosed)
    }

    pub fn flow_control(stream_id: u32) -> Self {
        Self::new(stream_id, ErrorCode::FlowControlError)
    }

    pub fn refused(stream_id: u32) -> Self {
        Self::new(stream_id, ErrorCode::RefusedStream)
    }
}

/// A socket-level failure (EOF or I/O error). No GOAWAY is possible; the
/// connection simply closes and any handler blocked on a stream is woken
/// with a cancellation.
#[derive(Debug, thiserror::Error)]
#[error("transport error: {0}")]
pub struct TransportError(#[from] pub std::io::Error);

/// Top-level error a connection-engine operation can fail with.
#[derive(Debug, thiserror::Error)]
pub enum H2Error {
    #[error(transparent)]
    Connection(#[from] ConnError),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
