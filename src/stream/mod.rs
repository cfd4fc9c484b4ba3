//! The per-stream state machine, RFC 9113 §5.1. Modeled as an explicit
//! total function over `(State, Event) -> Result<State, ErrorCode>` rather
//! than scattered boolean flags, the way
//! `examples/other_examples/235f199d_ymesika-h2__src-proto-state.rs.rs`
//! models it (there split across separate local/remote `PeerState`
//! trackers; here collapsed into a single enum since a stream's legal next
//! states never depend on more than its current one).

use crate::error::StreamError;
use crate::flow::{ReceiveWindow, ThresholdStrategy};
use crate::frame::{ErrorCode, Priority};
use crate::header::HeaderList;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Notify};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    ReservedLocal,
    ReservedRemote,
    Open,
    HalfClosedLocal,
    HalfClosedRemote,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    SendHeaders { end_stream: bool },
    RecvHeaders { end_stream: bool },
    SendPushPromise,
    RecvPushPromise,
    SendData { end_stream: bool },
    RecvData { end_stream: bool },
    SendRstStream,
    RecvRstStream,
}

/// The transition table itself: every `(State, Event)` pair maps to exactly
/// one arm, `_ => Err(...)` closing it over. No half-finished branches.
pub fn transition(state: State, event: Event) -> Result<State, ErrorCode> {
    use Event::*;
    use State::*;

    match (state, event) {
        (Idle, SendHeaders { end_stream: false }) | (Idle, RecvHeaders { end_stream: false }) => {
            Ok(Open)
        }
        (Idle, SendHeaders { end_stream: true }) => Ok(HalfClosedLocal),
        (Idle, RecvHeaders { end_stream: true }) => Ok(HalfClosedRemote),
        (Idle, SendPushPromise) => Ok(ReservedLocal),
        (Idle, RecvPushPromise) => Ok(ReservedRemote),

        (ReservedLocal, SendHeaders { end_stream: false }) => Ok(HalfClosedRemote),
        (ReservedLocal, SendHeaders { end_stream: true }) => Ok(Closed),
        (ReservedLocal, SendRstStream) | (ReservedLocal, RecvRstStream) => Ok(Closed),

        (ReservedRemote, RecvHeaders { end_stream: false }) => Ok(HalfClosedLocal),
        (ReservedRemote, RecvHeaders { end_stream: true }) => Ok(Closed),
        (ReservedRemote, SendRstStream) | (ReservedRemote, RecvRstStream) => Ok(Closed),

        (Open, SendData { end_stream: true }) | (Open, SendHeaders { end_stream: true }) => {
            Ok(HalfClosedLocal)
        }
        (Open, RecvData { end_stream: true }) | (Open, RecvHeaders { end_stream: true }) => {
            Ok(HalfClosedRemote)
        }
        (Open, SendData { end_stream: false })
        | (Open, RecvData { end_stream: false })
        | (Open, SendHeaders { end_stream: false }) => Ok(Open),
        (Open, SendRstStream) | (Open, RecvRstStream) => Ok(Closed),

        (HalfClosedRemote, SendData { end_stream: true })
        | (HalfClosedRemote, SendHeaders { end_stream: true }) => Ok(Closed),
        (HalfClosedRemote, SendData { end_stream: false })
        | (HalfClosedRemote, SendHeaders { end_stream: false }) => Ok(HalfClosedRemote),
        (HalfClosedRemote, SendRstStream) | (HalfClosedRemote, RecvRstStream) => Ok(Closed),
        // A half-closed-remote stream receiving anything but RST_STREAM is
        // a protocol error handled by the caller before it ever reaches
        // this table — accepting it silently here would hide the bug.
        (HalfClosedRemote, RecvData { .. }) | (HalfClosedRemote, RecvHeaders { .. }) => {
            Err(ErrorCode::StreamClosed)
        }

        (HalfClosedLocal, RecvData { end_stream: true })
        | (HalfClosedLocal, RecvHeaders { end_stream: true }) => Ok(Closed),
        (HalfClosedLocal, RecvData { end_stream: false }) => Ok(HalfClosedLocal),
        (HalfClosedLocal, SendRstStream) | (HalfClosedLocal, RecvRstStream) => Ok(Closed),

        (Closed, SendRstStream) | (Closed, RecvRstStream) => Ok(Closed),
        // Any other event against an already-CLOSED stream is STREAM_CLOSED
        // (RFC 9113 §5.1); everywhere else an unlisted pair is a protocol
        // violation scoped to this stream, not "already closed".
        (Closed, _) => Err(ErrorCode::StreamClosed),

        _ => Err(ErrorCode::ProtocolError),
    }
}

/// Everything the engine tracks about one stream for its lifetime
/// (spec.md §3). Back-referencing the owning connection is deliberately
/// avoided here — [`crate::conn`] indexes these by stream id instead of
/// handing out a shared owning reference, per spec.md §9.
#[derive(Debug, Clone)]
pub struct Stream {
    pub id: u32,
    pub state: State,
    pub send_window: i64,
    /// The receive-side half of this stream's flow-control window (spec.md
    /// §4.5): charged on every DATA byte received, and the source of the
    /// per-stream WINDOW_UPDATE increments sent back to the peer — distinct
    /// from the connection-wide [`crate::conn::Shared::conn_send_window`]/
    /// `conn_recv_window` pair per spec.md §9's send/recv split.
    pub recv_window: ReceiveWindow,
    pub priority: Option<Priority>,
    pub content_length: Option<u64>,
    pub received_bytes: u64,
    /// Pseudo+regular request headers, once validated. `None` until the
    /// HEADERS (and any CONTINUATION) block has been decoded.
    pub request_headers: Option<HeaderList>,
    /// Trailers, if a second HEADERS block arrived with `END_STREAM`.
    pub trailers: Option<HeaderList>,
    pub end_stream_sent: bool,
    pub end_stream_received: bool,
    pub created_at: Instant,
    pub closed_at: Option<Instant>,
    /// Whether any DATA has been received — rapid-reset protection only
    /// counts a reset as "rapid" when no data ever arrived (spec.md §4.6).
    pub any_data_received: bool,
    /// Wakes a handler task blocked in `send_data` on this stream's flow
    /// control, per spec.md §9: a per-stream notification primitive rather
    /// than a shared mutable global.
    pub notify: Arc<Notify>,
    /// Feeds DATA payloads through to the handler's `Request::body` channel.
    pub body_tx: Option<mpsc::Sender<Bytes>>,
}

impl Stream {
    pub fn new(id: u32, initial_send_window: i64, initial_recv_window: i64) -> Self {
        Self::with_strategy(id, initial_send_window, initial_recv_window, ThresholdStrategy::Moderate)
    }

    pub fn with_strategy(
        id: u32,
        initial_send_window: i64,
        initial_recv_window: i64,
        strategy: ThresholdStrategy,
    ) -> Self {
        Self {
            id,
            state: State::Idle,
            send_window: initial_send_window,
            recv_window: ReceiveWindow::new(initial_recv_window, strategy),
            priority: None,
            content_length: None,
            received_bytes: 0,
            request_headers: None,
            trailers: None,
            end_stream_sent: false,
            end_stream_received: false,
            created_at: Instant::now(),
            closed_at: None,
            any_data_received: false,
            notify: Arc::new(Notify::new()),
            body_tx: None,
        }
    }

    pub fn apply(&mut self, event: Event) -> Result<(), StreamError> {
        self.state = transition(self.state, event).map_err(|code| StreamError::new(self.id, code))?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    /// §8.1.2.6: a DATA frame's total length must equal a declared
    /// content-length, if one was sent.
    pub fn record_received_data(&mut self, len: u64) -> Result<(), StreamError> {
        self.received_bytes += len;
        if let Some(expected) = self.content_length {
            if self.received_bytes > expected {
                return Err(StreamError::protocol(self.id));
            }
        }
        Ok(())
    }

    pub fn finish_receiving(&mut self) -> Result<(), StreamError> {
        if let Some(expected) = self.content_length {
            if self.received_bytes != expected {
                return Err(StreamError::protocol(self.id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_to_open_on_headers_without_end_stream() {
        assert_eq!(
            transition(State::Idle, Event::RecvHeaders { end_stream: false }),
            Ok(State::Open)
        );
    }

    #[test]
    fn idle_to_half_closed_remote_on_headers_with_end_stream() {
        assert_eq!(
            transition(State::Idle, Event::RecvHeaders { end_stream: true }),
            Ok(State::HalfClosedRemote)
        );
    }

    #[test]
    fn open_to_half_closed_local_on_send_end_stream() {
        assert_eq!(
            transition(State::Open, Event::SendData { end_stream: true }),
            Ok(State::HalfClosedLocal)
        );
    }

    #[test]
    fn rst_stream_closes_from_any_live_state() {
        for state in [
            State::Idle,
            State::Open,
            State::HalfClosedLocal,
            State::HalfClosedRemote,
            State::ReservedLocal,
            State::ReservedRemote,
        ] {
            assert_eq!(transition(state, Event::RecvRstStream), Ok(State::Closed));
        }
    }

    #[test]
    fn half_closed_remote_rejects_more_data() {
        assert!(transition(State::HalfClosedRemote, Event::RecvData { end_stream: false }).is_err());
    }

    #[test]
    fn closed_is_terminal_except_for_reset_echoes() {
        assert_eq!(transition(State::Closed, Event::RecvRstStream), Ok(State::Closed));
        assert!(transition(State::Closed, Event::RecvHeaders { end_stream: false }).is_err());
    }

    #[test]
    fn content_length_mismatch_is_rejected() {
        let mut stream = Stream::new(1, 0, 0);
        stream.content_length = Some(10);
        stream.record_received_data(5).unwrap();
        assert!(stream.finish_receiving().is_err());
    }
}
