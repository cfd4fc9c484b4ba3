//! The per-connection engine (spec.md §4.6): preface handshake, the frame
//! read loop, CONTINUATION reassembly, rate limiting, rapid-reset tracking
//! and dispatch into the stream table. One [`run`] call owns one accepted
//! [`Transport`] end to end.

mod continuation;
mod sink;
mod writer;

use crate::config::Config;
use crate::error::{ConnError, H2Error, StreamError, TransportError};
use crate::frame::{
    DecodeError, ErrorCode, Frame, FrameHeader, Priority, Scope, HEADER_LEN, MAX_WINDOW_SIZE, PREFACE,
};
use crate::handler::{Handler, Request};
use crate::header::{self, HeaderKind, HeaderList};
use crate::hpack;
use crate::rapid_reset::{RapidResetTracker, Verdict};
use crate::ratelimit::RateLimiters;
use crate::settings::{Settings, SettingsValues};
use crate::stream::{Event, State, Stream};
use bytes::Bytes;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex};

use continuation::ContinuationAssembler;
use sink::StreamSink;
use writer::Writer;

const SETTINGS_ACK_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_TOTAL_STREAMS: u32 = 10_000;
const CLOSED_LRU_CAP: usize = 100;
const CLOSED_GRACE: Duration = Duration::from_secs(2);

/// State shared between the read loop and every [`StreamSink`] a handler
/// task holds: the stream table, the outbound HPACK encoder, the
/// connection send window, the peer's settings, and the writer. Everything
/// else (decoder, recv windows, rate limiters, continuation assembly) stays
/// confined to the read loop, per spec.md §9.
pub(crate) struct Shared<W> {
    streams: DashMap<u32, Stream>,
    writer: Writer<W>,
    encoder: Mutex<hpack::Encoder>,
    conn_send_window: Mutex<crate::flow::Window>,
    remote_settings: Mutex<SettingsValues>,
    closed_lru: Mutex<VecDeque<(u32, Instant)>>,
    goaway_sent: AtomicBool,
}

impl<W: AsyncWrite + Unpin + Send> Shared<W> {
    fn new(write_half: W) -> Self {
        use crate::frame::{DEFAULT_HEADER_TABLE_SIZE, DEFAULT_INITIAL_WINDOW_SIZE};
        // The connection-level window is distinct from any stream's window
        // and is never touched by SETTINGS_INITIAL_WINDOW_SIZE (RFC 9113
        // §6.9.2) — it always starts at the RFC default and only moves via
        // WINDOW_UPDATE on stream 0.
        Self {
            streams: DashMap::new(),
            writer: Writer::new(write_half),
            encoder: Mutex::new(hpack::Encoder::new(DEFAULT_HEADER_TABLE_SIZE as usize)),
            conn_send_window: Mutex::new(crate::flow::Window::new(i64::from(DEFAULT_INITIAL_WINDOW_SIZE))),
            remote_settings: Mutex::new(SettingsValues::default()),
            closed_lru: Mutex::new(VecDeque::new()),
            goaway_sent: AtomicBool::new(false),
        }
    }

    async fn push_closed(&self, stream_id: u32, now: Instant) {
        let mut lru = self.closed_lru.lock().await;
        lru.push_back((stream_id, now));
        while lru.len() > CLOSED_LRU_CAP {
            lru.pop_front();
        }
    }

    async fn is_recently_closed(&self, stream_id: u32) -> bool {
        let now = Instant::now();
        let lru = self.closed_lru.lock().await;
        lru.iter()
            .any(|(id, at)| *id == stream_id && now.saturating_duration_since(*at) <= CLOSED_GRACE)
    }

    /// Removes a stream from the live table once it has reached `CLOSED`,
    /// recording it in the grace-window LRU. Called from both the read
    /// loop and a handler's [`StreamSink`] — whichever side drives the
    /// state machine into its terminal state.
    async fn close_if_terminal(&self, stream_id: u32) {
        let closed = self.streams.get(&stream_id).map(|s| s.is_closed()).unwrap_or(false);
        if closed && self.streams.remove(&stream_id).is_some() {
            self.push_closed(stream_id, Instant::now()).await;
        }
    }

    fn notify_all_streams(&self) {
        for entry in self.streams.iter() {
            entry.notify.notify_waiters();
        }
    }

    fn goaway_sent(&self) -> bool {
        self.goaway_sent.load(Ordering::Acquire)
    }
}

/// Drives one accepted transport through the full HTTP/2 server lifecycle:
/// preface, settings handshake, then frame dispatch until the peer closes
/// the socket or a connection error ends it early.
pub async fn run<T>(transport: T, handler: Arc<dyn Handler>, config: Config) -> Result<(), H2Error>
where
    T: crate::transport::Transport + 'static,
{
    let (read_half, write_half) = tokio::io::split(transport);
    let shared = Arc::new(Shared::new(write_half));
    let engine = Connection::new(shared, handler, config, read_half);
    engine.serve().await
}

struct Connection<T> {
    shared: Arc<Shared<WriteHalf<T>>>,
    handler: Arc<dyn Handler>,
    config: Config,
    read_half: ReadHalf<T>,
    decoder: hpack::Decoder,
    conn_recv_window: crate::flow::ReceiveWindow,
    continuation: ContinuationAssembler,
    rate_limiters: RateLimiters,
    rapid_reset: RapidResetTracker,
    local_settings: SettingsValues,
    last_peer_stream_id: u32,
    total_streams: u32,
    settings_ack_deadline: Option<Instant>,
    last_activity: Instant,
}

impl<T: crate::transport::Transport + 'static> Connection<T> {
    fn new(
        shared: Arc<Shared<WriteHalf<T>>>,
        handler: Arc<dyn Handler>,
        config: Config,
        read_half: ReadHalf<T>,
    ) -> Self {
        use crate::frame::{DEFAULT_HEADER_TABLE_SIZE, DEFAULT_INITIAL_WINDOW_SIZE};
        let now = Instant::now();
        let local_settings = SettingsValues {
            header_table_size: DEFAULT_HEADER_TABLE_SIZE,
            enable_push: config.enable_push,
            max_concurrent_streams: config.max_concurrent_streams,
            initial_window_size: config.initial_window_size,
            max_frame_size: config.max_frame_size,
            max_header_list_size: config.max_header_list_size,
        };
        Self {
            shared,
            handler,
            decoder: hpack::Decoder::new(
                DEFAULT_HEADER_TABLE_SIZE as usize,
                config.max_header_list_size as usize,
            ),
            // Connection-level, not stream-level: always starts at the RFC
            // default regardless of `config.initial_window_size` (spec.md
            // §9 flags conflating the two as a bug to avoid).
            conn_recv_window: crate::flow::ReceiveWindow::new(
                i64::from(DEFAULT_INITIAL_WINDOW_SIZE),
                config.flow_control_strategy,
            ),
            continuation: ContinuationAssembler::new(),
            rate_limiters: RateLimiters::new(now),
            rapid_reset: RapidResetTracker::new(
                Duration::from_millis(config.rapid_reset_threshold_ms),
                config.rapid_reset_window,
            ),
            local_settings,
            last_peer_stream_id: 0,
            total_streams: 0,
            settings_ack_deadline: None,
            last_activity: now,
            read_half,
            config,
        }
    }

    async fn serve(mut self) -> Result<(), H2Error> {
        self.handshake().await?;
        loop {
            let deadline = self.next_deadline();
            match tokio::time::timeout(deadline, self.read_frame_bytes()).await {
                Err(_elapsed) => {
                    let now = Instant::now();
                    if let Some(d) = self.settings_ack_deadline {
                        if now >= d {
                            return self.fail_connection(ConnError::new(ErrorCode::SettingsTimeout)).await;
                        }
                    }
                    if now >= self.last_activity + self.config.idle_timeout {
                        let _ = self
                            .shared
                            .writer
                            .write_frame(&Frame::GoAway {
                                last_stream_id: self.last_peer_stream_id,
                                error_code: ErrorCode::NoError,
                                debug_data: Bytes::from_static(b"idle timeout"),
                            })
                            .await;
                        return Ok(());
                    }
                }
                Ok(Err(e)) => return Err(H2Error::Transport(e)),
                Ok(Ok(None)) => return Ok(()),
                Ok(Ok(Some((header, payload)))) => {
                    self.last_activity = Instant::now();
                    if let Err(e) = self.process_frame(header, payload).await {
                        return Err(e);
                    }
                }
            }
        }
    }

    fn next_deadline(&self) -> Duration {
        let now = Instant::now();
        let mut earliest = self.last_activity + self.config.idle_timeout;
        if let Some(d) = self.settings_ack_deadline {
            earliest = earliest.min(d);
        }
        earliest.saturating_duration_since(now).max(Duration::from_millis(1))
    }

    async fn process_frame(&mut self, header: FrameHeader, payload: Bytes) -> Result<(), H2Error> {
        if header.length > self.local_settings.max_frame_size {
            return self.fail_connection(ConnError::frame_size("frame exceeds MAX_FRAME_SIZE")).await;
        }
        match Frame::decode(&header, payload) {
            Ok(frame) => self.dispatch(frame).await,
            Err(e) => self.handle_decode_error(e).await,
        }
    }

    async fn handle_decode_error(&mut self, err: DecodeError) -> Result<(), H2Error> {
        match err.scope {
            Scope::Connection => self.fail_connection(ConnError::with_debug(err.code, err.message)).await,
            Scope::Stream(id) => self.fail_stream(StreamError::new(id, err.code)).await,
        }
    }

    async fn read_frame_bytes(&mut self) -> Result<Option<(FrameHeader, Bytes)>, TransportError> {
        let mut head_buf = [0u8; HEADER_LEN];
        match self.read_half.read_exact(&mut head_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(TransportError(e)),
        }
        let header = FrameHeader::parse(&head_buf);
        let mut payload = vec![0u8; header.length as usize];
        self.read_half.read_exact(&mut payload).await.map_err(TransportError)?;
        Ok(Some((header, Bytes::from(payload))))
    }

    async fn handshake(&mut self) -> Result<(), H2Error> {
        let mut preface = [0u8; 24];
        self.read_half
            .read_exact(&mut preface)
            .await
            .map_err(|e| H2Error::Transport(TransportError(e)))?;
        if &preface != PREFACE {
            return self.fail_connection(ConnError::protocol("bad connection preface")).await;
        }

        self.shared
            .writer
            .write_frame(&self.local_settings_frame())
            .await
            .map_err(|e| H2Error::Transport(TransportError(e)))?;
        self.settings_ack_deadline = Some(Instant::now() + SETTINGS_ACK_TIMEOUT);

        let Some((header, payload)) = self
            .read_frame_bytes()
            .await
            .map_err(H2Error::Transport)?
        else {
            return Ok(());
        };
        let frame = Frame::decode(&header, payload).map_err(|e| match e.scope {
            Scope::Connection => H2Error::Connection(ConnError::with_debug(e.code, e.message)),
            Scope::Stream(id) => H2Error::Stream(StreamError::new(id, e.code)),
        })?;
        match frame {
            Frame::Settings { ack: false, params } => self.on_settings(false, params).await,
            _ => self.fail_connection(ConnError::protocol("first frame from peer must be SETTINGS")).await,
        }
    }

    fn local_settings_frame(&self) -> Frame {
        use crate::frame::SettingsParameter;
        let mut params = Settings::new();
        params.set(SettingsParameter::MaxConcurrentStreams, self.config.max_concurrent_streams);
        params.set(SettingsParameter::InitialWindowSize, self.config.initial_window_size);
        params.set(SettingsParameter::MaxFrameSize, self.config.max_frame_size);
        params.set(SettingsParameter::MaxHeaderListSize, self.config.max_header_list_size);
        params.set(SettingsParameter::EnablePush, u32::from(self.config.enable_push));
        Frame::Settings { ack: false, params }
    }

    async fn dispatch(&mut self, frame: Frame) -> Result<(), H2Error> {
        if let Some(pending) = self.continuation.pending_stream_id() {
            let is_matching_continuation =
                matches!(&frame, Frame::Continuation { stream_id, .. } if *stream_id == pending);
            if !is_matching_continuation {
                let err = self.continuation.reject_interleaved_frame();
                return self.fail_connection(err).await;
            }
        }
        match frame {
            Frame::Data { stream_id, end_stream, data } => self.on_data(stream_id, end_stream, data).await,
            Frame::Headers {
                stream_id,
                end_stream,
                end_headers,
                priority,
                header_block,
            } => self.on_headers(stream_id, end_stream, end_headers, priority, header_block).await,
            Frame::Priority { stream_id, priority } => self.on_priority(stream_id, priority).await,
            Frame::ResetStream { stream_id, error_code } => self.on_reset_stream(stream_id, error_code).await,
            Frame::Settings { ack, params } => self.on_settings(ack, params).await,
            Frame::PushPromise { .. } => {
                self.fail_connection(ConnError::protocol("server does not accept PUSH_PROMISE")).await
            }
            Frame::Ping { ack, opaque_data } => self.on_ping(ack, opaque_data).await,
            Frame::GoAway { last_stream_id, error_code, .. } => self.on_goaway(last_stream_id, error_code).await,
            Frame::WindowUpdate { stream_id, increment } => self.on_window_update(stream_id, increment).await,
            Frame::Continuation { stream_id, end_headers, header_block } => {
                self.on_continuation(stream_id, end_headers, header_block).await
            }
            Frame::Unknown { .. } => Ok(()),
        }
    }

    async fn on_data(&mut self, stream_id: u32, end_stream: bool, data: Bytes) -> Result<(), H2Error> {
        let len = data.len() as u32;
        let (conn_exceeded, conn_increment) = self.conn_recv_window.on_receive(len, Instant::now());
        if conn_exceeded {
            return self.fail_connection(ConnError::flow_control("connection recv window exceeded")).await;
        }
        if let Some(increment) = conn_increment {
            self.shared
                .writer
                .write_frame(&Frame::WindowUpdate { stream_id: 0, increment })
                .await
                .map_err(TransportError)
                .map_err(H2Error::Transport)?;
        }

        if !self.shared.streams.contains_key(&stream_id) {
            if self.shared.is_recently_closed(stream_id).await {
                return self.fail_stream(StreamError::stream_closed(stream_id)).await;
            }
            return self.fail_connection(ConnError::protocol("DATA on unknown stream")).await;
        }

        let now = Instant::now();
        let (stream_exceeded, stream_increment) = {
            let mut entry = self.shared.streams.get_mut(&stream_id).expect("checked above");
            entry.recv_window.on_receive(len, now)
        };
        if stream_exceeded {
            return self.fail_stream(StreamError::flow_control(stream_id)).await;
        }
        if let Some(increment) = stream_increment {
            self.shared
                .writer
                .write_frame(&Frame::WindowUpdate { stream_id, increment })
                .await
                .map_err(TransportError)
                .map_err(H2Error::Transport)?;
        }

        let record_result = {
            let mut entry = self.shared.streams.get_mut(&stream_id).expect("checked above");
            entry.any_data_received = true;
            entry.record_received_data(u64::from(len))
        };
        if let Err(e) = record_result {
            return self.fail_stream(e).await;
        }

        if let Some(body_tx) = self.shared.streams.get(&stream_id).and_then(|e| e.body_tx.clone()) {
            let _ = body_tx.send(data).await;
        }

        let transition_result = {
            let mut entry = self.shared.streams.get_mut(&stream_id).expect("checked above");
            entry.apply(Event::RecvData { end_stream })
        };
        if let Err(e) = transition_result {
            return self.fail_stream(e).await;
        }

        if end_stream {
            let finish_result = {
                let mut entry = self.shared.streams.get_mut(&stream_id).expect("checked above");
                entry.end_stream_received = true;
                entry.body_tx.take();
                entry.finish_receiving()
            };
            if let Err(e) = finish_result {
                return self.fail_stream(e).await;
            }
            self.shared.close_if_terminal(stream_id).await;
        }
        Ok(())
    }

    async fn on_headers(
        &mut self,
        stream_id: u32,
        end_stream: bool,
        end_headers: bool,
        priority: Option<Priority>,
        header_block: Bytes,
    ) -> Result<(), H2Error> {
        let now = Instant::now();
        if self.rapid_reset.is_banned(now) {
            return self.fail_connection(ConnError::enhance_your_calm("peer is banned")).await;
        }

        let is_new_stream = !self.shared.streams.contains_key(&stream_id);
        if is_new_stream {
            if stream_id <= self.last_peer_stream_id {
                return self.fail_connection(ConnError::protocol("stream id not strictly increasing")).await;
            }
            if self.shared.goaway_sent() {
                self.send_rst_stream(stream_id, ErrorCode::RefusedStream).await?;
                return Ok(());
            }
            if self.total_streams >= MAX_TOTAL_STREAMS {
                return self.fail_connection(ConnError::enhance_your_calm("stream id space exhausted")).await;
            }
            if self.shared.streams.len() as u32 >= self.local_settings.max_concurrent_streams {
                self.send_rst_stream(stream_id, ErrorCode::RefusedStream).await?;
                return Ok(());
            }

            self.last_peer_stream_id = stream_id;
            self.total_streams += 1;
            let remote_initial = self.shared.remote_settings.lock().await.initial_window_size;
            let mut stream = Stream::with_strategy(
                stream_id,
                i64::from(remote_initial),
                i64::from(self.local_settings.initial_window_size),
                self.config.flow_control_strategy,
            );
            stream.priority = priority;
            self.shared.streams.insert(stream_id, stream);

            if let Verdict::Ban = self.rapid_reset.on_stream_created(now) {
                return self.fail_connection(ConnError::enhance_your_calm("rapid reset: creation ceiling exceeded")).await;
            }
        }

        if !end_headers {
            if let Err(e) = self.continuation.start_headers(stream_id, header_block, end_stream, now) {
                return self.fail_connection(e).await;
            }
            return Ok(());
        }
        self.finish_header_block(stream_id, header_block, end_stream).await
    }

    async fn finish_header_block(
        &mut self,
        stream_id: u32,
        header_block: Bytes,
        end_stream: bool,
    ) -> Result<(), H2Error> {
        let raw = match self.decoder.decode(&header_block) {
            Ok(v) => v,
            Err(_) => return self.fail_connection(ConnError::compression("HPACK decode failure")).await,
        };

        let is_initial = self
            .shared
            .streams
            .get(&stream_id)
            .map(|s| s.state == State::Idle)
            .unwrap_or(false);
        let kind = if is_initial { HeaderKind::Request } else { HeaderKind::Trailers };
        let validated = match header::validate(stream_id, kind, raw) {
            Ok(v) => v,
            Err(e) => return self.fail_stream(e).await,
        };

        if is_initial {
            self.on_initial_headers(stream_id, validated, end_stream).await
        } else {
            self.on_trailers(stream_id, validated, end_stream).await
        }
    }

    async fn on_initial_headers(
        &mut self,
        stream_id: u32,
        validated: HeaderList,
        end_stream: bool,
    ) -> Result<(), H2Error> {
        self.rapid_reset.on_headers_complete();
        let content_length = content_length_of(&validated);

        let mut body_rx = None;
        let transition = {
            let Some(mut entry) = self.shared.streams.get_mut(&stream_id) else {
                return Ok(());
            };
            match entry.apply(Event::RecvHeaders { end_stream }) {
                Ok(()) => {
                    entry.content_length = content_length;
                    if end_stream {
                        entry.end_stream_received = true;
                    } else {
                        let (tx, rx) = mpsc::channel(32);
                        entry.body_tx = Some(tx);
                        body_rx = Some(rx);
                    }
                    Ok(())
                }
                Err(e) => Err(e),
            }
        };
        if let Err(e) = transition {
            return self.fail_stream(e).await;
        }

        let sink = Box::new(StreamSink::new(self.shared.clone(), stream_id));
        let handler = self.handler.clone();
        let request = Request {
            headers: validated,
            body: body_rx.unwrap_or_else(|| mpsc::channel(1).1),
        };
        tokio::spawn(async move {
            handler.handle(request, sink).await;
        });

        if end_stream {
            self.shared.close_if_terminal(stream_id).await;
        }
        Ok(())
    }

    async fn on_trailers(
        &mut self,
        stream_id: u32,
        validated: HeaderList,
        end_stream: bool,
    ) -> Result<(), H2Error> {
        if !end_stream {
            return self.fail_stream(StreamError::protocol(stream_id)).await;
        }
        let transition = {
            let Some(mut entry) = self.shared.streams.get_mut(&stream_id) else {
                return Ok(());
            };
            entry.trailers = Some(validated);
            entry.end_stream_received = true;
            entry.body_tx.take();
            entry.apply(Event::RecvHeaders { end_stream: true })
        };
        if let Err(e) = transition {
            return self.fail_stream(e).await;
        }
        self.shared.close_if_terminal(stream_id).await;
        Ok(())
    }

    async fn on_priority(&mut self, stream_id: u32, priority: Priority) -> Result<(), H2Error> {
        if !self.rate_limiters.priority.try_consume(Instant::now()) {
            return self.fail_connection(ConnError::enhance_your_calm("PRIORITY rate exceeded")).await;
        }
        // Idle or recently-closed streams are silently ignored here, per
        // the closed-stream grace window (spec.md §4.4).
        if let Some(mut entry) = self.shared.streams.get_mut(&stream_id) {
            entry.priority = Some(priority);
        }
        Ok(())
    }

    async fn on_reset_stream(&mut self, stream_id: u32, error_code: ErrorCode) -> Result<(), H2Error> {
        if !self.rate_limiters.reset_stream.try_consume(Instant::now()) {
            return self.fail_connection(ConnError::enhance_your_calm("RST_STREAM rate exceeded")).await;
        }
        if stream_id > self.last_peer_stream_id {
            return self.fail_connection(ConnError::protocol("RST_STREAM on idle stream")).await;
        }
        let _ = error_code;
        let Some((_, stream)) = self.shared.streams.remove(&stream_id) else {
            // Already closed; within or past the grace window this is a no-op.
            return Ok(());
        };
        let now = Instant::now();
        stream.notify.notify_waiters();
        self.shared.push_closed(stream_id, now).await;
        if let Verdict::Ban = self.rapid_reset.on_stream_reset(now, stream.created_at, stream.any_data_received) {
            return self.fail_connection(ConnError::enhance_your_calm("rapid reset: ceiling exceeded")).await;
        }
        Ok(())
    }

    async fn on_settings(&mut self, ack: bool, params: Settings) -> Result<(), H2Error> {
        if ack {
            self.settings_ack_deadline = None;
            return Ok(());
        }
        if !self.rate_limiters.settings.try_consume(Instant::now()) {
            return self.fail_connection(ConnError::enhance_your_calm("SETTINGS rate exceeded")).await;
        }

        let delta = {
            let mut remote = self.shared.remote_settings.lock().await;
            let delta = remote.apply(&params);
            let mut encoder = self.shared.encoder.lock().await;
            encoder.set_max_dynamic_table_size(remote.header_table_size as usize);
            delta
        };

        if delta.initial_window_size_delta != 0 {
            let mut overflowed = false;
            for mut entry in self.shared.streams.iter_mut() {
                let new_size = entry.send_window + delta.initial_window_size_delta;
                if new_size > MAX_WINDOW_SIZE {
                    overflowed = true;
                    break;
                }
                entry.send_window = new_size;
            }
            if overflowed {
                return self
                    .fail_connection(ConnError::flow_control("INITIAL_WINDOW_SIZE delta overflowed a stream window"))
                    .await;
            }
            self.shared.notify_all_streams();
        }

        self.shared
            .writer
            .write_frame(&Frame::Settings { ack: true, params: Settings::new() })
            .await
            .map_err(TransportError)
            .map_err(H2Error::Transport)
    }

    async fn on_ping(&mut self, ack: bool, opaque_data: [u8; 8]) -> Result<(), H2Error> {
        if ack {
            return Ok(());
        }
        if !self.rate_limiters.ping.try_consume(Instant::now()) {
            return self.fail_connection(ConnError::enhance_your_calm("PING rate exceeded")).await;
        }
        self.shared
            .writer
            .write_frame(&Frame::Ping { ack: true, opaque_data })
            .await
            .map_err(TransportError)
            .map_err(H2Error::Transport)
    }

    async fn on_goaway(&mut self, last_stream_id: u32, _error_code: ErrorCode) -> Result<(), H2Error> {
        let to_abort: Vec<u32> = self
            .shared
            .streams
            .iter()
            .filter(|e| *e.key() > last_stream_id)
            .map(|e| *e.key())
            .collect();
        for id in to_abort {
            if let Some((_, stream)) = self.shared.streams.remove(&id) {
                stream.notify.notify_waiters();
                self.shared.push_closed(id, Instant::now()).await;
            }
        }
        Ok(())
    }

    async fn on_window_update(&mut self, stream_id: u32, increment: u32) -> Result<(), H2Error> {
        if stream_id == 0 {
            let overflowed = {
                let mut window = self.shared.conn_send_window.lock().await;
                window.credit(increment).is_err()
            };
            if overflowed {
                return self.fail_connection(ConnError::flow_control("connection window overflow")).await;
            }
            self.shared.notify_all_streams();
            return Ok(());
        }

        let Some(mut entry) = self.shared.streams.get_mut(&stream_id) else {
            // Ignored for idle/recently-closed streams, per the grace window.
            return Ok(());
        };
        let new_size = entry.send_window + i64::from(increment);
        if new_size > MAX_WINDOW_SIZE {
            drop(entry);
            return self.fail_stream(StreamError::flow_control(stream_id)).await;
        }
        entry.send_window = new_size;
        entry.notify.notify_waiters();
        Ok(())
    }

    async fn on_continuation(
        &mut self,
        stream_id: u32,
        end_headers: bool,
        header_block: Bytes,
    ) -> Result<(), H2Error> {
        match self.continuation.push(stream_id, header_block, end_headers, Instant::now()) {
            Ok(Some(assembled)) => {
                self.finish_header_block(assembled.stream_id, assembled.header_block, assembled.end_stream)
                    .await
            }
            Ok(None) => Ok(()),
            Err(e) => self.fail_connection(e).await,
        }
    }

    async fn send_rst_stream(&mut self, stream_id: u32, code: ErrorCode) -> Result<(), H2Error> {
        self.shared
            .writer
            .write_frame(&Frame::ResetStream { stream_id, error_code: code })
            .await
            .map_err(TransportError)
            .map_err(H2Error::Transport)
    }

    async fn fail_connection(&mut self, err: ConnError) -> Result<(), H2Error> {
        log::error!("connection error: {err}");
        let debug = err.debug.clone().unwrap_or_default();
        let _ = self
            .shared
            .writer
            .write_frame(&Frame::GoAway {
                last_stream_id: self.last_peer_stream_id,
                error_code: err.code,
                debug_data: Bytes::from(debug.into_bytes()),
            })
            .await;
        self.shared.goaway_sent.store(true, Ordering::Release);
        self.shared.writer.shutdown().await;
        Err(H2Error::Connection(err))
    }

    async fn fail_stream(&mut self, err: StreamError) -> Result<(), H2Error> {
        log::warn!("stream error: {err}");
        let stream_id = err.stream_id;
        let _ = self
            .shared
            .writer
            .write_frame(&Frame::ResetStream { stream_id, error_code: err.code })
            .await;
        if let Some((_, stream)) = self.shared.streams.remove(&stream_id) {
            stream.notify.notify_waiters();
            self.shared.push_closed(stream_id, Instant::now()).await;
        }
        Ok(())
    }
}

fn content_length_of(headers: &HeaderList) -> Option<u64> {
    headers
        .fields
        .iter()
        .find(|(name, _)| name == "content-length")
        .and_then(|(_, value)| value.parse().ok())
}
