//! Shared scaffolding for the end-to-end engine tests: a client-side byte
//! pump over an in-memory duplex pipe, plus a minimal echo [`Handler`] so
//! each test only has to script the frames it cares about.

#![allow(dead_code)]

use bytes::Bytes;
use htwo::frame::{Frame, FrameHeader, HEADER_LEN};
use htwo::handler::{Handler, Request, ResponseSink};
use htwo::hpack;
use htwo::{Config, Transport};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

pub const PREFACE: &[u8; 24] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Spawns the server engine over one end of an in-memory duplex pipe and
/// hands the test the other end to drive as a scripted client.
pub fn spawn_server(handler: Arc<dyn Handler>, config: Config) -> DuplexStream {
    let (client_side, server_side) = tokio::io::duplex(1 << 20);
    tokio::spawn(async move {
        let _ = htwo::run(server_side, handler, config).await;
    });
    client_side
}

pub async fn send_preface_and_settings(client: &mut DuplexStream) {
    client.write_all(PREFACE).await.unwrap();
    let settings = Frame::Settings {
        ack: false,
        params: htwo::settings::Settings::new(),
    };
    client.write_all(&settings.encode()).await.unwrap();
}

pub async fn write_frame(client: &mut DuplexStream, frame: &Frame) {
    client.write_all(&frame.encode()).await.unwrap();
}

/// Reads one frame off the wire, panicking on EOF — tests that expect a
/// connection close should use [`try_read_frame`] instead.
pub async fn read_frame(client: &mut DuplexStream) -> (FrameHeader, Bytes) {
    try_read_frame(client).await.expect("expected a frame, got EOF")
}

pub async fn try_read_frame(client: &mut DuplexStream) -> Option<(FrameHeader, Bytes)> {
    let mut head = [0u8; HEADER_LEN];
    let fut = client.read_exact(&mut head);
    match tokio::time::timeout(Duration::from_secs(2), fut).await {
        Ok(Ok(_)) => {}
        Ok(Err(_)) | Err(_) => return None,
    }
    let header = FrameHeader::parse(&head);
    let mut payload = vec![0u8; header.length as usize];
    client.read_exact(&mut payload).await.unwrap();
    Some((header, Bytes::from(payload)))
}

/// Reads frames until the server's initial SETTINGS and the client's
/// SETTINGS-ack have both gone by, since every connection starts with that
/// exchange regardless of what the test cares about afterwards.
pub async fn drain_handshake(client: &mut DuplexStream) {
    let mut seen_settings = false;
    let mut seen_ack = false;
    while !(seen_settings && seen_ack) {
        let (header, _payload) = read_frame(client).await;
        match header.frame_type() {
            Some(htwo::frame::FrameType::Settings) if header.flags & 0x1 != 0 => seen_ack = true,
            Some(htwo::frame::FrameType::Settings) => seen_settings = true,
            _ => {}
        }
    }
}

pub fn encode_headers(pairs: &[(&str, &str)]) -> Bytes {
    let mut encoder = hpack::Encoder::new(4096);
    let owned: Vec<(String, String)> = pairs.iter().map(|(n, v)| (n.to_string(), v.to_string())).collect();
    Bytes::from(encoder.encode(&owned))
}

/// A handler that replies `200` with a fixed body as soon as the request
/// completes, ignoring whatever was actually asked for.
pub struct EchoHandler {
    pub body: &'static [u8],
}

impl Default for EchoHandler {
    fn default() -> Self {
        Self { body: b"ok" }
    }
}

impl Handler for EchoHandler {
    fn handle(&self, _request: Request, mut sink: Box<dyn ResponseSink>) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>> {
        let body = self.body;
        Box::pin(async move {
            let _ = sink
                .send_headers(vec![(":status".to_string(), "200".to_string())], false)
                .await;
            let _ = sink.send_data(Bytes::from_static(body), true).await;
        })
    }
}

/// A handler that never responds, used by tests that only care about the
/// connection engine's reaction to misbehaving input, not the response.
pub struct SilentHandler;

impl Handler for SilentHandler {
    fn handle(&self, _request: Request, _sink: Box<dyn ResponseSink>) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>> {
        Box::pin(async move {})
    }
}
