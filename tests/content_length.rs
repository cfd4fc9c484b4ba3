//! End-to-end scenario 6 from spec.md §8: a DATA body that falls short of
//! its own declared content-length is a stream error, not a connection
//! error — the rest of the connection keeps working.

mod common;

use bytes::Bytes;
use common::*;
use htwo::frame::{ErrorCode, Frame, FrameType};
use htwo::Config;
use std::sync::Arc;

#[tokio::test]
async fn content_length_mismatch_resets_only_that_stream() {
    let mut client = spawn_server(Arc::new(SilentHandler), Config::default());
    send_preface_and_settings(&mut client).await;
    drain_handshake(&mut client).await;

    let header_block = encode_headers(&[
        (":method", "POST"),
        (":scheme", "https"),
        (":path", "/"),
        (":authority", "x"),
        ("content-length", "10"),
    ]);
    write_frame(
        &mut client,
        &Frame::Headers {
            stream_id: 1,
            end_stream: false,
            end_headers: true,
            priority: None,
            header_block,
        },
    )
    .await;
    write_frame(
        &mut client,
        &Frame::Data {
            stream_id: 1,
            end_stream: true,
            data: Bytes::from_static(b"12345678"), // 8 bytes, declared 10
        },
    )
    .await;

    let (header, payload) = read_frame(&mut client).await;
    assert_eq!(header.frame_type(), Some(FrameType::ResetStream));
    assert_eq!(header.stream_id, 1);
    let code = u32::from_be_bytes(payload[0..4].try_into().unwrap());
    assert_eq!(code, ErrorCode::ProtocolError as u32);

    // The connection itself must still be alive: a PING gets a PING ack.
    write_frame(
        &mut client,
        &Frame::Ping {
            ack: false,
            opaque_data: *b"liveness",
        },
    )
    .await;
    let (ping_header, ping_payload) = read_frame(&mut client).await;
    assert_eq!(ping_header.frame_type(), Some(FrameType::Ping));
    assert_eq!(ping_header.flags & 0x1, 0x1);
    assert_eq!(&ping_payload[..], b"liveness");
}
