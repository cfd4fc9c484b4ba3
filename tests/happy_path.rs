//! End-to-end scenario 1 from spec.md §8: a plain GET over a fresh
//! connection gets the full settings handshake plus a response.

mod common;

use common::*;
use htwo::frame::FrameType;
use htwo::hpack;
use htwo::{frame::Frame, Config};
use std::sync::Arc;

#[tokio::test]
async fn happy_get_round_trip() {
    let mut client = spawn_server(Arc::new(EchoHandler::default()), Config::default());

    send_preface_and_settings(&mut client).await;
    let header_block = encode_headers(&[
        (":method", "GET"),
        (":scheme", "https"),
        (":path", "/"),
        (":authority", "x"),
    ]);
    write_frame(
        &mut client,
        &Frame::Headers {
            stream_id: 1,
            end_stream: true,
            end_headers: true,
            priority: None,
            header_block,
        },
    )
    .await;

    drain_handshake(&mut client).await;

    let (headers_hdr, headers_payload) = read_frame(&mut client).await;
    assert_eq!(headers_hdr.frame_type(), Some(FrameType::Headers));
    assert_eq!(headers_hdr.stream_id, 1);
    let mut decoder = hpack::Decoder::new(4096, 1 << 20);
    let decoded = decoder.decode(&headers_payload).unwrap();
    assert!(decoded.contains(&(":status".to_string(), "200".to_string())));

    let (data_hdr, data_payload) = read_frame(&mut client).await;
    assert_eq!(data_hdr.frame_type(), Some(FrameType::Data));
    assert_eq!(data_hdr.stream_id, 1);
    assert_eq!(&data_payload[..], b"ok");
    assert_eq!(data_hdr.flags & 0x1, 0x1, "DATA must carry END_STREAM");
}
