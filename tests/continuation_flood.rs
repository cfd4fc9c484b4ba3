//! End-to-end scenario 4 from spec.md §8: a HEADERS frame held open with
//! never-ending CONTINUATION frames must be rejected once the per-block
//! frame-count cap is crossed, not accumulated forever.

mod common;

use bytes::Bytes;
use common::*;
use htwo::frame::{ErrorCode, Frame, FrameType};
use htwo::Config;
use std::sync::Arc;

#[tokio::test]
async fn continuation_flood_is_rejected() {
    let mut client = spawn_server(Arc::new(SilentHandler), Config::default());
    send_preface_and_settings(&mut client).await;
    drain_handshake(&mut client).await;

    write_frame(
        &mut client,
        &Frame::Headers {
            stream_id: 1,
            end_stream: false,
            end_headers: false,
            priority: None,
            header_block: Bytes::from_static(b""),
        },
    )
    .await;

    for _ in 0..101 {
        write_frame(
            &mut client,
            &Frame::Continuation {
                stream_id: 1,
                end_headers: false,
                header_block: Bytes::from_static(b""),
            },
        )
        .await;
    }

    let mut saw_protocol_error_goaway = false;
    while let Some((header, payload)) = try_read_frame(&mut client).await {
        if header.frame_type() == Some(FrameType::GoAway) {
            let code = u32::from_be_bytes(payload[4..8].try_into().unwrap());
            assert_eq!(code, ErrorCode::ProtocolError as u32);
            saw_protocol_error_goaway = true;
            break;
        }
    }
    assert!(
        saw_protocol_error_goaway,
        "server must close with PROTOCOL_ERROR before the 101st CONTINUATION"
    );
}
