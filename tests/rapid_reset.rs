//! End-to-end scenario 3 from spec.md §8 (CVE-2023-44487): a peer that
//! opens streams and resets them immediately, before any DATA arrives,
//! crosses the rapid-reset ceiling and gets banned with GOAWAY.

mod common;

use common::*;
use htwo::frame::{ErrorCode, Frame, FrameType};
use htwo::Config;
use std::sync::Arc;

#[tokio::test]
async fn rapid_reset_pattern_triggers_enhance_your_calm() {
    let mut client = spawn_server(Arc::new(SilentHandler), Config::default());
    send_preface_and_settings(&mut client).await;
    drain_handshake(&mut client).await;

    for i in 0..60u32 {
        let stream_id = 2 * i + 1;
        let header_block = encode_headers(&[
            (":method", "GET"),
            (":scheme", "https"),
            (":path", "/"),
            (":authority", "x"),
        ]);
        write_frame(
            &mut client,
            &Frame::Headers {
                stream_id,
                end_stream: false,
                end_headers: true,
                priority: None,
                header_block,
            },
        )
        .await;
        write_frame(
            &mut client,
            &Frame::ResetStream {
                stream_id,
                error_code: ErrorCode::Cancel,
            },
        )
        .await;
    }

    let mut saw_goaway_enhance_your_calm = false;
    while let Some((header, payload)) = try_read_frame(&mut client).await {
        if header.frame_type() == Some(FrameType::GoAway) {
            // last_stream_id(4) + error_code(4) prefix, per spec.md §4.1.
            let code = u32::from_be_bytes(payload[4..8].try_into().unwrap());
            assert_eq!(code, ErrorCode::EnhanceYourCalm as u32);
            saw_goaway_enhance_your_calm = true;
            break;
        }
    }
    assert!(
        saw_goaway_enhance_your_calm,
        "server must ban the peer with GOAWAY(ENHANCE_YOUR_CALM)"
    );
}
