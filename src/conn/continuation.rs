//! HEADERS continuation assembly (spec.md §4.6). A header block that spans
//! more than one frame is reassembled here before HPACK ever sees it; while
//! assembly is in progress the read loop rejects anything that isn't
//! another CONTINUATION on the same stream, which is what keeps a
//! CONTINUATION flood from turning into unbounded memory growth.
//! PUSH_PROMISE itself never reaches this assembler: the server rejects any
//! inbound PUSH_PROMISE at dispatch, per spec.md's Non-goals.

use crate::error::ConnError;
use crate::frame::ErrorCode;
use bytes::{Bytes, BytesMut};
use std::time::{Duration, Instant};

const MAX_CONTINUATION_FRAMES: usize = 100;
const MAX_ACCUMULATED_BYTES: usize = 32 * 1024;
const ASSEMBLY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ContinuationAssembler {
    in_progress: Option<InProgress>,
}

struct InProgress {
    stream_id: u32,
    buffer: BytesMut,
    frame_count: usize,
    end_stream: bool,
    started_at: Instant,
}

/// A header block that's ready to hand to HPACK, once END_HEADERS arrives.
pub struct Assembled {
    pub stream_id: u32,
    pub header_block: Bytes,
    pub end_stream: bool,
}

impl Default for ContinuationAssembler {
    fn default() -> Self {
        Self { in_progress: None }
    }
}

impl ContinuationAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.in_progress.is_some()
    }

    /// The stream the engine is currently waiting on CONTINUATION frames
    /// from, if any. Used by the read loop to reject interleaved frames.
    pub fn pending_stream_id(&self) -> Option<u32> {
        self.in_progress.as_ref().map(|p| p.stream_id)
    }

    pub fn start_headers(
        &mut self,
        stream_id: u32,
        fragment: Bytes,
        end_stream: bool,
        now: Instant,
    ) -> Result<(), ConnError> {
        if fragment.len() > MAX_ACCUMULATED_BYTES {
            return Err(ConnError::new(ErrorCode::ProtocolError));
        }
        let mut buffer = BytesMut::with_capacity(fragment.len());
        buffer.extend_from_slice(&fragment);
        self.in_progress = Some(InProgress {
            stream_id,
            buffer,
            frame_count: 1,
            end_stream,
            started_at: now,
        });
        Ok(())
    }

    /// Feeds a CONTINUATION frame into the assembly in progress. Returns
    /// `Some(Assembled)` once `end_headers` completes the block.
    pub fn push(
        &mut self,
        stream_id: u32,
        fragment: Bytes,
        end_headers: bool,
        now: Instant,
    ) -> Result<Option<Assembled>, ConnError> {
        let in_progress = self
            .in_progress
            .as_mut()
            .ok_or_else(|| ConnError::protocol("CONTINUATION without an open header block"))?;

        if stream_id != in_progress.stream_id {
            self.in_progress = None;
            return Err(ConnError::protocol("CONTINUATION on wrong stream"));
        }
        if now.saturating_duration_since(in_progress.started_at) > ASSEMBLY_TIMEOUT {
            self.in_progress = None;
            return Err(ConnError::protocol("CONTINUATION assembly timed out"));
        }

        in_progress.frame_count += 1;
        if in_progress.frame_count > MAX_CONTINUATION_FRAMES {
            self.in_progress = None;
            return Err(ConnError::protocol("too many CONTINUATION frames"));
        }
        in_progress.buffer.extend_from_slice(&fragment);
        if in_progress.buffer.len() > MAX_ACCUMULATED_BYTES {
            self.in_progress = None;
            return Err(ConnError::protocol("CONTINUATION block too large"));
        }

        if !end_headers {
            return Ok(None);
        }

        let finished = self.in_progress.take().expect("checked above");
        Ok(Some(Assembled {
            stream_id: finished.stream_id,
            header_block: finished.buffer.freeze(),
            end_stream: finished.end_stream,
        }))
    }

    /// Called whenever the read loop sees a frame that isn't a
    /// CONTINUATION while assembly is in progress: always a protocol
    /// error per spec.md §4.6.
    pub fn reject_interleaved_frame(&mut self) -> ConnError {
        self.in_progress = None;
        ConnError::protocol("frame interleaved with CONTINUATION assembly")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_continuation_completes_block() {
        let mut assembler = ContinuationAssembler::new();
        let now = Instant::now();
        assembler
            .start_headers(1, Bytes::from_static(b"abc"), true, now)
            .unwrap();
        assert!(assembler.is_active());

        let result = assembler
            .push(1, Bytes::from_static(b"def"), true, now)
            .unwrap();
        let assembled = result.unwrap();
        assert_eq!(&assembled.header_block[..], b"abcdef");
        assert!(assembled.end_stream);
        assert!(!assembler.is_active());
    }

    #[test]
    fn continuation_on_wrong_stream_is_rejected() {
        let mut assembler = ContinuationAssembler::new();
        let now = Instant::now();
        assembler
            .start_headers(1, Bytes::from_static(b"abc"), false, now)
            .unwrap();
        assert!(assembler.push(2, Bytes::new(), true, now).is_err());
        assert!(!assembler.is_active());
    }

    #[test]
    fn more_than_hundred_continuation_frames_is_rejected() {
        let mut assembler = ContinuationAssembler::new();
        let now = Instant::now();
        assembler
            .start_headers(7, Bytes::new(), false, now)
            .unwrap();
        for i in 0..99 {
            let result = assembler.push(7, Bytes::new(), false, now);
            assert!(result.unwrap().is_none(), "frame {i}");
        }
        // this is the 101st frame in the block overall (1 start + 100 pushes)
        assert!(assembler.push(7, Bytes::new(), false, now).is_err());
    }

    #[test]
    fn accumulated_bytes_over_cap_is_rejected() {
        let mut assembler = ContinuationAssembler::new();
        let now = Instant::now();
        assembler
            .start_headers(1, Bytes::new(), false, now)
            .unwrap();
        let chunk = Bytes::from(vec![0u8; 16 * 1024]);
        assembler.push(1, chunk.clone(), false, now).unwrap();
        assert!(assembler.push(1, chunk.clone(), false, now).is_err());
    }

    #[test]
    fn timeout_between_fragments_is_rejected() {
        let mut assembler = ContinuationAssembler::new();
        let start = Instant::now();
        assembler
            .start_headers(1, Bytes::new(), false, start)
            .unwrap();
        let later = start + Duration::from_secs(6);
        assert!(assembler.push(1, Bytes::new(), true, later).is_err());
    }
}
