//! The write path (spec.md §4.6): a single mutex serializes socket writes,
//! and a pending-bytes counter applies the backpressure watermarks so a
//! slow peer can't grow an unbounded outbound queue the way an unbounded
//! per-connection channel would.

use crate::frame::{DataFlags, Frame, FrameHeader, FrameType, HEADER_LEN};
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, Notify};

const HIGH_WATER: usize = 800 * 1024;
const LOW_WATER: usize = 500 * 1024;

pub struct Writer<W> {
    sink: Mutex<W>,
    pending_bytes: AtomicUsize,
    drained: Notify,
}

impl<W: AsyncWrite + Unpin + Send> Writer<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink: Mutex::new(sink),
            pending_bytes: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    /// Blocks while the outbound queue is above the high-water mark.
    pub async fn wait_for_capacity(&self) {
        while self.pending_bytes.load(Ordering::Acquire) > HIGH_WATER {
            self.drained.notified().await;
        }
    }

    /// Encodes and writes a single frame, holding the write lock only for
    /// the duration of the syscall.
    pub async fn write_frame(&self, frame: &Frame) -> std::io::Result<()> {
        self.wait_for_capacity().await;
        let encoded = frame.encode();
        let len = encoded.len();
        self.pending_bytes.fetch_add(len, Ordering::AcqRel);
        let result = {
            let mut sink = self.sink.lock().await;
            sink.write_all(&encoded).await
        };
        let remaining = self.pending_bytes.fetch_sub(len, Ordering::AcqRel) - len;
        if remaining <= LOW_WATER {
            self.drained.notify_waiters();
        }
        result
    }

    /// DATA's zero-copy path (spec.md §4.1): writes the 9-byte header and
    /// then `data` itself as a second `write_all`, so the payload is never
    /// copied into an intermediate buffer the way [`Frame::encode`]'s
    /// generic path does for every other frame type.
    pub async fn write_data_frame(&self, stream_id: u32, end_stream: bool, data: &Bytes) -> std::io::Result<()> {
        self.wait_for_capacity().await;
        let flags = if end_stream { DataFlags::END_STREAM.bits() } else { 0 };
        let header = FrameHeader::new(data.len() as u32, FrameType::Data, flags, stream_id);
        let mut head_buf = Vec::with_capacity(HEADER_LEN);
        header.write(&mut head_buf);
        let total = head_buf.len() + data.len();
        self.pending_bytes.fetch_add(total, Ordering::AcqRel);
        let result = {
            let mut sink = self.sink.lock().await;
            match sink.write_all(&head_buf).await {
                Ok(()) => sink.write_all(data).await,
                Err(e) => Err(e),
            }
        };
        let remaining = self.pending_bytes.fetch_sub(total, Ordering::AcqRel) - total;
        if remaining <= LOW_WATER {
            self.drained.notify_waiters();
        }
        result
    }

    pub async fn shutdown(&self) {
        let mut sink = self.sink.lock().await;
        let _ = sink.shutdown().await;
    }
}
