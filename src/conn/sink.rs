//! [`ResponseSink`] wired to a live connection (spec.md §4.7): every method
//! enforces the stream state machine and §4.5 flow control before a byte
//! reaches the wire, so handler code never has to think about either.

use super::Shared;
use crate::error::StreamError;
use crate::frame::{ErrorCode, Frame};
use crate::handler::ResponseSink;
use crate::stream::Event;
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWrite;

pub struct StreamSink<W> {
    shared: Arc<Shared<W>>,
    stream_id: u32,
}

impl<W> StreamSink<W> {
    pub fn new(shared: Arc<Shared<W>>, stream_id: u32) -> Self {
        Self { shared, stream_id }
    }
}

impl<W: AsyncWrite + Unpin + Send + 'static> StreamSink<W> {
    async fn wait_for_send_allowance(&self) -> Result<usize, StreamError> {
        loop {
            let (stream_window, notify, closed) = {
                let entry = self
                    .shared
                    .streams
                    .get(&self.stream_id)
                    .ok_or_else(|| StreamError::stream_closed(self.stream_id))?;
                (entry.send_window, entry.notify.clone(), entry.is_closed())
            };
            if closed {
                return Err(StreamError::stream_closed(self.stream_id));
            }
            let conn_window = self.shared.conn_send_window.lock().await.size();
            let allowance = stream_window.min(conn_window);
            if allowance > 0 {
                return Ok(allowance as usize);
            }
            notify.notified().await;
        }
    }

    async fn charge_send_windows(&self, n: u32) {
        if let Some(mut entry) = self.shared.streams.get_mut(&self.stream_id) {
            entry.send_window -= i64::from(n);
        }
        self.shared.conn_send_window.lock().await.charge(n);
    }

    async fn send_data_frame(&self, piece: Bytes, end_stream: bool) -> Result<(), StreamError> {
        {
            let mut entry = self
                .shared
                .streams
                .get_mut(&self.stream_id)
                .ok_or_else(|| StreamError::stream_closed(self.stream_id))?;
            entry.apply(Event::SendData { end_stream })?;
            if end_stream {
                entry.end_stream_sent = true;
            }
        }
        self.shared
            .writer
            .write_data_frame(self.stream_id, end_stream, &piece)
            .await
            .map_err(|_| StreamError::new(self.stream_id, ErrorCode::InternalError))?;
        Ok(())
    }

    async fn finish_if_closed(&self) {
        self.shared.close_if_terminal(self.stream_id).await;
    }
}

impl<W: AsyncWrite + Unpin + Send + 'static> ResponseSink for StreamSink<W> {
    fn send_headers(
        &mut self,
        headers: Vec<(String, String)>,
        end_stream: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(), StreamError>> + Send + '_>> {
        Box::pin(async move {
            {
                let mut entry = self
                    .shared
                    .streams
                    .get_mut(&self.stream_id)
                    .ok_or_else(|| StreamError::stream_closed(self.stream_id))?;
                entry.apply(Event::SendHeaders { end_stream })?;
                entry.end_stream_sent = end_stream;
            }
            let encoded = {
                let mut encoder = self.shared.encoder.lock().await;
                encoder.encode(&headers)
            };
            self.shared
                .writer
                .write_frame(&Frame::Headers {
                    stream_id: self.stream_id,
                    end_stream,
                    end_headers: true,
                    priority: None,
                    header_block: Bytes::from(encoded),
                })
                .await
                .map_err(|_| StreamError::new(self.stream_id, ErrorCode::InternalError))?;
            if end_stream {
                self.finish_if_closed().await;
            }
            Ok(())
        })
    }

    fn send_data(
        &mut self,
        chunk: Bytes,
        end_stream: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(), StreamError>> + Send + '_>> {
        Box::pin(async move {
            if chunk.is_empty() {
                if end_stream {
                    self.send_data_frame(Bytes::new(), true).await?;
                    self.finish_if_closed().await;
                }
                return Ok(());
            }

            let total = chunk.len();
            let mut offset = 0usize;
            while offset < total {
                let remaining = total - offset;
                let peer_max_frame = {
                    let remote = self.shared.remote_settings.lock().await;
                    remote.max_frame_size as usize
                }
                .max(1);
                let allowance = self.wait_for_send_allowance().await?;
                let take = allowance.min(peer_max_frame).min(remaining);
                if take == 0 {
                    continue;
                }
                let piece = chunk.slice(offset..offset + take);
                offset += take;
                self.charge_send_windows(take as u32).await;
                let is_last = offset == total;
                self.send_data_frame(piece, is_last && end_stream).await?;
            }
            if end_stream {
                self.finish_if_closed().await;
            }
            Ok(())
        })
    }

    fn send_trailers(
        &mut self,
        trailers: Vec<(String, String)>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StreamError>> + Send + '_>> {
        Box::pin(async move {
            {
                let mut entry = self
                    .shared
                    .streams
                    .get_mut(&self.stream_id)
                    .ok_or_else(|| StreamError::stream_closed(self.stream_id))?;
                entry.apply(Event::SendHeaders { end_stream: true })?;
                entry.end_stream_sent = true;
            }
            let encoded = {
                let mut encoder = self.shared.encoder.lock().await;
                encoder.encode(&trailers)
            };
            self.shared
                .writer
                .write_frame(&Frame::Headers {
                    stream_id: self.stream_id,
                    end_stream: true,
                    end_headers: true,
                    priority: None,
                    header_block: Bytes::from(encoded),
                })
                .await
                .map_err(|_| StreamError::new(self.stream_id, ErrorCode::InternalError))?;
            self.finish_if_closed().await;
            Ok(())
        })
    }

    fn reset(&mut self, error_code: ErrorCode) {
        let shared = self.shared.clone();
        let stream_id = self.stream_id;
        tokio::spawn(async move {
            let _ = shared
                .writer
                .write_frame(&Frame::ResetStream { stream_id, error_code })
                .await;
            if let Some((_, stream)) = shared.streams.remove(&stream_id) {
                stream.notify.notify_waiters();
                shared.push_closed(stream_id, Instant::now()).await;
            }
        });
    }
}
