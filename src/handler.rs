//! The request-handler boundary (spec.md §5): the engine hands each
//! complete request to a callback, which drives a [`ResponseSink`] back.
//! Dispatch onto a worker pool, and the pool's sizing, are the caller's
//! concern — `htwo` only defines the seam.

use crate::error::StreamError;
use crate::frame::ErrorCode;
use crate::header::HeaderList;
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

/// A fully validated request: pseudo-headers plus regular fields, and a
/// channel yielding body chunks as DATA frames arrive.
pub struct Request {
    pub headers: HeaderList,
    pub body: mpsc::Receiver<Bytes>,
}

/// What a handler uses to talk back to its stream. Every method enforces
/// the stream's state machine and flow control internally — callers never
/// see a raw frame.
pub trait ResponseSink: Send {
    fn send_headers(
        &mut self,
        headers: Vec<(String, String)>,
        end_stream: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(), StreamError>> + Send + '_>>;

    fn send_data(
        &mut self,
        chunk: Bytes,
        end_stream: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(), StreamError>> + Send + '_>>;

    fn send_trailers(
        &mut self,
        trailers: Vec<(String, String)>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StreamError>> + Send + '_>>;

    fn reset(&mut self, error_code: ErrorCode);
}

pub type BoxFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// A per-connection request handler. One instance is shared across every
/// stream the connection opens.
pub trait Handler: Send + Sync {
    fn handle(&self, request: Request, sink: Box<dyn ResponseSink>) -> BoxFuture<'static>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request, Box<dyn ResponseSink>) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn handle(&self, request: Request, sink: Box<dyn ResponseSink>) -> BoxFuture<'static> {
        Box::pin(self(request, sink))
    }
}
