//! A thin demonstration of wiring the out-of-scope collaborators (spec.md
//! §1, §4.7) around `htwo`: a plain-TCP listener and an echo [`Handler`].
//! Neither the listener loop nor the handler are part of the crate's
//! product surface — see `src/transport.rs` and `src/handler.rs` for the
//! trait boundary this wires into.

use bytes::Bytes;
use htwo::handler::{Handler, Request, ResponseSink};
use htwo::Config;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::TcpListener;

struct EchoHandler;

impl Handler for EchoHandler {
    fn handle(
        &self,
        mut request: Request,
        mut sink: Box<dyn ResponseSink>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>> {
        Box::pin(async move {
            let path = request
                .headers
                .pseudo
                .iter()
                .find(|(name, _)| name == ":path")
                .map(|(_, value)| value.clone())
                .unwrap_or_default();

            let mut body = Vec::new();
            while let Some(chunk) = request.body.recv().await {
                body.extend_from_slice(&chunk);
            }

            log::info!("{path} ({} body bytes)", body.len());

            let headers = vec![
                (":status".to_string(), "200".to_string()),
                ("content-type".to_string(), "text/plain".to_string()),
            ];
            if sink.send_headers(headers, false).await.is_err() {
                return;
            }
            let response = format!("echo: {path}\n");
            let _ = sink.send_data(Bytes::from(response), true).await;
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let addr = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:8443".to_string());
    let listener = TcpListener::bind(&addr).await?;
    log::info!("listening on {addr} (h2c, no TLS — demo only)");

    let handler: Arc<dyn Handler> = Arc::new(EchoHandler);
    loop {
        let (socket, peer) = listener.accept().await?;
        let handler = handler.clone();
        let config = Config::default();
        tokio::spawn(async move {
            log::debug!("accepted connection from {peer}");
            if let Err(err) = htwo::run(socket, handler, config).await {
                log::warn!("connection with {peer} ended: {err}");
            }
        });
    }
}
