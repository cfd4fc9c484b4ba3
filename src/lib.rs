#![warn(future_incompatible, nonstandard_style, rust_2018_idioms, unused)]
#![warn(clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::similar_names,
    clippy::cast_possible_truncation,
    clippy::too_many_lines,
)]

//! An HTTP/2 server core: RFC 9113 framing and stream handling, RFC 7541
//! HPACK, and the DoS mitigations a public-facing implementation needs
//! (rapid-reset, CONTINUATION flood, SETTINGS/PING flood, padding oracle).
//! The crate owns the protocol state machine and the socket; routing and
//! response generation are the [`Handler`] the caller supplies.

pub mod config;
pub mod conn;
pub mod error;
pub mod flow;
pub mod frame;
pub mod handler;
pub mod header;
pub mod hpack;
pub mod ratelimit;
pub mod rapid_reset;
pub mod settings;
pub mod stream;
pub mod transport;

pub use bytes::Bytes;
pub use config::Config;
pub use conn::run;
pub use error::{ConnError, H2Error, StreamError, TransportError};
pub use handler::{Handler, Request, ResponseSink};
pub use transport::Transport;
