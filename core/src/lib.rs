//! Raw async HTTP/1.1 client for streaming chunked request bodies.
//!
//! # Overview
//! `ChunkedClient` opens a `Connection`, writes a request head, streams the
//! body from any `Read` as `Transfer-Encoding: chunked`, and pushes every
//! decoded response object into a `ResponseHandler`. The wire format lives
//! in the sans-IO `HttpClientCodec`, so framing can be tested without a
//! socket.
//!
//! # Design
//! - `codec` owns all byte-level work: request heads, chunk framing, and
//!   response decoding (fixed length, chunked, or close-delimited).
//! - `client` drives the codec over a tokio `TcpStream`; one runtime acts
//!   as the event loop.
//! - `ResponseRecorder` plus `CountDownLatch` let a plain thread block until
//!   a response completes and then inspect what was received.

pub mod chunked;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod latch;

pub use chunked::ChunkedStream;
pub use client::{ChunkedClient, Connection};
pub use codec::HttpClientCodec;
pub use config::ClientConfig;
pub use error::{ClientError, CodecError, ConfigError};
pub use handler::{ResponseHandler, ResponseRecorder};
pub use http::{ClientMessage, HttpMethod, HttpObject, HttpRequest, HttpResponseHead};
pub use latch::CountDownLatch;
