//! Error types for the chunking client.
//!
//! # Design
//! Wire-level failures live in `CodecError` so the codec stays free of I/O
//! concerns. `ClientError` wraps them together with socket and URL errors
//! for everything the async client does around the codec.

use std::io;

/// Errors raised while encoding requests or decoding responses.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid response head: {0}")]
    InvalidResponseHead(httparse::Error),

    #[error("response head exceeds {0} bytes")]
    HeadTooLarge(usize),

    #[error("invalid chunk size line: {0}")]
    InvalidChunkSize(httparse::InvalidChunkSize),

    #[error("chunk size line exceeds {0} bytes")]
    ChunkLineTooLarge(usize),

    #[error("trailer section exceeds {0} bytes")]
    TrailersTooLarge(usize),

    #[error("invalid chunk footer: expected {expected:#04x}, found {found:#04x}")]
    InvalidChunkFooter { expected: u8, found: u8 },

    #[error("invalid content-length: {0}")]
    InvalidContentLength(String),

    #[error("invalid trailer section: {0}")]
    InvalidTrailer(httparse::Error),

    /// Body content was written before any request head.
    #[error("content written before request head")]
    ContentBeforeHead,

    #[error("unexpected end of stream")]
    UnexpectedEof,
}

/// Errors returned by `ChunkedClient` and `Connection`.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The reader supplying the request body failed.
    #[error("reading request body: {0}")]
    BodySource(io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported scheme `{0}`, only http is supported")]
    UnsupportedScheme(String),

    #[error("url has no host")]
    MissingHost,

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The peer closed the connection before a full response arrived.
    #[error("connection closed before the response completed")]
    ConnectionClosed,
}

/// Invalid configuration, either from the environment or from a
/// deserialized document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}
