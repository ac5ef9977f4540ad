//! Async HTTP/1.1 client that streams request bodies as chunks.
//!
//! # Design
//! `ChunkedClient` holds only the parsed base URL and its config. Each
//! exchange opens a `Connection`, which owns a `TcpStream`, an
//! `HttpClientCodec`, and its read and write buffers. Writing is split like
//! a channel pipeline: `write` only encodes into the outbound buffer and
//! `flush` puts it on the socket. Decoded response objects are pushed into a
//! `ResponseHandler` as they arrive.

use std::io::Read;
use std::net::SocketAddr;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};
use url::Url;

use crate::chunked::ChunkedStream;
use crate::codec::HttpClientCodec;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::handler::ResponseHandler;
use crate::http::{ClientMessage, HttpMethod, HttpObject, HttpRequest};

#[derive(Debug, Clone)]
pub struct ChunkedClient {
    base_url: Url,
    host: String,
    port: u16,
    config: ClientConfig,
}

impl ChunkedClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_config(base_url, ClientConfig::default())
    }

    pub fn with_config(base_url: &str, config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let base_url = Url::parse(base_url)?;
        if base_url.scheme() != "http" {
            return Err(ClientError::UnsupportedScheme(base_url.scheme().to_string()));
        }
        let host = base_url.host_str().ok_or(ClientError::MissingHost)?.to_string();
        let port = base_url.port_or_known_default().unwrap_or(80);
        Ok(Self {
            base_url,
            host,
            port,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// `host:port` of the server, as sent in the `Host` header.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Absolute URL of `path` on this client's server.
    pub fn target_url(&self, path: &str) -> String {
        format!("http://{}{}", self.authority(), self.request_target(path))
    }

    /// Head of a chunked POST to `path`; the body follows as content
    /// messages.
    pub fn build_chunked_post(&self, path: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Post, self.request_target(path))
            .with_header("Accept", "*/*")
            .with_header("Transfer-Encoding", "chunked")
            .with_header("Host", self.authority())
            .with_header("Connection", "keep-alive")
    }

    pub async fn connect(&self) -> Result<Connection, ClientError> {
        let stream = TcpStream::connect(self.authority()).await?;
        stream.set_nodelay(true)?;
        debug!(peer = %self.authority(), "connected");
        Ok(Connection::new(stream, &self.config))
    }

    /// POST `body` to `path` as a chunked stream and feed the response to
    /// `handler`. On failure the handler's `on_error` runs before the error
    /// is returned.
    ///
    /// `body` is read on the calling task, so it should be an in-memory or
    /// otherwise non-blocking reader. Move slow sources onto
    /// `tokio::task::spawn_blocking` and hand over the bytes they produce.
    pub async fn post_chunked<R, H>(
        &self,
        path: &str,
        body: R,
        handler: &mut H,
    ) -> Result<(), ClientError>
    where
        R: Read,
        H: ResponseHandler + ?Sized,
    {
        let result = self.exchange(path, body, handler).await;
        if let Err(error) = &result {
            warn!(%error, path, "chunked exchange failed");
            handler.on_error(error);
        }
        result
    }

    async fn exchange<R, H>(&self, path: &str, body: R, handler: &mut H) -> Result<(), ClientError>
    where
        R: Read,
        H: ResponseHandler + ?Sized,
    {
        let mut connection = self.connect().await?;
        let request = self.build_chunked_post(path);
        debug!(uri = %request.uri, "sending chunked request");

        let written = Self::send(&mut connection, request, body, self.config.chunk_size).await;
        match written {
            Ok(sent) => {
                debug!(sent, "request body complete");
                connection.read_response(handler).await
            }
            // The server may answer early (413) and close while we are still
            // sending; its response takes precedence over the failed write.
            Err(ClientError::Io(write_error)) => {
                debug!(%write_error, "write failed, reading early response");
                connection.read_early_response(handler, write_error).await
            }
            Err(error) => Err(error),
        }
    }

    async fn send<R: Read>(
        connection: &mut Connection,
        request: HttpRequest,
        body: R,
        chunk_size: usize,
    ) -> Result<u64, ClientError> {
        connection.write(ClientMessage::Head(request))?;
        let sent = connection
            .write_stream(ChunkedStream::with_chunk_size(body, chunk_size))
            .await?;
        connection.write_and_flush(ClientMessage::Last).await?;
        Ok(sent)
    }

    fn request_target(&self, path: &str) -> String {
        let prefix = self.base_url.path().trim_end_matches('/');
        if path.starts_with('/') {
            format!("{prefix}{path}")
        } else {
            format!("{prefix}/{path}")
        }
    }
}

/// One open HTTP/1.1 connection. Responses are read in request order, so a
/// keep-alive connection can carry several exchanges back to back.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    codec: HttpClientCodec,
    read_buf: BytesMut,
    write_buf: BytesMut,
    read_reserve: usize,
    eof: bool,
}

impl Connection {
    pub fn new(stream: TcpStream, config: &ClientConfig) -> Self {
        Self {
            stream,
            codec: HttpClientCodec::new(config.max_head_size),
            read_buf: BytesMut::with_capacity(config.read_buffer_capacity),
            write_buf: BytesMut::new(),
            read_reserve: config.read_buffer_capacity.max(1),
            eof: false,
        }
    }

    pub fn peer_addr(&self) -> Result<SocketAddr, ClientError> {
        Ok(self.stream.peer_addr()?)
    }

    /// Encode `msg` into the outbound buffer without touching the socket.
    pub fn write(&mut self, msg: ClientMessage) -> Result<(), ClientError> {
        self.codec.encode(msg, &mut self.write_buf)?;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), ClientError> {
        if !self.write_buf.is_empty() {
            trace!(len = self.write_buf.len(), "flushing");
            self.stream.write_all(&self.write_buf).await?;
            self.write_buf.clear();
        }
        self.stream.flush().await?;
        Ok(())
    }

    pub async fn write_and_flush(&mut self, msg: ClientMessage) -> Result<(), ClientError> {
        self.write(msg)?;
        self.flush().await
    }

    /// Write every chunk of `stream`, flushing after each one. Returns the
    /// number of body bytes sent.
    ///
    /// The underlying reader is polled synchronously between socket writes
    /// and must not block; a `&[u8]`, `Cursor` or `io::empty()` is fine.
    /// A failing reader is reported as `ClientError::BodySource`.
    pub async fn write_stream<R: Read>(
        &mut self,
        mut stream: ChunkedStream<R>,
    ) -> Result<u64, ClientError> {
        while let Some(chunk) = stream.next_chunk().map_err(ClientError::BodySource)? {
            self.write(ClientMessage::Content(chunk))?;
            self.flush().await?;
        }
        Ok(stream.transferred())
    }

    /// Next decoded object, or `None` once the peer has closed the
    /// connection between responses.
    pub async fn read_object(&mut self) -> Result<Option<HttpObject>, ClientError> {
        loop {
            if let Some(object) = self.codec.decode(&mut self.read_buf)? {
                return Ok(Some(object));
            }
            if self.eof {
                return Ok(self.codec.decode_eof(&mut self.read_buf)?);
            }
            self.read_buf.reserve(self.read_reserve);
            if self.stream.read_buf(&mut self.read_buf).await? == 0 {
                trace!("peer closed connection");
                self.eof = true;
            }
        }
    }

    /// Feed one complete response to `handler`, ending after its
    /// `LastContent`.
    ///
    /// Every request written on this connection needs its response read
    /// here. After an error the codec is reset, dropping any requests still
    /// waiting for a response.
    pub async fn read_response<H>(&mut self, handler: &mut H) -> Result<(), ClientError>
    where
        H: ResponseHandler + ?Sized,
    {
        let mut saw_head = false;
        let result = self.deliver_response(handler, &mut saw_head).await;
        if result.is_err() {
            self.codec.reset();
        }
        result
    }

    /// Read a response the server sent before a write to it failed. When no
    /// response head arrives the original `write_error` is returned.
    pub async fn read_early_response<H>(
        &mut self,
        handler: &mut H,
        write_error: std::io::Error,
    ) -> Result<(), ClientError>
    where
        H: ResponseHandler + ?Sized,
    {
        let mut saw_head = false;
        let result = self.deliver_response(handler, &mut saw_head).await;
        if result.is_err() {
            self.codec.reset();
        }
        match result {
            Err(_) if !saw_head => Err(ClientError::Io(write_error)),
            other => other,
        }
    }

    async fn deliver_response<H>(
        &mut self,
        handler: &mut H,
        saw_head: &mut bool,
    ) -> Result<(), ClientError>
    where
        H: ResponseHandler + ?Sized,
    {
        loop {
            let object = self.read_object().await?.ok_or(ClientError::ConnectionClosed)?;
            if let HttpObject::Response(head) = &object {
                debug!(status = head.status, "response head received");
                *saw_head = true;
            }
            handler.handle(&object);
            if matches!(object, HttpObject::LastContent(_)) {
                return Ok(());
            }
        }
    }
}
