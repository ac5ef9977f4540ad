//! HTTP/1.1 client codec: request encoder and response decoder.
//!
//! # Design
//! `HttpClientCodec` never touches a socket. The encoder appends wire bytes
//! to a `BytesMut`; the decoder consumes bytes from a `BytesMut` and yields
//! at most one `HttpObject` per call, returning `Ok(None)` when it needs
//! more input. `Connection` drives both halves over a `TcpStream`.
//!
//! The encoder remembers the method of every request head it writes so the
//! decoder knows that a response to `HEAD` carries no body, whatever its
//! `Content-Length` says.

use std::collections::VecDeque;

use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

use crate::error::CodecError;
use crate::http::{ends_with_chunked, ClientMessage, HttpMethod, HttpObject, HttpRequest, HttpResponseHead};

/// Upper bound on header lines parsed per response head or trailer section.
const MAX_HEADERS: usize = 64;

pub const DEFAULT_MAX_HEAD_SIZE: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    ReadHead,
    EmptyBody,
    FixedLength { remaining: u64 },
    ChunkSize,
    ChunkData { remaining: u64 },
    ChunkFooter,
    Trailers,
    UntilClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outbound {
    Idle,
    Chunked,
    Raw,
}

#[derive(Debug)]
pub struct HttpClientCodec {
    state: DecodeState,
    outbound: Outbound,
    pending_methods: VecDeque<HttpMethod>,
    max_head_size: usize,
}

impl Default for HttpClientCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HEAD_SIZE)
    }
}

impl HttpClientCodec {
    pub fn new(max_head_size: usize) -> Self {
        Self {
            state: DecodeState::ReadHead,
            outbound: Outbound::Idle,
            pending_methods: VecDeque::new(),
            max_head_size,
        }
    }

    /// Request heads encoded whose responses have not been decoded yet.
    pub fn pending_responses(&self) -> usize {
        self.pending_methods.len()
    }

    /// Forget any half-decoded response and every outstanding request.
    /// Used once a connection has failed and its framing can't be trusted.
    pub fn reset(&mut self) {
        self.state = DecodeState::ReadHead;
        self.outbound = Outbound::Idle;
        self.pending_methods.clear();
    }

    /// Each encoded `Head` queues its method until the matching response
    /// head is decoded, so every request must have its response read or
    /// the codec be `reset`.
    pub fn encode(&mut self, msg: ClientMessage, dst: &mut BytesMut) -> Result<(), CodecError> {
        match msg {
            ClientMessage::Head(request) => {
                self.outbound = if request.is_chunked() {
                    Outbound::Chunked
                } else {
                    Outbound::Raw
                };
                self.pending_methods.push_back(request.method);
                encode_head(&request, dst);
            }
            ClientMessage::Content(data) => match self.outbound {
                Outbound::Idle => return Err(CodecError::ContentBeforeHead),
                // A zero-size chunk would terminate the body early.
                Outbound::Chunked if data.is_empty() => {}
                Outbound::Chunked => {
                    dst.reserve(data.len() + 12);
                    dst.extend_from_slice(format!("{:X}\r\n", data.len()).as_bytes());
                    dst.extend_from_slice(&data);
                    dst.extend_from_slice(b"\r\n");
                }
                Outbound::Raw => dst.extend_from_slice(&data),
            },
            ClientMessage::Last => {
                match self.outbound {
                    Outbound::Idle => return Err(CodecError::ContentBeforeHead),
                    Outbound::Chunked => dst.extend_from_slice(b"0\r\n\r\n"),
                    Outbound::Raw => {}
                }
                self.outbound = Outbound::Idle;
            }
        }
        Ok(())
    }

    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<HttpObject>, CodecError> {
        loop {
            match self.state {
                DecodeState::ReadHead => return self.decode_head(src),
                DecodeState::EmptyBody => {
                    self.state = DecodeState::ReadHead;
                    return Ok(Some(HttpObject::LastContent(Bytes::new())));
                }
                DecodeState::FixedLength { remaining } => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let piece = split_at_most(src, remaining);
                    let remaining = remaining - piece.len() as u64;
                    if remaining == 0 {
                        self.state = DecodeState::ReadHead;
                        return Ok(Some(HttpObject::LastContent(piece)));
                    }
                    self.state = DecodeState::FixedLength { remaining };
                    return Ok(Some(HttpObject::Content(piece)));
                }
                DecodeState::ChunkSize => {
                    match httparse::parse_chunk_size(&src[..]).map_err(CodecError::InvalidChunkSize)? {
                        httparse::Status::Complete((at, len)) => {
                            src.advance(at);
                            trace!(len, "chunk header");
                            self.state = if len == 0 {
                                DecodeState::Trailers
                            } else {
                                DecodeState::ChunkData { remaining: len }
                            };
                        }
                        httparse::Status::Partial => {
                            if src.len() > self.max_head_size {
                                return Err(CodecError::ChunkLineTooLarge(self.max_head_size));
                            }
                            return Ok(None);
                        }
                    }
                }
                DecodeState::ChunkData { remaining } => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let piece = split_at_most(src, remaining);
                    let remaining = remaining - piece.len() as u64;
                    self.state = if remaining == 0 {
                        DecodeState::ChunkFooter
                    } else {
                        DecodeState::ChunkData { remaining }
                    };
                    return Ok(Some(HttpObject::Content(piece)));
                }
                DecodeState::ChunkFooter => {
                    if src.len() < 2 {
                        return Ok(None);
                    }
                    for expected in [b'\r', b'\n'] {
                        let found = src.get_u8();
                        if found != expected {
                            return Err(CodecError::InvalidChunkFooter { expected, found });
                        }
                    }
                    self.state = DecodeState::ChunkSize;
                }
                DecodeState::Trailers => {
                    let mut trailers = [httparse::EMPTY_HEADER; MAX_HEADERS];
                    let end = match httparse::parse_headers(&src[..], &mut trailers)
                        .map_err(CodecError::InvalidTrailer)?
                    {
                        httparse::Status::Complete((end, _)) => end,
                        httparse::Status::Partial => {
                            if src.len() > self.max_head_size {
                                return Err(CodecError::TrailersTooLarge(self.max_head_size));
                            }
                            return Ok(None);
                        }
                    };
                    src.advance(end);
                    self.state = DecodeState::ReadHead;
                    return Ok(Some(HttpObject::LastContent(Bytes::new())));
                }
                DecodeState::UntilClose => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(HttpObject::Content(src.split().freeze())));
                }
            }
        }
    }

    /// Decode once the peer has closed its side. A close-delimited body is
    /// finished here; anything else still in flight is truncated.
    pub fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<HttpObject>, CodecError> {
        if let Some(object) = self.decode(src)? {
            return Ok(Some(object));
        }
        match self.state {
            DecodeState::ReadHead if src.is_empty() => Ok(None),
            DecodeState::UntilClose => {
                self.state = DecodeState::ReadHead;
                Ok(Some(HttpObject::LastContent(src.split().freeze())))
            }
            _ => Err(CodecError::UnexpectedEof),
        }
    }

    fn decode_head(&mut self, src: &mut BytesMut) -> Result<Option<HttpObject>, CodecError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut response = httparse::Response::new(&mut headers);
        let head_len = match response.parse(&src[..]).map_err(CodecError::InvalidResponseHead)? {
            httparse::Status::Complete(len) => len,
            httparse::Status::Partial => {
                if src.len() > self.max_head_size {
                    return Err(CodecError::HeadTooLarge(self.max_head_size));
                }
                return Ok(None);
            }
        };
        if head_len > self.max_head_size {
            return Err(CodecError::HeadTooLarge(self.max_head_size));
        }

        let head = HttpResponseHead {
            status: response.code.unwrap_or_default(),
            reason: response.reason.unwrap_or_default().to_string(),
            headers: response
                .headers
                .iter()
                .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).into_owned()))
                .collect(),
        };
        src.advance(head_len);

        self.state = self.body_framing(&head)?;
        trace!(status = head.status, state = ?self.state, "response head");
        Ok(Some(HttpObject::Response(head)))
    }

    fn body_framing(&mut self, head: &HttpResponseHead) -> Result<DecodeState, CodecError> {
        // Interim responses precede the final one for the same request.
        if (100..200).contains(&head.status) {
            return Ok(DecodeState::EmptyBody);
        }
        let method = self.pending_methods.pop_front();
        if method == Some(HttpMethod::Head) || head.status == 204 || head.status == 304 {
            return Ok(DecodeState::EmptyBody);
        }
        if head.header("transfer-encoding").is_some_and(ends_with_chunked) {
            return Ok(DecodeState::ChunkSize);
        }
        match content_length(head)? {
            Some(0) => Ok(DecodeState::EmptyBody),
            Some(remaining) => Ok(DecodeState::FixedLength { remaining }),
            None => Ok(DecodeState::UntilClose),
        }
    }
}

fn encode_head(request: &HttpRequest, dst: &mut BytesMut) {
    dst.extend_from_slice(request.method.as_str().as_bytes());
    dst.extend_from_slice(b" ");
    dst.extend_from_slice(request.uri.as_bytes());
    dst.extend_from_slice(b" HTTP/1.1\r\n");
    for (name, value) in &request.headers {
        dst.extend_from_slice(name.as_bytes());
        dst.extend_from_slice(b": ");
        dst.extend_from_slice(value.as_bytes());
        dst.extend_from_slice(b"\r\n");
    }
    dst.extend_from_slice(b"\r\n");
}

/// All `Content-Length` values, including comma-separated repeats, must
/// agree.
fn content_length(head: &HttpResponseHead) -> Result<Option<u64>, CodecError> {
    let mut length = None;
    for (_, value) in head
        .headers
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case("content-length"))
    {
        for part in value.split(',') {
            let parsed: u64 = part
                .trim()
                .parse()
                .map_err(|_| CodecError::InvalidContentLength(value.clone()))?;
            match length {
                Some(existing) if existing != parsed => {
                    return Err(CodecError::InvalidContentLength(value.clone()));
                }
                _ => length = Some(parsed),
            }
        }
    }
    Ok(length)
}

fn split_at_most(src: &mut BytesMut, limit: u64) -> Bytes {
    let at = limit.min(src.len() as u64) as usize;
    src.split_to(at).freeze()
}
