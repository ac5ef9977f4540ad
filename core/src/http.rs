//! HTTP message types exchanged with the codec.
//!
//! # Design
//! A request is described by its head only; the body travels separately as
//! `ClientMessage::Content` pieces so it can be streamed chunk by chunk.
//! Responses come back the same way: one `HttpObject::Response`, any number
//! of `Content` pieces, and exactly one `LastContent`.
//!
//! Header names keep the caller's casing on the wire; lookups are
//! case-insensitive.

use bytes::Bytes;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }
}

/// The head of an HTTP/1.1 request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Request-target exactly as written on the request line.
    pub uri: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: Vec::new(),
        }
    }

    /// Append a header, keeping any existing values with the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// True when the final transfer coding is `chunked`.
    pub fn is_chunked(&self) -> bool {
        self.header("transfer-encoding").is_some_and(ends_with_chunked)
    }
}

/// Messages written by the client, in order: one `Head`, any number of
/// `Content` pieces, then `Last`.
#[derive(Debug, Clone)]
pub enum ClientMessage {
    Head(HttpRequest),
    Content(Bytes),
    Last,
}

/// Status line and headers of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponseHead {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
}

impl HttpResponseHead {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Objects produced by the response decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpObject {
    Response(HttpResponseHead),
    Content(Bytes),
    /// Final piece of the body; may be empty.
    LastContent(Bytes),
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

pub(crate) fn ends_with_chunked(value: &str) -> bool {
    value
        .rsplit(',')
        .next()
        .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
}
