//! Callbacks for decoded response objects.
//!
//! # Design
//! The connection pushes every decoded `HttpObject` into a
//! `ResponseHandler`, in wire order. `ResponseRecorder` is the handler the
//! round-trip test uses: it keeps the numbers behind atomics so a clone can
//! be read from the waiting thread while the event loop owns another.

use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::ClientError;
use crate::http::HttpObject;
use crate::latch::CountDownLatch;

pub trait ResponseHandler {
    fn handle(&mut self, object: &HttpObject);

    /// Called at most once, when the exchange fails before completing.
    fn on_error(&mut self, _error: &ClientError) {}
}

#[derive(Debug)]
struct Recorded {
    status: AtomicI32,
    last_chunk_size: AtomicI64,
    body_bytes: AtomicU64,
    error: Mutex<Option<String>>,
    latch: CountDownLatch,
}

/// Records the status and the size of the most recent content piece, and
/// opens its latch once the response is complete or has failed.
#[derive(Debug, Clone)]
pub struct ResponseRecorder {
    inner: Arc<Recorded>,
}

impl Default for ResponseRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseRecorder {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Recorded {
                status: AtomicI32::new(-1),
                last_chunk_size: AtomicI64::new(-1),
                body_bytes: AtomicU64::new(0),
                error: Mutex::new(None),
                latch: CountDownLatch::new(1),
            }),
        }
    }

    /// Response status, or -1 before a head has been seen.
    pub fn status(&self) -> i32 {
        self.inner.status.load(Ordering::Acquire)
    }

    /// Size of the last content piece, or -1 before any content.
    pub fn last_chunk_size(&self) -> i64 {
        self.inner.last_chunk_size.load(Ordering::Acquire)
    }

    pub fn body_bytes(&self) -> u64 {
        self.inner.body_bytes.load(Ordering::Acquire)
    }

    pub fn error(&self) -> Option<String> {
        self.inner
            .error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn latch(&self) -> &CountDownLatch {
        &self.inner.latch
    }

    fn record_content(&self, len: usize) {
        self.inner.last_chunk_size.store(len as i64, Ordering::Release);
        self.inner.body_bytes.fetch_add(len as u64, Ordering::AcqRel);
    }
}

impl ResponseHandler for ResponseRecorder {
    fn handle(&mut self, object: &HttpObject) {
        match object {
            HttpObject::Response(head) => {
                self.inner.status.store(i32::from(head.status), Ordering::Release);
            }
            HttpObject::Content(content) => self.record_content(content.len()),
            HttpObject::LastContent(content) => {
                self.record_content(content.len());
                self.inner.latch.count_down();
            }
        }
    }

    fn on_error(&mut self, error: &ClientError) {
        *self
            .inner
            .error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(error.to_string());
        self.inner.latch.count_down();
    }
}
