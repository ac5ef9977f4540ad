//! One-shot countdown latch usable from async tasks and plain threads.

use std::sync::Arc;

use tokio::sync::watch;

/// Opens once `count_down` has been called `count` times.
///
/// Clones share the same count. Waiting works both inside a runtime
/// (`wait`) and on a thread outside one (`wait_blocking`).
#[derive(Debug, Clone)]
pub struct CountDownLatch {
    remaining: Arc<watch::Sender<usize>>,
}

impl CountDownLatch {
    pub fn new(count: usize) -> Self {
        let (tx, _) = watch::channel(count);
        Self {
            remaining: Arc::new(tx),
        }
    }

    /// Decrement the count; extra calls after zero are ignored.
    pub fn count_down(&self) {
        self.remaining.send_if_modified(|count| {
            if *count == 0 {
                return false;
            }
            *count -= 1;
            true
        });
    }

    pub fn count(&self) -> usize {
        *self.remaining.borrow()
    }

    pub async fn wait(&self) {
        let mut rx = self.remaining.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|count| *count == 0).await;
    }

    /// Block the current thread until the latch opens. Must not be called
    /// from inside an async task.
    pub fn wait_blocking(&self) {
        futures::executor::block_on(self.wait());
    }
}
