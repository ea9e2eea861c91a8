use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// Cancellation scope tied to a view's lifetime.
///
/// Clones share the same flag. Once cancelled, work run through
/// [`ViewScope::run`] resolves to `None` and its result is dropped.
#[derive(Debug, Clone)]
pub struct ViewScope {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ViewScope {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewScope {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the scope is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Drive `fut` unless the scope is cancelled first. A result that
    /// arrives after cancellation is discarded as well.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        if self.is_cancelled() {
            return None;
        }
        tokio::select! {
            out = fut => {
                if self.is_cancelled() {
                    None
                } else {
                    Some(out)
                }
            }
            _ = self.cancelled() => None,
        }
    }
}
