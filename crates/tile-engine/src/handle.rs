//! Deferred tile results.
//!
//! Asynchronous tile requests run on the rayon global pool. The caller gets
//! a [`TileHandle`] back immediately; the worker reports over a oneshot
//! channel. Workers never depend on the handle being awaited: dropping it
//! just discards the result.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{Result, TileError};
use crate::types::RasterTile;

/// Handle to a tile computed in the background.
///
/// Awaiting the handle yields the tile or the error the computation failed
/// with.
pub struct TileHandle {
    receiver: oneshot::Receiver<Result<RasterTile>>,
    cancelled: Arc<AtomicBool>,
}

impl TileHandle {
    /// Submit `job` to the worker pool.
    pub fn spawn<F>(job: F) -> Self
    where
        F: FnOnce() -> Result<RasterTile> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        rayon::spawn(move || {
            if flag.load(Ordering::Acquire) {
                debug!("Skipping cancelled tile request");
                let _ = sender.send(Err(TileError::Cancelled));
                return;
            }

            let result = catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|panic| {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "worker panicked".to_string());
                warn!(reason = %reason, "Tile worker panicked");
                Err(TileError::WorkerLost(reason))
            });

            // The receiver may already be gone; nobody wants the result then.
            let _ = sender.send(result);
        });

        Self {
            receiver,
            cancelled,
        }
    }

    /// Ask the worker to skip the request if it has not started yet.
    /// Work already running completes and its result is discarded.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Block the current thread until the tile is ready.
    ///
    /// Must not be called from within an async runtime.
    pub fn blocking_wait(self) -> Result<RasterTile> {
        self.receiver
            .blocking_recv()
            .unwrap_or_else(|_| Err(worker_lost()))
    }

    /// The result, if the worker has finished.
    pub fn try_take(&mut self) -> Option<Result<RasterTile>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(worker_lost())),
        }
    }
}

fn worker_lost() -> TileError {
    TileError::WorkerLost("worker exited without a result".to_string())
}

impl Future for TileHandle {
    type Output = Result<RasterTile>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(worker_lost())))
    }
}

impl std::fmt::Debug for TileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileHandle")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Result of a tile request: the tile itself, or a handle when the request
/// was asynchronous.
#[derive(Debug)]
pub enum TileResponse {
    Ready(RasterTile),
    Deferred(TileHandle),
}

impl TileResponse {
    pub fn is_deferred(&self) -> bool {
        matches!(self, TileResponse::Deferred(_))
    }

    /// The tile, if it was computed synchronously.
    pub fn into_ready(self) -> Option<RasterTile> {
        match self {
            TileResponse::Ready(tile) => Some(tile),
            TileResponse::Deferred(_) => None,
        }
    }

    /// Wait for the tile regardless of how it was requested.
    pub async fn resolve(self) -> Result<RasterTile> {
        match self {
            TileResponse::Ready(tile) => Ok(tile),
            TileResponse::Deferred(handle) => handle.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[tokio::test]
    async fn test_handle_yields_result() {
        let handle = TileHandle::spawn(|| Ok(RasterTile::from_values(vec![1.0, 2.0], 1, 2)));
        let tile = handle.await.unwrap();
        assert_eq!(tile.get(0, 1), Some(2.0));
    }

    #[tokio::test]
    async fn test_error_delivered_on_await() {
        let handle = TileHandle::spawn(|| Err(TileError::NoValidData("x".to_string())));
        assert!(matches!(handle.await, Err(TileError::NoValidData(_))));
    }

    #[tokio::test]
    async fn test_panic_becomes_worker_lost() {
        let handle = TileHandle::spawn(|| panic!("boom"));
        match handle.await {
            Err(TileError::WorkerLost(reason)) => assert_eq!(reason, "boom"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_dropped_handle_does_not_stop_worker() {
        let (done_tx, done_rx) = mpsc::channel();
        let handle = TileHandle::spawn(move || {
            let tile = RasterTile::empty(1, 1);
            let _ = done_tx.send(());
            Ok(tile)
        });
        drop(handle);
        done_rx
            .recv_timeout(std::time::Duration::from_secs(10))
            .unwrap();
    }

    #[test]
    fn test_blocking_wait() {
        let handle = TileHandle::spawn(|| Ok(RasterTile::empty(2, 3)));
        assert_eq!(handle.blocking_wait().unwrap().shape(), (2, 3));
    }

    #[tokio::test]
    async fn test_ready_response_resolves() {
        let response = TileResponse::Ready(RasterTile::empty(1, 1));
        assert!(!response.is_deferred());
        assert_eq!(response.resolve().await.unwrap().valid_count(), 0);
    }
}
