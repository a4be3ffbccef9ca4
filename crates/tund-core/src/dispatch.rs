//! Control-connection dispatcher.
//!
//! One detached task accepts connections forever and spawns an independent
//! handler per connection without waiting on it. The first accept failure is
//! reported on a single-slot channel and ends the loop; nothing is retried.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;

use crate::backend::{ControlListener, DeviceLog, RuntimeDevice, TunnelBackend};

/// Counts spawned handler tasks that have not finished yet.
///
/// Tracking never blocks the accept loop. [`HandlerTracker::wait_idle`] is
/// only used by the graceful-drain shutdown policy.
#[derive(Debug, Clone, Default)]
pub struct HandlerTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Decrements the in-flight count when the handler ends, however it ends.
struct InFlight(Arc<TrackerInner>);

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl HandlerTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `task` as a tracked, detached handler.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
        let guard = InFlight(Arc::clone(&self.inner));
        tokio::spawn(async move {
            let _guard = guard;
            task.await;
        })
    }

    /// Returns the number of handlers still running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Waits until no handler is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent drop cannot be missed.
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Spawns the accept loop.
///
/// Returns the loop's join handle and the receiving end of the single-slot
/// failure channel.
pub fn spawn_accept_loop<B: TunnelBackend>(
    backend: Arc<B>,
    listener: Arc<B::Listener>,
    device: Arc<B::Device>,
    tracker: HandlerTracker,
) -> (JoinHandle<()>, oneshot::Receiver<io::Error>) {
    let (failed_tx, failed_rx) = oneshot::channel();
    let handle = tokio::spawn(accept_loop(backend, listener, device, tracker, failed_tx));
    (handle, failed_rx)
}

async fn accept_loop<B: TunnelBackend>(
    backend: Arc<B>,
    listener: Arc<B::Listener>,
    device: Arc<B::Device>,
    tracker: HandlerTracker,
    failed: oneshot::Sender<io::Error>,
) {
    loop {
        match listener.accept().await {
            Ok(conn) => {
                let backend = Arc::clone(&backend);
                let device = Arc::clone(&device);
                tracker.spawn(async move {
                    if let Err(e) = backend.handle_connection(Arc::clone(&device), conn).await {
                        device.log().debug(&format!("UAPI connection error: {e}"));
                    }
                });
            }
            Err(e) => {
                // The coordinator may already be gone; nobody left to tell.
                let _ = failed.send(e);
                return;
            }
        }
    }
}
