//! Lifecycle coordinator.
//!
//! Sequences a foreground run:
//!
//! ```text
//! create tun → runtime device → UAPI listener → accept loop
//!            ↘ race { device terminated | OS signal | accept failure }
//!            ↘ close listener → (drain) → done
//! ```
//!
//! Background mode never gets this far: [`Coordinator::select_mode`]
//! daemonizes and the detached process re-enters in foreground mode.

use std::future::Future;
use std::io;
use std::sync::Arc;

use tokio::sync::{oneshot, watch};

use crate::args::StartupArgs;
use crate::backend::{ControlListener, DeviceLog, RuntimeDevice, TunnelBackend};
use crate::config::TunnelConfig;
use crate::dispatch::{HandlerTracker, spawn_accept_loop};
use crate::error::{LifecycleError, Result};
use crate::types::{LifecycleState, ShutdownPolicy, Signal, TerminationEvent};

/// Outcome of startup mode selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    /// A background process took over; this invocation is done.
    Detached,
    /// Continue in this process.
    Foreground,
}

/// Resources held for the duration of a foreground run.
pub struct Resources<B: TunnelBackend> {
    /// The live runtime device.
    pub device: Arc<B::Device>,
    /// The UAPI listener, shared with the accept loop.
    pub listener: Arc<B::Listener>,
}

/// Drives one tunnel through its lifecycle.
pub struct Coordinator<B: TunnelBackend> {
    backend: Arc<B>,
    config: TunnelConfig,
    state: watch::Sender<LifecycleState>,
    tracker: HandlerTracker,
}

impl<B: TunnelBackend> Coordinator<B> {
    /// Creates a coordinator over `backend`.
    #[must_use]
    pub fn new(backend: Arc<B>, config: TunnelConfig) -> Self {
        let (state, _) = watch::channel(LifecycleState::Starting);
        Self {
            backend,
            config,
            state,
            tracker: HandlerTracker::new(),
        }
    }

    /// Returns the configuration in use.
    #[must_use]
    pub const fn config(&self) -> &TunnelConfig {
        &self.config
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Subscribes to lifecycle state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Returns the tracker of in-flight control handlers.
    #[must_use]
    pub fn handlers(&self) -> &HandlerTracker {
        &self.tracker
    }

    fn transition(&self, next: LifecycleState) {
        let prev = self.state.send_replace(next);
        tracing::debug!(old = ?prev, new = ?next, "lifecycle state changed");
    }

    /// Daemonizes unless `args` ask for the foreground.
    ///
    /// A daemonization failure is fatal; there is no foreground fallback.
    pub fn select_mode(&self, args: &StartupArgs) -> Result<Launch> {
        if args.run_in_foreground {
            return Ok(Launch::Foreground);
        }

        match self.backend.daemonize(args) {
            Ok(()) => {
                tracing::debug!(interface = %args.interface_name, "detached into background");
                Ok(Launch::Detached)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to daemonize");
                Err(LifecycleError::Daemonize(e))
            }
        }
    }

    /// Acquires tun → device → listener, strictly in that order.
    ///
    /// A listener failure is reported through the device's fatal sink; the
    /// device itself is not torn down and lives until the process exits.
    pub fn acquire(&self, interface: &str) -> Result<Resources<B>> {
        let tun = self.backend.create_tun(interface).map_err(|e| {
            tracing::error!(interface = %interface, error = %e, "Failed to create tun device");
            LifecycleError::device_creation(interface, e)
        })?;

        let device = self.backend.new_device(tun, self.config.log_level);
        device.log().info("Starting device");

        let listener = match self.backend.listen(interface) {
            Ok(listener) => Arc::new(listener),
            Err(e) => {
                device.log().fatal(&format!("UAPI listen error: {e}"));
                return Err(LifecycleError::listener_start(interface, e));
            }
        };

        Ok(Resources { device, listener })
    }

    /// Runs in the foreground until the first termination event.
    ///
    /// The state ends at `Terminated` whether or not acquisition succeeded.
    /// `shutdown` is the OS signal source; it is raced, never polled after
    /// another source wins.
    pub async fn run<S>(&self, args: &StartupArgs, shutdown: S) -> Result<TerminationEvent>
    where
        S: Future<Output = Signal>,
    {
        let Resources { device, listener } = match self.acquire(&args.interface_name) {
            Ok(resources) => resources,
            Err(e) => {
                self.transition(LifecycleState::Terminated);
                return Err(e);
            }
        };

        let (_accept_loop, failures) = spawn_accept_loop(
            Arc::clone(&self.backend),
            Arc::clone(&listener),
            Arc::clone(&device),
            self.tracker.clone(),
        );
        device.log().info("UAPI listener started");
        self.transition(LifecycleState::Running);

        let event = race(device.as_ref(), shutdown, failures).await;
        tracing::debug!(cause = ?event.cause(), "{event}");

        self.transition(LifecycleState::ShuttingDown);
        listener.close();
        device.log().info("Closing");
        self.drain(device.as_ref()).await;
        self.transition(LifecycleState::Terminated);

        Ok(event)
    }

    async fn drain(&self, device: &B::Device) {
        if self.config.shutdown_policy != ShutdownPolicy::GracefulDrain {
            return;
        }
        let deadline = self.config.drain_timeout;
        if tokio::time::timeout(deadline, self.tracker.wait_idle())
            .await
            .is_err()
        {
            device.log().debug(&format!(
                "drain deadline of {deadline:?} passed with {} UAPI handlers in flight",
                self.tracker.in_flight()
            ));
        }
    }
}

/// Waits for the first of the three termination sources.
///
/// The losers are dropped without being drained.
pub async fn race<D, S>(
    device: &D,
    shutdown: S,
    failures: oneshot::Receiver<io::Error>,
) -> TerminationEvent
where
    D: RuntimeDevice,
    S: Future<Output = Signal>,
{
    tokio::select! {
        () = device.terminated() => TerminationEvent::DeviceTerminated,
        sig = shutdown => TerminationEvent::SignalReceived(sig),
        failed = failures => match failed {
            Ok(e) => TerminationEvent::ListenerFailed(e),
            Err(_) => TerminationEvent::ListenerFailed(io::Error::other("UAPI dispatcher stopped")),
        },
    }
}
