//! Collaborator contracts consumed by the lifecycle coordinator.
//!
//! The coordinator never looks inside these: it creates, wires, races and
//! closes them. A [`TunnelBackend`] bundles one implementation of each so
//! the whole set can be swapped (Linux in production, mocks in tests).

use std::io;
use std::sync::Arc;

use async_trait::async_trait;

use crate::args::StartupArgs;
use crate::types::LogLevel;

/// Leveled log sink owned by a runtime device.
pub trait DeviceLog: Send + Sync {
    /// Verbose diagnostics.
    fn debug(&self, msg: &str);

    /// Lifecycle milestones.
    fn info(&self, msg: &str);

    /// Recoverable failures.
    fn error(&self, msg: &str);

    /// Unrecoverable failure.
    ///
    /// Logged at error level. The caller is expected to stop immediately
    /// afterwards; the sink itself does not exit the process.
    fn fatal(&self, msg: &str);
}

/// The live tunnel: session state and forwarding live behind this handle.
#[async_trait]
pub trait RuntimeDevice: Send + Sync + 'static {
    /// Log sink type.
    type Log: DeviceLog;

    /// Returns the device's log sink.
    fn log(&self) -> &Self::Log;

    /// Resolves once the device has shut down on its own.
    ///
    /// Every caller observes the same single shutdown; calling this after
    /// the fact resolves immediately.
    async fn terminated(&self);
}

/// Local control-plane listener bound to one interface.
#[async_trait]
pub trait ControlListener: Send + Sync + 'static {
    /// Accepted connection type.
    type Conn: Send + 'static;

    /// Waits for the next connection.
    ///
    /// Must fail promptly once [`ControlListener::close`] has been called,
    /// including for an accept that is already pending.
    async fn accept(&self) -> io::Result<Self::Conn>;

    /// Stops accepting connections. Idempotent.
    fn close(&self);
}

/// Bundle of the platform collaborators.
#[async_trait]
pub trait TunnelBackend: Send + Sync + 'static {
    /// Handle to an opened tunnel interface.
    type Tun: Send;

    /// Runtime device built on top of a [`TunnelBackend::Tun`].
    type Device: RuntimeDevice;

    /// UAPI listener type.
    type Listener: ControlListener;

    /// Detaches into a background process that re-enters in foreground mode.
    ///
    /// Returns without waiting for the background process.
    fn daemonize(&self, args: &StartupArgs) -> io::Result<()>;

    /// Creates (or opens) the tunnel interface `interface`.
    fn create_tun(&self, interface: &str) -> io::Result<Self::Tun>;

    /// Builds the runtime device. Never fails.
    fn new_device(&self, tun: Self::Tun, level: LogLevel) -> Arc<Self::Device>;

    /// Starts the UAPI listener for `interface`.
    fn listen(&self, interface: &str) -> io::Result<Self::Listener>;

    /// Serves one control connection against `device`.
    async fn handle_connection(
        &self,
        device: Arc<Self::Device>,
        conn: <Self::Listener as ControlListener>::Conn,
    ) -> io::Result<()>;
}
