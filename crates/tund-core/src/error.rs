//! Error types for tund-core.
//!
//! Every fatal condition is reported once, where it is detected, and ends
//! the process. Nothing in the core retries.

use std::io;

/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Fatal lifecycle failures.
///
/// Usage errors live in [`crate::args::UsageError`]; accept failures are not
/// errors at this level but a [`crate::TerminationEvent`].
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Configuration could not be loaded or validated.
    #[error("configuration error: {0}")]
    Config(String),

    /// Detaching into the background failed.
    #[error("failed to daemonize: {0}")]
    Daemonize(#[source] io::Error),

    /// The tunnel device could not be created.
    #[error("failed to create tun device '{interface}': {source}")]
    DeviceCreation {
        /// Requested interface name.
        interface: String,
        /// Driver error.
        #[source]
        source: io::Error,
    },

    /// The UAPI listener could not be started.
    #[error("UAPI listen error on '{interface}': {source}")]
    ListenerStart {
        /// Interface the listener was bound to.
        interface: String,
        /// Listener error.
        #[source]
        source: io::Error,
    },

    /// The OS signal source could not be registered.
    #[error("signal registration failed: {0}")]
    Signal(#[source] io::Error),

    /// The async runtime could not be built.
    #[error("runtime error: {0}")]
    Runtime(#[source] io::Error),
}

impl LifecycleError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a device creation error.
    #[must_use]
    pub fn device_creation(interface: impl Into<String>, source: io::Error) -> Self {
        Self::DeviceCreation {
            interface: interface.into(),
            source,
        }
    }

    /// Creates a listener start error.
    #[must_use]
    pub fn listener_start(interface: impl Into<String>, source: io::Error) -> Self {
        Self::ListenerStart {
            interface: interface.into(),
            source,
        }
    }

    /// Returns true if the failure happened after the runtime device existed.
    #[must_use]
    pub const fn device_was_live(&self) -> bool {
        matches!(self, Self::ListenerStart { .. })
    }

    /// Returns true if the coordinator already logged this failure.
    #[must_use]
    pub const fn already_reported(&self) -> bool {
        matches!(
            self,
            Self::Daemonize(_) | Self::DeviceCreation { .. } | Self::ListenerStart { .. }
        )
    }
}
