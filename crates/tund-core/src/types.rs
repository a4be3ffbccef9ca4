//! Core types for the tunnel lifecycle.
//!
//! Explicit state machines, no implicit transitions.

use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;

/// Verbosity of the runtime device's log sink.
///
/// Ordered from most to least verbose: a sink bound to `Info` emits
/// `Info` and `Error` messages and drops `Debug`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogLevel {
    /// Everything, including per-connection chatter.
    Debug,
    /// Lifecycle milestones.
    #[default]
    Info,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// Resolves a level from a raw configuration value.
    ///
    /// Unset or unrecognized values fall back to [`LogLevel::Info`].
    #[must_use]
    pub fn resolve(raw: Option<&str>) -> Self {
        match raw {
            Some("debug") => Self::Debug,
            Some("info") => Self::Info,
            Some("error") => Self::Error,
            _ => Self::Info,
        }
    }

    /// Returns the lowercase name, also usable as a tracing filter directive.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Error => "error",
        }
    }

    /// Returns true if a message at `message` level passes this threshold.
    #[must_use]
    pub fn allows(self, message: Self) -> bool {
        message >= self
    }
}

impl From<String> for LogLevel {
    fn from(raw: String) -> Self {
        Self::resolve(Some(raw.as_str()))
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        level.as_str().to_string()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens to in-flight control handlers once the listener is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShutdownPolicy {
    /// Return immediately; handlers finish or die with the process.
    #[default]
    Abrupt,
    /// Wait up to the configured drain timeout for handlers to finish.
    GracefulDrain,
}

impl ShutdownPolicy {
    /// Returns the configuration name of the policy.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Abrupt => "abrupt",
            Self::GracefulDrain => "graceful-drain",
        }
    }
}

impl FromStr for ShutdownPolicy {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abrupt" => Ok(Self::Abrupt),
            "graceful-drain" => Ok(Self::GracefulDrain),
            other => Err(LifecycleError::config(format!(
                "unknown shutdown policy '{other}' (expected 'abrupt' or 'graceful-drain')"
            ))),
        }
    }
}

impl fmt::Display for ShutdownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coordinator lifecycle state.
///
/// ```text
/// Starting → Running → ShuttingDown → Terminated
/// ```
///
/// `Starting` covers resource acquisition. A failed acquisition goes
/// straight to `Terminated` without passing through `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Acquiring the tunnel, device and listener.
    Starting,
    /// Serving control connections, waiting for a termination event.
    Running,
    /// Closing the listener (and draining, if configured).
    ShuttingDown,
    /// Cleanup done; the process may exit.
    Terminated,
}

impl LifecycleState {
    /// Returns true once cleanup has completed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

/// Process signals that end a foreground run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    /// Interrupt (Ctrl+C).
    Int,
    /// Terminate.
    Term,
}

impl Signal {
    /// Returns the Unix signal number.
    #[must_use]
    pub const fn as_i32(&self) -> i32 {
        match self {
            Self::Int => 2,
            Self::Term => 15,
        }
    }

    /// Creates a signal from a Unix signal number.
    #[must_use]
    pub const fn from_i32(sig: i32) -> Option<Self> {
        match sig {
            2 => Some(Self::Int),
            15 => Some(Self::Term),
            _ => None,
        }
    }
}

/// The event that won the termination race.
#[derive(Debug)]
pub enum TerminationEvent {
    /// The runtime device shut down on its own.
    DeviceTerminated,
    /// An OS termination signal arrived.
    SignalReceived(Signal),
    /// The accept loop stopped with an error.
    ListenerFailed(io::Error),
}

impl TerminationEvent {
    /// Returns the payload-free cause, for logging and comparisons.
    #[must_use]
    pub const fn cause(&self) -> TerminationCause {
        match self {
            Self::DeviceTerminated => TerminationCause::DeviceTerminated,
            Self::SignalReceived(_) => TerminationCause::Signal,
            Self::ListenerFailed(_) => TerminationCause::ListenerFailed,
        }
    }
}

impl fmt::Display for TerminationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceTerminated => write!(f, "device terminated"),
            Self::SignalReceived(sig) => write!(f, "received signal {}", sig.as_i32()),
            Self::ListenerFailed(e) => write!(f, "UAPI listener failed: {e}"),
        }
    }
}

/// Payload-free discriminant of [`TerminationEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationCause {
    /// See [`TerminationEvent::DeviceTerminated`].
    DeviceTerminated,
    /// See [`TerminationEvent::SignalReceived`].
    Signal,
    /// See [`TerminationEvent::ListenerFailed`].
    ListenerFailed,
}
