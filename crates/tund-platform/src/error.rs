//! Platform error types.

use std::io;
use std::path::PathBuf;

/// Result type alias for platform operations.
pub type Result<T> = std::result::Result<T, PlatformError>;

/// Platform-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// Interface name rejected before any system call.
    #[error("invalid interface name '{name}': {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// TUN driver failure.
    #[error("tun error on '{interface}': {source}")]
    Tun {
        /// Interface being created.
        interface: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// UAPI socket failure.
    #[error("UAPI socket error at {}: {source}", path.display())]
    Uapi {
        /// Socket path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Another process already serves this interface.
    #[error("UAPI socket {} is in use by another process", .0.display())]
    SocketInUse(PathBuf),

    /// Re-executing in the background failed.
    #[error("failed to daemonize: {0}")]
    Daemonize(String),

    /// Not available on this platform.
    #[error("platform not supported: {0}")]
    NotSupported(&'static str),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PlatformError {
    /// Creates an invalid name error.
    #[must_use]
    pub fn invalid_name(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason,
        }
    }

    /// Creates a TUN driver error.
    #[must_use]
    pub fn tun(interface: impl Into<String>, source: io::Error) -> Self {
        Self::Tun {
            interface: interface.into(),
            source,
        }
    }

    /// Creates a UAPI socket error.
    #[must_use]
    pub fn uapi(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Uapi {
            path: path.into(),
            source,
        }
    }

    /// Creates a daemonize error.
    #[must_use]
    pub fn daemonize(msg: impl Into<String>) -> Self {
        Self::Daemonize(msg.into())
    }

    fn kind(&self) -> io::ErrorKind {
        match self {
            Self::InvalidName { .. } => io::ErrorKind::InvalidInput,
            Self::Tun { source, .. } | Self::Uapi { source, .. } | Self::Io(source) => {
                source.kind()
            }
            Self::SocketInUse(_) => io::ErrorKind::AddrInUse,
            Self::Daemonize(_) => io::ErrorKind::Other,
            Self::NotSupported(_) => io::ErrorKind::Unsupported,
        }
    }
}

impl From<PlatformError> for io::Error {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Io(e) => e,
            other => Self::new(other.kind(), other),
        }
    }
}
