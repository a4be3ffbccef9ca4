//! tund: userspace tunnel daemon.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tund::prelude::*;
//!
//! // Re-exports from sub-crates for convenience
//! ```

pub use tund_core as core;
pub use tund_platform as platform;

/// Prelude module for common imports.
pub mod prelude {
    pub use tund_core::{
        Coordinator, Launch, LifecycleError, LifecycleState, LogLevel, ShutdownPolicy, Signal,
        StartupArgs, TerminationEvent, TunnelBackend, TunnelConfig, UsageError,
    };
    #[cfg(unix)]
    pub use tund_platform::{Daemonizer, LinuxBackend, SignalSource, TunnelDevice, UapiListener};
}
