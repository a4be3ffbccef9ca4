// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # tund-platform
//!
//! Linux collaborators for the tund lifecycle coordinator:
//!
//! - [`TunDevice`]: layer-3 interface through `/dev/net/tun`
//! - [`TunnelDevice`]: runtime device with settings, counters and shutdown
//! - [`UapiListener`]: per-interface control socket speaking `get=1`/`set=1`
//! - [`Daemonizer`]: re-executes the binary in the foreground, detached
//! - [`SignalSource`]: SIGINT/SIGTERM as a termination source
//! - [`LinuxBackend`]: all of the above behind `tund_core::TunnelBackend`
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tund_core::{Coordinator, TunnelConfig};
//! use tund_platform::{LinuxBackend, SignalSource};
//!
//! let config = TunnelConfig::from_env()?;
//! let coordinator = Coordinator::new(Arc::new(LinuxBackend::new(&config)), config);
//! let signals = SignalSource::register()?;
//! coordinator.run(&args, signals.recv()).await?;
//! ```

#![warn(missing_docs)]

pub mod error;

#[cfg(unix)]
pub mod backend;
#[cfg(unix)]
pub mod daemon;
#[cfg(unix)]
pub mod device;
#[cfg(unix)]
pub mod signals;
#[cfg(unix)]
pub mod tun;
#[cfg(unix)]
pub mod uapi;

pub use error::{PlatformError, Result};

#[cfg(unix)]
pub use backend::LinuxBackend;
#[cfg(unix)]
pub use daemon::Daemonizer;
#[cfg(unix)]
pub use device::{SettingError, TunnelDevice};
#[cfg(unix)]
pub use signals::SignalSource;
#[cfg(unix)]
pub use tun::TunDevice;
#[cfg(unix)]
pub use uapi::UapiListener;
