// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # tund-core
//!
//! Lifecycle coordinator for the tund tunnel daemon.
//!
//! This crate decides how a tunnel process lives and dies; the collaborators
//! that do the real work are reached only through [`backend`] traits:
//!
//! - [`StartupArgs`] resolves `[-f/--foreground] INTERFACE-NAME`
//! - [`TunnelConfig`] merges defaults, an optional TOML file and the environment
//! - [`Coordinator`] daemonizes or acquires tun → device → UAPI listener,
//!   dispatches control connections and races termination events
//! - [`LevelLog`] is the `tracing`-backed device log sink
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tund_core::{Coordinator, Launch, StartupArgs, TunnelConfig};
//!
//! let args = StartupArgs::resolve(&std::env::args().collect::<Vec<_>>())?;
//! let coordinator = Coordinator::new(Arc::new(backend), TunnelConfig::from_env()?);
//! if coordinator.select_mode(&args)? == Launch::Foreground {
//!     let event = coordinator.run(&args, signals.recv()).await?;
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod args;
pub mod backend;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod log;
#[cfg(test)]
pub mod tests;
pub mod types;

pub use args::{FOREGROUND_FLAGS, StartupArgs, UsageError};
pub use backend::{ControlListener, DeviceLog, RuntimeDevice, TunnelBackend};
pub use config::TunnelConfig;
pub use coordinator::{Coordinator, Launch, Resources, race};
pub use dispatch::{HandlerTracker, spawn_accept_loop};
pub use error::{LifecycleError, Result};
pub use log::LevelLog;
pub use types::{
    LifecycleState, LogLevel, ShutdownPolicy, Signal, TerminationCause, TerminationEvent,
};
