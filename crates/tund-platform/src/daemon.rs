//! Background re-execution.
//!
//! The parent spawns `<program> --foreground <interface>` in a new session
//! with stdio on `/dev/null`, then returns without waiting. The environment
//! is inherited, so `LOG_LEVEL` and the `TUND_*` settings carry over.
//!
//! Must run before the async runtime starts any threads.

use std::ffi::OsString;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tund_core::StartupArgs;

use crate::error::{PlatformError, Result};

/// Arguments the detached child is started with.
#[must_use]
pub fn child_args(args: &StartupArgs) -> Vec<OsString> {
    vec![
        OsString::from("--foreground"),
        OsString::from(&args.interface_name),
    ]
}

/// Spawns the foreground child that replaces this invocation.
#[derive(Debug, Clone)]
pub struct Daemonizer {
    program: PathBuf,
}

impl Daemonizer {
    /// Re-executes the running binary.
    pub fn current() -> Result<Self> {
        let program = std::env::current_exe()
            .map_err(|e| PlatformError::daemonize(format!("cannot locate executable: {e}")))?;
        Ok(Self { program })
    }

    /// Re-executes `program` instead of the running binary.
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Returns the program the child runs.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Builds the child command without spawning it.
    #[allow(unsafe_code)]
    #[must_use]
    pub fn command(&self, args: &StartupArgs) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(child_args(args))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // SAFETY: setsid is async-signal-safe and touches no memory shared
        // with the parent.
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setsid()
                    .map(|_| ())
                    .map_err(std::io::Error::from)
            });
        }
        cmd
    }

    /// Spawns the child and returns its PID.
    pub fn spawn(&self, args: &StartupArgs) -> Result<u32> {
        let child = self.command(args).spawn().map_err(|e| {
            PlatformError::daemonize(format!(
                "failed to start {}: {e}",
                self.program.display()
            ))
        })?;
        let pid = child.id();
        tracing::info!(pid = pid, interface = %args.interface_name, "spawned background process");
        Ok(pid)
    }
}
