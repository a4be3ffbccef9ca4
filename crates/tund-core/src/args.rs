//! Command-line resolution.
//!
//! The accepted grammar is deliberately tiny:
//!
//! ```text
//! tund [-f/--foreground] INTERFACE-NAME
//! ```

use std::fmt;

/// Flags that keep the daemon attached to the invoking terminal.
pub const FOREGROUND_FLAGS: [&str; 2] = ["-f", "--foreground"];

/// Program name used in usage text when `argv[0]` is missing.
const DEFAULT_PROGRAM: &str = "tund";

/// Resolved startup arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupArgs {
    /// Stay attached instead of daemonizing.
    pub run_in_foreground: bool,
    /// Name of the tunnel interface (never empty).
    pub interface_name: String,
}

impl StartupArgs {
    /// Creates foreground arguments for `interface_name`.
    #[must_use]
    pub fn foreground(interface_name: impl Into<String>) -> Self {
        Self {
            run_in_foreground: true,
            interface_name: interface_name.into(),
        }
    }

    /// Creates background (daemonizing) arguments for `interface_name`.
    #[must_use]
    pub fn background(interface_name: impl Into<String>) -> Self {
        Self {
            run_in_foreground: false,
            interface_name: interface_name.into(),
        }
    }

    /// Resolves the raw argument list, program name first.
    ///
    /// # Errors
    /// Returns [`UsageError`] for any arity other than 2 or 3, an
    /// unrecognized flag, or an empty interface name.
    pub fn resolve<S: AsRef<str>>(args: &[S]) -> Result<Self, UsageError> {
        let program = args
            .first()
            .map_or(DEFAULT_PROGRAM, |p| p.as_ref())
            .to_string();
        let usage = || UsageError {
            program: program.clone(),
        };

        let resolved = match args {
            [_, name] if !is_foreground_flag(name.as_ref()) => Self::background(name.as_ref()),
            [_, flag, name] if is_foreground_flag(flag.as_ref()) => Self::foreground(name.as_ref()),
            _ => return Err(usage()),
        };

        if resolved.interface_name.is_empty() {
            return Err(usage());
        }
        Ok(resolved)
    }
}

fn is_foreground_flag(arg: &str) -> bool {
    FOREGROUND_FLAGS.contains(&arg)
}

/// Malformed command line.
///
/// Displays as the two-line usage text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageError {
    program: String,
}

impl UsageError {
    /// Returns the program name the usage text refers to.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "usage:")?;
        write!(f, "{} [-f/--foreground] INTERFACE-NAME", self.program)
    }
}

impl std::error::Error for UsageError {}
