//! Level-gated device log sink backed by `tracing`.

use crate::backend::DeviceLog;
use crate::types::LogLevel;

/// [`DeviceLog`] that forwards to `tracing`, tagged with the interface name.
///
/// Messages below the bound [`LogLevel`] are dropped before they reach the
/// subscriber.
#[derive(Debug, Clone)]
pub struct LevelLog {
    interface: String,
    level: LogLevel,
}

impl LevelLog {
    /// Creates a sink for `interface` at `level`.
    #[must_use]
    pub fn new(interface: impl Into<String>, level: LogLevel) -> Self {
        Self {
            interface: interface.into(),
            level,
        }
    }

    /// Returns the bound level.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }

    /// Returns the interface the sink tags messages with.
    #[must_use]
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Returns true if a message at `level` would be emitted.
    #[must_use]
    pub fn enabled(&self, level: LogLevel) -> bool {
        self.level.allows(level)
    }
}

impl DeviceLog for LevelLog {
    fn debug(&self, msg: &str) {
        if self.enabled(LogLevel::Debug) {
            tracing::debug!(interface = %self.interface, "{msg}");
        }
    }

    fn info(&self, msg: &str) {
        if self.enabled(LogLevel::Info) {
            tracing::info!(interface = %self.interface, "{msg}");
        }
    }

    fn error(&self, msg: &str) {
        tracing::error!(interface = %self.interface, "{msg}");
    }

    fn fatal(&self, msg: &str) {
        tracing::error!(interface = %self.interface, fatal = true, "{msg}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_sink_enables_everything() {
        let log = LevelLog::new("wg0", LogLevel::Debug);
        assert!(log.enabled(LogLevel::Debug));
        assert!(log.enabled(LogLevel::Info));
        assert!(log.enabled(LogLevel::Error));
    }

    #[test]
    fn test_info_sink_drops_debug() {
        let log = LevelLog::new("wg0", LogLevel::Info);
        assert!(!log.enabled(LogLevel::Debug));
        assert!(log.enabled(LogLevel::Info));
    }

    #[test]
    fn test_error_sink_only_errors() {
        let log = LevelLog::new("wg0", LogLevel::Error);
        assert!(!log.enabled(LogLevel::Info));
        assert!(log.enabled(LogLevel::Error));
        assert_eq!(log.level(), LogLevel::Error);
        assert_eq!(log.interface(), "wg0");
    }

    #[test]
    fn test_logging_without_subscriber_is_silent() {
        let log = LevelLog::new("wg0", LogLevel::Debug);
        log.debug("debug");
        log.info("info");
        log.error("error");
        log.fatal("fatal");
    }
}
