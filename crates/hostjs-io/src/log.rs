//! Logging collaborator.

use std::fmt;
use tracing::{error, info, trace, warn};

/// Severity of a script log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Log,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Log => "log",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log sink consumed by scripts through `console`.
pub trait LogSystem: Send + Sync {
    /// Write one message. `source` is a script location, possibly empty.
    fn write(&self, level: LogLevel, message: &str, source: &str);
}

/// Routes script log lines to `tracing` under the `hostjs::console` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLogSystem;

impl LogSystem for DefaultLogSystem {
    fn write(&self, level: LogLevel, message: &str, source: &str) {
        match level {
            LogLevel::Trace => trace!(target: "hostjs::console", source, "{}", message),
            LogLevel::Log => info!(target: "hostjs::console", source, "{}", message),
            LogLevel::Info => info!(target: "hostjs::console", source, "{}", message),
            LogLevel::Warn => warn!(target: "hostjs::console", source, "{}", message),
            LogLevel::Error => error!(target: "hostjs::console", source, "{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names() {
        assert_eq!(LogLevel::Trace.to_string(), "trace");
        assert_eq!(LogLevel::Log.as_str(), "log");
        assert_eq!(LogLevel::Error.to_string(), "error");
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Trace < LogLevel::Log);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn test_default_log_system_accepts_all_levels() {
        let log = DefaultLogSystem;
        for level in [
            LogLevel::Trace,
            LogLevel::Log,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
        ] {
            log.write(level, "message", "test.js:1");
        }
    }
}
