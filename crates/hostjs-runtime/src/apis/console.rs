//! `console`
//!
//! A small script wrapper formats the arguments and captures the caller's
//! stack, then hands both to the engine's log system.

use super::{engine_of, expect_arg_count, string_arg};
use crate::engine::ScriptEngine;
use crate::error::{EngineError, EngineResult};
use hostjs_io::LogLevel;

const CONSOLE_FACTORY: &str = r#"(function (write) {
  var console = {};
  ['trace', 'log', 'debug', 'info', 'warn', 'error'].forEach(function (level) {
    console[level] = function () {
      var message = Array.prototype.map.call(arguments, String).join(' ');
      var stack = '';
      try { stack = String(new Error().stack || ''); } catch (e) {}
      write(level, message, stack);
    };
  });
  return console;
})"#;

pub(super) fn install(engine: &ScriptEngine) -> EngineResult<()> {
    let weak = engine.downgrade();
    let write = engine.new_function("write", move |args| {
        const METHOD: &str = "console";
        expect_arg_count(args, 3, METHOD)?;
        let level = parse_level(&string_arg(args, 0, METHOD)?)?;
        let message = string_arg(args, 1, METHOD)?;
        let source = caller_source(&string_arg(args, 2, METHOD)?);
        engine_of(&weak)?.log_system().write(level, &message, &source);
        Ok(None)
    })?;

    let factory = engine.evaluate_with_filename(CONSOLE_FACTORY, "console.js")?;
    let console = factory.call(&[write], None)?;
    engine.set_global_property("console", console)
}

fn parse_level(level: &str) -> EngineResult<LogLevel> {
    match level {
        "trace" => Ok(LogLevel::Trace),
        "log" | "debug" => Ok(LogLevel::Log),
        "info" => Ok(LogLevel::Info),
        "warn" => Ok(LogLevel::Warn),
        "error" => Ok(LogLevel::Error),
        other => Err(EngineError::invalid_argument(format!(
            "unknown console level '{other}'"
        ))),
    }
}

/// Location of the frame that called the console method. The first frame
/// of the captured stack is the wrapper itself.
fn caller_source(stack: &str) -> String {
    stack
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("at "))
        .nth(1)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug").unwrap(), LogLevel::Log);
        assert_eq!(parse_level("warn").unwrap(), LogLevel::Warn);
        assert!(parse_level("fatal").is_err());
    }

    #[test]
    fn test_caller_source() {
        let stack = "Error\n    at <anonymous> (console.js:7)\n    at main (app.js:3:5)\n";
        assert_eq!(caller_source(stack), "main (app.js:3:5)");
        assert_eq!(caller_source(""), "");
    }
}
