//! Error types for engine and value operations
//!
//! Script exceptions keep their type, message, location and stack so hosts
//! can report them. Backend-specific exception types never leave a binding.

use hostjs_io::ProviderError;
use thiserror::Error;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Uncaught script exception or compile error
    #[error("{error_type}: {message}{}", format_location(file, line, column))]
    Script {
        error_type: String,
        message: String,
        file: Option<String>,
        line: Option<u32>,
        column: Option<u32>,
        stack: Option<String>,
    },

    /// Operation invoked on a value of the wrong kind
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Null provider, malformed adapter call, foreign value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation not valid in the engine's current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The owning engine has been destroyed
    #[error("Engine is no longer available")]
    EngineUnavailable,

    /// A collaborator reported failure
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Engine startup failed
    #[error("Engine initialization failed: {message}")]
    Initialization { message: String },

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal/unexpected error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Format location for error display
fn format_location(file: &Option<String>, line: &Option<u32>, column: &Option<u32>) -> String {
    match (file, line, column) {
        (Some(f), Some(l), Some(c)) => format!(" at {}:{}:{}", f, l, c),
        (Some(f), Some(l), None) => format!(" at {}:{}", f, l),
        (Some(f), None, _) => format!(" in {}", f),
        (None, Some(l), Some(c)) => format!(" at line {}:{}", l, c),
        (None, Some(l), None) => format!(" at line {}", l),
        _ => String::new(),
    }
}

impl EngineError {
    /// Create a script error from error type and message
    pub fn script(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Script {
            error_type: error_type.into(),
            message: message.into(),
            file: None,
            line: None,
            column: None,
            stack: None,
        }
    }

    /// Create a script error with location info
    pub fn script_with_location(
        error_type: impl Into<String>,
        message: impl Into<String>,
        file: Option<String>,
        line: Option<u32>,
        column: Option<u32>,
        stack: Option<String>,
    ) -> Self {
        Self::Script {
            error_type: error_type.into(),
            message: message.into(),
            file,
            line,
            column,
            stack,
        }
    }

    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    pub fn initialization(message: impl Into<String>) -> Self {
        Self::Initialization {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Fill in the file name of a script error that has none.
    pub(crate) fn with_default_file(self, filename: Option<&str>) -> Self {
        match (self, filename) {
            (
                Self::Script {
                    error_type,
                    message,
                    file: None,
                    line,
                    column,
                    stack,
                },
                Some(name),
            ) => Self::Script {
                error_type,
                message,
                file: Some(name.to_string()),
                line,
                column,
                stack,
            },
            (other, _) => other,
        }
    }

    pub fn is_script_error(&self) -> bool {
        matches!(self, Self::Script { .. })
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }

    pub fn is_engine_unavailable(&self) -> bool {
        matches!(self, Self::EngineUnavailable)
    }

    /// Get the stack trace if available
    pub fn stack_trace(&self) -> Option<&str> {
        match self {
            Self::Script { stack, .. } => stack.as_deref(),
            _ => None,
        }
    }

    /// Get source location if available
    pub fn location(&self) -> Option<(Option<&str>, Option<u32>, Option<u32>)> {
        match self {
            Self::Script {
                file, line, column, ..
            } => Some((file.as_deref(), *line, *column)),
            _ => None,
        }
    }

    /// Get the error type name (e.g., "TypeError", "ReferenceError")
    pub fn error_type(&self) -> &str {
        match self {
            Self::Script { error_type, .. } => error_type,
            Self::TypeMismatch { .. } => "TypeMismatch",
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::InvalidOperation(_) => "InvalidOperation",
            Self::EngineUnavailable => "EngineUnavailable",
            Self::Provider(_) => "ProviderError",
            Self::Initialization { .. } => "InitializationError",
            Self::Config(_) => "ConfigError",
            Self::Json(_) => "JsonError",
            Self::Internal(_) => "InternalError",
        }
    }
}

/// Extract `(file, line, column)` from the first frame of a script stack.
///
/// Understands frames like `at f (script.js:10:5)` and `at script.js:3`.
pub(crate) fn parse_stack_location(stack: &str) -> Option<(String, u32, Option<u32>)> {
    let frame = stack.lines().map(str::trim).find(|line| !line.is_empty())?;
    let location = match (frame.rfind('('), frame.rfind(')')) {
        (Some(open), Some(close)) if open < close => &frame[open + 1..close],
        _ => frame.trim_start_matches("at ").trim(),
    };

    let mut parts = location.rsplitn(3, ':');
    let last = parts.next()?;
    let middle = parts.next()?;
    match parts.next() {
        Some(file) => {
            let line = middle.parse().ok()?;
            Some((file.to_string(), line, last.parse().ok()))
        }
        None => {
            let line = last.parse().ok()?;
            Some((middle.to_string(), line, None))
        }
    }
}
