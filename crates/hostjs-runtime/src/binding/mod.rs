//! Backend bindings.
//!
//! An [`EngineBinding`] owns one native script context and translates
//! engine-agnostic requests into backend calls. Values cross the boundary as
//! [`NativeValueHandle`]s. Bindings are `!Send`: each lives on the thread
//! that created it and is only reached through an engine's execution scope.
//!
//! Host functions may call back into the binding while script is on the
//! stack, so every method takes `&self` and backends keep no borrow of
//! their own state across a call into script.

#[cfg(feature = "boa")]
mod boa;
#[cfg(feature = "quickjs")]
mod quickjs;

use crate::error::{EngineError, EngineResult};
use crate::handle::NativeValueHandle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Native function installed into script.
///
/// Receives owned argument handles. A returned handle is taken over by the
/// binding. An error is thrown into script as an exception.
pub type HostFunction =
    Box<dyn Fn(Vec<NativeValueHandle>) -> EngineResult<Option<NativeValueHandle>>>;

/// Script engine backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[cfg_attr(feature = "quickjs", default)]
    QuickJs,
    #[cfg_attr(not(feature = "quickjs"), default)]
    Boa,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::QuickJs => "quickjs",
            Backend::Boa => "boa",
        }
    }

    /// Whether support for this backend is compiled in
    pub fn is_available(self) -> bool {
        match self {
            Backend::QuickJs => cfg!(feature = "quickjs"),
            Backend::Boa => cfg!(feature = "boa"),
        }
    }

    /// All backends compiled into this build
    pub fn available() -> Vec<Backend> {
        [Backend::QuickJs, Backend::Boa]
            .into_iter()
            .filter(|backend| backend.is_available())
            .collect()
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quickjs" => Ok(Backend::QuickJs),
            "boa" => Ok(Backend::Boa),
            other => Err(EngineError::Config(format!("unknown backend '{other}'"))),
        }
    }
}

/// Kind of a script value, derived from the native value on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Undefined,
    Null,
    Boolean,
    Number,
    String,
    Array,
    Function,
    Object,
    /// Symbols, big integers and other values without a host representation
    Other,
}

impl ValueKind {
    /// Objects, arrays and functions all carry properties
    pub fn is_object(self) -> bool {
        matches!(self, ValueKind::Object | ValueKind::Array | ValueKind::Function)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Undefined => "undefined",
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Function => "function",
            ValueKind::Object => "object",
            ValueKind::Other => "other",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability interface implemented once per backend.
pub trait EngineBinding {
    fn backend(&self) -> Backend;

    /// Process-wide backend startup (once) and creation of the native context.
    fn initialize(&self) -> EngineResult<()>;

    /// Compile and run `source` as a top-level script.
    fn evaluate(&self, source: &str, filename: Option<&str>) -> EngineResult<NativeValueHandle>;

    fn new_string(&self, value: &str) -> EngineResult<NativeValueHandle>;
    fn new_number(&self, value: f64) -> EngineResult<NativeValueHandle>;
    fn new_bool(&self, value: bool) -> EngineResult<NativeValueHandle>;
    fn new_undefined(&self) -> EngineResult<NativeValueHandle>;
    fn new_null(&self) -> EngineResult<NativeValueHandle>;
    fn new_object(&self) -> EngineResult<NativeValueHandle>;
    fn new_array(&self) -> EngineResult<NativeValueHandle>;
    fn new_function(&self, name: &str, function: HostFunction) -> EngineResult<NativeValueHandle>;

    /// Fails with `InvalidOperation` before `initialize` has created a context.
    fn global_object(&self) -> EngineResult<NativeValueHandle>;

    fn kind(&self, value: NativeValueHandle) -> EngineResult<ValueKind>;

    /// Standard string coercion (`String(value)`)
    fn coerce_string(&self, value: NativeValueHandle) -> EngineResult<String>;
    /// Standard numeric coercion (`Number(value)`)
    fn coerce_number(&self, value: NativeValueHandle) -> EngineResult<f64>;
    fn coerce_bool(&self, value: NativeValueHandle) -> EngineResult<bool>;

    fn array_length(&self, array: NativeValueHandle) -> EngineResult<u32>;
    fn array_get(&self, array: NativeValueHandle, index: u32) -> EngineResult<NativeValueHandle>;

    /// Own enumerable string keys in the engine's enumeration order
    fn own_property_names(&self, object: NativeValueHandle) -> EngineResult<Vec<String>>;
    fn get_property(&self, object: NativeValueHandle, name: &str) -> EngineResult<NativeValueHandle>;
    fn set_property(
        &self,
        object: NativeValueHandle,
        name: &str,
        value: NativeValueHandle,
    ) -> EngineResult<()>;

    fn call(
        &self,
        function: NativeValueHandle,
        args: &[NativeValueHandle],
        this: NativeValueHandle,
    ) -> EngineResult<NativeValueHandle>;

    /// New handle to the same value
    fn duplicate(&self, value: NativeValueHandle) -> EngineResult<NativeValueHandle>;
    /// Unknown handles are ignored
    fn release(&self, value: NativeValueHandle);
    fn live_handles(&self) -> usize;

    /// Best-effort garbage collection hint
    fn collect_garbage(&self);

    /// Release every handle and tear down the native context.
    fn shutdown(&self);
}

/// Create an uninitialized binding for `backend`.
pub fn create(backend: Backend) -> EngineResult<Box<dyn EngineBinding>> {
    match backend {
        #[cfg(feature = "quickjs")]
        Backend::QuickJs => Ok(Box::new(quickjs::QuickJsBinding::new()?)),
        #[cfg(feature = "boa")]
        Backend::Boa => Ok(Box::new(boa::BoaBinding::new())),
        #[allow(unreachable_patterns)]
        other => Err(EngineError::initialization(format!(
            "backend '{other}' is not compiled into this build"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        assert_eq!(Backend::QuickJs.to_string(), "quickjs");
        assert_eq!("Boa".parse::<Backend>().unwrap(), Backend::Boa);
        assert!("v8".parse::<Backend>().is_err());
    }

    #[test]
    fn test_default_backend_is_available() {
        assert!(Backend::default().is_available());
        assert!(Backend::available().contains(&Backend::default()));
    }

    #[test]
    fn test_value_kind_objects() {
        assert!(ValueKind::Array.is_object());
        assert!(ValueKind::Function.is_object());
        assert!(!ValueKind::String.is_object());
        assert_eq!(ValueKind::Function.to_string(), "function");
    }
}
