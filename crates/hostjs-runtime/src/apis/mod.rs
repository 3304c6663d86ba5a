//! Script-visible host objects
//!
//! Installed into every engine at construction: `_appInfo`, `_fileSystem`,
//! `_webRequest`, `console`, `_triggerEvent` and `setTimeout`. Adapters hold
//! only a weak reference to their engine, so the engine can be dropped while
//! provider work is still in flight.

mod app_info;
mod console;
mod events;
mod fs;
mod timers;
mod web_request;

use crate::engine::{ScriptEngine, WeakScriptEngine};
use crate::error::{EngineError, EngineResult};
use crate::value::ScriptValue;
use tracing::{debug, warn};

pub(crate) fn install(engine: &ScriptEngine) -> EngineResult<()> {
    app_info::install(engine)?;
    fs::install(engine)?;
    web_request::install(engine)?;
    console::install(engine)?;
    events::install(engine)?;
    timers::install(engine)?;
    Ok(())
}

/// Weak engine reference resolved by adapter functions at call time
pub(crate) fn engine_of(weak: &WeakScriptEngine) -> EngineResult<ScriptEngine> {
    weak.upgrade().ok_or(EngineError::EngineUnavailable)
}

fn ordinal(index: usize) -> &'static str {
    match index {
        0 => "First",
        1 => "Second",
        2 => "Third",
        3 => "Fourth",
        _ => "An",
    }
}

pub(crate) fn expect_arg_count(args: &[ScriptValue], count: usize, method: &str) -> EngineResult<()> {
    if args.len() < count {
        return Err(EngineError::invalid_argument(format!(
            "{method} requires {count} parameters"
        )));
    }
    Ok(())
}

pub(crate) fn string_arg(args: &[ScriptValue], index: usize, method: &str) -> EngineResult<String> {
    match args.get(index) {
        Some(arg) if arg.is_string()? => arg.as_string(),
        _ => Err(EngineError::invalid_argument(format!(
            "{} argument to {method} must be a string",
            ordinal(index)
        ))),
    }
}

pub(crate) fn function_arg(args: &[ScriptValue], index: usize, method: &str) -> EngineResult<ScriptValue> {
    match args.get(index) {
        Some(arg) if arg.is_function()? => Ok(arg.clone()),
        _ => Err(EngineError::invalid_argument(format!(
            "{} argument to {method} must be a function",
            ordinal(index)
        ))),
    }
}

pub(crate) type AdapterFn =
    Box<dyn Fn(&[ScriptValue]) -> EngineResult<Option<ScriptValue>> + Send + 'static>;

/// Install `methods` on a new global object `name`.
pub(crate) fn install_object(
    engine: &ScriptEngine,
    name: &str,
    methods: Vec<(&str, AdapterFn)>,
) -> EngineResult<()> {
    let object = engine.new_object()?;
    for (method, callback) in methods {
        let function = engine.new_function(method, callback)?;
        object.set_property(method, function)?;
    }
    engine.set_global_property(name, object)
}

/// Run a script callback with arguments built from a completed host
/// operation. Called from whichever thread the provider completes on.
pub(crate) fn deliver<B>(weak: &WeakScriptEngine, callback: ScriptValue, context: &str, build: B)
where
    B: FnOnce(&ScriptEngine) -> EngineResult<Vec<ScriptValue>>,
{
    let Some(engine) = weak.upgrade() else {
        debug!("Dropping {context} completion for a destroyed engine");
        return;
    };
    let _scope = engine.scope();
    let result = build(&engine).and_then(|args| callback.call(&args, None));
    if let Err(e) = result {
        warn!(engine = engine.id(), "{context} callback failed: {e}");
        engine
            .log_system()
            .write(hostjs_io::LogLevel::Error, &e.to_string(), context);
    }
}
