//! hostjs-runtime - embeddable JavaScript engines for native hosts.
//!
//! This crate wraps a JavaScript backend (QuickJS or Boa) behind a small,
//! thread-safe host API. Each [`ScriptEngine`] owns one native context pinned
//! to a dedicated engine thread; host code on any thread evaluates scripts,
//! builds values, installs callbacks and reads results through
//! [`ScriptValue`] handles.
//!
//! # Features
//!
//! - **Two backends**: `quickjs` (rquickjs) and `boa` (boa_engine), both on by default
//! - **Thread-safe handles**: engines and values may be used from any thread
//! - **Re-entrancy**: host callbacks invoked by script can call back into the engine
//! - **Host objects**: `_fileSystem`, `_webRequest`, `console`, `_appInfo`,
//!   `_triggerEvent` and `setTimeout`, backed by replaceable providers
//!
//! # Example
//!
//! ```no_run
//! use hostjs_runtime::{AppInfo, ScriptEngine};
//!
//! let engine = ScriptEngine::new(AppInfo::new("demo", "1.0")).unwrap();
//! let result = engine.evaluate("2 + 2").unwrap();
//! assert_eq!(result.as_int().unwrap(), 4);
//!
//! engine.set_event_callback("done", |params| {
//!     println!("done with {} params", params.len());
//! });
//! engine.evaluate("_triggerEvent('done', 1, 2)").unwrap();
//! ```
//!
//! # Architecture
//!
//! ```text
//!   host threads                         engine thread (one per engine)
//! ┌──────────────┐   ExecutionScope    ┌──────────────────────────────┐
//! │ ScriptEngine │ ── job channel ───→ │ EngineBinding (QuickJS/Boa)  │
//! │ ScriptValue  │ ←── reply ───────── │  HandleTable of live values  │
//! └──────────────┘                     └──────────────────────────────┘
//!         ↑                                        │ host functions
//!         │        completions (I/O scheduler)     ↓
//!         └──────────── FileSystem / WebRequest / LogSystem
//! ```

mod apis;
pub mod app_info;
pub mod binding;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod handle;
pub mod scope;
pub mod value;
mod worker;

pub use app_info::AppInfo;
pub use binding::{Backend, ValueKind};
pub use config::{EngineBuilder, EngineConfig};
pub use engine::{ScriptEngine, WeakScriptEngine};
pub use error::{EngineError, EngineResult};
pub use event::{EventBridge, EventCallback};
pub use handle::NativeValueHandle;
pub use scope::{ExecutionScope, current_engine_id};
pub use value::{Primitive, PropertyValue, ScriptValue};
pub use worker::{EngineStats, EngineStatsSnapshot};

pub use hostjs_io::{
    Completion, DefaultFileSystem, DefaultLogSystem, DefaultWebRequest, FileSystem, LogLevel, LogSystem,
    ProviderError, ProviderResult, ServerResponse, StatResult, WebRequest,
};

/// Commonly used types
pub mod prelude {
    pub use crate::{
        AppInfo, Backend, EngineError, EngineResult, ScriptEngine, ScriptValue, ValueKind,
    };
}
