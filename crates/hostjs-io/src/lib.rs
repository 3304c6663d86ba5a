//! hostjs-io - host-side collaborators for hostjs script engines.
//!
//! Script code running inside a hostjs engine never touches the disk or the
//! network itself. It goes through three narrow capability traits defined here:
//!
//! - [`FileSystem`]: read/write/move/remove/stat a path, resolve a path
//! - [`WebRequest`]: HTTP GET
//! - [`LogSystem`]: write one log line
//!
//! Every asynchronous operation reports back through a [`Completion`], a boxed
//! `FnOnce`, so a provider cannot invoke it more than once. Providers must
//! invoke it exactly once; dropping it without calling is a leak of the
//! script-side callback.
//!
//! The default implementations run their work on a small shared Tokio runtime
//! (see [`scheduler`]) and deliver completions on its blocking pool, so a
//! completion may block while it re-enters a script engine.

pub mod error;
pub mod fs;
pub mod log;
pub mod scheduler;
pub mod web;

pub use error::{ProviderError, ProviderResult};
pub use fs::{Completion, DefaultFileSystem, FileSystem, StatResult};
pub use log::{DefaultLogSystem, LogLevel, LogSystem};
pub use web::{DefaultWebRequest, ServerResponse, WebRequest};
