//! Shared background runtime for provider work.
//!
//! One multi-threaded Tokio runtime per process, started on first use. Providers
//! spawn their async work here and hand results to completions on the blocking
//! pool, where it is fine for a completion to wait on a script engine.

use crate::error::{ProviderError, ProviderResult};
use std::future::Future;
use std::sync::OnceLock;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, warn};

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

const WORKER_THREADS: usize = 2;

/// Get a handle to the shared runtime, starting it if needed.
pub fn handle() -> ProviderResult<Handle> {
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime.handle().clone());
    }

    let runtime = Builder::new_multi_thread()
        .worker_threads(WORKER_THREADS)
        .thread_name("hostjs-io")
        .enable_all()
        .build()
        .map_err(|e| ProviderError::Scheduler(e.to_string()))?;

    // A racing initializer may have won; the losing runtime is dropped here.
    let runtime = RUNTIME.get_or_init(|| runtime);
    debug!("I/O scheduler started");
    Ok(runtime.handle().clone())
}

/// Run `work` on the shared runtime and pass its output to `done` on the
/// blocking pool.
///
/// `done` is called exactly once, also when the runtime cannot be started.
pub fn spawn_with_completion<T, Fut, F>(work: Fut, done: F)
where
    T: Send + 'static,
    Fut: Future<Output = ProviderResult<T>> + Send + 'static,
    F: FnOnce(ProviderResult<T>) + Send + 'static,
{
    match handle() {
        Ok(handle) => {
            handle.spawn(async move {
                let result = work.await;
                if let Err(e) = tokio::task::spawn_blocking(move || done(result)).await {
                    warn!(error = %e, "Completion panicked");
                }
            });
        }
        Err(e) => done(Err(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_handle_is_shared() {
        handle().unwrap();
        handle().unwrap();
        assert!(RUNTIME.get().is_some());
    }

    #[test]
    fn test_spawn_with_completion_delivers_once() {
        let (tx, rx) = mpsc::channel();
        spawn_with_completion(async { Ok(21 * 2) }, move |result| {
            tx.send(result.unwrap()).unwrap();
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }
}
