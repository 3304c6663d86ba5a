//! Engine thread
//!
//! Native runtimes cannot leave the thread that created them, so each engine
//! owns one dedicated thread. The thread creates and initializes the binding,
//! then processes jobs until the job channel closes. Panics inside a job are
//! caught and logged; the engine keeps running.

use crate::binding::{self, Backend, EngineBinding};
use crate::error::EngineResult;
use crate::scope::ReleaseQueue;
use crossbeam_channel::{Receiver, RecvError, Sender};
use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info_span};

/// Work executed on the engine thread
pub(crate) type Job = Box<dyn FnOnce(&dyn EngineBinding) + Send>;

/// State of the engine owning the current thread
struct EngineThread {
    engine_id: u64,
    binding: Rc<dyn EngineBinding>,
    jobs: Receiver<Job>,
    stats: Arc<EngineStats>,
}

thread_local! {
    static CURRENT: RefCell<Option<Rc<EngineThread>>> = const { RefCell::new(None) };
}

fn current_thread() -> Option<Rc<EngineThread>> {
    CURRENT.with(|current| current.borrow().clone())
}

/// Binding of engine `engine_id` if the calling thread is that engine's thread.
pub(crate) fn current_binding(engine_id: u64) -> Option<Rc<dyn EngineBinding>> {
    current_thread()
        .filter(|thread| thread.engine_id == engine_id)
        .map(|thread| thread.binding.clone())
}

/// Id of the engine owning the calling thread
pub(crate) fn current_engine_thread() -> Option<u64> {
    current_thread().map(|thread| thread.engine_id)
}

/// Wait for the reply to a job shipped to another engine.
///
/// On an engine thread, jobs sent to this engine while it waits run inline.
/// Only the call chain that holds this engine can send them, so a chain that
/// comes back here completes instead of waiting on itself.
pub(crate) fn wait_for_reply<R>(reply: &Receiver<R>) -> Result<R, RecvError> {
    let Some(thread) = current_thread() else {
        return reply.recv();
    };
    loop {
        crossbeam_channel::select! {
            recv(reply) -> msg => return msg,
            recv(thread.jobs) -> job => match job {
                Ok(job) => execute_job(&*thread.binding, job, &thread.stats),
                Err(_) => return reply.recv(),
            },
        }
    }
}

/// Counters shared between an engine handle and its thread
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Jobs executed on the engine thread
    pub jobs_executed: AtomicU64,
    /// Jobs that panicked
    pub jobs_panicked: AtomicU64,
    /// Top-level script evaluations
    pub evaluations: AtomicU64,
    /// Function calls made through `ScriptValue::call`
    pub calls: AtomicU64,
    /// Script errors surfaced to the host
    pub script_errors: AtomicU64,
}

impl EngineStats {
    /// Get snapshot of current stats
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            jobs_executed: self.jobs_executed.load(Ordering::Relaxed),
            jobs_panicked: self.jobs_panicked.load(Ordering::Relaxed),
            evaluations: self.evaluations.load(Ordering::Relaxed),
            calls: self.calls.load(Ordering::Relaxed),
            script_errors: self.script_errors.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of engine statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStatsSnapshot {
    pub jobs_executed: u64,
    pub jobs_panicked: u64,
    pub evaluations: u64,
    pub calls: u64,
    pub script_errors: u64,
}

pub(crate) struct WorkerSetup {
    pub engine_id: u64,
    pub backend: Backend,
    pub jobs: Receiver<Job>,
    pub releases: Arc<ReleaseQueue>,
    pub stats: Arc<EngineStats>,
    pub ready: Sender<EngineResult<()>>,
}

/// Run an engine thread until its job channel is closed.
pub(crate) fn run_worker(setup: WorkerSetup) {
    let WorkerSetup {
        engine_id,
        backend,
        jobs,
        releases,
        stats,
        ready,
    } = setup;

    let _span = info_span!("engine", id = engine_id, backend = %backend).entered();
    debug!("Engine thread starting");

    let binding: Rc<dyn EngineBinding> = match binding::create(backend) {
        Ok(binding) => Rc::from(binding),
        Err(e) => {
            error!(error = %e, "Failed to create binding");
            let _ = ready.send(Err(e));
            return;
        }
    };
    if let Err(e) = binding.initialize() {
        error!(error = %e, "Failed to initialize binding");
        let _ = ready.send(Err(e));
        return;
    }

    let thread = Rc::new(EngineThread {
        engine_id,
        binding: binding.clone(),
        jobs: jobs.clone(),
        stats: stats.clone(),
    });
    CURRENT.with(|current| *current.borrow_mut() = Some(thread));
    let _ = ready.send(Ok(()));
    debug!("Engine thread ready");

    while let Ok(job) = jobs.recv() {
        releases.drain_into(&*binding);
        execute_job(&*binding, job, &stats);
        releases.drain_into(&*binding);
    }

    debug!(pending_releases = releases.len(), "Job channel disconnected");
    releases.drain_into(&*binding);
    CURRENT.with(|current| current.borrow_mut().take());
    binding.shutdown();
    debug!("Engine thread stopped");
}

fn execute_job(binding: &dyn EngineBinding, job: Job, stats: &EngineStats) {
    stats.jobs_executed.fetch_add(1, Ordering::Relaxed);
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| job(binding))) {
        stats.jobs_panicked.fetch_add(1, Ordering::Relaxed);
        let message = if let Some(s) = panic.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        error!(panic = %message, "Engine job panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_snapshot() {
        let stats = EngineStats::default();
        stats.evaluations.fetch_add(2, Ordering::Relaxed);
        stats.script_errors.fetch_add(1, Ordering::Relaxed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.evaluations, 2);
        assert_eq!(snapshot.script_errors, 1);
        assert_eq!(snapshot.calls, 0);
    }

    #[test]
    fn test_no_current_binding_off_engine_thread() {
        assert!(current_binding(1).is_none());
        assert!(current_engine_thread().is_none());
    }

    #[test]
    fn test_wait_for_reply_off_engine_thread() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        tx.send(7).unwrap();
        assert_eq!(wait_for_reply(&rx).unwrap(), 7);

        drop(tx);
        assert!(wait_for_reply(&rx).is_err());
    }
}
