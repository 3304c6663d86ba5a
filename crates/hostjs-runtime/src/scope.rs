//! Execution scopes
//!
//! An [`ExecutionScope`] gives the current thread exclusive access to one
//! engine. From a foreign thread it holds the engine's re-entrant lock and
//! ships each operation to the engine thread, waiting for the reply. On the
//! engine thread itself (inside a host callback invoked by script) it runs
//! operations inline. Scopes nest; scopes for different engines may be held
//! at the same time.
//!
//! A shipped job carries the engines its caller holds. While it runs, those
//! engines count as held on the engine thread too, so a call chain that hops
//! between engines and comes back never waits on a lock its own caller owns.

use crate::binding::EngineBinding;
use crate::engine::EngineInner;
use crate::error::{EngineError, EngineResult};
use crate::handle::NativeValueHandle;
use crate::worker::{self, Job};
use parking_lot::{Mutex, ReentrantMutexGuard};
use std::cell::RefCell;

thread_local! {
    static SCOPE_STACK: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
    static INHERITED: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

fn is_inherited(engine_id: u64) -> bool {
    INHERITED.with(|held| held.borrow().contains(&engine_id))
}

/// Engines held by the calling thread's logical caller chain
fn held_engines() -> Vec<u64> {
    let mut held = INHERITED.with(|held| held.borrow().clone());
    SCOPE_STACK.with(|stack| held.extend(stack.borrow().iter().copied()));
    held.extend(worker::current_engine_thread());
    held.sort_unstable();
    held.dedup();
    held
}

/// Id of the engine whose scope was entered last on this thread
pub fn current_engine_id() -> Option<u64> {
    SCOPE_STACK.with(|stack| stack.borrow().last().copied())
}

/// Handles of dropped values awaiting release on the engine thread
#[derive(Debug, Default)]
pub(crate) struct ReleaseQueue {
    pending: Mutex<Vec<NativeValueHandle>>,
}

impl ReleaseQueue {
    pub(crate) fn push(&self, handle: NativeValueHandle) {
        self.pending.lock().push(handle);
    }

    pub(crate) fn drain_into(&self, binding: &dyn EngineBinding) {
        let pending = std::mem::take(&mut *self.pending.lock());
        for handle in pending {
            binding.release(handle);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.lock().len()
    }
}

enum Access<'a> {
    /// On the engine thread
    Inline,
    /// Lock already owned by the caller chain that shipped the current job
    Inherited,
    Locked(ReentrantMutexGuard<'a, ()>),
}

/// Exclusive access to one engine for the lifetime of the guard
pub struct ExecutionScope<'a> {
    engine: &'a EngineInner,
    access: Access<'a>,
}

impl<'a> ExecutionScope<'a> {
    pub(crate) fn enter(engine: &'a EngineInner) -> Self {
        let access = if engine.is_engine_thread() {
            Access::Inline
        } else if is_inherited(engine.id) {
            Access::Inherited
        } else {
            Access::Locked(engine.exec_lock.lock())
        };
        SCOPE_STACK.with(|stack| stack.borrow_mut().push(engine.id));
        Self { engine, access }
    }

    pub fn engine_id(&self) -> u64 {
        self.engine.id
    }

    /// Whether operations run inline on the engine thread
    pub fn is_inline(&self) -> bool {
        matches!(self.access, Access::Inline)
    }

    /// Run `op` against the engine's binding and return its result.
    pub fn run<R, F>(&self, op: F) -> EngineResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&dyn EngineBinding) -> EngineResult<R> + Send + 'static,
    {
        if self.is_inline() {
            let binding =
                worker::current_binding(self.engine.id).ok_or(EngineError::EngineUnavailable)?;
            return op(&*binding);
        }

        let jobs = self.engine.jobs().ok_or(EngineError::EngineUnavailable)?;
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let held = held_engines();
        let job: Job = Box::new(move |binding| {
            let previous = INHERITED.with(|inherited| inherited.replace(held));
            let _restore = scopeguard::guard(previous, |previous| {
                INHERITED.with(|inherited| *inherited.borrow_mut() = previous);
            });
            let _ = reply_tx.send(op(binding));
        });
        jobs.send(job).map_err(|_| EngineError::EngineUnavailable)?;
        worker::wait_for_reply(&reply_rx)
            .map_err(|_| EngineError::internal("engine job ended without a reply"))?
    }
}

impl Drop for ExecutionScope<'_> {
    fn drop(&mut self) {
        // Unlock first, then restore the previous current engine.
        if let Access::Locked(guard) = std::mem::replace(&mut self.access, Access::Inherited) {
            drop(guard);
        }
        SCOPE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
        if self.engine.is_engine_thread() {
            if let Some(binding) = worker::current_binding(self.engine.id) {
                self.engine.releases.drain_into(&*binding);
            }
        }
    }
}
