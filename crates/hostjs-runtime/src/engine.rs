//! Host-facing engine handle
//!
//! A [`ScriptEngine`] owns one binding running on its own engine thread, the
//! event callback table and the three I/O providers. It is a cheap `Clone`
//! handle; the engine is destroyed when the last clone is dropped. Values and
//! script-visible host objects only keep a weak reference back to it.

use crate::apis;
use crate::app_info::AppInfo;
use crate::binding::{Backend, EngineBinding, HostFunction};
use crate::config::{EngineBuilder, EngineConfig};
use crate::error::{EngineError, EngineResult};
use crate::event::EventBridge;
use crate::handle::NativeValueHandle;
use crate::scope::{ExecutionScope, ReleaseQueue};
use crate::value::{Primitive, PropertyValue, ScriptValue};
use crate::worker::{self, EngineStats, EngineStatsSnapshot, Job, WorkerSetup};
use crossbeam_channel::Sender;
use hostjs_io::{
    DefaultFileSystem, DefaultLogSystem, DefaultWebRequest, FileSystem, LogSystem, WebRequest,
};
use parking_lot::{Mutex, ReentrantMutex};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{JoinHandle, ThreadId};
use tracing::{debug, info, warn};

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

/// Replaceable I/O collaborators, created lazily on first use
struct Providers {
    base_path: Option<PathBuf>,
    file_system: Mutex<Option<Arc<dyn FileSystem>>>,
    web_request: Mutex<Option<Arc<dyn WebRequest>>>,
    log_system: Mutex<Option<Arc<dyn LogSystem>>>,
}

pub(crate) struct EngineInner {
    pub(crate) id: u64,
    backend: Backend,
    app_info: AppInfo,
    pub(crate) exec_lock: ReentrantMutex<()>,
    job_tx: Option<Sender<Job>>,
    thread: Option<JoinHandle<()>>,
    thread_id: ThreadId,
    pub(crate) releases: Arc<ReleaseQueue>,
    events: EventBridge,
    providers: Providers,
    stats: Arc<EngineStats>,
}

impl EngineInner {
    pub(crate) fn is_engine_thread(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    pub(crate) fn jobs(&self) -> Option<&Sender<Job>> {
        self.job_tx.as_ref()
    }

    pub(crate) fn stats(&self) -> &EngineStats {
        &self.stats
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        // Closing the channel stops the engine thread after its current job.
        self.job_tx.take();
        let Some(thread) = self.thread.take() else {
            return;
        };
        if self.is_engine_thread() {
            debug!(engine = self.id, "Engine dropped on its own thread; detaching");
            return;
        }
        if thread.join().is_err() {
            warn!(engine = self.id, "Engine thread panicked during shutdown");
        }
        debug!(engine = self.id, "Engine destroyed");
    }
}

/// Host handle to one JavaScript execution environment
#[derive(Clone)]
pub struct ScriptEngine {
    pub(crate) inner: Arc<EngineInner>,
}

/// Non-owning engine reference for callbacks that must not keep it alive
#[derive(Clone, Default)]
pub struct WeakScriptEngine {
    inner: Weak<EngineInner>,
}

impl WeakScriptEngine {
    pub fn upgrade(&self) -> Option<ScriptEngine> {
        self.inner.upgrade().map(|inner| ScriptEngine { inner })
    }
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("id", &self.inner.id)
            .field("backend", &self.inner.backend)
            .finish()
    }
}

impl ScriptEngine {
    /// Create an engine on the default backend.
    pub fn new(app_info: AppInfo) -> EngineResult<Self> {
        Self::builder().app_info(app_info).build()
    }

    pub fn with_config(config: EngineConfig) -> EngineResult<Self> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Two-phase construction: start the engine thread and allocate the
    /// shared state, then install the host objects, which capture a weak
    /// reference to the now fully built engine.
    pub(crate) fn start(builder: EngineBuilder) -> EngineResult<Self> {
        let EngineBuilder {
            config,
            file_system,
            web_request,
            log_system,
        } = builder;

        let id = NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed);
        let (job_tx, job_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let releases = Arc::new(ReleaseQueue::default());
        let stats = Arc::new(EngineStats::default());

        let mut thread_builder = std::thread::Builder::new().name(format!("hostjs-engine-{id}"));
        if let Some(size) = config.thread_stack_size {
            thread_builder = thread_builder.stack_size(size);
        }
        let setup = WorkerSetup {
            engine_id: id,
            backend: config.backend,
            jobs: job_rx,
            releases: releases.clone(),
            stats: stats.clone(),
            ready: ready_tx,
        };
        let thread = thread_builder
            .spawn(move || worker::run_worker(setup))
            .map_err(|e| EngineError::initialization(format!("failed to spawn engine thread: {e}")))?;
        let thread_id = thread.thread().id();

        let startup = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(EngineError::initialization("engine thread exited during startup")));
        if let Err(e) = startup {
            let _ = thread.join();
            return Err(e);
        }

        let engine = ScriptEngine {
            inner: Arc::new(EngineInner {
                id,
                backend: config.backend,
                app_info: config.app_info,
                exec_lock: ReentrantMutex::new(()),
                job_tx: Some(job_tx),
                thread: Some(thread),
                thread_id,
                releases,
                events: EventBridge::new(),
                providers: Providers {
                    base_path: config.base_path,
                    file_system: Mutex::new(file_system),
                    web_request: Mutex::new(web_request),
                    log_system: Mutex::new(log_system),
                },
                stats,
            }),
        };

        apis::install(&engine)?;
        info!(engine = id, backend = %engine.inner.backend, "Engine initialized");
        Ok(engine)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn backend(&self) -> Backend {
        self.inner.backend
    }

    pub fn app_info(&self) -> &AppInfo {
        &self.inner.app_info
    }

    pub fn downgrade(&self) -> WeakScriptEngine {
        WeakScriptEngine {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Hold exclusive access to the engine across several operations.
    pub fn scope(&self) -> ExecutionScope<'_> {
        ExecutionScope::enter(&self.inner)
    }

    pub(crate) fn run<R, F>(&self, op: F) -> EngineResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&dyn EngineBinding) -> EngineResult<R> + Send + 'static,
    {
        self.scope().run(op)
    }

    pub(crate) fn wrap(&self, handle: NativeValueHandle) -> ScriptValue {
        ScriptValue::new(Arc::downgrade(&self.inner), handle)
    }

    /// Evaluate a top-level script.
    pub fn evaluate(&self, source: &str) -> EngineResult<ScriptValue> {
        self.evaluate_source(source, None)
    }

    /// Evaluate a top-level script; `filename` appears in error locations.
    pub fn evaluate_with_filename(&self, source: &str, filename: &str) -> EngineResult<ScriptValue> {
        self.evaluate_source(source, Some(filename))
    }

    fn evaluate_source(&self, source: &str, filename: Option<&str>) -> EngineResult<ScriptValue> {
        let source = source.to_string();
        let filename = filename.map(str::to_string);
        self.inner.stats.evaluations.fetch_add(1, Ordering::Relaxed);

        let result = self.run(move |binding| binding.evaluate(&source, filename.as_deref()));
        if let Err(e) = &result {
            if e.is_script_error() {
                self.inner.stats.script_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
        result.map(|handle| self.wrap(handle))
    }

    /// Create a string, number or boolean value.
    pub fn new_value(&self, value: impl Into<Primitive>) -> EngineResult<ScriptValue> {
        let value = value.into();
        self.run(move |binding| value.create(binding))
            .map(|handle| self.wrap(handle))
    }

    pub fn new_object(&self) -> EngineResult<ScriptValue> {
        self.run(|binding| binding.new_object())
            .map(|handle| self.wrap(handle))
    }

    pub fn new_array(&self) -> EngineResult<ScriptValue> {
        self.run(|binding| binding.new_array())
            .map(|handle| self.wrap(handle))
    }

    pub fn undefined(&self) -> EngineResult<ScriptValue> {
        self.run(|binding| binding.new_undefined())
            .map(|handle| self.wrap(handle))
    }

    pub fn null(&self) -> EngineResult<ScriptValue> {
        self.run(|binding| binding.new_null())
            .map(|handle| self.wrap(handle))
    }

    /// Create a script function backed by a host closure.
    ///
    /// The closure runs on the engine thread whenever script calls the
    /// function. Returning an error throws it into script.
    pub fn new_function<F>(&self, name: &str, callback: F) -> EngineResult<ScriptValue>
    where
        F: Fn(&[ScriptValue]) -> EngineResult<Option<ScriptValue>> + Send + 'static,
    {
        let engine = Arc::downgrade(&self.inner);
        let name = name.to_string();
        self.run(move |binding| {
            let host: HostFunction = Box::new(move |args| {
                let args: Vec<ScriptValue> = args
                    .into_iter()
                    .map(|handle| ScriptValue::new(engine.clone(), handle))
                    .collect();
                match callback(&args)? {
                    Some(result) => Ok(Some(result.into_handle_for(&engine)?)),
                    None => Ok(None),
                }
            });
            binding.new_function(&name, host)
        })
        .map(|handle| self.wrap(handle))
    }

    /// Assign a property of the global object.
    pub fn set_global_property(
        &self,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> EngineResult<()> {
        let name = name.to_string();
        let value = value.into();
        value.check_engine(&self.inner)?;
        self.run(move |binding| {
            let global = binding.global_object()?;
            let result = value.with_handle(binding, |value| binding.set_property(global, &name, value));
            binding.release(global);
            result
        })
    }

    /// Read a property of the global object; undefined if absent.
    pub fn get_global_property(&self, name: &str) -> EngineResult<ScriptValue> {
        let name = name.to_string();
        self.run(move |binding| {
            let global = binding.global_object()?;
            let result = binding.get_property(global, &name);
            binding.release(global);
            result
        })
        .map(|handle| self.wrap(handle))
    }

    /// Handle to the global object.
    pub fn global_object(&self) -> EngineResult<ScriptValue> {
        self.run(|binding| binding.global_object())
            .map(|handle| self.wrap(handle))
    }

    /// Register the callback for `name`, replacing any previous one.
    pub fn set_event_callback<F>(&self, name: &str, callback: F)
    where
        F: Fn(&[ScriptValue]) + Send + Sync + 'static,
    {
        self.inner.events.set(name, Arc::new(callback));
    }

    pub fn remove_event_callback(&self, name: &str) {
        self.inner.events.remove(name);
    }

    /// Invoke the callback for `name` on the calling thread. Returns false
    /// if none is registered.
    pub fn trigger_event(&self, name: &str, params: &[ScriptValue]) -> bool {
        self.inner.events.trigger(name, params)
    }

    pub fn has_event_callback(&self, name: &str) -> bool {
        self.inner.events.contains(name)
    }

    /// Current file system, creating the default on first access.
    pub fn file_system(&self) -> Arc<dyn FileSystem> {
        let mut slot = self.inner.providers.file_system.lock();
        slot.get_or_insert_with(|| {
            let fs = match &self.inner.providers.base_path {
                Some(base_path) => DefaultFileSystem::with_base_path(base_path),
                None => DefaultFileSystem::new(),
            };
            Arc::new(fs)
        })
        .clone()
    }

    pub fn set_file_system(&self, file_system: Option<Arc<dyn FileSystem>>) -> EngineResult<()> {
        let file_system = file_system
            .ok_or_else(|| EngineError::invalid_argument("FileSystem cannot be null"))?;
        *self.inner.providers.file_system.lock() = Some(file_system);
        Ok(())
    }

    /// Current web request provider, creating the default on first access.
    pub fn web_request(&self) -> Arc<dyn WebRequest> {
        self.inner
            .providers
            .web_request
            .lock()
            .get_or_insert_with(|| Arc::new(DefaultWebRequest::new()))
            .clone()
    }

    pub fn set_web_request(&self, web_request: Option<Arc<dyn WebRequest>>) -> EngineResult<()> {
        let web_request = web_request
            .ok_or_else(|| EngineError::invalid_argument("WebRequest cannot be null"))?;
        *self.inner.providers.web_request.lock() = Some(web_request);
        Ok(())
    }

    /// Current log system, creating the default on first access.
    pub fn log_system(&self) -> Arc<dyn LogSystem> {
        self.inner
            .providers
            .log_system
            .lock()
            .get_or_insert_with(|| Arc::new(DefaultLogSystem))
            .clone()
    }

    pub fn set_log_system(&self, log_system: Option<Arc<dyn LogSystem>>) -> EngineResult<()> {
        let log_system =
            log_system.ok_or_else(|| EngineError::invalid_argument("LogSystem cannot be null"))?;
        *self.inner.providers.log_system.lock() = Some(log_system);
        Ok(())
    }

    /// Ask the backend to collect garbage. Best effort.
    pub fn collect_garbage(&self) -> EngineResult<()> {
        self.run(|binding| {
            binding.collect_garbage();
            Ok(())
        })
    }

    /// Number of native handles currently rooted by the binding.
    pub fn live_handles(&self) -> EngineResult<usize> {
        let releases = self.inner.releases.clone();
        self.run(move |binding| {
            releases.drain_into(binding);
            Ok(binding.live_handles())
        })
    }

    pub fn stats(&self) -> EngineStatsSnapshot {
        self.inner.stats.snapshot()
    }
}
