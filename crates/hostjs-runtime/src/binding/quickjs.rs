//! QuickJS backend via `rquickjs`.
//!
//! Values are rooted as `Persistent` in a handle table. Top-level operations
//! enter the context with `Context::with`; host functions stash the `Ctx` they
//! are called with so nested operations reuse it instead of re-locking the
//! runtime.

use super::{Backend, EngineBinding, HostFunction, ValueKind};
use crate::error::{EngineError, EngineResult, parse_stack_location};
use crate::handle::{HandleTable, NativeValueHandle};
use rquickjs::context::EvalOptions;
use rquickjs::convert::Coerced;
use rquickjs::function::{Rest, This};
use rquickjs::{Array, Context, Ctx, Exception, Function, Object, Persistent, Runtime, Value};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;
use tracing::{debug, trace};

static STARTUP: Once = Once::new();

/// File name QuickJS reports for code passed to `eval`
const EVAL_FILE_NAME: &str = "eval_script";

type Rooted = Persistent<Value<'static>>;

struct Shared {
    handles: RefCell<HandleTable<Rooted>>,
    /// Context of the innermost host function on the stack
    active: RefCell<Option<Ctx<'static>>>,
}

impl Shared {
    fn store<'js>(&self, ctx: &Ctx<'js>, value: Value<'js>) -> NativeValueHandle {
        let rooted: Rooted = Persistent::save(ctx, value);
        self.handles.borrow_mut().insert(rooted)
    }

    fn load<'js>(&self, ctx: &Ctx<'js>, handle: NativeValueHandle) -> EngineResult<Value<'js>> {
        let rooted = self
            .handles
            .borrow()
            .get(handle)
            .cloned()
            .ok_or_else(|| unknown_handle(handle))?;
        rooted
            .restore(ctx)
            .map_err(|e| EngineError::internal(e.to_string()))
    }

    fn take<'js>(&self, ctx: &Ctx<'js>, handle: NativeValueHandle) -> EngineResult<Value<'js>> {
        let rooted = self
            .handles
            .borrow_mut()
            .remove(handle)
            .ok_or_else(|| unknown_handle(handle))?;
        rooted
            .restore(ctx)
            .map_err(|e| EngineError::internal(e.to_string()))
    }
}

pub(crate) struct QuickJsBinding {
    shared: Rc<Shared>,
    context: RefCell<Option<Context>>,
    runtime: Runtime,
}

impl QuickJsBinding {
    pub(crate) fn new() -> EngineResult<Self> {
        let runtime = Runtime::new().map_err(|e| EngineError::initialization(e.to_string()))?;
        Ok(Self {
            shared: Rc::new(Shared {
                handles: RefCell::new(HandleTable::new()),
                active: RefCell::new(None),
            }),
            context: RefCell::new(None),
            runtime,
        })
    }

    fn with_ctx<R>(&self, f: impl for<'js> FnOnce(&Ctx<'js>) -> EngineResult<R>) -> EngineResult<R> {
        let active = self.shared.active.borrow().clone();
        if let Some(ctx) = active {
            return f(&ctx);
        }

        let context = self
            .context
            .borrow()
            .clone()
            .ok_or_else(|| EngineError::invalid_operation("QuickJS context is not initialized"))?;
        let result = context.with(|ctx| f(&ctx));
        self.run_pending_jobs();
        result
    }

    fn run_pending_jobs(&self) {
        while self.runtime.is_job_pending() {
            if self.runtime.execute_pending_job().is_err() {
                debug!("Pending job threw an exception");
            }
        }
    }
}

impl Drop for QuickJsBinding {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn unknown_handle(handle: NativeValueHandle) -> EngineError {
    EngineError::invalid_argument(format!("unknown value handle {}", handle.id()))
}

fn classify(value: &Value<'_>) -> ValueKind {
    if value.is_undefined() {
        ValueKind::Undefined
    } else if value.is_null() {
        ValueKind::Null
    } else if value.is_bool() {
        ValueKind::Boolean
    } else if value.is_number() {
        ValueKind::Number
    } else if value.is_string() {
        ValueKind::String
    } else if value.is_array() {
        ValueKind::Array
    } else if value.is_function() {
        ValueKind::Function
    } else if value.is_object() {
        ValueKind::Object
    } else {
        ValueKind::Other
    }
}

fn as_object<'js>(value: &Value<'js>) -> EngineResult<Object<'js>> {
    value
        .as_object()
        .cloned()
        .ok_or_else(|| EngineError::type_mismatch("object", classify(value).as_str()))
}

fn as_array<'js>(value: &Value<'js>) -> EngineResult<Array<'js>> {
    value
        .as_array()
        .cloned()
        .ok_or_else(|| EngineError::type_mismatch("array", classify(value).as_str()))
}

fn string_property(object: &Object<'_>, key: &str) -> Option<String> {
    let value: Value = object.get(key).ok()?;
    value.as_string()?.to_string().ok()
}

fn number_property(object: &Object<'_>, key: &str) -> Option<f64> {
    let value: Value = object.get(key).ok()?;
    value.as_number()
}

/// Convert a failed rquickjs call into an engine error, consuming the
/// pending exception.
fn script_error(ctx: &Ctx<'_>, err: rquickjs::Error) -> EngineError {
    if !matches!(err, rquickjs::Error::Exception) {
        return EngineError::internal(err.to_string());
    }
    let thrown = ctx.catch();
    describe_thrown(ctx, &thrown)
}

fn describe_thrown(ctx: &Ctx<'_>, thrown: &Value<'_>) -> EngineError {
    if let Some(object) = thrown.as_object() {
        let name = string_property(object, "name");
        let message = string_property(object, "message");
        if name.is_some() || message.is_some() {
            let stack = string_property(object, "stack");
            let mut file = string_property(object, "fileName");
            let mut line = number_property(object, "lineNumber").map(|n| n as u32);
            let mut column = None;
            if line.is_none() {
                if let Some((f, l, c)) = stack.as_deref().and_then(parse_stack_location) {
                    file = file.or(Some(f));
                    line = Some(l);
                    column = c;
                }
            }
            return EngineError::script_with_location(
                name.unwrap_or_else(|| "Error".to_string()),
                message.unwrap_or_default(),
                file,
                line,
                column,
                stack,
            );
        }
    }

    let message = match thrown.get::<Coerced<String>>() {
        Ok(Coerced(message)) => message,
        Err(_) => {
            ctx.catch();
            "uncaught exception".to_string()
        }
    };
    EngineError::script("Error", message)
}

/// Replace QuickJS's default eval file name with the caller's file name.
fn rename_eval_file(err: EngineError, filename: Option<&str>) -> EngineError {
    match (err, filename) {
        (
            EngineError::Script {
                error_type,
                message,
                file,
                line,
                column,
                stack,
            },
            Some(name),
        ) if file.as_deref().is_none_or(|f| f == EVAL_FILE_NAME) => EngineError::Script {
            error_type,
            message,
            file: Some(name.to_string()),
            line,
            column,
            stack,
        },
        (err, _) => err,
    }
}

fn throw_error(ctx: &Ctx<'_>, err: &EngineError) -> rquickjs::Error {
    match err {
        EngineError::TypeMismatch { .. } | EngineError::InvalidArgument(_) => {
            Exception::throw_type(ctx, &err.to_string())
        }
        EngineError::Script {
            error_type,
            message,
            ..
        } => Exception::throw_message(ctx, &format!("{error_type}: {message}")),
        _ => Exception::throw_message(ctx, &err.to_string()),
    }
}

fn invoke_host<'js>(
    shared: &Rc<Shared>,
    function: &HostFunction,
    ctx: Ctx<'js>,
    args: Vec<Value<'js>>,
) -> rquickjs::Result<Value<'js>> {
    // SAFETY: `Ctx` only differs in its lifetime brand. The stashed copy is
    // taken out again by the guard before this frame returns, so it never
    // outlives the call that produced it.
    let stashed = unsafe { std::mem::transmute::<Ctx<'js>, Ctx<'static>>(ctx.clone()) };
    let previous = shared.active.replace(Some(stashed));
    let _restore = scopeguard::guard(previous, |previous| {
        shared.active.replace(previous);
    });

    let handles = args
        .into_iter()
        .map(|value| shared.store(&ctx, value))
        .collect();
    match function(handles) {
        Ok(Some(handle)) => shared.take(&ctx, handle).map_err(|e| throw_error(&ctx, &e)),
        Ok(None) => Ok(Value::new_undefined(ctx.clone())),
        Err(e) => Err(throw_error(&ctx, &e)),
    }
}

fn make_function<'js>(
    ctx: &Ctx<'js>,
    shared: Rc<Shared>,
    function: HostFunction,
    name: &str,
) -> rquickjs::Result<Function<'js>> {
    Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, args: Rest<Value<'js>>| invoke_host(&shared, &function, ctx, args.0),
    )?
    .with_name(name)
}

impl EngineBinding for QuickJsBinding {
    fn backend(&self) -> Backend {
        Backend::QuickJs
    }

    fn initialize(&self) -> EngineResult<()> {
        STARTUP.call_once(|| debug!("QuickJS backend started"));
        if self.context.borrow().is_some() {
            return Ok(());
        }
        let context =
            Context::full(&self.runtime).map_err(|e| EngineError::initialization(e.to_string()))?;
        *self.context.borrow_mut() = Some(context);
        trace!("QuickJS context created");
        Ok(())
    }

    fn evaluate(&self, source: &str, filename: Option<&str>) -> EngineResult<NativeValueHandle> {
        self.with_ctx(|ctx| {
            let mut options = EvalOptions::default();
            options.strict = false;
            let result: rquickjs::Result<Value> = ctx.eval_with_options(source, options);
            match result {
                Ok(value) => Ok(self.shared.store(ctx, value)),
                Err(e) => Err(rename_eval_file(script_error(ctx, e), filename)),
            }
        })
    }

    fn new_string(&self, value: &str) -> EngineResult<NativeValueHandle> {
        self.with_ctx(|ctx| {
            let string =
                rquickjs::String::from_str(ctx.clone(), value).map_err(|e| script_error(ctx, e))?;
            Ok(self.shared.store(ctx, string.into_value()))
        })
    }

    fn new_number(&self, value: f64) -> EngineResult<NativeValueHandle> {
        self.with_ctx(|ctx| Ok(self.shared.store(ctx, Value::new_number(ctx.clone(), value))))
    }

    fn new_bool(&self, value: bool) -> EngineResult<NativeValueHandle> {
        self.with_ctx(|ctx| Ok(self.shared.store(ctx, Value::new_bool(ctx.clone(), value))))
    }

    fn new_undefined(&self) -> EngineResult<NativeValueHandle> {
        self.with_ctx(|ctx| Ok(self.shared.store(ctx, Value::new_undefined(ctx.clone()))))
    }

    fn new_null(&self) -> EngineResult<NativeValueHandle> {
        self.with_ctx(|ctx| Ok(self.shared.store(ctx, Value::new_null(ctx.clone()))))
    }

    fn new_object(&self) -> EngineResult<NativeValueHandle> {
        self.with_ctx(|ctx| {
            let object = Object::new(ctx.clone()).map_err(|e| script_error(ctx, e))?;
            Ok(self.shared.store(ctx, object.into_value()))
        })
    }

    fn new_array(&self) -> EngineResult<NativeValueHandle> {
        self.with_ctx(|ctx| {
            let array = Array::new(ctx.clone()).map_err(|e| script_error(ctx, e))?;
            Ok(self.shared.store(ctx, array.into_value()))
        })
    }

    fn new_function(&self, name: &str, function: HostFunction) -> EngineResult<NativeValueHandle> {
        let shared = self.shared.clone();
        self.with_ctx(move |ctx| {
            let function =
                make_function(ctx, shared.clone(), function, name).map_err(|e| script_error(ctx, e))?;
            Ok(shared.store(ctx, function.into_value()))
        })
    }

    fn global_object(&self) -> EngineResult<NativeValueHandle> {
        self.with_ctx(|ctx| Ok(self.shared.store(ctx, ctx.globals().into_value())))
    }

    fn kind(&self, value: NativeValueHandle) -> EngineResult<ValueKind> {
        self.with_ctx(|ctx| Ok(classify(&self.shared.load(ctx, value)?)))
    }

    fn coerce_string(&self, value: NativeValueHandle) -> EngineResult<String> {
        self.with_ctx(|ctx| {
            let value = self.shared.load(ctx, value)?;
            value
                .get::<Coerced<String>>()
                .map(|Coerced(s)| s)
                .map_err(|e| script_error(ctx, e))
        })
    }

    fn coerce_number(&self, value: NativeValueHandle) -> EngineResult<f64> {
        self.with_ctx(|ctx| {
            let value = self.shared.load(ctx, value)?;
            value
                .get::<Coerced<f64>>()
                .map(|Coerced(n)| n)
                .map_err(|e| script_error(ctx, e))
        })
    }

    fn coerce_bool(&self, value: NativeValueHandle) -> EngineResult<bool> {
        self.with_ctx(|ctx| {
            let value = self.shared.load(ctx, value)?;
            value
                .get::<Coerced<bool>>()
                .map(|Coerced(b)| b)
                .map_err(|e| script_error(ctx, e))
        })
    }

    fn array_length(&self, array: NativeValueHandle) -> EngineResult<u32> {
        self.with_ctx(|ctx| {
            let array = as_array(&self.shared.load(ctx, array)?)?;
            Ok(array.len() as u32)
        })
    }

    fn array_get(&self, array: NativeValueHandle, index: u32) -> EngineResult<NativeValueHandle> {
        self.with_ctx(|ctx| {
            let array = as_array(&self.shared.load(ctx, array)?)?;
            let element: Value = array
                .get(index as usize)
                .map_err(|e| script_error(ctx, e))?;
            Ok(self.shared.store(ctx, element))
        })
    }

    fn own_property_names(&self, object: NativeValueHandle) -> EngineResult<Vec<String>> {
        self.with_ctx(|ctx| {
            let object = as_object(&self.shared.load(ctx, object)?)?;
            object
                .keys::<String>()
                .collect::<rquickjs::Result<Vec<String>>>()
                .map_err(|e| script_error(ctx, e))
        })
    }

    fn get_property(&self, object: NativeValueHandle, name: &str) -> EngineResult<NativeValueHandle> {
        self.with_ctx(|ctx| {
            let object = as_object(&self.shared.load(ctx, object)?)?;
            let value: Value = object.get(name).map_err(|e| script_error(ctx, e))?;
            Ok(self.shared.store(ctx, value))
        })
    }

    fn set_property(
        &self,
        object: NativeValueHandle,
        name: &str,
        value: NativeValueHandle,
    ) -> EngineResult<()> {
        self.with_ctx(|ctx| {
            let object = as_object(&self.shared.load(ctx, object)?)?;
            let value = self.shared.load(ctx, value)?;
            object.set(name, value).map_err(|e| script_error(ctx, e))
        })
    }

    fn call(
        &self,
        function: NativeValueHandle,
        args: &[NativeValueHandle],
        this: NativeValueHandle,
    ) -> EngineResult<NativeValueHandle> {
        self.with_ctx(|ctx| {
            let callee = self.shared.load(ctx, function)?;
            let function = callee
                .as_function()
                .cloned()
                .ok_or_else(|| EngineError::type_mismatch("function", classify(&callee).as_str()))?;
            let this = self.shared.load(ctx, this)?;
            let args = args
                .iter()
                .map(|handle| self.shared.load(ctx, *handle))
                .collect::<EngineResult<Vec<_>>>()?;

            let result: rquickjs::Result<Value> = function.call((This(this), Rest(args)));
            match result {
                Ok(value) => Ok(self.shared.store(ctx, value)),
                Err(e) => Err(script_error(ctx, e)),
            }
        })
    }

    fn duplicate(&self, value: NativeValueHandle) -> EngineResult<NativeValueHandle> {
        let rooted = self
            .shared
            .handles
            .borrow()
            .get(value)
            .cloned()
            .ok_or_else(|| unknown_handle(value))?;
        Ok(self.shared.handles.borrow_mut().insert(rooted))
    }

    fn release(&self, value: NativeValueHandle) {
        let removed = self.shared.handles.borrow_mut().remove(value);
        drop(removed);
    }

    fn live_handles(&self) -> usize {
        self.shared.handles.borrow().len()
    }

    fn collect_garbage(&self) {
        // The runtime is locked while script is on the stack.
        if self.shared.active.borrow().is_some() {
            trace!("Skipping GC inside a host call");
            return;
        }
        self.runtime.run_gc();
    }

    fn shutdown(&self) {
        let rooted = self.shared.handles.borrow_mut().drain();
        drop(rooted);
        let context = self.context.borrow_mut().take();
        if context.is_some() {
            drop(context);
            self.runtime.run_gc();
            debug!("QuickJS context destroyed");
        }
    }
}
