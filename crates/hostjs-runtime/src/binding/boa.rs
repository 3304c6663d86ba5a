//! Boa backend via `boa_engine`.
//!
//! Boa hands native functions a `&mut Context`. While a host function runs,
//! a pointer to that context is kept so nested operations can use it; the
//! owned context stays borrowed by the top-level operation meanwhile.

use super::{Backend, EngineBinding, HostFunction, ValueKind};
use crate::error::{EngineError, EngineResult, parse_stack_location};
use crate::handle::{HandleTable, NativeValueHandle};
use boa_engine::object::FunctionObjectBuilder;
use boa_engine::object::builtins::JsArray;
use boa_engine::{
    Context, JsError, JsNativeError, JsNativeErrorKind, JsObject, JsResult, JsString, JsValue,
    NativeFunction, Source,
};
use std::cell::{Cell, RefCell};
use std::path::Path;
use std::ptr::NonNull;
use std::rc::Rc;
use std::sync::Once;
use tracing::{debug, trace};

static STARTUP: Once = Once::new();

struct Shared {
    handles: RefCell<HandleTable<JsValue>>,
    /// Context passed to the innermost host function on the stack
    active: Cell<Option<NonNull<Context>>>,
}

impl Shared {
    fn store(&self, value: JsValue) -> NativeValueHandle {
        self.handles.borrow_mut().insert(value)
    }

    fn load(&self, handle: NativeValueHandle) -> EngineResult<JsValue> {
        self.handles
            .borrow()
            .get(handle)
            .cloned()
            .ok_or_else(|| unknown_handle(handle))
    }

    fn take(&self, handle: NativeValueHandle) -> Option<JsValue> {
        self.handles.borrow_mut().remove(handle)
    }
}

pub(crate) struct BoaBinding {
    shared: Rc<Shared>,
    context: RefCell<Option<Context>>,
}

impl BoaBinding {
    pub(crate) fn new() -> Self {
        Self {
            shared: Rc::new(Shared {
                handles: RefCell::new(HandleTable::new()),
                active: Cell::new(None),
            }),
            context: RefCell::new(None),
        }
    }

    fn with_context<R>(&self, f: impl FnOnce(&mut Context) -> EngineResult<R>) -> EngineResult<R> {
        if let Some(mut active) = self.shared.active.get() {
            // SAFETY: set by `invoke_host` from the `&mut Context` boa passed
            // to a native function that is still on the stack, and cleared
            // before that function returns.
            return f(unsafe { active.as_mut() });
        }

        let mut slot = self
            .context
            .try_borrow_mut()
            .map_err(|_| EngineError::internal("Boa context is already borrowed"))?;
        let context = slot
            .as_mut()
            .ok_or_else(|| EngineError::invalid_operation("Boa context is not initialized"))?;
        let result = f(context);
        let _ = context.run_jobs();
        result
    }
}

impl Drop for BoaBinding {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn unknown_handle(handle: NativeValueHandle) -> EngineError {
    EngineError::invalid_argument(format!("unknown value handle {}", handle.id()))
}

fn classify(value: &JsValue) -> ValueKind {
    if value.is_undefined() {
        ValueKind::Undefined
    } else if value.is_null() {
        ValueKind::Null
    } else if value.is_boolean() {
        ValueKind::Boolean
    } else if value.is_number() {
        ValueKind::Number
    } else if value.is_string() {
        ValueKind::String
    } else if let Some(object) = value.as_object() {
        if object.is_array() {
            ValueKind::Array
        } else if object.is_callable() {
            ValueKind::Function
        } else {
            ValueKind::Object
        }
    } else {
        ValueKind::Other
    }
}

fn as_object(value: &JsValue) -> EngineResult<JsObject> {
    value
        .as_object()
        .cloned()
        .ok_or_else(|| EngineError::type_mismatch("object", classify(value).as_str()))
}

fn as_array(value: &JsValue) -> EngineResult<JsObject> {
    match classify(value) {
        ValueKind::Array => as_object(value),
        other => Err(EngineError::type_mismatch("array", other.as_str())),
    }
}

fn string_property(object: &JsObject, key: &str, context: &mut Context) -> Option<String> {
    let value = object.get(JsString::from(key), context).ok()?;
    value.as_string().map(|s| s.to_std_string_escaped())
}

fn script_error(err: JsError, context: &mut Context) -> EngineError {
    // Runtime limit errors are uncatchable and have no script object.
    if let Some(native) = err.as_native() {
        if matches!(native.kind, JsNativeErrorKind::RuntimeLimit) {
            return EngineError::script("RangeError", native.message().to_string());
        }
    }
    let thrown = err.to_opaque(context);
    describe_thrown(&thrown, context)
}

fn describe_thrown(thrown: &JsValue, context: &mut Context) -> EngineError {
    if let Some(object) = thrown.as_object() {
        let name = string_property(&object, "name", context);
        let message = string_property(&object, "message", context);
        if name.is_some() || message.is_some() {
            let stack = string_property(&object, "stack", context);
            let (file, line, column) = match stack.as_deref().and_then(parse_stack_location) {
                Some((file, line, column)) => (Some(file), Some(line), column),
                None => (None, None, None),
            };
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

    let message = thrown
        .to_string(context)
        .map(|s| s.to_std_string_escaped())
        .unwrap_or_else(|_| "uncaught exception".to_string());
    EngineError::script("Error", message)
}

fn to_js_error(err: &EngineError) -> JsError {
    let native = match err {
        EngineError::TypeMismatch { .. } | EngineError::InvalidArgument(_) => JsNativeError::typ(),
        _ => JsNativeError::error(),
    };
    native.with_message(err.to_string()).into()
}

fn invoke_host(
    shared: &Shared,
    function: &HostFunction,
    args: &[JsValue],
    context: &mut Context,
) -> JsResult<JsValue> {
    let handles = args
        .iter()
        .map(|value| shared.store(value.clone()))
        .collect();

    let previous = shared.active.replace(Some(NonNull::from(&mut *context)));
    let _restore = scopeguard::guard(previous, |previous| shared.active.set(previous));

    match function(handles) {
        Ok(Some(handle)) => shared.take(handle).ok_or_else(|| {
            JsNativeError::error()
                .with_message("host function returned an unknown value")
                .into()
        }),
        Ok(None) => Ok(JsValue::undefined()),
        Err(e) => Err(to_js_error(&e)),
    }
}

fn make_function(
    context: &mut Context,
    shared: Rc<Shared>,
    function: HostFunction,
    name: &str,
) -> JsValue {
    // SAFETY: the closure only captures `Rc<Shared>`. Its `JsValue`s live
    // outside the GC heap, so boa_gc's root detection keeps them alive without
    // tracing the closure.
    let native = unsafe {
        NativeFunction::from_closure(move |_this, args, context| {
            invoke_host(&shared, &function, args, context)
        })
    };
    FunctionObjectBuilder::new(context.realm(), native)
        .name(JsString::from(name))
        .length(0)
        .build()
        .into()
}

impl EngineBinding for BoaBinding {
    fn backend(&self) -> Backend {
        Backend::Boa
    }

    fn initialize(&self) -> EngineResult<()> {
        STARTUP.call_once(|| debug!("Boa backend started"));
        if self.context.borrow().is_some() {
            return Ok(());
        }
        let context = Context::builder()
            .build()
            .map_err(|e| EngineError::initialization(e.to_string()))?;
        *self.context.borrow_mut() = Some(context);
        trace!("Boa context created");
        Ok(())
    }

    fn evaluate(&self, source: &str, filename: Option<&str>) -> EngineResult<NativeValueHandle> {
        self.with_context(|context| {
            let result = match filename {
                Some(name) => {
                    context.eval(Source::from_bytes(source).with_path(Path::new(name)))
                }
                None => context.eval(Source::from_bytes(source)),
            };
            match result {
                Ok(value) => Ok(self.shared.store(value)),
                Err(e) => Err(script_error(e, context).with_default_file(filename)),
            }
        })
    }

    fn new_string(&self, value: &str) -> EngineResult<NativeValueHandle> {
        Ok(self.shared.store(JsValue::from(JsString::from(value))))
    }

    fn new_number(&self, value: f64) -> EngineResult<NativeValueHandle> {
        Ok(self.shared.store(JsValue::from(value)))
    }

    fn new_bool(&self, value: bool) -> EngineResult<NativeValueHandle> {
        Ok(self.shared.store(JsValue::from(value)))
    }

    fn new_undefined(&self) -> EngineResult<NativeValueHandle> {
        Ok(self.shared.store(JsValue::undefined()))
    }

    fn new_null(&self) -> EngineResult<NativeValueHandle> {
        Ok(self.shared.store(JsValue::null()))
    }

    fn new_object(&self) -> EngineResult<NativeValueHandle> {
        self.with_context(|context| {
            let object = JsObject::with_object_proto(context.intrinsics());
            Ok(self.shared.store(JsValue::from(object)))
        })
    }

    fn new_array(&self) -> EngineResult<NativeValueHandle> {
        self.with_context(|context| {
            let array = JsArray::new(context);
            Ok(self.shared.store(JsValue::from(array)))
        })
    }

    fn new_function(&self, name: &str, function: HostFunction) -> EngineResult<NativeValueHandle> {
        let shared = self.shared.clone();
        self.with_context(move |context| {
            let function = make_function(context, shared.clone(), function, name);
            Ok(shared.store(function))
        })
    }

    fn global_object(&self) -> EngineResult<NativeValueHandle> {
        self.with_context(|context| Ok(self.shared.store(JsValue::from(context.global_object()))))
    }

    fn kind(&self, value: NativeValueHandle) -> EngineResult<ValueKind> {
        Ok(classify(&self.shared.load(value)?))
    }

    fn coerce_string(&self, value: NativeValueHandle) -> EngineResult<String> {
        let value = self.shared.load(value)?;
        self.with_context(|context| {
            value
                .to_string(context)
                .map(|s| s.to_std_string_escaped())
                .map_err(|e| script_error(e, context))
        })
    }

    fn coerce_number(&self, value: NativeValueHandle) -> EngineResult<f64> {
        let value = self.shared.load(value)?;
        self.with_context(|context| value.to_number(context).map_err(|e| script_error(e, context)))
    }

    fn coerce_bool(&self, value: NativeValueHandle) -> EngineResult<bool> {
        Ok(self.shared.load(value)?.to_boolean())
    }

    fn array_length(&self, array: NativeValueHandle) -> EngineResult<u32> {
        let array = as_array(&self.shared.load(array)?)?;
        self.with_context(|context| {
            let length = array
                .get(JsString::from("length"), context)
                .and_then(|length| length.to_number(context))
                .map_err(|e| script_error(e, context))?;
            Ok(length as u32)
        })
    }

    fn array_get(&self, array: NativeValueHandle, index: u32) -> EngineResult<NativeValueHandle> {
        let array = as_array(&self.shared.load(array)?)?;
        self.with_context(|context| {
            let element = array.get(index, context).map_err(|e| script_error(e, context))?;
            Ok(self.shared.store(element))
        })
    }

    fn own_property_names(&self, object: NativeValueHandle) -> EngineResult<Vec<String>> {
        let value = self.shared.load(object)?;
        as_object(&value)?;
        self.with_context(|context| {
            let object_constructor = context.intrinsics().constructors().object().constructor();
            let keys = object_constructor
                .get(JsString::from("keys"), context)
                .map_err(|e| script_error(e, context))?;
            let keys = keys
                .as_callable()
                .cloned()
                .ok_or_else(|| EngineError::internal("Object.keys is not callable"))?;
            let names = keys
                .call(&JsValue::undefined(), &[value], context)
                .map_err(|e| script_error(e, context))?;
            let names = as_object(&names)?;
            let length = names
                .get(JsString::from("length"), context)
                .and_then(|length| length.to_number(context))
                .map_err(|e| script_error(e, context))? as u32;

            let mut result = Vec::with_capacity(length as usize);
            for index in 0..length {
                let name = names
                    .get(index, context)
                    .and_then(|name| name.to_string(context))
                    .map_err(|e| script_error(e, context))?;
                result.push(name.to_std_string_escaped());
            }
            Ok(result)
        })
    }

    fn get_property(&self, object: NativeValueHandle, name: &str) -> EngineResult<NativeValueHandle> {
        let object = as_object(&self.shared.load(object)?)?;
        self.with_context(|context| {
            let value = object
                .get(JsString::from(name), context)
                .map_err(|e| script_error(e, context))?;
            Ok(self.shared.store(value))
        })
    }

    fn set_property(
        &self,
        object: NativeValueHandle,
        name: &str,
        value: NativeValueHandle,
    ) -> EngineResult<()> {
        let object = as_object(&self.shared.load(object)?)?;
        let value = self.shared.load(value)?;
        self.with_context(|context| {
            object
                .set(JsString::from(name), value, true, context)
                .map(|_| ())
                .map_err(|e| script_error(e, context))
        })
    }

    fn call(
        &self,
        function: NativeValueHandle,
        args: &[NativeValueHandle],
        this: NativeValueHandle,
    ) -> EngineResult<NativeValueHandle> {
        let callee = self.shared.load(function)?;
        let function = callee
            .as_callable()
            .cloned()
            .ok_or_else(|| EngineError::type_mismatch("function", classify(&callee).as_str()))?;
        let this = self.shared.load(this)?;
        let args = args
            .iter()
            .map(|handle| self.shared.load(*handle))
            .collect::<EngineResult<Vec<_>>>()?;

        self.with_context(|context| match function.call(&this, &args, context) {
            Ok(value) => Ok(self.shared.store(value)),
            Err(e) => Err(script_error(e, context)),
        })
    }

    fn duplicate(&self, value: NativeValueHandle) -> EngineResult<NativeValueHandle> {
        let value = self.shared.load(value)?;
        Ok(self.shared.store(value))
    }

    fn release(&self, value: NativeValueHandle) {
        let removed = self.shared.take(value);
        drop(removed);
    }

    fn live_handles(&self) -> usize {
        self.shared.handles.borrow().len()
    }

    fn collect_garbage(&self) {
        boa_gc::force_collect();
    }

    fn shutdown(&self) {
        let values = self.shared.handles.borrow_mut().drain();
        drop(values);
        let context = self.context.borrow_mut().take();
        if context.is_some() {
            drop(context);
            boa_gc::force_collect();
            debug!("Boa context destroyed");
        }
    }
}
