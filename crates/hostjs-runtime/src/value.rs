//! Host-side script values
//!
//! A [`ScriptValue`] pairs a native handle with a weak reference to the
//! engine that created it. Every operation runs inside an execution scope of
//! that engine; once the engine is gone they all fail with
//! [`EngineError::EngineUnavailable`].

use crate::binding::{EngineBinding, ValueKind};
use crate::engine::{EngineInner, ScriptEngine};
use crate::error::{EngineError, EngineResult};
use crate::handle::NativeValueHandle;
use crate::scope::ExecutionScope;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use tracing::debug;

pub struct ScriptValue {
    engine: Weak<EngineInner>,
    handle: NativeValueHandle,
}

impl ScriptValue {
    pub(crate) fn new(engine: Weak<EngineInner>, handle: NativeValueHandle) -> Self {
        Self { engine, handle }
    }

    pub fn handle(&self) -> NativeValueHandle {
        self.handle
    }

    /// The owning engine, if it is still alive
    pub fn engine(&self) -> Option<ScriptEngine> {
        self.engine.upgrade().map(|inner| ScriptEngine { inner })
    }

    pub fn belongs_to(&self, engine: &ScriptEngine) -> bool {
        std::ptr::eq(self.engine.as_ptr(), Arc::as_ptr(&engine.inner))
    }

    fn inner(&self) -> EngineResult<Arc<EngineInner>> {
        self.engine.upgrade().ok_or(EngineError::EngineUnavailable)
    }

    fn run<R, F>(&self, op: F) -> EngineResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&dyn EngineBinding, NativeValueHandle) -> EngineResult<R> + Send + 'static,
    {
        let inner = self.inner()?;
        let handle = self.handle;
        ExecutionScope::enter(&inner).run(move |binding| op(binding, handle))
    }

    fn wrap(&self, handle: NativeValueHandle) -> ScriptValue {
        ScriptValue::new(self.engine.clone(), handle)
    }

    /// Hand the native handle over to the binding without queueing a release.
    pub(crate) fn into_handle_for(
        mut self,
        engine: &Weak<EngineInner>,
    ) -> EngineResult<NativeValueHandle> {
        if !Weak::ptr_eq(&self.engine, engine) {
            return Err(EngineError::invalid_argument(
                "value belongs to a different engine",
            ));
        }
        // Dropping a value with a dead engine reference releases nothing.
        self.engine = Weak::new();
        Ok(self.handle)
    }

    pub(crate) fn check_engine(&self, engine: &EngineInner) -> EngineResult<()> {
        if std::ptr::eq(self.engine.as_ptr(), engine) {
            Ok(())
        } else {
            Err(EngineError::invalid_argument(
                "value belongs to a different engine",
            ))
        }
    }

    pub fn kind(&self) -> EngineResult<ValueKind> {
        self.run(|binding, handle| binding.kind(handle))
    }

    pub fn is_undefined(&self) -> EngineResult<bool> {
        Ok(self.kind()? == ValueKind::Undefined)
    }

    pub fn is_null(&self) -> EngineResult<bool> {
        Ok(self.kind()? == ValueKind::Null)
    }

    pub fn is_boolean(&self) -> EngineResult<bool> {
        Ok(self.kind()? == ValueKind::Boolean)
    }

    pub fn is_number(&self) -> EngineResult<bool> {
        Ok(self.kind()? == ValueKind::Number)
    }

    pub fn is_string(&self) -> EngineResult<bool> {
        Ok(self.kind()? == ValueKind::String)
    }

    /// True for plain objects, arrays and functions
    pub fn is_object(&self) -> EngineResult<bool> {
        Ok(self.kind()?.is_object())
    }

    pub fn is_array(&self) -> EngineResult<bool> {
        Ok(self.kind()? == ValueKind::Array)
    }

    pub fn is_function(&self) -> EngineResult<bool> {
        Ok(self.kind()? == ValueKind::Function)
    }

    /// String coercion, as `String(value)` in script
    pub fn as_string(&self) -> EngineResult<String> {
        self.run(|binding, handle| binding.coerce_string(handle))
    }

    pub fn as_number(&self) -> EngineResult<f64> {
        self.run(|binding, handle| binding.coerce_number(handle))
    }

    /// Numeric coercion truncated toward zero. NaN becomes 0 and values
    /// outside the `i64` range saturate.
    pub fn as_int(&self) -> EngineResult<i64> {
        Ok(self.as_number()? as i64)
    }

    /// Truthiness
    pub fn as_bool(&self) -> EngineResult<bool> {
        self.run(|binding, handle| binding.coerce_bool(handle))
    }

    /// Elements of an array, in index order.
    pub fn as_list(&self) -> EngineResult<Vec<ScriptValue>> {
        let handles = self.run(|binding, handle| {
            let kind = binding.kind(handle)?;
            if kind != ValueKind::Array {
                return Err(EngineError::type_mismatch("array", kind.as_str()));
            }
            let length = binding.array_length(handle)?;
            let mut items = Vec::with_capacity(length as usize);
            for index in 0..length {
                match binding.array_get(handle, index) {
                    Ok(item) => items.push(item),
                    Err(e) => {
                        for item in items {
                            binding.release(item);
                        }
                        return Err(e);
                    }
                }
            }
            Ok(items)
        })?;
        Ok(handles.into_iter().map(|handle| self.wrap(handle)).collect())
    }

    /// Own enumerable property names.
    pub fn own_property_names(&self) -> EngineResult<Vec<String>> {
        self.run(|binding, handle| {
            expect_object(binding, handle)?;
            binding.own_property_names(handle)
        })
    }

    /// Read a property; undefined if absent.
    pub fn get_property(&self, name: &str) -> EngineResult<ScriptValue> {
        let name = name.to_string();
        self.run(move |binding, handle| {
            expect_object(binding, handle)?;
            binding.get_property(handle, &name)
        })
        .map(|handle| self.wrap(handle))
    }

    /// Assign a property from a primitive or another value of this engine.
    pub fn set_property(&self, name: &str, value: impl Into<PropertyValue>) -> EngineResult<()> {
        let inner = self.inner()?;
        let value = value.into();
        value.check_engine(&inner)?;
        let name = name.to_string();
        self.run(move |binding, handle| {
            expect_object(binding, handle)?;
            value.with_handle(binding, |value| binding.set_property(handle, &name, value))
        })
    }

    /// Name of the object's constructor, `"Object"` when it has none.
    pub fn class_name(&self) -> EngineResult<String> {
        self.run(|binding, handle| {
            expect_object(binding, handle)?;
            let constructor = binding.get_property(handle, "constructor")?;
            let name = match binding.kind(constructor)? {
                ValueKind::Function => match binding.get_property(constructor, "name") {
                    Ok(name) => {
                        let text = binding.coerce_string(name);
                        binding.release(name);
                        text.ok().filter(|text| !text.is_empty())
                    }
                    Err(_) => None,
                },
                _ => None,
            };
            binding.release(constructor);
            Ok(name.unwrap_or_else(|| "Object".to_string()))
        })
    }

    /// Call this value as a function.
    ///
    /// `this` defaults to the global object. Arguments must belong to the
    /// same engine.
    pub fn call(&self, args: &[ScriptValue], this: Option<&ScriptValue>) -> EngineResult<ScriptValue> {
        let inner = self.inner()?;
        for arg in args.iter().chain(this) {
            arg.check_engine(&inner)?;
        }
        // The caller's values stay rooted while this blocks on the job.
        let handles: Vec<NativeValueHandle> = args.iter().map(ScriptValue::handle).collect();
        let this = this.map(ScriptValue::handle);
        inner.stats().calls.fetch_add(1, Ordering::Relaxed);

        let result = self.run(move |binding, function| {
            let kind = binding.kind(function)?;
            if kind != ValueKind::Function {
                return Err(EngineError::type_mismatch("function", kind.as_str()));
            }
            match this {
                Some(this) => {
                    expect_object(binding, this)?;
                    binding.call(function, &handles, this)
                }
                None => {
                    let global = binding.global_object()?;
                    let result = binding.call(function, &handles, global);
                    binding.release(global);
                    result
                }
            }
        });
        if let Err(e) = &result {
            if e.is_script_error() {
                inner.stats().script_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
        result.map(|handle| self.wrap(handle))
    }
}

fn expect_object(binding: &dyn EngineBinding, handle: NativeValueHandle) -> EngineResult<()> {
    let kind = binding.kind(handle)?;
    if kind.is_object() {
        Ok(())
    } else {
        Err(EngineError::type_mismatch("object", kind.as_str()))
    }
}

impl Clone for ScriptValue {
    /// Duplicates the native handle. A value whose engine is gone, or whose
    /// handle the engine no longer knows, clones into a dead value.
    fn clone(&self) -> Self {
        let duplicate = self
            .inner()
            .and_then(|inner| {
                let handle = self.handle;
                ExecutionScope::enter(&inner).run(move |binding| binding.duplicate(handle))
            });
        match duplicate {
            Ok(handle) => self.wrap(handle),
            Err(e) => {
                if !e.is_engine_unavailable() {
                    debug!(handle = self.handle.id(), error = %e, "Failed to duplicate value");
                }
                ScriptValue::new(Weak::new(), self.handle)
            }
        }
    }
}

impl Drop for ScriptValue {
    fn drop(&mut self) {
        if let Some(inner) = self.engine.upgrade() {
            inner.releases.push(self.handle);
        }
    }
}

impl fmt::Debug for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptValue")
            .field("handle", &self.handle.id())
            .field("alive", &(self.engine.strong_count() > 0))
            .finish()
    }
}

/// Host value convertible into a script primitive
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
}

impl Primitive {
    pub(crate) fn create(&self, binding: &dyn EngineBinding) -> EngineResult<NativeValueHandle> {
        match self {
            Primitive::String(value) => binding.new_string(value),
            Primitive::Integer(value) => binding.new_number(*value as f64),
            Primitive::Number(value) => binding.new_number(*value),
            Primitive::Boolean(value) => binding.new_bool(*value),
        }
    }
}

macro_rules! impl_primitive_from {
    ($($ty:ty => $variant:ident($conv:expr)),* $(,)?) => {
        $(
            impl From<$ty> for Primitive {
                fn from(value: $ty) -> Self {
                    Primitive::$variant($conv(value))
                }
            }

            impl From<$ty> for PropertyValue {
                fn from(value: $ty) -> Self {
                    PropertyValue::Primitive(Primitive::from(value))
                }
            }
        )*
    };
}

impl_primitive_from! {
    String => String(|v| v),
    &str => String(|v: &str| v.to_string()),
    &String => String(|v: &String| v.clone()),
    i64 => Integer(|v| v),
    i32 => Integer(i64::from),
    u32 => Integer(i64::from),
    f64 => Number(|v| v),
    bool => Boolean(|v| v),
}

/// Right-hand side of a property assignment
#[derive(Debug)]
pub enum PropertyValue {
    Primitive(Primitive),
    Value(ScriptValue),
}

impl PropertyValue {
    pub(crate) fn check_engine(&self, engine: &EngineInner) -> EngineResult<()> {
        match self {
            PropertyValue::Primitive(_) => Ok(()),
            PropertyValue::Value(value) => value.check_engine(engine),
        }
    }

    /// Pass a native handle for this value to `f`. Primitives get a
    /// temporary handle released afterwards.
    pub(crate) fn with_handle<R>(
        &self,
        binding: &dyn EngineBinding,
        f: impl FnOnce(NativeValueHandle) -> EngineResult<R>,
    ) -> EngineResult<R> {
        match self {
            PropertyValue::Value(value) => f(value.handle),
            PropertyValue::Primitive(primitive) => {
                let handle = primitive.create(binding)?;
                let result = f(handle);
                binding.release(handle);
                result
            }
        }
    }
}

impl From<Primitive> for PropertyValue {
    fn from(value: Primitive) -> Self {
        PropertyValue::Primitive(value)
    }
}

impl From<ScriptValue> for PropertyValue {
    fn from(value: ScriptValue) -> Self {
        PropertyValue::Value(value)
    }
}

impl From<&ScriptValue> for PropertyValue {
    fn from(value: &ScriptValue) -> Self {
        PropertyValue::Value(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_conversions() {
        assert_eq!(Primitive::from("a"), Primitive::String("a".into()));
        assert_eq!(Primitive::from(3), Primitive::Integer(3));
        assert_eq!(Primitive::from(2.5), Primitive::Number(2.5));
        assert_eq!(Primitive::from(true), Primitive::Boolean(true));
    }

    #[test]
    fn test_property_value_from_primitive() {
        let value = PropertyValue::from("x");
        assert!(matches!(value, PropertyValue::Primitive(Primitive::String(ref s)) if s == "x"));
    }

    #[test]
    fn test_dead_value_is_unavailable() {
        let handle = crate::handle::HandleTable::new().insert(());
        let value = ScriptValue::new(Weak::new(), handle);
        assert!(value.kind().unwrap_err().is_engine_unavailable());
        assert!(value.engine().is_none());
        let copy = value.clone();
        assert!(copy.as_string().unwrap_err().is_engine_unavailable());
    }

    #[test]
    fn test_clone_of_released_handle_is_detached() {
        for backend in crate::binding::Backend::available() {
            let engine = ScriptEngine::builder().backend(backend).build().unwrap();
            let value = engine.new_value("x").unwrap();
            let stale = ScriptValue::new(Arc::downgrade(&engine.inner), value.handle());
            drop(value);
            engine.live_handles().unwrap();

            let copy = stale.clone();
            assert!(!copy.belongs_to(&engine));
            assert!(stale.as_string().is_err());
            assert_eq!(engine.evaluate("1").unwrap().as_int().unwrap(), 1);
        }
    }
}
