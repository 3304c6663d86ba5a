//! Direct tests of the backend bindings

use hostjs_runtime::binding::{self, EngineBinding};
use hostjs_runtime::{Backend, EngineError, ValueKind};

fn initialized(backend: Backend) -> Box<dyn EngineBinding> {
    let binding = binding::create(backend).unwrap();
    binding.initialize().unwrap();
    binding
}

#[test]
fn test_global_object_requires_initialization() {
    for backend in Backend::available() {
        let binding = binding::create(backend).unwrap();
        assert!(matches!(
            binding.global_object(),
            Err(EngineError::InvalidOperation(_))
        ));
    }
}

#[test]
fn test_initialize_is_idempotent() {
    for backend in Backend::available() {
        let binding = initialized(backend);
        binding.initialize().unwrap();
        let value = binding.evaluate("1", None).unwrap();
        assert_eq!(binding.coerce_number(value).unwrap(), 1.0);
    }
}

#[test]
fn test_duplicate_and_release() {
    for backend in Backend::available() {
        let binding = initialized(backend);
        let base = binding.live_handles();
        let value = binding.new_string("kept").unwrap();
        let copy = binding.duplicate(value).unwrap();
        assert_ne!(value, copy);
        assert_eq!(binding.live_handles(), base + 2);

        binding.release(value);
        assert_eq!(binding.coerce_string(copy).unwrap(), "kept");
        binding.release(copy);
        binding.release(copy);
        assert_eq!(binding.live_handles(), base);
        assert!(binding.kind(copy).is_err());
    }
}

#[test]
fn test_host_function_receives_arguments() {
    for backend in Backend::available() {
        let binding = initialized(backend);
        let function = binding
            .new_function("count", Box::new(|args| {
                assert_eq!(args.len(), 3);
                Ok(None)
            }))
            .unwrap();
        assert_eq!(binding.kind(function).unwrap(), ValueKind::Function);

        let global = binding.global_object().unwrap();
        binding.set_property(global, "count", function).unwrap();
        let result = binding.evaluate("count(1, 'a', {})", None).unwrap();
        assert_eq!(binding.kind(result).unwrap(), ValueKind::Undefined);
    }
}

#[test]
fn test_shutdown_releases_everything() {
    for backend in Backend::available() {
        let binding = initialized(backend);
        binding.new_object().unwrap();
        binding.new_array().unwrap();
        binding.shutdown();
        assert_eq!(binding.live_handles(), 0);
        assert!(binding.evaluate("1", None).is_err());
    }
}
