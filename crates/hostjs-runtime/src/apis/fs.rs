//! `_fileSystem`
//!
//! Asynchronous file operations report back through a script callback:
//! `read` with `{content, error}`, `stat` with
//! `{exists, isDirectory, isFile, lastModified, error}`, and `write`, `move`
//! and `remove` with an error string that is empty on success. `resolve` is
//! synchronous.

use super::{
    AdapterFn, deliver, engine_of, expect_arg_count, function_arg, install_object, string_arg,
};
use crate::engine::{ScriptEngine, WeakScriptEngine};
use crate::error::EngineResult;
use crate::value::ScriptValue;
use hostjs_io::{Completion, ProviderResult, StatResult};

pub(super) fn install(engine: &ScriptEngine) -> EngineResult<()> {
    let weak = engine.downgrade();
    install_object(
        engine,
        "_fileSystem",
        vec![
            ("read", read(weak.clone())),
            ("write", write(weak.clone())),
            ("move", move_file(weak.clone())),
            ("remove", remove(weak.clone())),
            ("stat", stat(weak.clone())),
            ("resolve", resolve(weak)),
        ],
    )
}

fn read(weak: WeakScriptEngine) -> AdapterFn {
    Box::new(move |args| {
        const METHOD: &str = "_fileSystem.read";
        expect_arg_count(args, 2, METHOD)?;
        let path = string_arg(args, 0, METHOD)?;
        let callback = function_arg(args, 1, METHOD)?;
        let engine = engine_of(&weak)?;

        let weak = weak.clone();
        engine.file_system().read(
            &path,
            Box::new(move |result: ProviderResult<Vec<u8>>| {
                deliver(&weak, callback, METHOD, |engine| {
                    let (content, error) = match result {
                        Ok(bytes) => (String::from_utf8_lossy(&bytes).into_owned(), String::new()),
                        Err(e) => (String::new(), e.to_string()),
                    };
                    let object = engine.new_object()?;
                    object.set_property("content", content)?;
                    object.set_property("error", error)?;
                    Ok(vec![object])
                })
            }),
        );
        Ok(None)
    })
}

fn write(weak: WeakScriptEngine) -> AdapterFn {
    Box::new(move |args| {
        const METHOD: &str = "_fileSystem.write";
        expect_arg_count(args, 3, METHOD)?;
        let path = string_arg(args, 0, METHOD)?;
        let content = string_arg(args, 1, METHOD)?;
        let callback = function_arg(args, 2, METHOD)?;
        let engine = engine_of(&weak)?;

        engine
            .file_system()
            .write(&path, content.into_bytes(), report_error(&weak, callback, METHOD));
        Ok(None)
    })
}

fn move_file(weak: WeakScriptEngine) -> AdapterFn {
    Box::new(move |args| {
        const METHOD: &str = "_fileSystem.move";
        expect_arg_count(args, 3, METHOD)?;
        let from = string_arg(args, 0, METHOD)?;
        let to = string_arg(args, 1, METHOD)?;
        let callback = function_arg(args, 2, METHOD)?;
        let engine = engine_of(&weak)?;

        engine
            .file_system()
            .move_file(&from, &to, report_error(&weak, callback, METHOD));
        Ok(None)
    })
}

fn remove(weak: WeakScriptEngine) -> AdapterFn {
    Box::new(move |args| {
        const METHOD: &str = "_fileSystem.remove";
        expect_arg_count(args, 2, METHOD)?;
        let path = string_arg(args, 0, METHOD)?;
        let callback = function_arg(args, 1, METHOD)?;
        let engine = engine_of(&weak)?;

        engine
            .file_system()
            .remove(&path, report_error(&weak, callback, METHOD));
        Ok(None)
    })
}

fn stat(weak: WeakScriptEngine) -> AdapterFn {
    Box::new(move |args| {
        const METHOD: &str = "_fileSystem.stat";
        expect_arg_count(args, 2, METHOD)?;
        let path = string_arg(args, 0, METHOD)?;
        let callback = function_arg(args, 1, METHOD)?;
        let engine = engine_of(&weak)?;

        let weak = weak.clone();
        engine.file_system().stat(
            &path,
            Box::new(move |result: ProviderResult<StatResult>| {
                deliver(&weak, callback, METHOD, |engine| {
                    let (stat, error) = match result {
                        Ok(stat) => (stat, String::new()),
                        Err(e) => (StatResult::default(), e.to_string()),
                    };
                    let object = engine.new_object()?;
                    object.set_property("exists", stat.exists)?;
                    object.set_property("isDirectory", stat.is_directory)?;
                    object.set_property("isFile", stat.is_file)?;
                    object.set_property("lastModified", stat.last_modified)?;
                    object.set_property("error", error)?;
                    Ok(vec![object])
                })
            }),
        );
        Ok(None)
    })
}

fn resolve(weak: WeakScriptEngine) -> AdapterFn {
    Box::new(move |args| {
        const METHOD: &str = "_fileSystem.resolve";
        expect_arg_count(args, 1, METHOD)?;
        let path = string_arg(args, 0, METHOD)?;
        let engine = engine_of(&weak)?;

        let resolved = engine.file_system().resolve(&path)?;
        Ok(Some(engine.new_value(resolved)?))
    })
}

/// Completion passing the error string, empty on success, to `callback`.
fn report_error(weak: &WeakScriptEngine, callback: ScriptValue, method: &'static str) -> Completion<()> {
    let weak = weak.clone();
    Box::new(move |result: ProviderResult<()>| {
        deliver(&weak, callback, method, |engine| {
            let error = match result {
                Ok(()) => String::new(),
                Err(e) => e.to_string(),
            };
            Ok(vec![engine.new_value(error)?])
        })
    })
}
