//! Integration tests for the `_fileSystem` host object

mod common;

use common::{MemoryFileSystem, TIMEOUT, engine, event_channel, for_each_backend, install_memory_fs};
use hostjs_runtime::ScriptEngine;

fn throws_type_error(engine: &ScriptEngine, call: &str) -> bool {
    let source = format!("try {{ {call}; false }} catch (e) {{ e instanceof TypeError }}");
    engine.evaluate(&source).unwrap().as_bool().unwrap()
}

#[test]
fn test_write_success_reports_empty_error() {
    for_each_backend(|backend| {
        let engine = engine(backend);
        let fs = install_memory_fs(&engine, MemoryFileSystem::new());
        engine
            .evaluate("var result = null; _fileSystem.write('f', 'data', function (e) { result = e; })")
            .unwrap();
        assert_eq!(engine.evaluate("result").unwrap().as_string().unwrap(), "");
        assert_eq!(fs.files.lock().get("f").unwrap(), b"data");
    });
}

#[test]
fn test_write_failure_reports_error_string() {
    for_each_backend(|backend| {
        let engine = engine(backend);
        install_memory_fs(&engine, MemoryFileSystem::failing());
        engine
            .evaluate("var result = null; _fileSystem.write('f', 'data', function (e) { result = e; })")
            .unwrap();
        let result = engine.evaluate("result").unwrap().as_string().unwrap();
        assert!(result.contains("simulated failure"), "{backend}: {result}");
    });
}

#[test]
fn test_read_delivers_content() {
    for_each_backend(|backend| {
        let engine = engine(backend);
        install_memory_fs(&engine, MemoryFileSystem::new().with_file("notes.txt", "hello"));
        engine
            .evaluate("var read = null; _fileSystem.read('notes.txt', function (r) { read = r; })")
            .unwrap();
        assert_eq!(engine.evaluate("read.content").unwrap().as_string().unwrap(), "hello");
        assert_eq!(engine.evaluate("read.error").unwrap().as_string().unwrap(), "");

        engine
            .evaluate("_fileSystem.read('missing.txt', function (r) { read = r; })")
            .unwrap();
        assert_eq!(engine.evaluate("read.content").unwrap().as_string().unwrap(), "");
        assert!(!engine.evaluate("read.error").unwrap().as_string().unwrap().is_empty());
    });
}

#[test]
fn test_move_remove_and_stat() {
    for_each_backend(|backend| {
        let engine = engine(backend);
        let fs = install_memory_fs(&engine, MemoryFileSystem::new().with_file("a", "1"));
        engine
            .evaluate(
                "var log = [];
                 _fileSystem.move('a', 'b', function (e) { log.push('move:' + e); });
                 _fileSystem.stat('b', function (s) { log.push('stat:' + s.exists + ':' + s.isFile + ':' + s.lastModified); });
                 _fileSystem.remove('b', function (e) { log.push('remove:' + e); });
                 _fileSystem.stat('b', function (s) { log.push('stat:' + s.exists); });",
            )
            .unwrap();
        let log = engine.evaluate("log.join('|')").unwrap().as_string().unwrap();
        assert_eq!(log, "move:|stat:true:true:1000|remove:|stat:false");
        assert!(fs.files.lock().is_empty());
    });
}

#[test]
fn test_resolve_is_synchronous() {
    for_each_backend(|backend| {
        let engine = engine(backend);
        install_memory_fs(&engine, MemoryFileSystem::new());
        let resolved = engine.evaluate("_fileSystem.resolve('data.json')").unwrap();
        assert_eq!(resolved.as_string().unwrap(), "/memory/data.json");
    });
}

#[test]
fn test_wrong_arguments_throw() {
    for_each_backend(|backend| {
        let engine = engine(backend);
        install_memory_fs(&engine, MemoryFileSystem::new());
        assert!(throws_type_error(&engine, "_fileSystem.read('x')"));
        assert!(throws_type_error(&engine, "_fileSystem.read(1, function () {})"));
        assert!(throws_type_error(&engine, "_fileSystem.read('x', 'not a function')"));
        assert!(throws_type_error(&engine, "_fileSystem.write('x', 'y')"));
        assert!(throws_type_error(&engine, "_fileSystem.move('x', 2, function () {})"));
        assert!(throws_type_error(&engine, "_fileSystem.resolve()"));
        assert_eq!(engine.evaluate("'still alive'").unwrap().as_string().unwrap(), "still alive");

        let err = engine.evaluate("_fileSystem.read('x')").unwrap_err();
        assert!(err.to_string().contains("requires 2 parameters"), "{err}");
    });
}

#[test]
fn test_completion_on_another_thread() {
    for_each_backend(|backend| {
        let engine = engine(backend);
        install_memory_fs(&engine, MemoryFileSystem::threaded());
        let done = event_channel(&engine, "written");
        engine
            .evaluate("_fileSystem.write('f', 'data', function (e) { _triggerEvent('written', e, 'ok'); })")
            .unwrap();
        let params = done.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(params, vec!["".to_string(), "ok".to_string()]);
    });
}

#[test]
fn test_default_file_system_with_base_path() {
    for_each_backend(|backend| {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptEngine::builder()
            .backend(backend)
            .app_info(common::app_info())
            .base_path(dir.path())
            .build()
            .unwrap();
        let written = event_channel(&engine, "written");
        let read = event_channel(&engine, "read");

        engine
            .evaluate("_fileSystem.write('out.txt', 'persisted', function (e) { _triggerEvent('written', e); })")
            .unwrap();
        assert_eq!(written.recv_timeout(TIMEOUT).unwrap(), vec![String::new()]);
        assert_eq!(std::fs::read_to_string(dir.path().join("out.txt")).unwrap(), "persisted");

        engine
            .evaluate("_fileSystem.read('out.txt', function (r) { _triggerEvent('read', r.content, r.error); })")
            .unwrap();
        assert_eq!(
            read.recv_timeout(TIMEOUT).unwrap(),
            vec!["persisted".to_string(), String::new()]
        );

        let resolved = engine.evaluate("_fileSystem.resolve('out.txt')").unwrap();
        assert_eq!(
            resolved.as_string().unwrap(),
            dir.path().join("out.txt").to_string_lossy()
        );
    });
}
