//! Shared helpers for integration tests

#![allow(dead_code)]

use hostjs_runtime::{
    AppInfo, Backend, Completion, FileSystem, LogLevel, LogSystem, ProviderError, ScriptEngine,
    ServerResponse, StatResult, WebRequest,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub fn app_info() -> AppInfo {
    AppInfo::new("hostjs-tests", "1.0.0").with_application("test-host", "1.0")
}

pub fn engine(backend: Backend) -> ScriptEngine {
    ScriptEngine::builder()
        .backend(backend)
        .app_info(app_info())
        .build()
        .unwrap()
}

/// Run `test` once per compiled-in backend.
pub fn for_each_backend(test: impl Fn(Backend)) {
    for backend in Backend::available() {
        test(backend);
    }
}

/// Forward string renderings of every `name` event to a channel.
pub fn event_channel(engine: &ScriptEngine, name: &str) -> Receiver<Vec<String>> {
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    engine.set_event_callback(name, move |params| {
        let rendered = params.iter().map(|p| p.as_string().unwrap()).collect();
        let _ = tx.lock().send(rendered);
    });
    rx
}

/// In-memory file system. Completes inline, or on a fresh thread when
/// `threaded` is set.
#[derive(Default)]
pub struct MemoryFileSystem {
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub fail: bool,
    pub threaded: bool,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn threaded() -> Self {
        Self {
            threaded: true,
            ..Self::default()
        }
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.files.lock().insert(path.to_string(), content.as_bytes().to_vec());
        self
    }

    fn complete<T: Send + 'static>(&self, result: Result<T, ProviderError>, done: Completion<T>) {
        if self.threaded {
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                done(result)
            });
        } else {
            done(result);
        }
    }

    fn check(&self) -> Result<(), ProviderError> {
        if self.fail {
            Err(ProviderError::other("simulated failure"))
        } else {
            Ok(())
        }
    }
}

impl FileSystem for MemoryFileSystem {
    fn read(&self, path: &str, done: Completion<Vec<u8>>) {
        let result = self.check().and_then(|_| {
            self.files
                .lock()
                .get(path)
                .cloned()
                .ok_or_else(|| ProviderError::other(format!("no such file: {path}")))
        });
        self.complete(result, done);
    }

    fn write(&self, path: &str, data: Vec<u8>, done: Completion<()>) {
        let result = self.check().map(|_| {
            self.files.lock().insert(path.to_string(), data);
        });
        self.complete(result, done);
    }

    fn move_file(&self, from: &str, to: &str, done: Completion<()>) {
        let result = self.check().and_then(|_| {
            let mut files = self.files.lock();
            let data = files
                .remove(from)
                .ok_or_else(|| ProviderError::other(format!("no such file: {from}")))?;
            files.insert(to.to_string(), data);
            Ok(())
        });
        self.complete(result, done);
    }

    fn remove(&self, path: &str, done: Completion<()>) {
        let result = self.check().map(|_| {
            self.files.lock().remove(path);
        });
        self.complete(result, done);
    }

    fn stat(&self, path: &str, done: Completion<StatResult>) {
        let result = self.check().map(|_| {
            let exists = self.files.lock().contains_key(path);
            StatResult {
                exists,
                is_directory: false,
                is_file: exists,
                last_modified: if exists { 1_000 } else { 0 },
            }
        });
        self.complete(result, done);
    }

    fn resolve(&self, path: &str) -> Result<String, ProviderError> {
        Ok(format!("/memory/{path}"))
    }
}

/// Web request stub answering every GET with a fixed response.
pub struct StubWebRequest {
    pub response: Result<ServerResponse, String>,
    pub seen: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl StubWebRequest {
    pub fn ok(body: &str) -> Self {
        Self {
            response: Ok(ServerResponse {
                status_code: 200,
                headers: vec![("content-type".to_string(), "text/plain".to_string())],
                body: body.to_string(),
            }),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl WebRequest for StubWebRequest {
    fn get(&self, url: &str, headers: &[(String, String)], done: Completion<ServerResponse>) {
        self.seen.lock().push((url.to_string(), headers.to_vec()));
        match &self.response {
            Ok(response) => done(Ok(response.clone())),
            Err(message) => done(Err(ProviderError::Http(message.clone()))),
        }
    }
}

/// Log system recording every line.
#[derive(Default)]
pub struct RecordingLog {
    pub lines: Mutex<Vec<(LogLevel, String)>>,
}

impl LogSystem for RecordingLog {
    fn write(&self, level: LogLevel, message: &str, _source: &str) {
        self.lines.lock().push((level, message.to_string()));
    }
}

pub fn install_memory_fs(engine: &ScriptEngine, fs: MemoryFileSystem) -> Arc<MemoryFileSystem> {
    let fs = Arc::new(fs);
    engine.set_file_system(Some(fs.clone())).unwrap();
    fs
}
