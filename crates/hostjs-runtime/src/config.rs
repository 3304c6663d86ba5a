//! Engine configuration and builder.

use crate::app_info::AppInfo;
use crate::binding::Backend;
use crate::engine::ScriptEngine;
use crate::error::{EngineError, EngineResult};
use hostjs_io::{FileSystem, LogSystem, WebRequest};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Serializable engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Script backend to run on
    pub backend: Backend,
    /// Application description exposed as `_appInfo`
    pub app_info: AppInfo,
    /// Base path for the default file system (current directory if unset)
    pub base_path: Option<PathBuf>,
    /// Stack size of the engine thread in bytes (platform default if unset)
    pub thread_stack_size: Option<usize>,
}

impl EngineConfig {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }
}

/// Builder for creating a [`ScriptEngine`] with custom configuration
#[derive(Default)]
pub struct EngineBuilder {
    pub(crate) config: EngineConfig,
    pub(crate) file_system: Option<Arc<dyn FileSystem>>,
    pub(crate) web_request: Option<Arc<dyn WebRequest>>,
    pub(crate) log_system: Option<Arc<dyn LogSystem>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn app_info(mut self, app_info: AppInfo) -> Self {
        self.config.app_info = app_info;
        self
    }

    pub fn base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.config.base_path = Some(base_path.into());
        self
    }

    pub fn thread_stack_size(mut self, size: usize) -> Self {
        self.config.thread_stack_size = Some(size);
        self
    }

    pub fn file_system(mut self, file_system: Arc<dyn FileSystem>) -> Self {
        self.file_system = Some(file_system);
        self
    }

    pub fn web_request(mut self, web_request: Arc<dyn WebRequest>) -> Self {
        self.web_request = Some(web_request);
        self
    }

    pub fn log_system(mut self, log_system: Arc<dyn LogSystem>) -> Self {
        self.log_system = Some(log_system);
        self
    }

    /// Start the engine thread, initialize the backend and install the
    /// script-visible host objects.
    pub fn build(self) -> EngineResult<ScriptEngine> {
        ScriptEngine::start(self)
    }
}
