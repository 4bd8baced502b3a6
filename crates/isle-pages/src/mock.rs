//! Mock module loader for testing.
//!
//! Provides [`MockModuleLoader`] so dynamic pages can be expanded without a
//! bundler.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BoxError;
use crate::expander::{ModuleLoader, ModuleRequest, PageModule, STATIC_PATHS_EXPORT};

/// In-memory page module whose exports return fixed JSON values.
#[derive(Clone, Debug, Default)]
pub struct MockModule {
    exports: HashMap<String, Value>,
}

impl MockModule {
    /// Create a module without exports.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an export returning `value` when called.
    #[must_use]
    pub fn with_export(mut self, name: impl Into<String>, value: Value) -> Self {
        self.exports.insert(name.into(), value);
        self
    }
}

#[async_trait]
impl PageModule for MockModule {
    fn has_export(&self, name: &str) -> bool {
        self.exports.contains_key(name)
    }

    async fn call(&self, name: &str) -> Result<Value, BoxError> {
        self.exports
            .get(name)
            .cloned()
            .ok_or_else(|| format!("export {name} not found").into())
    }
}

/// Mock loader serving [`MockModule`]s by absolute path.
///
/// Records every [`ModuleRequest`] so tests can assert on cache behavior.
///
/// # Example
///
/// ```ignore
/// use serde_json::json;
/// use isle_pages::MockModuleLoader;
///
/// let loader = MockModuleLoader::new()
///     .with_static_paths("/site/src/pages/blog/[page].tsx", json!([{"params": {"page": "1"}}]));
/// ```
#[derive(Debug, Default)]
pub struct MockModuleLoader {
    modules: RwLock<HashMap<PathBuf, MockModule>>,
    requests: Mutex<Vec<ModuleRequest>>,
}

impl MockModuleLoader {
    /// Create a loader without modules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module for `path`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_module(self, path: impl Into<PathBuf>, module: MockModule) -> Self {
        self.set_module(path, module);
        self
    }

    /// Register a module whose `getStaticPaths` returns `paths`.
    #[must_use]
    pub fn with_static_paths(self, path: impl Into<PathBuf>, paths: Value) -> Self {
        self.set_static_paths(path, paths);
        self
    }

    /// Replace the module for `path`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn set_module(&self, path: impl Into<PathBuf>, module: MockModule) {
        self.modules.write().unwrap().insert(path.into(), module);
    }

    /// Replace the `getStaticPaths` result for `path`.
    pub fn set_static_paths(&self, path: impl Into<PathBuf>, paths: Value) {
        self.set_module(path, MockModule::new().with_export(STATIC_PATHS_EXPORT, paths));
    }

    /// Requests received so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn requests(&self) -> Vec<ModuleRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModuleLoader for MockModuleLoader {
    async fn load(&self, request: ModuleRequest) -> Result<Arc<dyn PageModule>, BoxError> {
        let module = self.modules.read().unwrap().get(&request.path).cloned();
        let path = request.path.display().to_string();
        self.requests.lock().unwrap().push(request);

        match module {
            Some(module) => Ok(Arc::new(module)),
            None => Err(format!("no module registered for {path}").into()),
        }
    }
}
