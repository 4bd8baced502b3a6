//! Dynamic path expansion.
//!
//! A dynamic page (`blog/[pagination].tsx`) exports `getStaticPaths`, which
//! returns the parameter sets to render. [`PathExpander`] loads the page
//! module through a [`ModuleLoader`], calls the export and turns each entry
//! into a [`RenderedPath`] with a concrete URL.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BoxError, PagesError};
use crate::paths::to_slash_path;
use crate::route::{route_params, substitute_params};

/// Name of the export that enumerates dynamic paths.
pub const STATIC_PATHS_EXPORT: &str = "getStaticPaths";

/// A concrete path of a dynamic page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderedPath {
    /// Parameter values keyed by placeholder name.
    pub params: BTreeMap<String, String>,
    /// Extra props passed to the page for this path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<Map<String, Value>>,
    /// Route template with parameters substituted.
    pub url: String,
}

/// Request to compile a page module in isolation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleRequest {
    /// Absolute path of the page.
    pub path: PathBuf,
    /// Unique import identity (`<path>?t=<n>`), never reused.
    pub id: String,
}

/// A compiled page module.
#[async_trait]
pub trait PageModule: Send + Sync {
    /// Whether the module has an export with this name.
    fn has_export(&self, name: &str) -> bool;

    /// Call an exported function and return its JSON result.
    async fn call(&self, name: &str) -> Result<Value, BoxError>;
}

/// Compiles and evaluates page modules.
///
/// Implemented by the bundler integration; the registry only sees this trait.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Compile and load the module described by `request`.
    async fn load(&self, request: ModuleRequest) -> Result<Arc<dyn PageModule>, BoxError>;
}

/// Compiled modules keyed by absolute page path.
#[derive(Default)]
pub struct ModuleCache {
    modules: Mutex<HashMap<PathBuf, Arc<dyn PageModule>>>,
}

impl ModuleCache {
    /// Cached module for `path`.
    pub fn get(&self, path: &Path) -> Option<Arc<dyn PageModule>> {
        self.modules.lock().unwrap().get(path).cloned()
    }

    /// Store a module for `path`.
    pub fn insert(&self, path: PathBuf, module: Arc<dyn PageModule>) {
        self.modules.lock().unwrap().insert(path, module);
    }

    /// Drop the module for `path`. Returns `true` if one was cached.
    pub fn invalidate(&self, path: &Path) -> bool {
        self.modules.lock().unwrap().remove(path).is_some()
    }

    /// Drop all modules.
    pub fn clear(&self) {
        self.modules.lock().unwrap().clear();
    }

    /// Number of cached modules.
    pub fn len(&self) -> usize {
        self.modules.lock().unwrap().len()
    }

    /// Whether no module is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Expands dynamic pages into their rendered paths.
pub struct PathExpander {
    loader: Arc<dyn ModuleLoader>,
    cache: ModuleCache,
    counter: AtomicU64,
}

impl PathExpander {
    /// Create an expander backed by `loader`.
    #[must_use]
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            cache: ModuleCache::default(),
            counter: AtomicU64::new(0),
        }
    }

    /// Compiled module cache.
    #[must_use]
    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    /// Drop the compiled module of `path`.
    pub fn invalidate(&self, path: &Path) -> bool {
        self.cache.invalidate(path)
    }

    fn next_request(&self, path: &Path) -> ModuleRequest {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        ModuleRequest {
            path: path.to_path_buf(),
            id: format!("{}?t={n}", to_slash_path(path)),
        }
    }

    async fn module(&self, path: &Path) -> Result<Arc<dyn PageModule>, PagesError> {
        if let Some(module) = self.cache.get(path) {
            return Ok(module);
        }

        let request = self.next_request(path);
        tracing::debug!(id = %request.id, "Loading page module");
        let module = self
            .loader
            .load(request)
            .await
            .map_err(|source| PagesError::Module {
                path: to_slash_path(path),
                source,
            })?;
        self.cache.insert(path.to_path_buf(), Arc::clone(&module));
        Ok(module)
    }

    /// Enumerate the rendered paths of a dynamic page.
    ///
    /// # Errors
    ///
    /// Returns [`PagesError::MissingStaticPaths`] if the module has no
    /// `getStaticPaths` export, [`PagesError::InvalidStaticPaths`] if it
    /// doesn't return a non-empty array of `{ params, props? }` entries, and
    /// [`PagesError::ParamMismatch`] if params don't fit `route`.
    pub async fn expand(
        &self,
        absolute_path: &Path,
        route: &str,
    ) -> Result<Vec<RenderedPath>, PagesError> {
        let page_path = to_slash_path(absolute_path);
        let module = self.module(absolute_path).await?;

        if !module.has_export(STATIC_PATHS_EXPORT) {
            return Err(PagesError::MissingStaticPaths { path: page_path });
        }

        let result = module
            .call(STATIC_PATHS_EXPORT)
            .await
            .map_err(|source| PagesError::Module {
                path: page_path.clone(),
                source,
            })?;

        let entries = match result {
            Value::Array(entries) => entries,
            other => {
                return Err(PagesError::InvalidStaticPaths {
                    path: page_path,
                    message: format!("found {}", json_kind(&other)),
                });
            }
        };
        if entries.is_empty() {
            return Err(PagesError::InvalidStaticPaths {
                path: page_path,
                message: "returned no paths".to_owned(),
            });
        }

        let paths = entries
            .into_iter()
            .map(|entry| rendered_path(&page_path, route, entry))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(path = %page_path, count = paths.len(), "Expanded dynamic page");
        Ok(paths)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn rendered_path(path: &str, route: &str, entry: Value) -> Result<RenderedPath, PagesError> {
    let invalid = |message: String| PagesError::InvalidStaticPaths {
        path: path.to_owned(),
        message,
    };
    let mismatch = |message: String| PagesError::ParamMismatch {
        path: path.to_owned(),
        message,
    };

    let mut entry = match entry {
        Value::Object(entry) => entry,
        other => {
            return Err(invalid(format!(
                "entry must be an object, found {}",
                json_kind(&other)
            )));
        }
    };

    let raw_params = match entry.remove("params") {
        Some(Value::Object(params)) => params,
        None | Some(Value::Null) => Map::new(),
        Some(other) => {
            return Err(invalid(format!("params must be an object, found {}", json_kind(&other))));
        }
    };

    let props = match entry.remove("props") {
        Some(Value::Object(props)) => Some(props),
        None | Some(Value::Null) => None,
        Some(other) => {
            return Err(invalid(format!("props must be an object, found {}", json_kind(&other))));
        }
    };

    let declared = route_params(route);
    let mut params = BTreeMap::new();
    for (key, value) in raw_params {
        let name = key.to_lowercase();
        if !declared.iter().any(|p| p.name == name) {
            let expected: Vec<&str> = declared.iter().map(|p| p.name.as_str()).collect();
            return Err(mismatch(format!(
                "unknown parameter `{key}`, expected one of [{}]",
                expected.join(", ")
            )));
        }
        let value = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => continue,
            other => {
                return Err(mismatch(format!(
                    "parameter `{key}` must be a string, found {}",
                    json_kind(&other)
                )));
            }
        };
        params.insert(name, value);
    }

    let url = substitute_params(route, &params)
        .map_err(|missing| mismatch(format!("missing parameters: {}", missing.join(", "))))?;

    Ok(RenderedPath { params, props, url })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::mock::{MockModule, MockModuleLoader};

    const PAGE: &str = "/site/pages/blog/[pagination].tsx";

    fn expander_with(paths: Value) -> (Arc<MockModuleLoader>, PathExpander) {
        let loader = Arc::new(MockModuleLoader::new().with_static_paths(PAGE, paths));
        let expander = PathExpander::new(Arc::clone(&loader) as Arc<dyn ModuleLoader>);
        (loader, expander)
    }

    #[tokio::test]
    async fn test_expand_blog_pagination() {
        let (_, expander) = expander_with(json!([
            {"params": {"pagination": ""}},
            {"params": {"pagination": 2}},
        ]));

        let paths = expander
            .expand(Path::new(PAGE), "/blog/:pagination?")
            .await
            .unwrap();

        assert_eq!(
            paths.iter().map(|p| p.url.as_str()).collect::<Vec<_>>(),
            vec!["/blog", "/blog/2"]
        );
        assert_eq!(paths[1].params.get("pagination").map(String::as_str), Some("2"));
        assert!(paths[0].props.is_none());
    }

    #[tokio::test]
    async fn test_expand_keeps_props() {
        let (_, expander) = expander_with(json!([
            {"params": {"pagination": "1"}, "props": {"posts": [1, 2]}},
        ]));

        let paths = expander
            .expand(Path::new(PAGE), "/blog/:pagination?")
            .await
            .unwrap();

        assert_eq!(paths[0].props, Some(json!({"posts": [1, 2]}).as_object().unwrap().clone()));
    }

    #[tokio::test]
    async fn test_param_keys_are_case_insensitive() {
        let (_, expander) = expander_with(json!([{"params": {"Pagination": "3"}}]));

        let paths = expander
            .expand(Path::new(PAGE), "/blog/:pagination?")
            .await
            .unwrap();

        assert_eq!(paths[0].url, "/blog/3");
    }

    #[tokio::test]
    async fn test_missing_export_names_page() {
        let loader = Arc::new(MockModuleLoader::new().with_module(PAGE, MockModule::new()));
        let expander = PathExpander::new(loader);

        let err = expander
            .expand(Path::new(PAGE), "/blog/:pagination?")
            .await
            .unwrap_err();

        assert!(matches!(err, PagesError::MissingStaticPaths { ref path } if path == PAGE));
    }

    #[tokio::test]
    async fn test_non_array_result_is_invalid() {
        let (_, expander) = expander_with(json!({"params": {}}));

        let err = expander
            .expand(Path::new(PAGE), "/blog/:pagination?")
            .await
            .unwrap_err();

        assert!(matches!(err, PagesError::InvalidStaticPaths { .. }));
        assert!(err.to_string().contains(PAGE));
    }

    #[tokio::test]
    async fn test_unknown_param_is_mismatch() {
        let (_, expander) = expander_with(json!([{"params": {"page": "2"}}]));

        let err = expander
            .expand(Path::new(PAGE), "/blog/:pagination?")
            .await
            .unwrap_err();

        assert!(matches!(err, PagesError::ParamMismatch { .. }));
    }

    #[tokio::test]
    async fn test_missing_required_param_is_mismatch() {
        let (_, expander) = expander_with(json!([{"params": {"slug": "x"}}]));

        let err = expander
            .expand(Path::new(PAGE), "/:category/:slug?")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("missing parameters: category"));
    }

    #[tokio::test]
    async fn test_loader_error_is_module_error() {
        let expander = PathExpander::new(Arc::new(MockModuleLoader::new()));

        let err = expander
            .expand(Path::new(PAGE), "/blog/:pagination?")
            .await
            .unwrap_err();

        assert!(matches!(err, PagesError::Module { .. }));
    }

    #[tokio::test]
    async fn test_empty_result_is_invalid() {
        let (_, expander) = expander_with(json!([]));

        let err = expander
            .expand(Path::new(PAGE), "/blog/:pagination?")
            .await
            .unwrap_err();

        assert!(
            matches!(err, PagesError::InvalidStaticPaths { ref message, .. } if message == "returned no paths")
        );
    }

    #[tokio::test]
    async fn test_module_is_cached_until_invalidated() {
        let (loader, expander) = expander_with(json!([{"params": {"pagination": "1"}}]));
        let path = Path::new(PAGE);

        expander.expand(path, "/blog/:pagination?").await.unwrap();
        expander.expand(path, "/blog/:pagination?").await.unwrap();
        assert_eq!(loader.requests().len(), 1);

        assert!(expander.invalidate(path));
        expander.expand(path, "/blog/:pagination?").await.unwrap();
        assert_eq!(loader.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_request_ids_strictly_increase() {
        let (loader, expander) = expander_with(json!([{"params": {"pagination": "1"}}]));
        let path = Path::new(PAGE);

        for _ in 0..3 {
            expander.invalidate(path);
            expander.expand(path, "/blog/:pagination?").await.unwrap();
        }

        let ids: Vec<String> = loader.requests().into_iter().map(|r| r.id).collect();
        assert_eq!(
            ids,
            vec![
                format!("{PAGE}?t=1"),
                format!("{PAGE}?t=2"),
                format!("{PAGE}?t=3"),
            ]
        );
    }
}
