//! Virtual modules served to the bundler.
//!
//! Sources are generated from the registry on first load and cached until
//! [`VirtualModules::clear`] (a full reload) or
//! [`VirtualModules::invalidate`].

use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::error::PagesError;
use crate::page::{Route, SpecificRouteProps};
use crate::registry::PageRegistry;

/// Id of the routes module.
pub const ROUTES_ID: &str = "virtual:isle/routes";

/// Id of the route data module.
pub const ROUTE_DATA_ID: &str = "virtual:isle/route-data";

/// Resolver picking the entry with the most matching params.
const PROPS_RESOLVER: &str = r"function propsFor(path, params) {
  let best = {};
  let bestSize = -1;
  for (const entry of specificProps[path] || []) {
    const keys = Object.keys(entry.matches);
    if (keys.length > bestSize && keys.every((key) => params[key] === entry.matches[key])) {
      best = entry.props;
      bestSize = keys.length;
    }
  }
  return { ...params, ...best };
}
";

/// Generator and cache for the routes and route data modules.
pub struct VirtualModules {
    registry: Arc<PageRegistry>,
    routes: Mutex<Option<String>>,
    route_data: Mutex<Option<String>>,
}

impl VirtualModules {
    /// Create modules backed by `registry`.
    #[must_use]
    pub fn new(registry: Arc<PageRegistry>) -> Self {
        Self {
            registry,
            routes: Mutex::new(None),
            route_data: Mutex::new(None),
        }
    }

    /// Backing registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<PageRegistry> {
        &self.registry
    }

    /// Source of the module with `id`, or `None` for ids not served here.
    ///
    /// # Errors
    ///
    /// Returns an error if the route table can't be built.
    pub async fn load(&self, id: &str) -> Result<Option<String>, PagesError> {
        match id {
            ROUTES_ID => self.routes_module().await.map(Some),
            ROUTE_DATA_ID => self.route_data_module().await.map(Some),
            _ => Ok(None),
        }
    }

    /// Source of [`ROUTES_ID`].
    ///
    /// # Errors
    ///
    /// Returns an error if the `extendRoutes` hook fails.
    pub async fn routes_module(&self) -> Result<String, PagesError> {
        let cached = self.routes.lock().unwrap().clone();
        if let Some(source) = cached {
            return Ok(source);
        }

        let routes = self.registry.extended_routes().await?;
        let props = self.registry.specific_route_props(&routes);
        let source = render_routes_module(&routes, &props)?;
        tracing::debug!(routes = routes.len(), "Generated routes module");

        *self.routes.lock().unwrap() = Some(source.clone());
        Ok(source)
    }

    /// Source of [`ROUTE_DATA_ID`].
    ///
    /// # Errors
    ///
    /// Returns an error if the `extendRoutes` hook fails.
    pub async fn route_data_module(&self) -> Result<String, PagesError> {
        let cached = self.route_data.lock().unwrap().clone();
        if let Some(source) = cached {
            return Ok(source);
        }

        let routes = self.registry.extended_routes().await?;
        let source = format!("export default {};\n", serde_json::to_string(&routes)?);

        *self.route_data.lock().unwrap() = Some(source.clone());
        Ok(source)
    }

    /// Drop the cached source of `id`.
    pub fn invalidate(&self, id: &str) -> bool {
        let slot = match id {
            ROUTES_ID => &self.routes,
            ROUTE_DATA_ID => &self.route_data,
            _ => return false,
        };
        slot.lock().unwrap().take().is_some()
    }

    /// Drop both cached sources.
    pub fn clear(&self) {
        self.routes.lock().unwrap().take();
        self.route_data.lock().unwrap().take();
    }
}

fn js_string(value: &str) -> String {
    Value::String(value.to_owned()).to_string()
}

fn render_routes_module(
    routes: &[Route],
    props: &SpecificRouteProps,
) -> Result<String, PagesError> {
    let mut out = format!(
        "const specificProps = {};\n\n{PROPS_RESOLVER}\nexport default [\n",
        serde_json::to_string(props)?
    );

    for route in routes {
        let path = js_string(&route.path);
        // Writing to a String is infallible
        let _ = writeln!(
            out,
            "  {{ path: {path}, name: {name}, component: () => import({import}), props: (params) => propsFor({path}, params) }},",
            name = js_string(&route.component_name),
            import = js_string(&route.import_path),
        );
    }

    out.push_str("];\n");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use isle_config::PagesConfig;
    use isle_storage::{MockStorage, Storage};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::mock::MockModuleLoader;

    fn modules() -> (Arc<MockStorage>, VirtualModules) {
        let storage = Arc::new(
            MockStorage::new()
                .with_file("/site/pages/index.md", "")
                .with_file("/site/pages/posts/[slug].vue", ""),
        );
        let loader = MockModuleLoader::new().with_static_paths(
            "/site/pages/posts/[slug].vue",
            json!([{"params": {"slug": "hello"}, "props": {"title": "Hello"}}]),
        );
        let config = PagesConfig {
            root: PathBuf::from("/site"),
            pages_dir: PathBuf::from("/site/pages"),
            extensions: vec!["md".to_owned(), "vue".to_owned()],
            ..PagesConfig::default()
        };
        let registry = PageRegistry::builder(
            config,
            Arc::clone(&storage) as Arc<dyn Storage>,
            Arc::new(loader),
        )
        .build();
        (storage, VirtualModules::new(Arc::new(registry)))
    }

    #[tokio::test]
    async fn test_routes_module() {
        let (_, modules) = modules();
        modules.registry().scan().await.unwrap();

        let source = modules.routes_module().await.unwrap();

        assert!(source.starts_with(
            r#"const specificProps = {"/posts/:slug?":[{"matches":{"slug":"hello"},"props":{"title":"Hello"}}]};"#
        ));
        assert!(source.contains("function propsFor(path, params)"));
        assert!(source.contains(
            r#"  { path: "/", name: "Index", component: () => import("/site/pages/index.md"), props: (params) => propsFor("/", params) },"#
        ));
        assert!(source.contains(r#"name: "PostsDynamicSlug""#));
        assert!(source.ends_with("];\n"));
    }

    #[tokio::test]
    async fn test_route_data_module() {
        let (_, modules) = modules();
        modules.registry().scan().await.unwrap();

        let source = modules.load(ROUTE_DATA_ID).await.unwrap().unwrap();

        let json = source
            .strip_prefix("export default ")
            .and_then(|s| s.strip_suffix(";\n"))
            .unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(json).unwrap(),
            json!([
                {"path": "/", "componentName": "Index", "importPath": "/site/pages/index.md"},
                {
                    "path": "/posts/:slug?",
                    "componentName": "PostsDynamicSlug",
                    "importPath": "/site/pages/posts/[slug].vue"
                },
            ])
        );
    }

    #[tokio::test]
    async fn test_sources_are_cached_until_cleared() {
        let (storage, modules) = modules();
        modules.registry().scan().await.unwrap();
        let before = modules.routes_module().await.unwrap();

        storage.set_file("/site/pages/about.md", "");
        modules
            .registry()
            .add_page(&PathBuf::from("/site/pages/about.md"))
            .await
            .unwrap();
        assert_eq!(modules.routes_module().await.unwrap(), before);

        assert!(modules.invalidate(ROUTES_ID));
        assert!(!modules.invalidate(ROUTES_ID));
        assert!(modules.routes_module().await.unwrap().contains(r#""/about""#));

        modules.route_data_module().await.unwrap();
        modules.clear();
        assert!(!modules.invalidate(ROUTES_ID));
        assert!(!modules.invalidate(ROUTE_DATA_ID));
    }

    #[tokio::test]
    async fn test_load_unknown_id() {
        let (_, modules) = modules();

        assert_eq!(modules.load("virtual:other").await.unwrap(), None);
        assert!(!modules.invalidate("virtual:other"));
    }
}
