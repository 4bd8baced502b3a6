//! Page registry.
//!
//! Maps absolute page paths to [`Page`]s and keeps the route table valid:
//! every route and every component name belongs to exactly one page.
//!
//! # Architecture
//!
//! Building a page is async (storage reads, module compilation, hooks) and
//! happens without holding the registry lock. The page is then inserted
//! (last write wins) and the whole registry is validated against the
//! current snapshot.
//!
//! In [`Mode::Dev`], frontmatter failures degrade to base frontmatter and
//! [`scan`](PageRegistry::scan) logs broken pages instead of failing. The
//! failure stays readable through
//! [`frontmatter_error`](PageRegistry::frontmatter_error) until the page
//! builds cleanly.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use isle_config::{Config, Mode, PagesConfig};
use isle_meta::FrontmatterCache;
use isle_storage::Storage;
use serde_json::{Map, Value};

use crate::component_name::create_component_name;
use crate::error::{BoxError, PagesError};
use crate::expander::{ModuleLoader, PathExpander};
use crate::frontmatter::{
    FrontmatterHook, PageFrontmatter, extract_frontmatter, normalize_frontmatter,
    timestamp_from_mtime,
};
use crate::page::{Page, PageUpdate, Route, RouteProps, SpecificRouteProps};
use crate::paths::{extension, to_slash_path};
use crate::route::{RouteOptions, derive_route};

/// Characters that may not appear in page paths.
const DISALLOWED_CHARS: &[char] = &['?', '#', ':', '*', '%', '"', '<', '>', '|'];

/// Convert Duration to milliseconds as f64.
fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Hook to filter, reorder or append to the exported route table.
#[async_trait]
pub trait ExtendRoutesHook: Send + Sync {
    /// Return the routes to export, or `None` to keep `routes` as is.
    async fn extend(&self, routes: Vec<Route>) -> Result<Option<Vec<Route>>, BoxError>;
}

/// Builder for [`PageRegistry`].
pub struct PageRegistryBuilder {
    config: PagesConfig,
    storage: Arc<dyn Storage>,
    loader: Arc<dyn ModuleLoader>,
    mode: Mode,
    frontmatter_hook: Option<Arc<dyn FrontmatterHook>>,
    routes_hook: Option<Arc<dyn ExtendRoutesHook>>,
}

impl PageRegistryBuilder {
    /// Set the run mode.
    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the `extendFrontmatter` hook.
    #[must_use]
    pub fn frontmatter_hook(mut self, hook: Arc<dyn FrontmatterHook>) -> Self {
        self.frontmatter_hook = Some(hook);
        self
    }

    /// Set the `extendRoutes` hook.
    #[must_use]
    pub fn routes_hook(mut self, hook: Arc<dyn ExtendRoutesHook>) -> Self {
        self.routes_hook = Some(hook);
        self
    }

    /// Build an empty registry.
    #[must_use]
    pub fn build(self) -> PageRegistry {
        PageRegistry {
            route_options: RouteOptions::from_config(&self.config),
            config: self.config,
            mode: self.mode,
            storage: self.storage,
            expander: PathExpander::new(self.loader),
            frontmatter_cache: FrontmatterCache::new(),
            frontmatter_hook: self.frontmatter_hook,
            routes_hook: self.routes_hook,
            pages: RwLock::new(BTreeMap::new()),
            frontmatter_errors: RwLock::new(BTreeMap::new()),
        }
    }
}

/// Registry of discovered pages.
pub struct PageRegistry {
    config: PagesConfig,
    route_options: RouteOptions,
    mode: Mode,
    storage: Arc<dyn Storage>,
    expander: PathExpander,
    frontmatter_cache: FrontmatterCache,
    frontmatter_hook: Option<Arc<dyn FrontmatterHook>>,
    routes_hook: Option<Arc<dyn ExtendRoutesHook>>,
    /// Pages keyed by absolute forward-slash path.
    pages: RwLock<BTreeMap<String, Page>>,
    /// Dev-mode frontmatter failures, same keys as `pages`.
    frontmatter_errors: RwLock<BTreeMap<String, String>>,
}

impl PageRegistry {
    /// Start building a registry.
    #[must_use]
    pub fn builder(
        config: PagesConfig,
        storage: Arc<dyn Storage>,
        loader: Arc<dyn ModuleLoader>,
    ) -> PageRegistryBuilder {
        PageRegistryBuilder {
            config,
            storage,
            loader,
            mode: Mode::default(),
            frontmatter_hook: None,
            routes_hook: None,
        }
    }

    /// Registry for a loaded [`Config`], using its mode.
    #[must_use]
    pub fn from_config(
        config: &Config,
        storage: Arc<dyn Storage>,
        loader: Arc<dyn ModuleLoader>,
    ) -> Self {
        Self::builder(config.pages_resolved.clone(), storage, loader)
            .mode(config.mode)
            .build()
    }

    /// Pages configuration.
    #[must_use]
    pub fn config(&self) -> &PagesConfig {
        &self.config
    }

    /// Run mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Page source storage.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Dynamic path expander.
    #[must_use]
    pub fn expander(&self) -> &PathExpander {
        &self.expander
    }

    /// Whether `path` lies in the pages directory and has a page extension.
    #[must_use]
    pub fn is_page(&self, path: &Path) -> bool {
        path.strip_prefix(&self.config.pages_dir)
            .is_ok_and(|relative| self.has_page_extension(&to_slash_path(relative)))
    }

    fn has_page_extension(&self, relative: &str) -> bool {
        extension(relative).is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            self.config.extensions.iter().any(|e| *e == ext)
        })
    }

    /// Validate a page path and return it relative to the pages directory.
    fn relative_path(&self, absolute_path: &Path) -> Result<String, PagesError> {
        let invalid = |reason: String| PagesError::InvalidPagePath {
            path: to_slash_path(absolute_path),
            reason,
        };

        let relative = absolute_path
            .strip_prefix(&self.config.pages_dir)
            .map_err(|_| invalid("outside the pages directory".to_owned()))?;

        let raw = relative.to_string_lossy();
        if raw.is_empty() {
            return Err(invalid("not a file in the pages directory".to_owned()));
        }
        if let Some(c) = raw.chars().find(|&c| {
            c.is_whitespace() || DISALLOWED_CHARS.contains(&c) || (c == '\\' && !cfg!(windows))
        }) {
            return Err(invalid(format!("contains disallowed character {c:?}")));
        }

        let relative = to_slash_path(relative);
        if !self.has_page_extension(&relative) {
            return Err(invalid(format!(
                "extension is not one of [{}]",
                self.config.extensions.join(", ")
            )));
        }
        Ok(relative)
    }

    /// Page path relative to the project root, for `meta.filename`.
    fn filename(&self, absolute_path: &Path) -> String {
        absolute_path
            .strip_prefix(&self.config.root)
            .map_or_else(|_| to_slash_path(absolute_path), to_slash_path)
    }

    /// Frontmatter of a page, plus the error it fell back from in dev mode.
    async fn page_frontmatter(
        &self,
        absolute_path: &Path,
    ) -> Result<(PageFrontmatter, Option<String>), PagesError> {
        let filename = self.filename(absolute_path);
        let dev = self.mode == Mode::Dev;

        let last_updated = match self.storage.mtime(absolute_path) {
            Ok(mtime) => timestamp_from_mtime(mtime),
            Err(err) if dev => {
                tracing::warn!(path = %filename, error = %err, "Failed to read page mtime");
                Utc::now()
            }
            Err(err) => return Err(err.into()),
        };

        let user = match extract_frontmatter(
            self.storage.as_ref(),
            &self.frontmatter_cache,
            absolute_path,
        ) {
            Ok(user) => user,
            Err(err) if dev => {
                tracing::warn!(path = %filename, error = %err, "Using empty frontmatter");
                let fallback = PageFrontmatter::fallback(&filename, last_updated);
                return Ok((fallback, Some(err.to_string())));
            }
            Err(err) => return Err(err),
        };

        let frontmatter = normalize_frontmatter(
            &filename,
            last_updated,
            user,
            self.frontmatter_hook.as_deref(),
        )
        .await?;
        Ok((frontmatter, None))
    }

    async fn build_page(
        &self,
        absolute_path: &Path,
    ) -> Result<(Page, Option<String>), PagesError> {
        let relative = self.relative_path(absolute_path)?;
        let info = derive_route(&relative, &self.route_options);

        let translations = info
            .translations
            .into_iter()
            .filter(|t| self.storage.exists(&self.config.pages_dir.join(&t.path)))
            .collect();

        let rendered_paths = if info.is_dynamic {
            self.expander.expand(absolute_path, &info.route).await?
        } else {
            Vec::new()
        };

        let (frontmatter, frontmatter_error) = self.page_frontmatter(absolute_path).await?;

        let page = Page {
            component_name: create_component_name(&relative),
            path: relative,
            absolute_path: to_slash_path(absolute_path),
            route: info.route,
            is_dynamic: info.is_dynamic,
            frontmatter,
            rendered_paths,
            translations,
        };
        Ok((page, frontmatter_error))
    }

    fn insert(&self, page: Page, frontmatter_error: Option<String>) {
        let mut errors = self.frontmatter_errors.write().unwrap();
        match frontmatter_error {
            Some(message) => errors.insert(page.absolute_path.clone(), message),
            None => errors.remove(&page.absolute_path),
        };
        drop(errors);

        self.pages
            .write()
            .unwrap()
            .insert(page.absolute_path.clone(), page);
    }

    /// Check that routes and component names are unique.
    fn validate(&self) -> Result<(), PagesError> {
        let pages = self.pages.read().unwrap();

        let mut by_route: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut by_name: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for page in pages.values() {
            by_route
                .entry(page.route.as_str())
                .or_default()
                .push(page.absolute_path.as_str());
            by_name
                .entry(page.component_name.as_str())
                .or_default()
                .push(page.absolute_path.as_str());
        }

        if let Some((route, paths)) = by_route.into_iter().find(|(_, paths)| paths.len() > 1) {
            return Err(PagesError::DuplicateRoute {
                route: route.to_owned(),
                paths: paths.into_iter().map(str::to_owned).collect(),
            });
        }
        if let Some((name, paths)) = by_name.into_iter().find(|(_, paths)| paths.len() > 1) {
            return Err(PagesError::ComponentNameCollision {
                name: name.to_owned(),
                paths: paths.into_iter().map(str::to_owned).collect(),
            });
        }
        Ok(())
    }

    /// Add (or replace) the page at `absolute_path`.
    ///
    /// The page stays registered even when validation fails afterwards, so
    /// fixing or removing the conflicting file resolves the error.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not a valid page, the page can't be
    /// built, or its route or component name is already taken.
    pub async fn add_page(&self, absolute_path: &Path) -> Result<Page, PagesError> {
        let (page, frontmatter_error) = self.build_page(absolute_path).await?;
        tracing::debug!(path = %page.absolute_path, route = %page.route, "Added page");
        self.insert(page.clone(), frontmatter_error);
        self.validate()?;
        Ok(page)
    }

    /// Rebuild the page at `absolute_path` and classify the change.
    ///
    /// An unknown path is added and reported as changed and needing reload.
    ///
    /// # Errors
    ///
    /// Same as [`add_page`](Self::add_page).
    pub async fn update_page(&self, absolute_path: &Path) -> Result<PageUpdate, PagesError> {
        let key = to_slash_path(absolute_path);
        let previous = self.pages.read().unwrap().get(&key).cloned();
        let Some(previous) = previous else {
            self.add_page(absolute_path).await?;
            return Ok(PageUpdate {
                changed: true,
                needs_reload: true,
            });
        };

        let (page, frontmatter_error) = self.build_page(absolute_path).await?;
        let needs_reload =
            page.route != previous.route || page.rendered_paths != previous.rendered_paths;
        let changed = needs_reload || page.frontmatter != previous.frontmatter;

        tracing::debug!(path = %key, changed, needs_reload, "Updated page");
        self.insert(page, frontmatter_error);
        self.validate()?;
        Ok(PageUpdate {
            changed,
            needs_reload,
        })
    }

    /// Remove the page at `absolute_path`.
    pub fn remove_page(&self, absolute_path: &Path) -> Option<Page> {
        let key = to_slash_path(absolute_path);
        self.frontmatter_errors.write().unwrap().remove(&key);
        let removed = self.pages.write().unwrap().remove(&key);
        if removed.is_some() {
            tracing::debug!(path = %key, "Removed page");
        }
        removed
    }

    /// Discover and add every page in storage.
    ///
    /// Returns the number of pages added.
    ///
    /// # Errors
    ///
    /// Returns the first error in [`Mode::Build`]. In [`Mode::Dev`] only
    /// storage and hook errors abort the scan.
    pub async fn scan(&self) -> Result<usize, PagesError> {
        let start = Instant::now();
        let files = self.storage.scan()?;

        let mut added = 0;
        for file in files.iter().filter(|f| self.is_page(f)) {
            match self.add_page(file).await {
                Ok(_) => added += 1,
                Err(err) if self.mode == Mode::Dev && err.is_configuration() => {
                    tracing::error!(path = %file.display(), error = %err, "Failed to add page");
                }
                Err(err) => return Err(err),
            }
        }

        tracing::info!(pages = added, elapsed_ms = elapsed_ms(start), "Scanned pages");
        Ok(added)
    }

    /// Drop all pages and caches before a full rebuild.
    pub fn clear(&self) {
        self.pages.write().unwrap().clear();
        self.frontmatter_errors.write().unwrap().clear();
        self.frontmatter_cache.clear();
        self.expander.cache().clear();
    }

    /// Page at `absolute_path`.
    #[must_use]
    pub fn get(&self, absolute_path: &Path) -> Option<Page> {
        self.pages
            .read()
            .unwrap()
            .get(&to_slash_path(absolute_path))
            .cloned()
    }

    /// Frontmatter error the page at `absolute_path` fell back from in
    /// [`Mode::Dev`], if its last build used base frontmatter.
    #[must_use]
    pub fn frontmatter_error(&self, absolute_path: &Path) -> Option<String> {
        self.frontmatter_errors
            .read()
            .unwrap()
            .get(&to_slash_path(absolute_path))
            .cloned()
    }

    /// Page with the given route.
    #[must_use]
    pub fn page_by_route(&self, route: &str) -> Option<Page> {
        self.pages
            .read()
            .unwrap()
            .values()
            .find(|page| page.route == route)
            .cloned()
    }

    /// Snapshot of all pages, ordered by absolute path.
    #[must_use]
    pub fn pages(&self) -> Vec<Page> {
        self.pages.read().unwrap().values().cloned().collect()
    }

    /// Number of pages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.read().unwrap().len()
    }

    /// Whether the registry has no pages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exported route table, sorted by route and passed through the
    /// `extendRoutes` hook.
    ///
    /// # Errors
    ///
    /// Returns [`PagesError::Hook`] if the hook fails.
    pub async fn extended_routes(&self) -> Result<Vec<Route>, PagesError> {
        let mut routes: Vec<Route> = self
            .pages
            .read()
            .unwrap()
            .values()
            .map(Page::to_route)
            .collect();
        routes.sort_by(|a, b| a.path.cmp(&b.path));

        let Some(hook) = &self.routes_hook else {
            return Ok(routes);
        };
        let original = routes.clone();
        Ok(hook
            .extend(routes)
            .await
            .map_err(PagesError::Hook)?
            .unwrap_or(original))
    }

    /// Props of rendered paths for the dynamic pages among `routes`.
    ///
    /// Only routes with at least one rendered path carrying non-empty props
    /// are included.
    #[must_use]
    pub fn specific_route_props(&self, routes: &[Route]) -> SpecificRouteProps {
        self.collect_props(routes.iter().map(|r| r.path.as_str()))
    }

    /// Props for a rendered path of `route`, picking the most specific entry.
    #[must_use]
    pub fn props_for(
        &self,
        route: &str,
        params: &BTreeMap<String, String>,
    ) -> Option<Map<String, Value>> {
        self.collect_props(std::iter::once(route))
            .props_for(route, params)
            .cloned()
    }

    fn collect_props<'a>(&self, routes: impl Iterator<Item = &'a str>) -> SpecificRouteProps {
        let mut table = SpecificRouteProps::default();

        for route in routes {
            let Some(page) = self.page_by_route(route).filter(|p| p.is_dynamic) else {
                continue;
            };
            let entries: Vec<RouteProps> = page
                .rendered_paths
                .iter()
                .filter_map(|rendered| {
                    let props = rendered.props.as_ref().filter(|p| !p.is_empty())?;
                    Some(RouteProps {
                        matches: rendered.params.clone(),
                        props: props.clone(),
                    })
                })
                .collect();
            if !entries.is_empty() {
                table.insert(route.to_owned(), entries);
            }
        }
        table
    }
}
