//! Page discovery, routing and hot updates for isle.
//!
//! This crate provides:
//! - [`PageRegistry`]: discovered pages keyed by absolute path, with unique
//!   routes and component names
//! - [`derive_route`]: file path to route template, including language
//!   suffixes and `[param]` segments
//! - [`PathExpander`]: dynamic pages expanded through `getStaticPaths`
//! - [`VirtualModules`]: the routes and route data modules for the bundler
//! - [`UpdateController`]: storage events applied to the registry in dev mode
//!
//! # Quick Start
//!
//! ```no_run
//! # async fn run(loader: std::sync::Arc<dyn isle_pages::ModuleLoader>) -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use isle_config::Config;
//! use isle_pages::{PageRegistry, ROUTES_ID, VirtualModules};
//! use isle_storage::FsStorage;
//!
//! let config = Config::load(None, None)?;
//! let pages = &config.pages_resolved;
//! let storage = Arc::new(FsStorage::new(pages.pages_dir.clone(), pages.extensions.clone()));
//!
//! let registry = Arc::new(PageRegistry::from_config(&config, storage, loader));
//! registry.scan().await?;
//!
//! let modules = VirtualModules::new(registry);
//! let routes = modules.load(ROUTES_ID).await?;
//! # Ok(())
//! # }
//! ```

mod component_name;
mod error;
mod expander;
mod frontmatter;
mod hot_update;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod page;
mod paths;
mod registry;
mod route;
mod virtual_modules;

pub use component_name::create_component_name;
pub use error::{BoxError, PagesError};
pub use expander::{
    ModuleCache, ModuleLoader, ModuleRequest, PageModule, PathExpander, RenderedPath,
    STATIC_PATHS_EXPORT,
};
pub use frontmatter::{FrontmatterHook, Layout, PageFrontmatter};
pub use hot_update::{BroadcastDevServer, DevServer, HmrMessage, UpdateController, UpdateOutcome};
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockModule, MockModuleLoader};
pub use page::{Page, PageUpdate, Route, RouteProps, SpecificRouteProps};
pub use registry::{ExtendRoutesHook, PageRegistry, PageRegistryBuilder};
pub use route::{
    RouteInfo, RouteOptions, RouteParam, Translation, derive_route, match_route, route_params,
    substitute_params,
};
pub use virtual_modules::{ROUTE_DATA_ID, ROUTES_ID, VirtualModules};
