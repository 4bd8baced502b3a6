//! Page and route types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::expander::RenderedPath;
use crate::frontmatter::PageFrontmatter;
use crate::route::Translation;

/// A discovered page.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Path relative to the pages directory, forward slashes.
    pub path: String,
    /// Absolute forward-slash path; registry key.
    pub absolute_path: String,
    /// Canonical route.
    pub route: String,
    /// Path contains a `[param]` segment.
    pub is_dynamic: bool,
    /// Normalized frontmatter.
    pub frontmatter: PageFrontmatter,
    /// Concrete paths of a dynamic page; empty for static pages.
    pub rendered_paths: Vec<RenderedPath>,
    /// Component identifier derived from `path`.
    pub component_name: String,
    /// Existing sibling pages in other languages.
    pub translations: Vec<Translation>,
}

impl Page {
    /// Exported route view of this page.
    #[must_use]
    pub fn to_route(&self) -> Route {
        Route {
            path: self.route.clone(),
            component_name: self.component_name.clone(),
            import_path: self.absolute_path.clone(),
        }
    }
}

/// Route descriptor consumed by the client router.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Route template.
    pub path: String,
    /// Component identifier.
    pub component_name: String,
    /// Module to import for the page component.
    pub import_path: String,
}

/// Outcome of [`PageRegistry::update_page`](crate::PageRegistry::update_page).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageUpdate {
    /// Frontmatter, route or rendered paths differ from the previous version.
    pub changed: bool,
    /// Route or rendered paths differ; the route table must be rebuilt.
    pub needs_reload: bool,
}

/// Props of one rendered path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteProps {
    /// Parameter values the props apply to.
    pub matches: BTreeMap<String, String>,
    /// Props for the page component.
    pub props: Map<String, Value>,
}

/// Per-route props of dynamic pages, keyed by route template.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SpecificRouteProps(BTreeMap<String, Vec<RouteProps>>);

impl SpecificRouteProps {
    pub(crate) fn insert(&mut self, route: String, props: Vec<RouteProps>) {
        self.0.insert(route, props);
    }

    /// Entries for a route template.
    #[must_use]
    pub fn get(&self, route: &str) -> Option<&[RouteProps]> {
        self.0.get(route).map(Vec::as_slice)
    }

    /// Number of routes with props.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no route has props.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Props of the most specific entry of `route` matching `params`.
    ///
    /// An entry matches when all of its `matches` agree with `params`; the
    /// entry with the most matched keys wins, the first one on a tie.
    #[must_use]
    pub fn props_for(
        &self,
        route: &str,
        params: &BTreeMap<String, String>,
    ) -> Option<&Map<String, Value>> {
        self.0
            .get(route)?
            .iter()
            .filter(|entry| {
                entry
                    .matches
                    .iter()
                    .all(|(key, value)| params.get(key).is_some_and(|v| v == value))
            })
            .fold(None::<&RouteProps>, |best, entry| match best {
                Some(best) if best.matches.len() >= entry.matches.len() => Some(best),
                _ => Some(entry),
            })
            .map(|entry| &entry.props)
    }
}
