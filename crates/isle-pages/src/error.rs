//! Error types for page processing.

use isle_meta::FrontmatterError;
use isle_storage::StorageError;

/// Boxed error returned by user hooks and module loaders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for page registry operations.
///
/// Every variant except [`Storage`](Self::Storage), [`Hook`](Self::Hook)
/// and [`Serialize`](Self::Serialize) describes a page configuration
/// problem: fatal when building, reported and skipped in dev mode.
#[derive(Debug, thiserror::Error)]
pub enum PagesError {
    /// Two or more pages resolve to the same route.
    #[error("Route {route} is defined by more than one page: {}", .paths.join(", "))]
    DuplicateRoute { route: String, paths: Vec<String> },

    /// Two or more pages resolve to the same component identifier.
    #[error("Component name {name} is shared by more than one page: {}", .paths.join(", "))]
    ComponentNameCollision { name: String, paths: Vec<String> },

    /// Dynamic page without a `getStaticPaths` export.
    #[error("Dynamic page {path} must export getStaticPaths")]
    MissingStaticPaths { path: String },

    /// `getStaticPaths` returned something other than a list of paths.
    #[error("getStaticPaths in {path} must return an array of paths: {message}")]
    InvalidStaticPaths { path: String, message: String },

    /// Parameters returned by `getStaticPaths` don't fit the route.
    #[error("Invalid params in {path}: {message}")]
    ParamMismatch { path: String, message: String },

    /// Path is not a valid page file.
    #[error("Invalid page path {path}: {reason}")]
    InvalidPagePath { path: String, reason: String },

    /// Frontmatter could not be extracted.
    #[error("Invalid frontmatter in {path}: {source}")]
    Frontmatter {
        path: String,
        #[source]
        source: FrontmatterError,
    },

    /// Page module could not be loaded or executed.
    #[error("Failed to load page module {path}: {source}")]
    Module {
        path: String,
        #[source]
        source: BoxError,
    },

    /// Storage access failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// User hook failed.
    #[error("Hook failed: {0}")]
    Hook(#[source] BoxError),

    /// Virtual module payload could not be serialized.
    #[error("Failed to serialize virtual module: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PagesError {
    /// Whether the error is a page configuration problem that dev mode may
    /// degrade instead of failing.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Self::Storage(_) | Self::Hook(_) | Self::Serialize(_))
    }
}

#[cfg(test)]
mod tests {
    use isle_storage::StorageErrorKind;

    use super::*;

    static_assertions::assert_impl_all!(PagesError: Send, Sync);

    #[test]
    fn test_duplicate_route_names_all_paths() {
        let err = PagesError::DuplicateRoute {
            route: "/about".to_owned(),
            paths: vec!["/pages/about.md".to_owned(), "/pages/about.vue".to_owned()],
        };

        assert_eq!(
            err.to_string(),
            "Route /about is defined by more than one page: /pages/about.md, /pages/about.vue"
        );
    }

    #[test]
    fn test_is_configuration() {
        let missing = PagesError::MissingStaticPaths {
            path: "/pages/[id].vue".to_owned(),
        };
        let storage = PagesError::from(StorageError::new(StorageErrorKind::NotFound));

        assert!(missing.is_configuration());
        assert!(!storage.is_configuration());
    }
}
