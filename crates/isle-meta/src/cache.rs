//! Content-keyed frontmatter cache.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::UserFrontmatter;
use crate::component::parse_component_frontmatter;
use crate::error::FrontmatterError;
use crate::markdown::parse_markdown_frontmatter;

/// Source format of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontmatterFormat {
    /// Leading YAML block (`.md`, `.mdx`, `.markdown`).
    Markdown,
    /// `export const frontmatter` object literal.
    Component,
}

impl FrontmatterFormat {
    /// Parse `source` in this format without caching.
    ///
    /// # Errors
    ///
    /// Returns the parser's [`FrontmatterError`].
    pub fn parse(self, source: &str) -> Result<UserFrontmatter, FrontmatterError> {
        match self {
            Self::Markdown => parse_markdown_frontmatter(source),
            Self::Component => parse_component_frontmatter(source),
        }
    }
}

/// Frontmatter cache keyed by exact source text.
///
/// Entries are never evicted on their own; call [`invalidate`](Self::invalidate)
/// or [`clear`](Self::clear). Parse failures are not cached.
#[derive(Debug, Default)]
pub struct FrontmatterCache {
    entries: RwLock<HashMap<(FrontmatterFormat, String), UserFrontmatter>>,
}

impl FrontmatterCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `source`, reusing a previous result for identical text.
    ///
    /// # Errors
    ///
    /// Returns the parser's [`FrontmatterError`].
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn get_or_parse(
        &self,
        format: FrontmatterFormat,
        source: &str,
    ) -> Result<UserFrontmatter, FrontmatterError> {
        let key = (format, source.to_owned());
        if let Some(hit) = self.entries.read().unwrap().get(&key) {
            return Ok(hit.clone());
        }

        tracing::trace!(?format, len = source.len(), "Frontmatter cache miss");
        let parsed = format.parse(source)?;
        self.entries.write().unwrap().insert(key, parsed.clone());
        Ok(parsed)
    }

    /// Drop cached results for `source` in every format.
    ///
    /// Returns `true` if anything was removed.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn invalidate(&self, source: &str) -> bool {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|(_, text), _| text != source);
        entries.len() != before
    }

    /// Drop all cached results.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }

    /// Number of cached results.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
