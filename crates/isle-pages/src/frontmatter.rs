//! Page frontmatter normalization.
//!
//! Raw user frontmatter comes from `isle-meta`. This module reads page
//! sources through storage, applies the `extendFrontmatter` hook and builds
//! the normalized [`PageFrontmatter`] every page carries.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use isle_meta::{FrontmatterCache, FrontmatterFormat, UserFrontmatter};
use isle_storage::Storage;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{BoxError, PagesError};
use crate::paths::{extension, is_component_extension, is_text_extension, to_slash_path};

/// Layout name used when a page doesn't pick one.
pub const DEFAULT_LAYOUT: &str = "default";

/// Layout selection of a page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Layout {
    /// Named layout component.
    Named(String),
    /// `layout: false`, render without a layout.
    Disabled,
}

impl Default for Layout {
    fn default() -> Self {
        Self::Named(DEFAULT_LAYOUT.to_owned())
    }
}

impl Layout {
    /// Interpret a user `layout` value: a string names a layout, `false`
    /// disables it, anything else selects the default.
    #[must_use]
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(name)) => Self::Named(name.clone()),
            Some(Value::Bool(false)) => Self::Disabled,
            _ => Self::default(),
        }
    }
}

impl Serialize for Layout {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Named(name) => serializer.serialize_str(name),
            Self::Disabled => serializer.serialize_bool(false),
        }
    }
}

impl<'de> Deserialize<'de> for Layout {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LayoutVisitor;

        impl Visitor<'_> for LayoutVisitor {
            type Value = Layout;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a layout name or `false`")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Layout, E> {
                Ok(Layout::Named(v.to_owned()))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Layout, E> {
                if v {
                    Err(E::invalid_value(de::Unexpected::Bool(true), &self))
                } else {
                    Ok(Layout::Disabled)
                }
            }
        }

        deserializer.deserialize_any(LayoutVisitor)
    }
}

/// Normalized page frontmatter.
///
/// Serializes as a single flat object: `{ layout, meta, ...extra }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageFrontmatter {
    /// Selected layout.
    pub layout: Layout,
    /// Page metadata, always containing `filename` and `lastUpdated`.
    pub meta: Map<String, Value>,
    /// Remaining user keys, verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PageFrontmatter {
    /// Frontmatter with only the base metadata.
    #[must_use]
    pub fn fallback(filename: &str, last_updated: DateTime<Utc>) -> Self {
        Self {
            layout: Layout::default(),
            meta: base_meta(filename, last_updated),
            extra: Map::new(),
        }
    }

    /// Page title, if set.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.extra.get("title").and_then(Value::as_str)
    }
}

/// Hook to rewrite user frontmatter before normalization.
#[async_trait]
pub trait FrontmatterHook: Send + Sync {
    /// Return the frontmatter to use, or `None` to keep `frontmatter` as is.
    ///
    /// `filename` is the page path relative to the project root.
    async fn extend(
        &self,
        frontmatter: UserFrontmatter,
        filename: &str,
    ) -> Result<Option<UserFrontmatter>, BoxError>;
}

fn base_meta(filename: &str, last_updated: DateTime<Utc>) -> Map<String, Value> {
    let mut meta = Map::new();
    meta.insert("filename".to_owned(), Value::String(filename.to_owned()));
    meta.insert(
        "lastUpdated".to_owned(),
        Value::String(last_updated.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    meta
}

/// Convert a storage mtime into a UTC timestamp.
#[must_use]
pub fn timestamp_from_mtime(mtime: f64) -> DateTime<Utc> {
    #[allow(clippy::cast_possible_truncation)]
    let millis = (mtime * 1000.0).round() as i64;
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Frontmatter format for a page extension.
#[must_use]
pub fn format_for_extension(ext: &str) -> Option<FrontmatterFormat> {
    let ext = ext.to_ascii_lowercase();
    if is_text_extension(&ext) {
        Some(FrontmatterFormat::Markdown)
    } else if is_component_extension(&ext) {
        Some(FrontmatterFormat::Component)
    } else {
        None
    }
}

/// Read a page and extract its user frontmatter.
///
/// Files with an extension that has no known frontmatter format yield an
/// empty map.
///
/// # Errors
///
/// Returns [`PagesError::Storage`] if the page can't be read and
/// [`PagesError::Frontmatter`] if parsing fails.
pub fn extract_frontmatter(
    storage: &dyn Storage,
    cache: &FrontmatterCache,
    absolute_path: &Path,
) -> Result<UserFrontmatter, PagesError> {
    let display = to_slash_path(absolute_path);
    let Some(format) = extension(&display).and_then(format_for_extension) else {
        return Ok(UserFrontmatter::new());
    };

    let source = storage.read(absolute_path)?;
    cache
        .get_or_parse(format, &source)
        .map_err(|source| PagesError::Frontmatter {
            path: display,
            source,
        })
}

/// Normalize user frontmatter into a [`PageFrontmatter`].
///
/// The hook runs first; its result replaces `user` unless it returns `None`.
/// `layout` and `meta` are pulled out, and user `meta` keys are merged over
/// `{ filename, lastUpdated }`.
///
/// # Errors
///
/// Returns [`PagesError::Hook`] if the hook fails.
pub async fn normalize_frontmatter(
    filename: &str,
    last_updated: DateTime<Utc>,
    user: UserFrontmatter,
    hook: Option<&dyn FrontmatterHook>,
) -> Result<PageFrontmatter, PagesError> {
    let mut frontmatter = match hook {
        Some(hook) => {
            let original = user.clone();
            hook.extend(user, filename)
                .await
                .map_err(PagesError::Hook)?
                .unwrap_or(original)
        }
        None => user,
    };

    let layout = Layout::from_value(frontmatter.remove("layout").as_ref());

    let mut meta = base_meta(filename, last_updated);
    match frontmatter.remove("meta") {
        Some(Value::Object(user_meta)) => meta.extend(user_meta),
        Some(Value::Null) | None => {}
        Some(other) => {
            tracing::warn!(filename, meta = %other, "Ignoring non-object frontmatter meta");
        }
    }

    Ok(PageFrontmatter {
        layout,
        meta,
        extra: frontmatter,
    })
}
