//! Frontmatter extraction for isle pages.
//!
//! Two source formats are supported:
//!
//! - Text pages (`.md`, `.mdx`): a leading `---` delimited YAML block, see
//!   [`parse_markdown_frontmatter`].
//! - Component pages (`.tsx`, `.vue`, ...): an `export const frontmatter = {...}`
//!   object literal evaluated statically, see [`parse_component_frontmatter`].
//!
//! Both produce a [`UserFrontmatter`] map. [`FrontmatterCache`] memoizes
//! results by exact source text.

mod cache;
mod component;
mod error;
mod markdown;

pub use cache::{FrontmatterCache, FrontmatterFormat};
pub use component::parse_component_frontmatter;
pub use error::{FrontmatterError, UnsupportedConstruct};
pub use markdown::parse_markdown_frontmatter;

/// User-authored frontmatter keys and values.
pub type UserFrontmatter = serde_json::Map<String, serde_json::Value>;
