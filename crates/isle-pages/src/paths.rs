//! Path string utilities.
//!
//! Pure transformations over forward-slash path strings. Nothing here touches
//! the filesystem.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// Extensions of pages whose source is a component module.
pub const COMPONENT_EXTENSIONS: &[&str] = &["vue", "jsx", "tsx", "js", "ts", "svelte"];

/// Extensions of pages whose source is markdown text.
pub const TEXT_EXTENSIONS: &[&str] = &["md", "mdx", "markdown"];

static PARAM_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]/.]+)\]").unwrap());

/// Convert a path to a forward-slash string.
#[must_use]
pub fn to_slash_path(path: &Path) -> String {
    normalize_slashes(&path.to_string_lossy())
}

/// Replace backslashes with slashes and collapse repeated slashes.
#[must_use]
pub fn normalize_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        let c = if c == '\\' { '/' } else { c };
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Byte offset where the last path segment starts.
fn file_name_start(path: &str) -> usize {
    path.rfind('/').map_or(0, |i| i + 1)
}

/// Split a path into the part before the extension and the extension.
///
/// Only the last segment is considered, and a leading dot (`.env`) is not an
/// extension.
#[must_use]
pub fn split_extension(path: &str) -> (&str, Option<&str>) {
    let name_start = file_name_start(path);
    match path[name_start..].rfind('.') {
        Some(0) | None => (path, None),
        Some(dot) => {
            let dot = name_start + dot;
            (&path[..dot], Some(&path[dot + 1..]))
        }
    }
}

/// Strip the file extension.
#[must_use]
pub fn strip_extension(path: &str) -> &str {
    split_extension(path).0
}

/// File extension without the dot.
#[must_use]
pub fn extension(path: &str) -> Option<&str> {
    split_extension(path).1
}

/// Whether the extension belongs to a component page.
#[must_use]
pub fn is_component_extension(ext: &str) -> bool {
    COMPONENT_EXTENSIONS.contains(&ext)
}

/// Whether the extension belongs to a markdown page.
#[must_use]
pub fn is_text_extension(ext: &str) -> bool {
    TEXT_EXTENSIONS.contains(&ext)
}

/// Whether any segment contains a `[param]`.
#[must_use]
pub fn has_dynamic_segment(path: &str) -> bool {
    PARAM_BRACKETS.is_match(path)
}

/// Replace `[name]` with `:name`.
///
/// Placeholders in the last segment are marked optional (`:name?`).
#[must_use]
pub fn replace_param_brackets(path: &str) -> String {
    let name_start = file_name_start(path);
    let mut out = String::with_capacity(path.len() + 2);
    let mut last = 0;
    for caps in PARAM_BRACKETS.captures_iter(path) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&path[last..whole.start()]);
        out.push(':');
        out.push_str(name.as_str());
        if whole.start() >= name_start {
            out.push('?');
        }
        last = whole.end();
    }
    out.push_str(&path[last..]);
    out
}

/// Split a trailing `.lang` suffix off a path without extension.
///
/// Returns `(base, language)` only if the last dot-delimited token of the
/// file name is one of `languages`.
#[must_use]
pub fn split_language_suffix<'a>(path: &'a str, languages: &[&str]) -> Option<(&'a str, &'a str)> {
    let (base, suffix) = split_extension(path);
    let suffix = suffix?;
    languages
        .iter()
        .any(|lang| lang.eq_ignore_ascii_case(suffix))
        .then_some((base, suffix))
}

/// Remove a trailing `index` segment.
#[must_use]
pub fn strip_index(path: &str) -> &str {
    if path == "index" {
        return "";
    }
    path.strip_suffix("/index").unwrap_or(path)
}

/// Trim slashes and prepend exactly one; empty becomes `/`.
#[must_use]
pub fn to_route_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    format!("/{trimmed}")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_normalize_slashes() {
        assert_eq!(normalize_slashes(r"pages\blog\\post.md"), "pages/blog/post.md");
        assert_eq!(normalize_slashes("a//b///c"), "a/b/c");
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("blog/post.md"), ("blog/post", Some("md")));
        assert_eq!(split_extension("index.en.tsx"), ("index.en", Some("tsx")));
        assert_eq!(split_extension("a.de.b/index"), ("a.de.b/index", None));
        assert_eq!(split_extension("dir/.hidden"), ("dir/.hidden", None));
    }

    #[test]
    fn test_extension_kinds() {
        assert!(is_component_extension("tsx"));
        assert!(is_component_extension("vue"));
        assert!(!is_component_extension("md"));
        assert!(is_text_extension("mdx"));
        assert!(!is_text_extension("svelte"));
    }

    #[test]
    fn test_dynamic_segments() {
        assert!(has_dynamic_segment("blog/[pagination].tsx"));
        assert!(!has_dynamic_segment("blog/index.tsx"));
        assert!(has_dynamic_segment("[lang]/posts/intro.vue"));
    }

    #[test]
    fn test_replace_param_brackets() {
        assert_eq!(
            replace_param_brackets("blog/[pagination].tsx"),
            "blog/:pagination?.tsx"
        );
        assert_eq!(
            replace_param_brackets("[category]/[slug].vue"),
            ":category/:slug?.vue"
        );
        assert_eq!(
            replace_param_brackets("[category]/index.vue"),
            ":category/index.vue"
        );
        assert_eq!(replace_param_brackets("about.vue"), "about.vue");
    }

    #[test]
    fn test_split_language_suffix() {
        let languages = ["en", "fr"];

        assert_eq!(
            split_language_suffix("a.de.b/index.fr", &languages),
            Some(("a.de.b/index", "fr"))
        );
        assert_eq!(split_language_suffix("about.de", &languages), None);
        assert_eq!(split_language_suffix("about.2", &languages), None);
        assert_eq!(split_language_suffix("about", &languages), None);
        assert_eq!(split_language_suffix("about.en", &[]), None);
    }

    #[test]
    fn test_strip_index() {
        assert_eq!(strip_index("index"), "");
        assert_eq!(strip_index("blog/index"), "blog");
        assert_eq!(strip_index("blog/reindex"), "blog/reindex");
        assert_eq!(strip_index("index/about"), "index/about");
    }

    #[test]
    fn test_to_route_path() {
        assert_eq!(to_route_path(""), "/");
        assert_eq!(to_route_path("/blog/"), "/blog");
        assert_eq!(to_route_path("en/about"), "/en/about");
    }

    #[test]
    fn test_to_slash_path() {
        assert_eq!(to_slash_path(Path::new("/site/pages/a.md")), "/site/pages/a.md");
    }
}
