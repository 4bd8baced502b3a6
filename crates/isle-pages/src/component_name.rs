//! Component identifiers for pages.

use std::sync::LazyLock;

use regex::Regex;

use crate::paths::{normalize_slashes, strip_extension};

static BRACKET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\[\]]*)\]").unwrap());

fn pascal_case(text: &str) -> String {
    text.split(['-', '_', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect()
}

fn token_name(token: &str) -> String {
    let mut out = String::new();
    let mut last = 0;
    for caps in BRACKET.captures_iter(token) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&pascal_case(&token[last..whole.start()]));
        out.push_str("Dynamic");
        out.push_str(&pascal_case(&caps[1]));
        last = whole.end();
    }
    out.push_str(&pascal_case(&token[last..]));
    out
}

/// Create a deterministic component identifier from a page path.
///
/// ```text
/// blog/[pagination].tsx -> BlogDynamicPagination
/// about-us.md           -> AboutUs
/// 2024/recap.md         -> _2024Recap
/// ```
#[must_use]
pub fn create_component_name(path: &str) -> String {
    let path = normalize_slashes(path);
    let stem = strip_extension(path.trim_start_matches('/'));

    let joined: String = stem.split(['/', '.']).map(token_name).collect();

    let mut name = String::with_capacity(joined.len() + 1);
    for c in joined.chars() {
        if !(c.is_ascii_alphanumeric() || c == '$' || c == '_') {
            continue;
        }
        if c == '$' && name.ends_with('$') {
            continue;
        }
        name.push(c);
    }

    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_simple_names() {
        assert_eq!(create_component_name("index.tsx"), "Index");
        assert_eq!(create_component_name("about.md"), "About");
        assert_eq!(create_component_name("about.tsx"), "About");
        assert_eq!(create_component_name("blog/index.vue"), "BlogIndex");
    }

    #[test]
    fn test_separators_are_pascal_cased() {
        assert_eq!(create_component_name("about-us.md"), "AboutUs");
        assert_eq!(create_component_name("getting_started guide.mdx"), "GettingStartedGuide");
    }

    #[test]
    fn test_dots_split_tokens() {
        assert_eq!(create_component_name("index.en.tsx"), "IndexEn");
        assert_eq!(create_component_name("guide/setup.de.md"), "GuideSetupDe");
    }

    #[test]
    fn test_dynamic_segments() {
        assert_eq!(
            create_component_name("blog/[pagination].tsx"),
            "BlogDynamicPagination"
        );
        assert_eq!(
            create_component_name("[category]/[post-id].vue"),
            "DynamicCategoryDynamicPostId"
        );
        assert_eq!(create_component_name("post-[id].vue"), "PostDynamicId");
        assert_eq!(
            create_component_name("writing/[dir]/index.tsx"),
            "WritingDynamicDirIndex"
        );
    }

    #[test]
    fn test_invalid_characters_are_stripped() {
        assert_eq!(create_component_name("c++/notes!.md"), "CNotes");
        assert_eq!(create_component_name("$$price$$.vue"), "$price$");
    }

    #[test]
    fn test_leading_digit_is_prefixed() {
        assert_eq!(create_component_name("2024/recap.md"), "_2024Recap");
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(
            create_component_name("docs/intro.md"),
            create_component_name("docs/intro.md")
        );
    }
}
