//! YAML frontmatter for text pages.

use serde_json::Value;

use crate::UserFrontmatter;
use crate::error::FrontmatterError;

/// Locate the YAML block between the opening and closing `---` lines.
///
/// Returns `None` if the source doesn't start with a delimiter line or the
/// block is never closed.
fn frontmatter_block(source: &str) -> Option<&str> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let mut lines = source.split_inclusive('\n');

    let first = lines.next()?;
    if first.trim_end() != "---" {
        return None;
    }

    let start = first.len();
    let mut end = start;
    for line in lines {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            return Some(&source[start..end]);
        }
        end += line.len();
    }
    None
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

/// Parse the leading YAML frontmatter of a markdown source.
///
/// A source without a frontmatter block, or with an empty one, yields an
/// empty map.
///
/// # Errors
///
/// Returns [`FrontmatterError::Yaml`] if the block is malformed and
/// [`FrontmatterError::NotAMapping`] if it isn't a mapping.
pub fn parse_markdown_frontmatter(source: &str) -> Result<UserFrontmatter, FrontmatterError> {
    let Some(block) = frontmatter_block(source) else {
        return Ok(UserFrontmatter::new());
    };
    if block.trim().is_empty() {
        return Ok(UserFrontmatter::new());
    }

    let value: Value =
        serde_yaml::from_str(block).map_err(|e| FrontmatterError::Yaml(e.to_string()))?;

    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(UserFrontmatter::new()),
        other => Err(FrontmatterError::NotAMapping(kind_name(&other))),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_no_frontmatter_is_empty() {
        let fm = parse_markdown_frontmatter("# Title\n\nBody").unwrap();

        assert!(fm.is_empty());
    }

    #[test]
    fn test_simple_frontmatter() {
        let fm = parse_markdown_frontmatter("---\ntitle: Hello\nlayout: post\n---\n# Body\n")
            .unwrap();

        assert_eq!(Value::Object(fm), json!({"title": "Hello", "layout": "post"}));
    }

    #[test]
    fn test_nested_and_typed_values() {
        let source = "---\ntitle: Typed\ndraft: false\norder: 3\ntags:\n  - a\n  - b\nmeta:\n  author: Ann\n---\n";

        let fm = parse_markdown_frontmatter(source).unwrap();

        assert_eq!(
            Value::Object(fm),
            json!({
                "title": "Typed",
                "draft": false,
                "order": 3,
                "tags": ["a", "b"],
                "meta": {"author": "Ann"}
            })
        );
    }

    #[test]
    fn test_layout_false_is_preserved() {
        let fm = parse_markdown_frontmatter("---\nlayout: false\n---\n").unwrap();

        assert_eq!(fm.get("layout"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_empty_block_is_empty() {
        assert!(parse_markdown_frontmatter("---\n---\nBody").unwrap().is_empty());
        assert!(parse_markdown_frontmatter("---\n\n---\n").unwrap().is_empty());
    }

    #[test]
    fn test_crlf_and_bom() {
        let fm = parse_markdown_frontmatter("\u{feff}---\r\ntitle: Win\r\n---\r\nBody").unwrap();

        assert_eq!(fm.get("title"), Some(&json!("Win")));
    }

    #[test]
    fn test_unclosed_block_is_empty() {
        let fm = parse_markdown_frontmatter("---\ntitle: Never closed\n").unwrap();

        assert!(fm.is_empty());
    }

    #[test]
    fn test_delimiter_not_on_first_line_is_ignored() {
        let fm = parse_markdown_frontmatter("\n---\ntitle: Late\n---\n").unwrap();

        assert!(fm.is_empty());
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let err = parse_markdown_frontmatter("---\ntitle: [unclosed\n---\n").unwrap_err();

        assert!(matches!(err, FrontmatterError::Yaml(_)));
    }

    #[test]
    fn test_non_mapping_is_error() {
        let err = parse_markdown_frontmatter("---\n- a\n- b\n---\n").unwrap_err();

        assert_eq!(err, FrontmatterError::NotAMapping("a sequence"));
    }
}
