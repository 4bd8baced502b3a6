//! Static evaluation of `export const frontmatter = {...}` in component pages.
//!
//! The object literal is parsed without executing any code. Only literal
//! values are accepted: strings, template literals without substitutions,
//! numbers, booleans, `null`, arrays and nested objects. Anything that would
//! require evaluation is rejected with [`FrontmatterError::Unsupported`].

use serde_json::{Number, Value};

use crate::UserFrontmatter;
use crate::error::{FrontmatterError, UnsupportedConstruct, line_col};

/// Parse frontmatter exported from a component page.
///
/// A source without a `frontmatter` export yields an empty map.
///
/// # Errors
///
/// Returns an error if the exported value is malformed, is not an object,
/// contains constructs that require evaluation, or has no `title` key.
pub fn parse_component_frontmatter(source: &str) -> Result<UserFrontmatter, FrontmatterError> {
    let Some(start) = find_export(source) else {
        return Ok(UserFrontmatter::new());
    };

    let mut parser = Parser { src: source, pos: start };
    parser.skip_trivia()?;
    if parser.peek() != Some('{') {
        return Err(parser.syntax("expected an object literal after `frontmatter =`"));
    }

    let Value::Object(map) = parser.parse_value()? else {
        return Err(parser.syntax("expected an object literal"));
    };
    if !map.contains_key("title") {
        return Err(FrontmatterError::MissingTitle);
    }
    Ok(map)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Strip a keyword followed by a non-identifier character.
fn strip_keyword<'a>(s: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = s.strip_prefix(keyword)?;
    match rest.chars().next() {
        Some(c) if is_ident_char(c) => None,
        _ => Some(rest),
    }
}

/// Find the byte offset just after `export const frontmatter =`.
///
/// Comments and string literals are skipped, so a commented-out export is
/// not picked up.
fn find_export(source: &str) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = source[i..].find('\n').map_or(bytes.len(), |n| i + n);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = source[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |n| i + 2 + n + 2);
            }
            quote @ (b'"' | b'\'' | b'`') => i = skip_string(bytes, i + 1, quote),
            b'e' => {
                if let Some(end) = match_export(source, i) {
                    return Some(end);
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    None
}

/// Offset just past the closing `quote` of a string starting at `i`.
///
/// Quoted strings also end at a newline, which keeps apostrophes in markup
/// from swallowing the rest of the file.
fn skip_string(bytes: &[u8], mut i: usize, quote: u8) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            c if c == quote => return i + 1,
            b'\n' if quote != b'`' => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Match `export const frontmatter =` at `at`.
fn match_export(source: &str, at: usize) -> Option<usize> {
    if source[..at].chars().next_back().is_some_and(is_ident_char) {
        return None;
    }
    let rest = strip_keyword(&source[at..], "export")?;
    let rest = strip_keyword(rest.trim_start(), "const")?;
    let rest = strip_keyword(rest.trim_start(), "frontmatter")?;

    let mut rest = rest.trim_start();
    // Type annotation: `frontmatter: Frontmatter = {...}`
    if rest.starts_with(':') {
        rest = &rest[rest.find('=')?..];
    }

    let after_eq = rest.strip_prefix('=')?;
    if after_eq.starts_with('=') {
        return None;
    }
    Some(source.len() - after_eq.len())
}

/// Recursive-descent parser over an object literal.
struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn syntax(&self, message: impl Into<String>) -> FrontmatterError {
        let (line, column) = line_col(self.src, self.pos);
        FrontmatterError::Syntax {
            line,
            column,
            message: message.into(),
        }
    }

    fn unsupported_at(&self, offset: usize, construct: UnsupportedConstruct) -> FrontmatterError {
        let (line, column) = line_col(self.src, offset);
        FrontmatterError::Unsupported {
            construct,
            line,
            column,
        }
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) -> Result<(), FrontmatterError> {
        loop {
            let rest = self.rest();
            if rest.starts_with("//") {
                let len = rest.find('\n').unwrap_or(rest.len());
                self.pos += len;
            } else if rest.starts_with("/*") {
                let Some(end) = rest[2..].find("*/") else {
                    return Err(self.syntax("unterminated block comment"));
                };
                self.pos += end + 4;
            } else if self.peek().is_some_and(char::is_whitespace) {
                self.bump();
            } else {
                return Ok(());
            }
        }
    }

    fn parse_value(&mut self) -> Result<Value, FrontmatterError> {
        self.skip_trivia()?;
        let start = self.pos;
        match self.peek() {
            Some('{') => self.parse_object(),
            Some('[') => self.parse_array(),
            Some(quote @ ('"' | '\'')) => self.parse_string(quote).map(Value::String),
            Some('`') => self.parse_template().map(Value::String),
            Some('-' | '+') => self.parse_signed(),
            Some(c) if c.is_ascii_digit() || c == '.' => self.parse_number(),
            Some('(') => Err(self.unsupported_at(start, UnsupportedConstruct::Function)),
            Some(c) if is_ident_start(c) => self.parse_word_value(),
            Some(c) => Err(self.syntax(format!("unexpected character `{c}`"))),
            None => Err(self.syntax("unexpected end of input")),
        }
    }

    fn parse_ident(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.bump();
        }
        self.src[start..self.pos].to_owned()
    }

    fn parse_word_value(&mut self) -> Result<Value, FrontmatterError> {
        let start = self.pos;
        let word = self.parse_ident();
        match word.as_str() {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            "null" => return Ok(Value::Null),
            "function" | "async" | "class" => {
                return Err(self.unsupported_at(start, UnsupportedConstruct::Function));
            }
            "new" => {
                self.skip_trivia()?;
                let callee = self.parse_ident();
                return Err(self.unsupported_at(start, UnsupportedConstruct::Call(callee)));
            }
            _ => {}
        }

        self.skip_trivia()?;
        if self.rest().starts_with("=>") {
            return Err(self.unsupported_at(start, UnsupportedConstruct::Function));
        }
        if self.peek() == Some('(') {
            return Err(self.unsupported_at(start, UnsupportedConstruct::Call(word)));
        }
        Err(self.unsupported_at(start, UnsupportedConstruct::IdentifierReference(word)))
    }

    fn parse_signed(&mut self) -> Result<Value, FrontmatterError> {
        let negative = self.bump() == Some('-');
        let inner = self.parse_value()?;
        let Value::Number(n) = inner else {
            return Err(self.syntax("unary sign must be followed by a number"));
        };
        if !negative {
            return Ok(Value::Number(n));
        }

        if let Some(i) = n.as_i64()
            && i != 0
        {
            return Ok(Value::from(-i));
        }
        let f = n.as_f64().unwrap_or_default();
        Number::from_f64(-f)
            .map(Value::Number)
            .ok_or_else(|| self.syntax("number out of range"))
    }

    fn parse_number(&mut self) -> Result<Value, FrontmatterError> {
        let start = self.pos;
        let rest = self.rest();

        let radix = match rest.get(..2) {
            Some("0x" | "0X") => Some(16),
            Some("0o" | "0O") => Some(8),
            Some("0b" | "0B") => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            self.pos += 2;
            let digits_start = self.pos;
            while self
                .peek()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                self.bump();
            }
            let digits = self.src[digits_start..self.pos].replace('_', "");
            return i64::from_str_radix(&digits, radix)
                .map(Value::from)
                .map_err(|_| {
                    self.syntax(format!("invalid number `{}`", &self.src[start..self.pos]))
                });
        }

        let mut is_float = false;
        let mut prev = '\0';
        while let Some(c) = self.peek() {
            let accepted = match c {
                '0'..='9' | '_' => true,
                '.' | 'e' | 'E' => {
                    is_float = true;
                    true
                }
                '+' | '-' => matches!(prev, 'e' | 'E'),
                _ => false,
            };
            if !accepted {
                break;
            }
            prev = c;
            self.bump();
        }

        if self.peek().is_some_and(is_ident_char) {
            return Err(self.syntax("unsupported numeric literal"));
        }

        let literal = self.src[start..self.pos].replace('_', "");
        if !is_float
            && let Ok(i) = literal.parse::<i64>()
        {
            return Ok(Value::from(i));
        }
        literal
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| self.syntax(format!("invalid number `{literal}`")))
    }

    fn parse_escape(&mut self, out: &mut String) -> Result<(), FrontmatterError> {
        let Some(c) = self.bump() else {
            return Err(self.syntax("unterminated escape sequence"));
        };
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            'x' => out.push(self.parse_hex_char(2)?),
            'u' => {
                if self.peek() == Some('{') {
                    self.bump();
                    let len = self
                        .rest()
                        .find('}')
                        .ok_or_else(|| self.syntax("unterminated unicode escape"))?;
                    let c = self.parse_hex_char(len)?;
                    self.bump();
                    out.push(c);
                } else {
                    out.push(self.parse_hex_char(4)?);
                }
            }
            // Line continuation
            '\n' => {}
            '\r' => {
                if self.peek() == Some('\n') {
                    self.bump();
                }
            }
            other => out.push(other),
        }
        Ok(())
    }

    fn parse_hex_char(&mut self, len: usize) -> Result<char, FrontmatterError> {
        let digits = self.rest().get(..len).unwrap_or_default();
        let c = u32::from_str_radix(digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.syntax("invalid escape sequence"))?;
        self.pos += len;
        Ok(c)
    }

    fn parse_string(&mut self, quote: char) -> Result<String, FrontmatterError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(out),
                Some('\\') => self.parse_escape(&mut out)?,
                Some('\n') | None => return Err(self.syntax("unterminated string literal")),
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_template(&mut self) -> Result<String, FrontmatterError> {
        self.bump();
        let mut out = String::new();
        loop {
            let at = self.pos;
            match self.bump() {
                Some('`') => return Ok(out),
                Some('\\') => self.parse_escape(&mut out)?,
                Some('$') if self.peek() == Some('{') => {
                    return Err(self.unsupported_at(at, UnsupportedConstruct::TemplateSubstitution));
                }
                Some(c) => out.push(c),
                None => return Err(self.syntax("unterminated template literal")),
            }
        }
    }

    fn parse_array(&mut self) -> Result<Value, FrontmatterError> {
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_trivia()?;
            match self.peek() {
                Some(']') => {
                    self.bump();
                    return Ok(Value::Array(items));
                }
                Some(',') => return Err(self.syntax("array holes are not supported")),
                _ if self.rest().starts_with("...") => {
                    return Err(self.unsupported_at(self.pos, UnsupportedConstruct::Spread));
                }
                _ => {}
            }

            items.push(self.parse_value()?);

            self.skip_trivia()?;
            match self.bump() {
                Some(',') => {}
                Some(']') => return Ok(Value::Array(items)),
                _ => return Err(self.syntax("expected `,` or `]` in array")),
            }
        }
    }

    fn parse_object(&mut self) -> Result<Value, FrontmatterError> {
        self.bump();
        let mut map = serde_json::Map::new();
        loop {
            self.skip_trivia()?;
            let key_start = self.pos;
            let (key, is_identifier) = match self.peek() {
                Some('}') => {
                    self.bump();
                    return Ok(Value::Object(map));
                }
                Some('[') => {
                    return Err(self.unsupported_at(key_start, UnsupportedConstruct::ComputedKey));
                }
                Some('.') if self.rest().starts_with("...") => {
                    return Err(self.unsupported_at(key_start, UnsupportedConstruct::Spread));
                }
                Some(quote @ ('"' | '\'')) => (self.parse_string(quote)?, false),
                Some(c) if c.is_ascii_digit() => match self.parse_number()? {
                    Value::Number(n) => (n.to_string(), false),
                    _ => return Err(self.syntax("invalid numeric key")),
                },
                Some(c) if is_ident_start(c) => (self.parse_ident(), true),
                Some(c) => return Err(self.syntax(format!("unexpected character `{c}` in object"))),
                None => return Err(self.syntax("unterminated object literal")),
            };

            self.skip_trivia()?;
            match self.peek() {
                Some(':') => {
                    self.bump();
                }
                Some('(') => {
                    return Err(self.unsupported_at(key_start, UnsupportedConstruct::Function));
                }
                Some(c)
                    if is_identifier
                        && matches!(key.as_str(), "get" | "set" | "async")
                        && (is_ident_start(c) || c == '*') =>
                {
                    return Err(self.unsupported_at(key_start, UnsupportedConstruct::Function));
                }
                Some(',' | '}') if is_identifier => {
                    return Err(
                        self.unsupported_at(key_start, UnsupportedConstruct::ShorthandProperty(key))
                    );
                }
                _ => return Err(self.syntax(format!("expected `:` after key `{key}`"))),
            }

            let value = self.parse_value()?;
            map.insert(key, value);

            self.skip_trivia()?;
            match self.bump() {
                Some(',') => {}
                Some('}') => return Ok(Value::Object(map)),
                _ => return Err(self.syntax("expected `,` or `}` in object")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn parse(source: &str) -> Result<Value, FrontmatterError> {
        parse_component_frontmatter(source).map(Value::Object)
    }

    fn unsupported(source: &str) -> UnsupportedConstruct {
        match parse(source) {
            Err(FrontmatterError::Unsupported { construct, .. }) => construct,
            other => panic!("expected unsupported construct, got {other:?}"),
        }
    }

    #[test]
    fn test_no_export_is_empty() {
        let source = "export default function Page() { return <h1>Hi</h1> }";

        assert_eq!(parse(source).unwrap(), json!({}));
    }

    #[test]
    fn test_simple_object() {
        let source = r#"
import Layout from "../layouts/Base"

export const frontmatter = {
  title: "Home",
  layout: 'landing',
  order: 2,
  draft: false,
  cover: null,
}

export default function Page() {}
"#;

        assert_eq!(
            parse(source).unwrap(),
            json!({
                "title": "Home",
                "layout": "landing",
                "order": 2,
                "draft": false,
                "cover": null
            })
        );
    }

    #[test]
    fn test_nested_values_and_comments() {
        let source = r#"export const frontmatter = {
  // shown in the tab
  title: `Blog`,
  /* structured */
  meta: { "og:image": "/cover.png", tags: ["a", 'b',], },
  ratio: -1.5,
  offset: - 3,
  mask: 0xff,
  big: 1_000,
}"#;

        assert_eq!(
            parse(source).unwrap(),
            json!({
                "title": "Blog",
                "meta": {"og:image": "/cover.png", "tags": ["a", "b"]},
                "ratio": -1.5,
                "offset": -3,
                "mask": 255,
                "big": 1000
            })
        );
    }

    #[test]
    fn test_type_annotation() {
        let source = "export const frontmatter: Frontmatter = { title: 'Typed' }";

        assert_eq!(parse(source).unwrap(), json!({"title": "Typed"}));
    }

    #[test]
    fn test_string_escapes() {
        let source = r#"export const frontmatter = { title: "a\"b\nA\u{1F600}\x41" }"#;

        assert_eq!(parse(source).unwrap(), json!({"title": "a\"b\nA\u{1F600}A"}));
    }

    #[test]
    fn test_multiline_template() {
        let source = "export const frontmatter = { title: `line1\nline2` }";

        assert_eq!(parse(source).unwrap(), json!({"title": "line1\nline2"}));
    }

    #[test]
    fn test_ignores_similar_names() {
        let source = "export const frontmatterExtra = { a: 1 }\nexport const frontmatter = { title: 'x' }";

        assert_eq!(parse(source).unwrap(), json!({"title": "x"}));
    }

    #[test]
    fn test_skips_exports_in_comments_and_strings() {
        let source = r#"// export const frontmatter = { title: draftTitle }
/* export const frontmatter = { title: old() } */
const hint = "export const frontmatter = { broken";
<p>Don't forget the title</p>
export const frontmatter = { title: 'Live' }"#;

        assert_eq!(parse(source).unwrap(), json!({"title": "Live"}));
    }

    #[test]
    fn test_commented_out_export_only_is_empty() {
        let source = "// export const frontmatter = { title: siteName }\nexport default {}";

        assert_eq!(parse(source).unwrap(), json!({}));
    }

    #[test]
    fn test_missing_title() {
        let err = parse("export const frontmatter = { layout: 'x' }").unwrap_err();

        assert_eq!(err, FrontmatterError::MissingTitle);
    }

    #[test]
    fn test_not_an_object() {
        let err = parse("export const frontmatter = ['title']").unwrap_err();

        assert!(matches!(err, FrontmatterError::Syntax { .. }));
    }

    #[test]
    fn test_rejects_identifier_reference() {
        assert_eq!(
            unsupported("export const frontmatter = { title: siteName }"),
            UnsupportedConstruct::IdentifierReference("siteName".to_owned())
        );
    }

    #[test]
    fn test_rejects_shorthand_property() {
        assert_eq!(
            unsupported("export const frontmatter = { title }"),
            UnsupportedConstruct::ShorthandProperty("title".to_owned())
        );
    }

    #[test]
    fn test_rejects_call() {
        assert_eq!(
            unsupported("export const frontmatter = { title: t('home') }"),
            UnsupportedConstruct::Call("t".to_owned())
        );
        assert_eq!(
            unsupported("export const frontmatter = { title: 'x', at: new Date() }"),
            UnsupportedConstruct::Call("Date".to_owned())
        );
    }

    #[test]
    fn test_rejects_spread() {
        assert_eq!(
            unsupported("export const frontmatter = { ...base, title: 'x' }"),
            UnsupportedConstruct::Spread
        );
        assert_eq!(
            unsupported("export const frontmatter = { title: 'x', tags: [...tags] }"),
            UnsupportedConstruct::Spread
        );
    }

    #[test]
    fn test_rejects_computed_key() {
        assert_eq!(
            unsupported("export const frontmatter = { [key]: 'x' }"),
            UnsupportedConstruct::ComputedKey
        );
    }

    #[test]
    fn test_rejects_template_substitution() {
        assert_eq!(
            unsupported("export const frontmatter = { title: `Hi ${name}` }"),
            UnsupportedConstruct::TemplateSubstitution
        );
    }

    #[test]
    fn test_rejects_functions() {
        assert_eq!(
            unsupported("export const frontmatter = { title: 'x', load: () => 1 }"),
            UnsupportedConstruct::Function
        );
        assert_eq!(
            unsupported("export const frontmatter = { title: 'x', load: x => x }"),
            UnsupportedConstruct::Function
        );
        assert_eq!(
            unsupported("export const frontmatter = { title: 'x', load() {} }"),
            UnsupportedConstruct::Function
        );
        assert_eq!(
            unsupported("export const frontmatter = { title: 'x', get slug() { return 1 } }"),
            UnsupportedConstruct::Function
        );
        assert_eq!(
            unsupported("export const frontmatter = { title: 'x', load: function () {} }"),
            UnsupportedConstruct::Function
        );
    }

    #[test]
    fn test_error_position() {
        let err = parse("export const frontmatter = {\n  title: site,\n}").unwrap_err();

        assert_eq!(
            err,
            FrontmatterError::Unsupported {
                construct: UnsupportedConstruct::IdentifierReference("site".to_owned()),
                line: 2,
                column: 10,
            }
        );
    }

    #[test]
    fn test_unterminated_object() {
        let err = parse("export const frontmatter = { title: 'x'").unwrap_err();

        assert!(matches!(err, FrontmatterError::Syntax { .. }));
    }
}
