//! Frontmatter error types.

use std::fmt;

/// A source construct that cannot be evaluated without running code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsupportedConstruct {
    /// Reference to a variable or import, e.g. `title: siteName`.
    IdentifierReference(String),
    /// Shorthand property, e.g. `{ title }`.
    ShorthandProperty(String),
    /// Function or constructor call, e.g. `title: t("home")`.
    Call(String),
    /// Spread element or property, e.g. `{ ...base }`.
    Spread,
    /// Computed key, e.g. `{ [key]: 1 }`.
    ComputedKey,
    /// Template literal with `${...}`.
    TemplateSubstitution,
    /// Function, arrow function, method, or accessor.
    Function,
}

impl fmt::Display for UnsupportedConstruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdentifierReference(name) => write!(f, "identifier reference `{name}`"),
            Self::ShorthandProperty(name) => write!(f, "shorthand property `{name}`"),
            Self::Call(name) => write!(f, "call to `{name}`"),
            Self::Spread => f.write_str("spread syntax"),
            Self::ComputedKey => f.write_str("computed key"),
            Self::TemplateSubstitution => f.write_str("template literal substitution"),
            Self::Function => f.write_str("function"),
        }
    }
}

/// Error type for frontmatter extraction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrontmatterError {
    /// YAML block could not be parsed.
    #[error("Invalid YAML frontmatter: {0}")]
    Yaml(String),

    /// Frontmatter parsed to something other than a mapping.
    #[error("Frontmatter must be a mapping, found {0}")]
    NotAMapping(&'static str),

    /// Malformed object literal.
    #[error("Syntax error at {line}:{column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// Object literal uses a construct that requires evaluation.
    #[error(
        "Unsupported {construct} at {line}:{column}, frontmatter must only contain literal values"
    )]
    Unsupported {
        construct: UnsupportedConstruct,
        line: usize,
        column: usize,
    },

    /// Component frontmatter without a `title` key.
    #[error("Frontmatter is missing the required `title` key")]
    MissingTitle,
}

/// Convert a byte offset into a 1-based line and column.
pub(crate) fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let before = &source[..offset.min(source.len())];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map_or(before.chars().count(), |i| before[i + 1..].chars().count())
        + 1;
    (line, column)
}
