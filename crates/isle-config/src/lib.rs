//! Configuration management for isle.
//!
//! Parses `isle.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! Settings supplied by the embedding build tool can be applied during load
//! via [`Overrides`].
//!
//! ## Environment Variable Expansion
//!
//! Path values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `pages.src_dir`
//! - `pages.pages_dir`
//!
//! ## Languages
//!
//! Languages are declared as an ordered table. Declaration order is
//! significant: translation links follow it.
//!
//! ```toml
//! [i18n]
//! default_language = "en"
//!
//! [i18n.languages]
//! en = { label = "English" }
//! de = { label = "Deutsch", locale = "de-DE" }
//! ```

mod expand;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

/// Settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct Overrides {
    /// Override the pages directory.
    pub pages_dir: Option<PathBuf>,
    /// Override the run mode.
    pub mode: Option<Mode>,
    /// Override the default language.
    pub default_language: Option<String>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "isle.toml";

/// Default page file extensions.
const DEFAULT_EXTENSIONS: &[&str] = &["vue", "tsx", "jsx", "md", "mdx"];

/// Run mode of the surrounding tool.
///
/// Decides whether page configuration errors abort the run (`Build`) or are
/// reported and degraded (`Dev`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One-shot static build.
    #[default]
    Build,
    /// Long-running development server.
    Dev,
}

/// A configured site language.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Language {
    /// Language id used as file suffix and route prefix (e.g. "en").
    pub id: String,
    /// Human-readable label. Defaults to the id.
    pub label: String,
    /// Optional locale tag (e.g. "de-DE").
    pub locale: Option<String>,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Page discovery configuration (paths are relative strings from TOML).
    pages: PagesConfigRaw,
    /// Internationalization configuration.
    i18n: I18nConfigRaw,
    /// Run mode.
    pub mode: Mode,

    /// Resolved pages configuration (set after loading).
    #[serde(skip)]
    pub pages_resolved: PagesConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw pages configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct PagesConfigRaw {
    src_dir: Option<String>,
    pages_dir: Option<String>,
    extensions: Option<Vec<String>>,
}

/// Raw language entry as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct LanguageRaw {
    label: Option<String>,
    locale: Option<String>,
}

/// Raw i18n configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct I18nConfigRaw {
    default_language: Option<String>,
    #[serde(deserialize_with = "deserialize_languages")]
    languages: Vec<Language>,
}

/// Resolved page discovery configuration with absolute paths.
#[derive(Clone, Debug, Default)]
pub struct PagesConfig {
    /// Project root (directory containing `isle.toml`).
    pub root: PathBuf,
    /// Source directory.
    pub src_dir: PathBuf,
    /// Root directory of page files.
    pub pages_dir: PathBuf,
    /// Recognized page file extensions, without leading dot.
    pub extensions: Vec<String>,
    /// Default language id; pages in this language get no route prefix.
    pub default_language: Option<String>,
    /// Languages in declaration order.
    pub languages: Vec<Language>,
}

impl PagesConfig {
    /// Language ids in declaration order.
    #[must_use]
    pub fn language_ids(&self) -> Vec<&str> {
        self.languages.iter().map(|l| l.id.as_str()).collect()
    }
}

/// Deserialize an ordered language table into a `Vec`, keeping declaration order.
fn deserialize_languages<'de, D>(deserializer: D) -> Result<Vec<Language>, D::Error>
where
    D: Deserializer<'de>,
{
    struct LanguagesVisitor;

    impl<'de> Visitor<'de> for LanguagesVisitor {
        type Value = Vec<Language>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a table of language id to language settings")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut languages = Vec::new();
            while let Some((id, raw)) = map.next_entry::<String, LanguageRaw>()? {
                languages.push(Language {
                    label: raw.label.unwrap_or_else(|| id.clone()),
                    locale: raw.locale,
                    id,
                });
            }
            Ok(languages)
        }
    }

    deserializer.deserialize_map(LanguagesVisitor)
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`pages.src_dir`").
        field: String,
        /// Error message (e.g., "${`SITE_DIR`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional overrides.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `isle.toml` in current directory and parents.
    ///
    /// Overrides are applied after loading and path resolution.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        overrides: Option<&Overrides>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(overrides) = overrides {
            config.apply_overrides(overrides);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply overrides to the configuration.
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(pages_dir) = &overrides.pages_dir {
            self.pages_resolved.pages_dir.clone_from(pages_dir);
        }
        if let Some(mode) = overrides.mode {
            self.mode = mode;
        }
        if let Some(language) = &overrides.default_language {
            self.pages_resolved.default_language = Some(language.clone());
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            pages: PagesConfigRaw::default(),
            i18n: I18nConfigRaw::default(),
            mode: Mode::default(),
            pages_resolved: PagesConfig {
                root: base.to_path_buf(),
                src_dir: base.join("src"),
                pages_dir: base.join("src").join("pages"),
                extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_owned()).collect(),
                default_language: None,
                languages: Vec::new(),
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    ///
    /// Resolved paths are always absolute, also for a relative `path`.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let path = &std::path::absolute(path)?;
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_pages()?;
        self.validate_languages()?;
        Ok(())
    }

    /// Validate page discovery configuration.
    fn validate_pages(&self) -> Result<(), ConfigError> {
        let pages = &self.pages_resolved;
        if pages.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "pages.extensions cannot be empty".to_owned(),
            ));
        }
        for ext in &pages.extensions {
            require_non_empty(ext, "pages.extensions")?;
        }
        Ok(())
    }

    /// Validate language ids and the default language.
    fn validate_languages(&self) -> Result<(), ConfigError> {
        let pages = &self.pages_resolved;

        for language in &pages.languages {
            require_non_empty(&language.id, "i18n.languages")?;
            if language.id.contains(['.', '/', '\\']) {
                return Err(ConfigError::Validation(format!(
                    "i18n.languages: invalid language id {:?}",
                    language.id
                )));
            }
        }

        if let Some(default) = &pages.default_language
            && !pages.languages.is_empty()
            && !pages.languages.iter().any(|l| &l.id == default)
        {
            return Err(ConfigError::Validation(format!(
                "i18n.default_language {default:?} is not a configured language"
            )));
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref dir) = self.pages.src_dir {
            self.pages.src_dir = Some(expand::expand_env(dir, "pages.src_dir")?);
        }
        if let Some(ref dir) = self.pages.pages_dir {
            self.pages.pages_dir = Some(expand::expand_env(dir, "pages.pages_dir")?);
        }
        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    ///
    /// `pages_dir` is relative to `src_dir`.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let src_dir = config_dir.join(self.pages.src_dir.as_deref().unwrap_or("src"));
        let pages_dir = src_dir.join(self.pages.pages_dir.as_deref().unwrap_or("pages"));

        let extensions = match &self.pages.extensions {
            Some(exts) => exts
                .iter()
                .map(|e| e.trim_start_matches('.').to_owned())
                .collect(),
            None => DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_owned()).collect(),
        };

        self.pages_resolved = PagesConfig {
            root: config_dir.to_path_buf(),
            src_dir,
            pages_dir,
            extensions,
            default_language: self.i18n.default_language.clone(),
            languages: self.i18n.languages.clone(),
        };
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/site"));
        assert_eq!(config.pages_resolved.root, PathBuf::from("/site"));
        assert_eq!(config.pages_resolved.src_dir, PathBuf::from("/site/src"));
        assert_eq!(
            config.pages_resolved.pages_dir,
            PathBuf::from("/site/src/pages")
        );
        assert_eq!(
            config.pages_resolved.extensions,
            vec!["vue", "tsx", "jsx", "md", "mdx"]
        );
        assert_eq!(config.mode, Mode::Build);
        assert!(config.pages_resolved.languages.is_empty());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.mode, Mode::Build);
        assert!(config.i18n.languages.is_empty());
    }

    #[test]
    fn test_parse_mode() {
        let config: Config = toml::from_str(r#"mode = "dev""#).unwrap();
        assert_eq!(config.mode, Mode::Dev);
    }

    #[test]
    fn test_languages_keep_declaration_order() {
        let toml = r#"
[i18n]
default_language = "de"

[i18n.languages]
fr = { label = "Français" }
de = { label = "Deutsch", locale = "de-DE" }
en = {}
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/site"));

        assert_eq!(config.pages_resolved.language_ids(), vec!["fr", "de", "en"]);
        assert_eq!(config.pages_resolved.languages[1].label, "Deutsch");
        assert_eq!(
            config.pages_resolved.languages[1].locale.as_deref(),
            Some("de-DE")
        );
        assert_eq!(config.pages_resolved.languages[2].label, "en");
        assert_eq!(config.pages_resolved.default_language.as_deref(), Some("de"));
    }

    #[test]
    fn test_resolve_paths() {
        let toml = r#"
[pages]
src_dir = "app"
pages_dir = "routes"
extensions = [".tsx", "md"]
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(config.pages_resolved.src_dir, PathBuf::from("/project/app"));
        assert_eq!(
            config.pages_resolved.pages_dir,
            PathBuf::from("/project/app/routes")
        );
        assert_eq!(config.pages_resolved.extensions, vec!["tsx", "md"]);
    }

    #[test]
    fn test_default_language_must_be_configured() {
        let toml = r#"
[i18n]
default_language = "it"

[i18n.languages]
en = {}
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("\"it\""));
    }

    #[test]
    fn test_language_id_with_dot_rejected() {
        let toml = r#"
[i18n.languages]
"en.us" = {}
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_extensions_rejected() {
        let toml = r"
[pages]
extensions = []
";
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pages.extensions"));
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = Config::default_with_base(Path::new("/site"));
        let overrides = Overrides {
            pages_dir: Some(PathBuf::from("/elsewhere/pages")),
            mode: Some(Mode::Dev),
            ..Default::default()
        };

        config.apply_overrides(&overrides);

        assert_eq!(
            config.pages_resolved.pages_dir,
            PathBuf::from("/elsewhere/pages")
        );
        assert_eq!(config.mode, Mode::Dev);
        assert!(config.pages_resolved.default_language.is_none());
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let result = Config::load(Some(Path::new("/nonexistent/isle.toml")), None);
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_from_file_resolves_relative_to_config_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("isle.toml");
        std::fs::write(
            &config_path,
            r#"
mode = "dev"

[pages]
pages_dir = "content"

[i18n]
default_language = "en"

[i18n.languages]
en = {}
de = {}
"#,
        )
        .unwrap();

        let config = Config::load(Some(&config_path), None).unwrap();

        assert_eq!(config.mode, Mode::Dev);
        assert_eq!(
            config.pages_resolved.pages_dir,
            temp_dir.path().join("src").join("content")
        );
        assert_eq!(config.pages_resolved.language_ids(), vec!["en", "de"]);
        assert_eq!(config.config_path, Some(config_path));
    }

    #[test]
    fn test_load_relative_config_path_resolves_absolute() {
        let temp_dir = tempfile::tempdir_in(".").unwrap();
        let config_path = temp_dir.path().join("isle.toml");
        std::fs::write(&config_path, "[pages]\nextensions = [\"md\"]\n").unwrap();
        assert!(config_path.is_relative());

        let config = Config::load(Some(&config_path), None).unwrap();
        let pages = &config.pages_resolved;

        assert!(pages.root.is_absolute());
        assert!(pages.pages_dir.is_absolute());
        assert!(pages.pages_dir.ends_with("src/pages"));
        assert!(config.config_path.is_some_and(|p| p.is_absolute()));
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("isle.toml");
        std::fs::write(&config_path, "[pages\nsrc_dir = ").unwrap();

        let result = Config::load(Some(&config_path), None);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
