//! Environment variable expansion for configuration strings.

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` references in a configuration value.
///
/// # Errors
///
/// Returns `ConfigError::EnvVar` naming `field` if a referenced variable is
/// unset and has no default.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    shellexpand::env(value)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{}}} not set", e.var_name),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_value_unchanged() {
        assert_eq!(expand_env("src/pages", "pages.dir").unwrap(), "src/pages");
    }

    #[test]
    fn test_default_used_when_unset() {
        let value = expand_env("${ISLE_TEST_SURELY_UNSET_VAR:-site}", "pages.src_dir").unwrap();
        assert_eq!(value, "site");
    }

    #[test]
    fn test_unset_without_default_errors() {
        let err = expand_env("${ISLE_TEST_SURELY_UNSET_VAR}", "pages.src_dir").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("pages.src_dir"));
        assert!(message.contains("ISLE_TEST_SURELY_UNSET_VAR"));
    }
}
