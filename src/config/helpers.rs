//! Environment variable readers shared by the config sections.

use std::str::FromStr;

use crate::error::ConfigError;

/// Read an environment variable. Unset and empty are both `None`.
pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode {
            key: key.to_string(),
        }),
    }
}

/// Parse an environment variable, falling back to `default` when unset.
pub(crate) fn parse_optional_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key)?
        .map(|s| {
            s.parse().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{e}"),
            })
        })
        .transpose()
        .map(|v| v.unwrap_or(default))
}

/// Parse a `true`/`false` environment variable.
pub(crate) fn parse_bool_env(key: &str, default: bool) -> Result<bool, ConfigError> {
    optional_env(key)?
        .map(|s| s.to_ascii_lowercase().parse())
        .transpose()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be 'true' or 'false': {e}"),
        })
        .map(|v| v.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable; the process environment is shared.

    #[test]
    fn test_unset_is_none() {
        assert_eq!(optional_env("TLS_FIXTURES_TEST_UNSET_0").unwrap(), None);
        assert_eq!(
            parse_optional_env("TLS_FIXTURES_TEST_UNSET_1", 7u64).unwrap(),
            7
        );
        assert!(parse_bool_env("TLS_FIXTURES_TEST_UNSET_2", true).unwrap());
    }

    #[test]
    fn test_parse_invalid_number() {
        unsafe { std::env::set_var("TLS_FIXTURES_TEST_NUMBER", "fifty") };
        let err = parse_optional_env("TLS_FIXTURES_TEST_NUMBER", 50u64).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "TLS_FIXTURES_TEST_NUMBER"));
        unsafe { std::env::remove_var("TLS_FIXTURES_TEST_NUMBER") };
    }

    #[test]
    fn test_parse_bool_is_case_insensitive() {
        unsafe { std::env::set_var("TLS_FIXTURES_TEST_BOOL", "TRUE") };
        assert!(parse_bool_env("TLS_FIXTURES_TEST_BOOL", false).unwrap());
        unsafe { std::env::set_var("TLS_FIXTURES_TEST_BOOL", "yes") };
        assert!(parse_bool_env("TLS_FIXTURES_TEST_BOOL", false).is_err());
        unsafe { std::env::remove_var("TLS_FIXTURES_TEST_BOOL") };
    }
}
