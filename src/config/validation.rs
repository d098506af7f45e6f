use crate::config::types::{ApiConfig, Config, HarvestConfig, KeyEntry, OutputConfig, RetryConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_retry_config(&config.retry)?;
    validate_keys(&config.keys)?;
    validate_harvest_config(&config.harvest)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the remote API section
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.key_param.is_empty() {
        return Err(ConfigError::Validation(
            "key-param cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.page_size == 0 {
        return Err(ConfigError::Validation(
            "page-size must be >= 1".to_string(),
        ));
    }

    let endpoints = &config.endpoints;
    for (name, value) in [
        ("channels", &endpoints.channels),
        ("playlist-items", &endpoints.playlist_items),
        ("videos", &endpoints.videos),
        ("comment-threads", &endpoints.comment_threads),
        ("cursor-param", &endpoints.cursor_param),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!(
                "endpoint '{}' cannot be empty",
                name
            )));
        }
    }

    Ok(())
}

/// Validates retry and backoff settings
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.base_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "base-delay-ms ({}) cannot exceed max-delay-ms ({})",
            config.base_delay_ms, config.max_delay_ms
        )));
    }

    if !(0.0..1.0).contains(&config.jitter) {
        return Err(ConfigError::Validation(format!(
            "jitter must be in [0, 1), got {}",
            config.jitter
        )));
    }

    Ok(())
}

/// Validates the key list: at least one key, unique labels, no blank tokens
fn validate_keys(keys: &[KeyEntry]) -> Result<(), ConfigError> {
    if keys.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[keys]] entry is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for key in keys {
        if key.label.trim().is_empty() {
            return Err(ConfigError::Validation(
                "key label cannot be empty".to_string(),
            ));
        }

        if key.token.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "key '{}' has an empty token",
                key.label
            )));
        }

        if !seen.insert(key.label.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate key label '{}'",
                key.label
            )));
        }
    }

    Ok(())
}

/// Validates the harvest section
fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    if config.resource.trim().is_empty() {
        return Err(ConfigError::Validation(
            "resource cannot be empty".to_string(),
        ));
    }

    if config.strategies.is_empty() {
        return Err(ConfigError::Validation(
            "at least one resolution strategy is required".to_string(),
        ));
    }

    if config.max_comment_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max-comment-pages must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(label: &str, token: &str) -> KeyEntry {
        KeyEntry {
            label: label.to_string(),
            token: token.to_string(),
        }
    }

    #[test]
    fn test_validate_keys() {
        assert!(validate_keys(&[key("a", "t1"), key("b", "t2")]).is_ok());

        assert!(validate_keys(&[]).is_err());
        assert!(validate_keys(&[key("", "t1")]).is_err());
        assert!(validate_keys(&[key("a", "  ")]).is_err());
        assert!(validate_keys(&[key("a", "t1"), key("a", "t2")]).is_err());
    }

    #[test]
    fn test_validate_retry_config() {
        assert!(validate_retry_config(&RetryConfig::default()).is_ok());

        let mut config = RetryConfig::default();
        config.max_attempts = 0;
        assert!(validate_retry_config(&config).is_err());

        let mut config = RetryConfig::default();
        config.jitter = 1.0;
        assert!(validate_retry_config(&config).is_err());

        let mut config = RetryConfig::default();
        config.jitter = -0.1;
        assert!(validate_retry_config(&config).is_err());
    }

    #[test]
    fn test_validate_api_base_url() {
        let mut api = ApiConfig {
            base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            key_param: "key".to_string(),
            timeout_secs: 30,
            page_size: 50,
            endpoints: Default::default(),
        };
        assert!(validate_api_config(&api).is_ok());

        api.base_url = "not a url".to_string();
        assert!(matches!(
            validate_api_config(&api),
            Err(ConfigError::InvalidUrl(_))
        ));

        api.base_url = "ftp://example.com/api".to_string();
        assert!(validate_api_config(&api).is_err());
    }
}
