use crate::config::types::{
    Config, FetchConfig, IngestConfig, OutputConfig, ProviderConfig, UserAgentConfig,
    ID_PLACEHOLDER,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_user_agent_config(&config.user_agent)?;
    validate_provider_config(&config.providers)?;
    validate_fetch_config(&config.fetch)?;
    validate_ingest_config(&config.ingest)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.client_name.is_empty() {
        return Err(ConfigError::Validation(
            "client_name cannot be empty".to_string(),
        ));
    }

    if !config
        .client_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "client_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.client_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates the provider endpoints
fn validate_provider_config(config: &ProviderConfig) -> Result<(), ConfigError> {
    Url::parse(&config.master_list_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid master-list-url: {}", e)))?;

    validate_per_id_url("stats-url", &config.stats_url)?;
    validate_per_id_url("store-url", &config.store_url)?;

    Ok(())
}

/// A per-id URL must carry the placeholder and parse once it is substituted
fn validate_per_id_url(key: &str, template: &str) -> Result<(), ConfigError> {
    if !template.contains(ID_PLACEHOLDER) {
        return Err(ConfigError::Validation(format!(
            "{} must contain the {} placeholder, got '{}'",
            key, ID_PLACEHOLDER, template
        )));
    }

    let sample = template.replace(ID_PLACEHOLDER, "0");
    Url::parse(&sample)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", key, template, e)))?;

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "timeout-ms must be >= 1".to_string(),
        ));
    }

    if config.timeout_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-attempts must be >= 1, got {}",
            config.timeout_attempts
        )));
    }

    if config.rate_limit_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "rate-limit-attempts must be >= 1, got {}",
            config.rate_limit_attempts
        )));
    }

    if config.connection_retry_ceiling_ms < config.connection_retry_wait_ms {
        return Err(ConfigError::Validation(format!(
            "connection-retry-ceiling-ms ({}) must not be below connection-retry-wait-ms ({})",
            config.connection_retry_ceiling_ms, config.connection_retry_wait_ms
        )));
    }

    Ok(())
}

fn validate_ingest_config(config: &IngestConfig) -> Result<(), ConfigError> {
    if config.store_request_budget < 1 {
        return Err(ConfigError::Validation(format!(
            "store-request-budget must be >= 1, got {}",
            config.store_request_budget
        )));
    }

    if config.owner_ceiling == 0 {
        return Err(ConfigError::Validation(
            "owner-ceiling must be > 0".to_string(),
        ));
    }

    if config.checkpoint_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "checkpoint-interval must be >= 1, got {}",
            config.checkpoint_interval
        )));
    }

    if config.expected_type.trim().is_empty() {
        return Err(ConfigError::Validation(
            "expected-type cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (key, value) in [
        ("database-path", &config.database_path),
        ("checkpoint-path", &config.checkpoint_path),
        ("diagnostic-log-path", &config.diagnostic_log_path),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", key)));
        }
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_per_id_url() {
        assert!(validate_per_id_url("stats-url", "https://a.example.com/?id={id}").is_ok());
        assert!(validate_per_id_url("stats-url", "https://a.example.com/{id}/details").is_ok());

        assert!(matches!(
            validate_per_id_url("stats-url", "https://a.example.com/?id="),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            validate_per_id_url("store-url", "not a url {id}"),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_validate_fetch_config() {
        assert!(validate_fetch_config(&FetchConfig::default()).is_ok());

        let config = FetchConfig {
            timeout_attempts: 0,
            ..FetchConfig::default()
        };
        assert!(validate_fetch_config(&config).is_err());

        let config = FetchConfig {
            connection_retry_wait_ms: 10_000,
            connection_retry_ceiling_ms: 5_000,
            ..FetchConfig::default()
        };
        assert!(validate_fetch_config(&config).is_err());
    }

    #[test]
    fn test_validate_ingest_config() {
        assert!(validate_ingest_config(&IngestConfig::default()).is_ok());

        let config = IngestConfig {
            store_request_budget: 0,
            ..IngestConfig::default()
        };
        assert!(validate_ingest_config(&config).is_err());

        let config = IngestConfig {
            expected_type: "  ".to_string(),
            ..IngestConfig::default()
        };
        assert!(validate_ingest_config(&config).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("admin@sub.example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
    }
}
