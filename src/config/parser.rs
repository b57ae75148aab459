use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigResult;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Recorded with every run so the history shows which settings produced it.
pub fn compute_config_hash(path: &Path) -> ConfigResult<String> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> ConfigResult<(Config, String)> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const VALID_CONFIG: &str = r#"
[user-agent]
client-name = "TestHarvester"
client-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[providers]
master-list-url = "https://api.example.com/GetAppList/v2/"
stats-url = "https://stats.example.com/api.php?request=appdetails&appid={id}"
store-url = "https://store.example.com/api/appdetails/?appids={id}"

[fetch]
request-delay-ms = 250
rate-limit-attempts = 4

[ingest]
store-request-budget = 500
owner-ceiling = 2000000

[output]
database-path = "./apps.db"
checkpoint-path = "./checkpoint.json"
diagnostic-log-path = "./responses.jsonl"
"#;

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.user_agent.client_name, "TestHarvester");
        assert_eq!(config.fetch.request_delay_ms, 250);
        assert_eq!(config.fetch.rate_limit_attempts, 4);
        // Unset keys fall back to defaults
        assert_eq!(config.fetch.timeout_attempts, 3);
        assert_eq!(config.ingest.store_request_budget, 500);
        assert_eq!(config.ingest.owner_ceiling, 2_000_000);
        assert_eq!(config.ingest.checkpoint_interval, 100);
        assert_eq!(config.ingest.expected_type, "game");
    }

    #[test]
    fn test_missing_tables_use_defaults() {
        let content = VALID_CONFIG
            .replace("[fetch]\nrequest-delay-ms = 250\nrate-limit-attempts = 4\n", "")
            .replace(
                "[ingest]\nstore-request-budget = 500\nowner-ceiling = 2000000\n",
                "",
            );
        let file = create_temp_config(&content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.fetch.request_delay_ms, 1_000);
        assert_eq!(config.ingest.store_request_budget, 100_000);
    }

    #[test]
    fn test_provider_url_substitution() {
        let file = create_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(
            config.providers.store_url_for(42),
            "https://store.example.com/api/appdetails/?appids=42"
        );
        assert_eq!(
            config.providers.stats_url_for(7),
            "https://stats.example.com/api.php?request=appdetails&appid=7"
        );
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/harvest.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let content = VALID_CONFIG.replace("rate-limit-attempts = 4", "rate-limit-attempts = 0");
        let file = create_temp_config(&content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
