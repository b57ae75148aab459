use serde::Deserialize;

/// Main configuration structure for Catalog-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub providers: ProviderConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    pub output: OutputConfig,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the client
    #[serde(rename = "client-name")]
    pub client_name: String,

    /// Version of the client
    #[serde(rename = "client-version")]
    pub client_version: String,

    /// URL with information about the client
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for client-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Endpoints of the master list and the two per-id providers
///
/// The per-id URLs carry an `{id}` placeholder that is substituted with the
/// item id before each request.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Bulk endpoint enumerating every item in the catalog
    #[serde(rename = "master-list-url")]
    pub master_list_url: String,

    /// Stats provider (ownership range, price, reviews, tag votes)
    #[serde(rename = "stats-url")]
    pub stats_url: String,

    /// Store provider (`{id: {success, data}}` envelope)
    #[serde(rename = "store-url")]
    pub store_url: String,
}

impl ProviderConfig {
    pub fn stats_url_for(&self, id: i64) -> String {
        self.stats_url.replace(ID_PLACEHOLDER, &id.to_string())
    }

    pub fn store_url_for(&self, id: i64) -> String {
        self.store_url.replace(ID_PLACEHOLDER, &id.to_string())
    }
}

pub const ID_PLACEHOLDER: &str = "{id}";

/// Retry, timeout and pacing knobs of the fetch client (all milliseconds)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Delay awaited before every HTTP request
    #[serde(rename = "request-delay-ms")]
    pub request_delay_ms: u64,

    /// Per-request timeout
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Total attempts for a request that keeps timing out
    #[serde(rename = "timeout-attempts")]
    pub timeout_attempts: u32,

    /// Base of the linear backoff after a timeout (`attempt * base`)
    #[serde(rename = "timeout-backoff-ms")]
    pub timeout_backoff_ms: u64,

    /// Cooldown after an HTTP 429
    #[serde(rename = "rate-limit-cooldown-ms")]
    pub rate_limit_cooldown_ms: u64,

    /// Total attempts for a request that keeps answering 429
    #[serde(rename = "rate-limit-attempts")]
    pub rate_limit_attempts: u32,

    /// Fixed wait between attempts after a connection-level error
    #[serde(rename = "connection-retry-wait-ms")]
    pub connection_retry_wait_ms: u64,

    /// Cumulative wait after which connection errors become fatal
    #[serde(rename = "connection-retry-ceiling-ms")]
    pub connection_retry_ceiling_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 1_000,
            timeout_ms: 10_000,
            timeout_attempts: 3,
            timeout_backoff_ms: 10_000,
            rate_limit_cooldown_ms: 30_000,
            rate_limit_attempts: 5,
            connection_retry_wait_ms: 60_000,
            connection_retry_ceiling_ms: 30 * 60 * 1_000,
        }
    }
}

/// Ingestion policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum store requests per budget window
    #[serde(rename = "store-request-budget")]
    pub store_request_budget: u64,

    /// Items whose minimum owner bound exceeds this are over threshold
    #[serde(rename = "owner-ceiling")]
    pub owner_ceiling: u64,

    /// Flush the checkpoint every this many items
    #[serde(rename = "checkpoint-interval")]
    pub checkpoint_interval: u64,

    /// Store content type that qualifies an item for ingestion
    #[serde(rename = "expected-type")]
    pub expected_type: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            store_request_budget: 100_000,
            owner_ceiling: 1_000_000,
            checkpoint_interval: 100,
            expected_type: "game".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the JSON checkpoint file
    #[serde(rename = "checkpoint-path")]
    pub checkpoint_path: String,

    /// Path to the JSON-lines log of non-2xx responses
    #[serde(rename = "diagnostic-log-path")]
    pub diagnostic_log_path: String,
}
