//! Shared fixtures for the integration tests

use catalog_harvest::config::{
    Config, FetchConfig, IngestConfig, OutputConfig, ProviderConfig, UserAgentConfig,
};
use serde_json::{json, Value};
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        client_name: "TestHarvester".to_string(),
        client_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

/// Fetch settings with every wait shortened to a few milliseconds
pub fn fast_fetch() -> FetchConfig {
    FetchConfig {
        request_delay_ms: 0,
        timeout_ms: 200,
        timeout_attempts: 3,
        timeout_backoff_ms: 1,
        rate_limit_cooldown_ms: 1,
        rate_limit_attempts: 3,
        connection_retry_wait_ms: 10,
        connection_retry_ceiling_ms: 30,
    }
}

/// Creates a test configuration pointing at the mock server
pub fn create_test_config(base_url: &str, dir: &Path, budget: u64) -> Config {
    Config {
        user_agent: user_agent(),
        providers: ProviderConfig {
            master_list_url: format!("{}/applist", base_url),
            stats_url: format!("{}/stats/{{id}}", base_url),
            store_url: format!("{}/store/{{id}}", base_url),
        },
        fetch: fast_fetch(),
        ingest: IngestConfig {
            store_request_budget: budget,
            owner_ceiling: 1_000_000,
            checkpoint_interval: 2,
            expected_type: "game".to_string(),
        },
        output: OutputConfig {
            database_path: dir.join("catalog.db").to_string_lossy().into_owned(),
            checkpoint_path: dir.join("checkpoint.json").to_string_lossy().into_owned(),
            diagnostic_log_path: String::new(),
        },
    }
}

pub async fn mount_master_list(server: &MockServer, apps: &[(i64, &str)]) {
    let apps: Vec<Value> = apps
        .iter()
        .map(|(id, name)| json!({ "appid": id, "name": name }))
        .collect();

    Mock::given(method("GET"))
        .and(path("/applist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "applist": { "apps": apps } })))
        .mount(server)
        .await;
}

pub fn stats_body(owners: &str) -> Value {
    json!({
        "owners": owners,
        "price": "999",
        "positive": 90,
        "negative": 10,
        "tags": { "Action": 120, "Indie": 45 }
    })
}

pub async fn mount_stats(server: &MockServer, id: i64, owners: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/stats/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(stats_body(owners)))
        .mount(server)
        .await;
}

pub fn store_body(id: i64, kind: &str) -> Value {
    json!({
        id.to_string(): {
            "success": true,
            "data": {
                "type": kind,
                "name": format!("Item {}", id),
                "release_date": { "coming_soon": false, "date": "14 Mar, 2021" },
                "developers": ["Studio"],
                "publishers": ["Publisher"],
                "short_description": "Short",
                "header_image": "https://cdn.example.com/header.jpg",
                "supported_languages": "English",
                "platforms": { "windows": true, "mac": false, "linux": true },
                "genres": [{ "id": "1", "description": "Action" }],
                "categories": [{ "id": 2, "description": "Single-player" }]
            }
        }
    })
}

pub async fn mount_store(server: &MockServer, id: i64, kind: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/store/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(store_body(id, kind)))
        .mount(server)
        .await;
}
