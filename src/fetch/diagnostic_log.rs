//! Append-only log of non-2xx provider responses
//!
//! One JSON object per line, kept for offline triage of provider behaviour.

use chrono::{DateTime, Utc};
use reqwest::Response;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A single non-2xx response as seen by the fetch client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseDiagnostic {
    pub recorded_at: DateTime<Utc>,
    pub url: String,
    pub status: u16,
    /// In arrival order; repeated headers keep every value
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ResponseDiagnostic {
    /// Captures status, headers and body, consuming the response
    pub async fn capture(url: &str, response: Response) -> Self {
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or("<non-utf8>").to_string(),
                )
            })
            .collect();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => format!("<unreadable body: {}>", e),
        };

        Self {
            recorded_at: Utc::now(),
            url: url.to_string(),
            status,
            headers,
            body,
        }
    }
}

/// JSON-lines sink for response diagnostics
#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    path: Option<PathBuf>,
}

impl DiagnosticLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A log that drops every entry
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Appends one entry, creating the file on first use
    pub fn append(&self, entry: &ResponseDiagnostic) -> std::io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let line = serde_json::to_string(entry)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Reads every entry back, skipping lines that do not parse
    pub fn read_all(&self) -> std::io::Result<Vec<ResponseDiagnostic>> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(path)?;
        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(status: u16) -> ResponseDiagnostic {
        let headers = vec![
            ("retry-after".to_string(), "30".to_string()),
            ("set-cookie".to_string(), "a=1".to_string()),
            ("set-cookie".to_string(), "b=2".to_string()),
        ];
        ResponseDiagnostic {
            recorded_at: Utc::now(),
            url: "https://store.example.com/api/appdetails/?appids=42".to_string(),
            status,
            headers,
            body: "slow down".to_string(),
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = DiagnosticLog::new(dir.path().join("responses.jsonl"));

        log.append(&sample(429)).unwrap();
        log.append(&sample(500)).unwrap();

        let entries = log.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, 429);
        assert_eq!(entries[1].status, 500);
        assert_eq!(entries[0].headers, sample(429).headers);
        let cookies: Vec<&str> = entries[0]
            .headers
            .iter()
            .filter(|(name, _)| name == "set-cookie")
            .map(|(_, value)| value.as_str())
            .collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_disabled_log_drops_entries() {
        let log = DiagnosticLog::disabled();
        log.append(&sample(404)).unwrap();
        assert!(log.read_all().unwrap().is_empty());
        assert!(log.path().is_none());
    }
}
