//! Fetch module for provider requests
//!
//! This module contains:
//! - The paced, retrying HTTP client
//! - The failure taxonomy used for retry and persistence decisions
//! - The diagnostic log of non-2xx responses

mod client;
mod diagnostic_log;
mod error;

pub use client::{build_http_client, FetchClient};
pub use diagnostic_log::{DiagnosticLog, ResponseDiagnostic};
pub use error::{ErrorKind, FetchError};
