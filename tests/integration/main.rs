//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the master list, stats and store
//! providers and drive the fetch client and the run controller end-to-end.

mod common;
mod fetch_tests;
mod ingest_tests;
