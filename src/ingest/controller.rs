//! Run controller - main ingestion orchestration logic
//!
//! This module contains the run loop that coordinates all aspects of an
//! ingestion run, including:
//! - Loading the checkpoint and applying pending resets
//! - Fetching or reusing the cached master list
//! - Enforcing the store request budget
//! - Periodic checkpoint flushes and progress reporting
//! - Handling interrupts and fatal errors without losing the position

use crate::config::Config;
use crate::fetch::{DiagnosticLog, FetchClient};
use crate::ingest::item::ItemIngestor;
use crate::ingest::{RunSummary, StopReason};
use crate::providers::MasterListResponse;
use crate::state::{CheckpointLog, CheckpointStore, ItemOutcome, JsonCheckpointStore};
use crate::storage::{MasterListEntry, RunStatus, SqliteStorage, Storage};
use crate::HarvestError;
use std::future::Future;
use std::path::Path;
use std::time::Instant;

/// Main ingestion controller
///
/// Owns the fetch client, the storage backend and the checkpoint log, and
/// threads them through every item. Items are processed strictly one after
/// another.
pub struct Controller<S: Storage, C: CheckpointStore> {
    config: Config,
    config_hash: String,
    storage: S,
    checkpoints: C,
    checkpoint: CheckpointLog,
    client: FetchClient,
    refresh_master_list: bool,
}

impl Controller<SqliteStorage, JsonCheckpointStore> {
    /// Opens the database and checkpoint file named in the configuration
    pub fn open(config: Config, config_hash: String) -> Result<Self, HarvestError> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        let checkpoints = JsonCheckpointStore::new(&config.output.checkpoint_path);
        Self::new(config, config_hash, storage, checkpoints)
    }
}

impl<S: Storage, C: CheckpointStore> Controller<S, C> {
    /// Creates a new controller instance
    ///
    /// # Arguments
    ///
    /// * `config` - The harvester configuration
    /// * `config_hash` - Hash of the configuration file, recorded with each run
    /// * `storage` - The storage backend
    /// * `checkpoints` - Where the checkpoint log is loaded from and saved to
    ///
    /// # Returns
    ///
    /// * `Ok(Controller)` - Successfully created controller
    /// * `Err(HarvestError)` - The checkpoint could not be loaded or the
    ///   HTTP client could not be built
    pub fn new(
        config: Config,
        config_hash: String,
        storage: S,
        checkpoints: C,
    ) -> Result<Self, HarvestError> {
        let checkpoint = checkpoints.load()?;

        let diagnostics = if config.output.diagnostic_log_path.is_empty() {
            DiagnosticLog::disabled()
        } else {
            DiagnosticLog::new(&config.output.diagnostic_log_path)
        };
        let client = FetchClient::new(&config.user_agent, config.fetch.clone(), diagnostics)?;

        Ok(Self {
            config,
            config_hash,
            storage,
            checkpoints,
            checkpoint,
            client,
            refresh_master_list: false,
        })
    }

    /// Fetch the master list again even if a cached copy exists
    pub fn with_refresh_master_list(mut self, refresh: bool) -> Self {
        self.refresh_master_list = refresh;
        self
    }

    pub fn checkpoint(&self) -> &CheckpointLog {
        &self.checkpoint
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Runs until the master list is exhausted or the budget is reached
    pub async fn run(&mut self) -> Result<RunSummary, HarvestError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs like [`Controller::run`], stopping early once `shutdown` resolves
    ///
    /// The shutdown future is only observed between await points, so an item
    /// merge is never cut in half.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<RunSummary, HarvestError>
    where
        F: Future<Output = ()>,
    {
        let run_id = self.start_run()?;
        let mut summary = RunSummary::default();
        let result = self.ingest_master_list(&mut summary, shutdown).await;
        self.finish_run(run_id, summary, result)
    }

    /// Re-runs ingestion for every recorded failure
    pub async fn repair(&mut self) -> Result<RunSummary, HarvestError> {
        self.repair_until(std::future::pending::<()>()).await
    }

    /// Repair pass that stops early once `shutdown` resolves
    ///
    /// The exclusion set is not consulted and the checkpoint position is left
    /// alone; the store request budget still applies.
    pub async fn repair_until<F>(&mut self, shutdown: F) -> Result<RunSummary, HarvestError>
    where
        F: Future<Output = ()>,
    {
        let run_id = self.start_run()?;
        let mut summary = RunSummary::default();
        let result = self.repair_failures(&mut summary, shutdown).await;
        self.finish_run(run_id, summary, result)
    }

    fn start_run(&mut self) -> Result<i64, HarvestError> {
        self.checkpoint.begin_run();
        self.save_checkpoint()?;
        let run_id = self.storage.create_run(&self.config_hash)?;
        tracing::info!(
            "Starting run {} at master list index {} ({} store requests already used)",
            run_id,
            self.checkpoint.last_processed_index,
            self.checkpoint.store_request_count
        );
        Ok(run_id)
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        summary: RunSummary,
        result: Result<(), HarvestError>,
    ) -> Result<RunSummary, HarvestError> {
        if let Err(e) = result {
            if let Err(save_error) = self.save_checkpoint() {
                tracing::error!("Failed to save checkpoint: {}", save_error);
            }
            if let Err(run_error) = self.storage.finish_run(run_id, RunStatus::Failed, &summary) {
                tracing::error!("Failed to record run {} as failed: {}", run_id, run_error);
            }
            tracing::error!(
                "Run {} failed; checkpoint is at master list index {}: {}",
                run_id,
                self.checkpoint.last_processed_index,
                e
            );
            return Err(e);
        }

        self.save_checkpoint()?;
        self.storage
            .finish_run(run_id, summary.stop_reason.run_status(), &summary)?;

        tracing::info!(
            "Run {} {}: {} updated, {} ineligible, {} over threshold, {} failed, {} ignored, {} store requests",
            run_id,
            summary.stop_reason,
            summary.updated,
            summary.ineligible,
            summary.over_threshold,
            summary.failed,
            summary.ignored,
            summary.requests_used
        );
        Ok(summary)
    }

    async fn ingest_master_list<F>(
        &mut self,
        summary: &mut RunSummary,
        shutdown: F,
    ) -> Result<(), HarvestError>
    where
        F: Future<Output = ()>,
    {
        let entries = self.load_master_list().await?;
        let excluded = self.storage.exclusion_set()?;
        let budget = self.config.ingest.store_request_budget;
        let interval = self.config.ingest.checkpoint_interval;
        let requests_at_start = self.checkpoint.store_request_count;
        let start = self.checkpoint.last_processed_index as usize;
        let started = Instant::now();

        summary.next_index = self.checkpoint.last_processed_index;
        tracing::info!(
            "Processing master list from index {} of {} ({} ids excluded)",
            start,
            entries.len(),
            excluded.len()
        );

        tokio::pin!(shutdown);

        for (index, entry) in entries.iter().enumerate().skip(start) {
            if self.checkpoint.budget_exhausted(budget) {
                tracing::info!(
                    "Store request budget of {} reached before index {}",
                    budget,
                    index
                );
                self.checkpoint.mark_budget_reached();
                summary.stop_reason = StopReason::BudgetReached;
                break;
            }

            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested before index {}", index);
                    summary.stop_reason = StopReason::Interrupted;
                    break;
                }
                outcome = self.ingest_entry(entry, excluded.contains(&entry.id)) => outcome?,
            };

            self.record(summary, &outcome);
            self.checkpoint.last_processed_index = index as u64 + 1;
            summary.next_index = self.checkpoint.last_processed_index;
            summary.requests_used = self.checkpoint.store_request_count - requests_at_start;

            if summary.processed() % interval == 0 {
                self.save_checkpoint()?;
                self.log_progress(summary, entries.len(), started);
            }
        }

        if summary.stop_reason == StopReason::Completed {
            tracing::info!("Pass over {} master list entries complete", entries.len());
            self.checkpoint.mark_pass_complete();
        }
        summary.requests_used = self
            .checkpoint
            .store_request_count
            .saturating_sub(requests_at_start);
        Ok(())
    }

    async fn repair_failures<F>(
        &mut self,
        summary: &mut RunSummary,
        shutdown: F,
    ) -> Result<(), HarvestError>
    where
        F: Future<Output = ()>,
    {
        let failures = self.storage.list_failed_requests()?;
        let budget = self.config.ingest.store_request_budget;
        let requests_at_start = self.checkpoint.store_request_count;

        summary.next_index = self.checkpoint.last_processed_index;
        tracing::info!("Repairing {} failed requests", failures.len());

        tokio::pin!(shutdown);

        for failure in failures {
            if self.checkpoint.budget_exhausted(budget) {
                tracing::info!("Store request budget of {} reached during repair", budget);
                self.checkpoint.mark_budget_reached();
                summary.stop_reason = StopReason::BudgetReached;
                break;
            }

            let entry = self
                .storage
                .get_master_entry(failure.id)?
                .unwrap_or(MasterListEntry {
                    id: failure.id,
                    name: String::new(),
                });

            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested during repair");
                    summary.stop_reason = StopReason::Interrupted;
                    break;
                }
                outcome = self.ingest_entry(&entry, false) => outcome?,
            };

            tracing::info!(
                "Repair of item {} ({} {}): {}",
                failure.id,
                failure.provider,
                failure.error_kind,
                outcome.state()
            );
            self.record(summary, &outcome);
        }

        summary.requests_used = self
            .checkpoint
            .store_request_count
            .saturating_sub(requests_at_start);
        Ok(())
    }

    /// Uses the cached master list unless it was never fetched or a refresh
    /// was requested
    async fn load_master_list(&mut self) -> Result<Vec<MasterListEntry>, HarvestError> {
        if self.checkpoint.master_list_fetched && !self.refresh_master_list {
            let cached = self.storage.load_master_list()?;
            if !cached.is_empty() {
                tracing::info!("Using cached master list of {} entries", cached.len());
                return Ok(cached);
            }
            tracing::warn!("Master list marked as fetched but the cache is empty");
        }

        tracing::info!(
            "Fetching master list from {}",
            self.config.providers.master_list_url
        );
        let response: MasterListResponse = self
            .client
            .fetch_json(&self.config.providers.master_list_url)
            .await?;
        let entries = response.into_entries();

        self.storage.save_master_list(&entries)?;
        self.checkpoint.master_list_fetched = true;
        self.save_checkpoint()?;

        tracing::info!("Cached master list of {} named entries", entries.len());
        Ok(entries)
    }

    async fn ingest_entry(
        &mut self,
        entry: &MasterListEntry,
        excluded: bool,
    ) -> Result<ItemOutcome, HarvestError> {
        let mut ingestor = ItemIngestor {
            client: &mut self.client,
            storage: &mut self.storage,
            checkpoint: &mut self.checkpoint,
            providers: &self.config.providers,
            policy: &self.config.ingest,
        };
        ingestor.ingest(entry, excluded).await
    }

    fn record(&mut self, summary: &mut RunSummary, outcome: &ItemOutcome) {
        self.checkpoint.record_outcome(outcome);
        summary.record(outcome);
    }

    fn save_checkpoint(&self) -> Result<(), HarvestError> {
        self.checkpoints.save(&self.checkpoint)?;
        Ok(())
    }

    fn log_progress(&self, summary: &RunSummary, total: usize, started: Instant) {
        let elapsed = started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            summary.processed() as f64 / elapsed
        } else {
            0.0
        };
        tracing::info!(
            "Progress: index {}/{} | {} updated | {} ineligible | {} over threshold | {} failed | {} ignored | {} store requests | {:.2} items/sec",
            self.checkpoint.last_processed_index,
            total,
            summary.updated,
            summary.ineligible,
            summary.over_threshold,
            summary.failed,
            summary.ignored,
            self.checkpoint.store_request_count,
            rate
        );
    }
}
