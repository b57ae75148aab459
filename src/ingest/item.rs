//! Per-item ingestion
//!
//! Drives one master list entry through the item states:
//! `Pending → FetchingStats → EligibilityCheck → FetchingStore → Classifying`
//! and into a terminal outcome. Every outcome other than `Ignored` is written
//! to storage before the step that produced it returns.

use crate::config::{IngestConfig, ProviderConfig};
use crate::fetch::{ErrorKind, FetchClient, FetchError};
use crate::providers::{
    assemble_item, parse_owner_range, StatsFields, StatsPayload, StoreEnvelope, StoreFields,
    StoreResponse,
};
use crate::state::{CheckpointLog, ItemOutcome, ItemState};
use crate::storage::{FailedRequestRecord, MasterListEntry, Provider, Storage};
use crate::HarvestError;
use chrono::Utc;

/// A state plus the data gathered so far
enum Step {
    Pending,
    FetchingStats,
    EligibilityCheck(StatsPayload),
    FetchingStore(StatsFields),
    Classifying(StatsFields, StoreEnvelope),
    Done(ItemOutcome),
}

impl Step {
    fn state(&self) -> ItemState {
        match self {
            Self::Pending => ItemState::Pending,
            Self::FetchingStats => ItemState::FetchingStats,
            Self::EligibilityCheck(_) => ItemState::EligibilityCheck,
            Self::FetchingStore(_) => ItemState::FetchingStore,
            Self::Classifying(..) => ItemState::Classifying,
            Self::Done(outcome) => outcome.state(),
        }
    }
}

/// Borrowed view of everything one item needs
pub struct ItemIngestor<'a, S: Storage> {
    pub client: &'a mut FetchClient,
    pub storage: &'a mut S,
    pub checkpoint: &'a mut CheckpointLog,
    pub providers: &'a ProviderConfig,
    pub policy: &'a IngestConfig,
}

impl<'a, S: Storage> ItemIngestor<'a, S> {
    /// Runs one entry to a terminal outcome
    ///
    /// # Arguments
    ///
    /// * `entry` - The master list entry to ingest
    /// * `excluded` - Whether the id is in the exclusion set
    ///
    /// # Returns
    ///
    /// * `Ok(ItemOutcome)` - The item reached a terminal state
    /// * `Err(HarvestError)` - A fatal connection or storage error
    pub async fn ingest(
        &mut self,
        entry: &MasterListEntry,
        excluded: bool,
    ) -> Result<ItemOutcome, HarvestError> {
        let mut step = if excluded {
            Step::Done(ItemOutcome::Ignored)
        } else {
            Step::Pending
        };

        loop {
            if let Step::Done(outcome) = step {
                return Ok(outcome);
            }

            let from = step.state();
            step = self.advance(entry, step).await?;
            tracing::debug!("Item {}: {} -> {}", entry.id, from, step.state());
        }
    }

    async fn advance(&mut self, entry: &MasterListEntry, step: Step) -> Result<Step, HarvestError> {
        let id = entry.id;

        let next = match step {
            Step::Pending => Step::FetchingStats,

            Step::FetchingStats => {
                let url = self.providers.stats_url_for(id);
                match self.client.fetch_json::<StatsPayload>(&url).await {
                    Ok(payload) => Step::EligibilityCheck(payload),
                    Err(e) => self.fail(id, Provider::Stats, e)?,
                }
            }

            Step::EligibilityCheck(payload) => match parse_owner_range(&payload.owners) {
                None => {
                    tracing::warn!("Item {}: unparseable owner range {:?}", id, payload.owners);
                    self.record_failure(id, Provider::Stats, ErrorKind::MalformedResponse, Some(200))?
                }
                Some(owners) if owners.min > self.policy.owner_ceiling as i64 => {
                    self.storage.record_over_threshold(id, owners.min)?;
                    Step::Done(ItemOutcome::OverThreshold {
                        min_owners: owners.min,
                    })
                }
                Some(owners) => Step::FetchingStore(StatsFields::from_payload(payload, owners)),
            },

            Step::FetchingStore(stats) => {
                let url = self.providers.store_url_for(id);
                self.checkpoint.record_store_request(Utc::now());
                match self.client.fetch_json::<StoreResponse>(&url).await {
                    Ok(mut response) => match response.remove(&id.to_string()) {
                        Some(envelope) => Step::Classifying(stats, envelope),
                        None => {
                            tracing::warn!("Item {}: store response lacks its own key", id);
                            self.record_failure(
                                id,
                                Provider::Store,
                                ErrorKind::MalformedResponse,
                                Some(200),
                            )?
                        }
                    },
                    Err(e) => self.fail(id, Provider::Store, e)?,
                }
            }

            Step::Classifying(stats, envelope) => {
                if !envelope.success {
                    tracing::warn!("Item {}: store rejected the request", id);
                    return self.record_failure(id, Provider::Store, ErrorKind::ResponseRejected, None);
                }
                let Some(data) = envelope.data else {
                    tracing::warn!("Item {}: store envelope has no data", id);
                    return self.record_failure(
                        id,
                        Provider::Store,
                        ErrorKind::MalformedResponse,
                        Some(200),
                    );
                };

                if data.kind != self.policy.expected_type {
                    tracing::debug!("Item {}: type {:?} is not eligible", id, data.kind);
                    self.storage.record_ineligible(id)?;
                    return Ok(Step::Done(ItemOutcome::Ineligible));
                }

                let item = assemble_item(entry, stats, StoreFields::from_data(data));
                self.storage.merge_item(&item)?;
                Step::Done(ItemOutcome::Merged)
            }

            Step::Done(outcome) => Step::Done(outcome),
        };

        Ok(next)
    }

    /// Records a classified fetch failure, or propagates a fatal one
    fn fail(&mut self, id: i64, provider: Provider, error: FetchError) -> Result<Step, HarvestError> {
        let Some(kind) = error.kind() else {
            return Err(error.into());
        };
        tracing::warn!("Item {}: {} request failed: {}", id, provider, error);
        self.record_failure(id, provider, kind, error.status_code())
    }

    fn record_failure(
        &mut self,
        id: i64,
        provider: Provider,
        kind: ErrorKind,
        status: Option<u16>,
    ) -> Result<Step, HarvestError> {
        self.storage.record_failed_request(&FailedRequestRecord {
            id,
            provider,
            error_kind: kind,
            status_code: status,
        })?;
        Ok(Step::Done(ItemOutcome::Failed {
            provider,
            kind,
            status,
        }))
    }
}
