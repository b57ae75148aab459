//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::fetch::ErrorKind;
use crate::ingest::RunSummary;
use crate::query::{BuiltQuery, ItemSummary};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    FailedRequestRecord, ItemRecord, LookupKind, MasterListEntry, Provider, RunRecord, RunStatus,
    Screenshot,
};
use crate::HarvestError;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";

const UPSERT_ITEM_SQL: &str = "
    INSERT INTO items (
        id, name, price, release_date, coming_soon, developers, publishers,
        owner_count, positive_reviews, negative_reviews, rating,
        about_the_game, short_description, detailed_description, website,
        header_image, screenshots, languages, windows, mac, linux, updated_at
    ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
        ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22
    )
    ON CONFLICT(id) DO UPDATE SET
        name = excluded.name,
        price = excluded.price,
        release_date = excluded.release_date,
        coming_soon = excluded.coming_soon,
        developers = excluded.developers,
        publishers = excluded.publishers,
        owner_count = excluded.owner_count,
        positive_reviews = excluded.positive_reviews,
        negative_reviews = excluded.negative_reviews,
        rating = excluded.rating,
        about_the_game = excluded.about_the_game,
        short_description = excluded.short_description,
        detailed_description = excluded.detailed_description,
        website = excluded.website,
        header_image = excluded.header_image,
        screenshots = excluded.screenshots,
        languages = excluded.languages,
        windows = excluded.windows,
        mac = excluded.mac,
        linux = excluded.linux,
        updated_at = excluded.updated_at
";

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status, updated, \
    ineligible, over_threshold, failed, ignored, requests_used, next_index";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        // WAL lets read-side queries run while a harvest is writing
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn load_relation(&self, sql: &str, item_id: i64) -> StorageResult<BTreeMap<String, i64>> {
        let mut stmt = self.conn.prepare(sql)?;
        let pairs = stmt
            .query_map(params![item_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(pairs)
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> StorageResult<String> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn from_json<T: DeserializeOwned>(column: &str, raw: &str) -> StorageResult<T> {
    serde_json::from_str(raw)
        .map_err(|e| StorageError::Serialization(format!("column {}: {}", column, e)))
}

fn row_to_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Running),
        updated: row.get::<_, i64>(5)? as u64,
        ineligible: row.get::<_, i64>(6)? as u64,
        over_threshold: row.get::<_, i64>(7)? as u64,
        failed: row.get::<_, i64>(8)? as u64,
        ignored: row.get::<_, i64>(9)? as u64,
        requests_used: row.get::<_, i64>(10)? as u64,
        next_index: row.get::<_, i64>(11)? as u64,
    })
}

/// Returns the local id for a tag name, creating it on first sight
fn resolve_tag(tx: &Transaction<'_>, name: &str) -> StorageResult<i64> {
    tx.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", params![name])?;
    let id = tx.query_row("SELECT id FROM tags WHERE name = ?1", params![name], |row| {
        row.get(0)
    })?;
    Ok(id)
}

/// Returns the id to link for a provider-keyed lookup
///
/// The first writer of an id or a name wins. A later conflicting pair links
/// to the row that already owns the name, or else to the provider id, which
/// is then guaranteed to exist.
fn resolve_provider_lookup(
    tx: &Transaction<'_>,
    kind: LookupKind,
    provider_id: i64,
    name: &str,
) -> StorageResult<i64> {
    tx.execute(
        &format!(
            "INSERT OR IGNORE INTO {} (id, name) VALUES (?1, ?2)",
            kind.table()
        ),
        params![provider_id, name],
    )?;
    let existing: Option<i64> = tx
        .query_row(
            &format!("SELECT id FROM {} WHERE name = ?1", kind.table()),
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    // Provider id already names another entry
    tx.execute(
        &format!("INSERT INTO {} (name) VALUES (?1)", kind.table()),
        params![name],
    )?;
    Ok(tx.last_insert_rowid())
}

struct ItemRow {
    id: i64,
    name: String,
    price: Option<i64>,
    release_date: Option<String>,
    coming_soon: bool,
    developers: String,
    publishers: String,
    owner_count: i64,
    positive_reviews: i64,
    negative_reviews: i64,
    rating: Option<u8>,
    about_the_game: String,
    short_description: String,
    detailed_description: String,
    website: Option<String>,
    header_image: String,
    screenshots: String,
    languages: String,
    windows: bool,
    mac: bool,
    linux: bool,
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                row_to_run,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                row_to_run,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        summary: &RunSummary,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, updated = ?3, ineligible = ?4,
                over_threshold = ?5, failed = ?6, ignored = ?7, requests_used = ?8,
                next_index = ?9
             WHERE id = ?10",
            params![
                status.to_db_string(),
                now,
                summary.updated as i64,
                summary.ineligible as i64,
                summary.over_threshold as i64,
                summary.failed as i64,
                summary.ignored as i64,
                summary.requests_used as i64,
                summary.next_index as i64,
                run_id
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Master List =====

    fn save_master_list(&mut self, entries: &[MasterListEntry]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM master_list", [])?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO master_list (position, id, name) VALUES (?1, ?2, ?3)")?;
            for (position, entry) in entries.iter().enumerate() {
                stmt.execute(params![position as i64, entry.id, entry.name])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_master_list(&self) -> StorageResult<Vec<MasterListEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM master_list ORDER BY position")?;
        let entries = stmt
            .query_map([], |row| {
                Ok(MasterListEntry {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn get_master_entry(&self, id: i64) -> StorageResult<Option<MasterListEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT id, name FROM master_list WHERE id = ?1 ORDER BY position LIMIT 1",
                params![id],
                |row| {
                    Ok(MasterListEntry {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    // ===== Items =====

    fn merge_item(&mut self, item: &ItemRecord) -> StorageResult<()> {
        let developers = to_json(&item.developers)?;
        let publishers = to_json(&item.publishers)?;
        let screenshots = to_json(&item.screenshots)?;
        let release_date = item
            .release_date
            .map(|date| date.format(DATE_FORMAT).to_string());
        let now = Utc::now().to_rfc3339();

        let tx = self.conn.transaction()?;

        tx.execute(
            UPSERT_ITEM_SQL,
            params![
                item.id,
                item.name,
                item.price,
                release_date,
                item.coming_soon,
                developers,
                publishers,
                item.owner_count,
                item.positive_reviews,
                item.negative_reviews,
                item.rating,
                item.about_the_game,
                item.short_description,
                item.detailed_description,
                item.website,
                item.header_image,
                screenshots,
                item.languages,
                item.windows,
                item.mac,
                item.linux,
                now
            ],
        )?;

        for kind in LookupKind::all() {
            tx.execute(
                &format!("DELETE FROM {} WHERE item_id = ?1", kind.relation_table()),
                params![item.id],
            )?;
        }

        for (name, votes) in &item.tags {
            let tag_id = resolve_tag(&tx, name)?;
            tx.execute(
                "INSERT INTO item_tags (item_id, tag_id, votes) VALUES (?1, ?2, ?3)
                 ON CONFLICT(item_id, tag_id) DO UPDATE SET votes = excluded.votes",
                params![item.id, tag_id, votes],
            )?;
        }

        for (kind, entries) in [
            (LookupKind::Genre, &item.genres),
            (LookupKind::Category, &item.categories),
        ] {
            for (name, provider_id) in entries {
                let lookup_id = resolve_provider_lookup(&tx, kind, *provider_id, name)?;
                tx.execute(
                    &format!(
                        "INSERT OR IGNORE INTO {} (item_id, {}) VALUES (?1, ?2)",
                        kind.relation_table(),
                        kind.relation_column()
                    ),
                    params![item.id, lookup_id],
                )?;
            }
        }

        tx.execute("DELETE FROM failed_requests WHERE id = ?1", params![item.id])?;
        tx.execute(
            "DELETE FROM over_threshold_items WHERE id = ?1",
            params![item.id],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn get_item(&self, id: i64) -> StorageResult<Option<ItemRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, price, release_date, coming_soon, developers, publishers,
                        owner_count, positive_reviews, negative_reviews, rating,
                        about_the_game, short_description, detailed_description, website,
                        header_image, screenshots, languages, windows, mac, linux
                 FROM items WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ItemRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        price: row.get(2)?,
                        release_date: row.get(3)?,
                        coming_soon: row.get(4)?,
                        developers: row.get(5)?,
                        publishers: row.get(6)?,
                        owner_count: row.get(7)?,
                        positive_reviews: row.get(8)?,
                        negative_reviews: row.get(9)?,
                        rating: row.get(10)?,
                        about_the_game: row.get(11)?,
                        short_description: row.get(12)?,
                        detailed_description: row.get(13)?,
                        website: row.get(14)?,
                        header_image: row.get(15)?,
                        screenshots: row.get(16)?,
                        languages: row.get(17)?,
                        windows: row.get(18)?,
                        mac: row.get(19)?,
                        linux: row.get(20)?,
                    })
                },
            )
            .optional()?;

        let Some(row) = row else {
            return Ok(None);
        };

        let release_date = match row.release_date.as_deref() {
            Some(raw) => Some(NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| {
                StorageError::Serialization(format!("column release_date: {}", e))
            })?),
            None => None,
        };
        let screenshots: Vec<Screenshot> = from_json("screenshots", &row.screenshots)?;

        let tags = self.load_relation(
            "SELECT t.name, it.votes FROM item_tags it
             JOIN tags t ON t.id = it.tag_id WHERE it.item_id = ?1",
            id,
        )?;
        let genres = self.load_relation(
            "SELECT g.name, g.id FROM item_genres ig
             JOIN genres g ON g.id = ig.genre_id WHERE ig.item_id = ?1",
            id,
        )?;
        let categories = self.load_relation(
            "SELECT c.name, c.id FROM item_categories ic
             JOIN categories c ON c.id = ic.category_id WHERE ic.item_id = ?1",
            id,
        )?;

        Ok(Some(ItemRecord {
            id: row.id,
            name: row.name,
            price: row.price,
            release_date,
            coming_soon: row.coming_soon,
            developers: from_json("developers", &row.developers)?,
            publishers: from_json("publishers", &row.publishers)?,
            owner_count: row.owner_count,
            positive_reviews: row.positive_reviews,
            negative_reviews: row.negative_reviews,
            rating: row.rating,
            about_the_game: row.about_the_game,
            short_description: row.short_description,
            detailed_description: row.detailed_description,
            website: row.website,
            header_image: row.header_image,
            screenshots,
            languages: row.languages,
            windows: row.windows,
            mac: row.mac,
            linux: row.linux,
            tags,
            genres,
            categories,
        }))
    }

    fn count_items(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM items")
    }

    fn count_lookup(&self, kind: LookupKind) -> StorageResult<u64> {
        self.count(&format!("SELECT COUNT(*) FROM {}", kind.table()))
    }

    // ===== Outcome Logs =====

    fn record_ineligible(&mut self, id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO ineligible_items (id, recorded_at) VALUES (?1, ?2)
             ON CONFLICT(id) DO NOTHING",
            params![id, now],
        )?;
        self.conn
            .execute("DELETE FROM failed_requests WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn list_ineligible(&self) -> StorageResult<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM ineligible_items ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    fn record_over_threshold(&mut self, id: i64, min_owners: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO over_threshold_items (id, min_owners, recorded_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                min_owners = excluded.min_owners,
                recorded_at = excluded.recorded_at",
            params![id, min_owners, now],
        )?;
        self.conn
            .execute("DELETE FROM failed_requests WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn list_over_threshold(&self) -> StorageResult<Vec<(i64, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, min_owners FROM over_threshold_items ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn record_failed_request(&mut self, record: &FailedRequestRecord) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO failed_requests (id, provider, error_kind, status_code, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                provider = excluded.provider,
                error_kind = excluded.error_kind,
                status_code = excluded.status_code,
                recorded_at = excluded.recorded_at",
            params![
                record.id,
                record.provider.to_db_string(),
                record.error_kind.to_db_string(),
                record.status_code,
                now
            ],
        )?;
        Ok(())
    }

    fn delete_failed_request(&mut self, id: i64) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM failed_requests WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn list_failed_requests(&self) -> StorageResult<Vec<FailedRequestRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, provider, error_kind, status_code FROM failed_requests ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<u16>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, provider, kind, status_code)| {
                let provider = Provider::from_db_string(&provider).ok_or_else(|| {
                    StorageError::Database(format!("unknown provider '{}' for {}", provider, id))
                })?;
                let error_kind = ErrorKind::from_db_string(&kind).ok_or_else(|| {
                    StorageError::Database(format!("unknown error kind '{}' for {}", kind, id))
                })?;
                Ok(FailedRequestRecord {
                    id,
                    provider,
                    error_kind,
                    status_code,
                })
            })
            .collect()
    }

    fn exclusion_set(&self) -> StorageResult<HashSet<i64>> {
        let mut excluded: HashSet<i64> = self.list_ineligible()?.into_iter().collect();
        excluded.extend(
            self.list_failed_requests()?
                .into_iter()
                .filter(|record| record.error_kind.is_hard())
                .map(|record| record.id),
        );
        Ok(excluded)
    }

    // ===== Maintenance =====

    fn prune_orphan_relations(&mut self) -> StorageResult<u64> {
        let tx = self.conn.transaction()?;
        let mut removed = 0;
        for kind in LookupKind::all() {
            removed += tx.execute(
                &format!(
                    "DELETE FROM {rel} WHERE item_id NOT IN (SELECT id FROM items)
                        OR {col} NOT IN (SELECT id FROM {lookup})",
                    rel = kind.relation_table(),
                    col = kind.relation_column(),
                    lookup = kind.table()
                ),
                [],
            )?;
        }
        tx.commit()?;
        Ok(removed as u64)
    }

    // ===== Queries =====

    fn query_items(&self, query: &BuiltQuery) -> StorageResult<Vec<ItemSummary>> {
        let mut stmt = self.conn.prepare(&query.sql)?;
        let items = stmt
            .query_map(params_from_iter(query.params.iter()), |row| {
                Ok(ItemSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    price: row.get(2)?,
                    release_date: row.get(3)?,
                    coming_soon: row.get(4)?,
                    rating: row.get(5)?,
                    owner_count: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }
}
