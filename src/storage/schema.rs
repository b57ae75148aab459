//! Database schema definitions and migrations
//!
//! This module contains all SQL schema definitions for the catalog database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    updated INTEGER NOT NULL DEFAULT 0,
    ineligible INTEGER NOT NULL DEFAULT 0,
    over_threshold INTEGER NOT NULL DEFAULT 0,
    failed INTEGER NOT NULL DEFAULT 0,
    ignored INTEGER NOT NULL DEFAULT 0,
    requests_used INTEGER NOT NULL DEFAULT 0,
    next_index INTEGER NOT NULL DEFAULT 0
);

-- Cached master list, in provider order
CREATE TABLE IF NOT EXISTS master_list (
    position INTEGER PRIMARY KEY,
    id INTEGER NOT NULL,
    name TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_master_list_id ON master_list(id);

-- Merged item records
CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    price INTEGER,
    release_date TEXT,
    coming_soon INTEGER NOT NULL DEFAULT 0,
    developers TEXT NOT NULL DEFAULT '[]',
    publishers TEXT NOT NULL DEFAULT '[]',
    owner_count INTEGER NOT NULL DEFAULT 0,
    positive_reviews INTEGER NOT NULL DEFAULT 0,
    negative_reviews INTEGER NOT NULL DEFAULT 0,
    rating INTEGER,
    about_the_game TEXT NOT NULL DEFAULT '',
    short_description TEXT NOT NULL DEFAULT '',
    detailed_description TEXT NOT NULL DEFAULT '',
    website TEXT,
    header_image TEXT NOT NULL DEFAULT '',
    screenshots TEXT NOT NULL DEFAULT '[]',
    languages TEXT NOT NULL DEFAULT '',
    windows INTEGER NOT NULL DEFAULT 0,
    mac INTEGER NOT NULL DEFAULT 0,
    linux INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_release_date ON items(release_date);
CREATE INDEX IF NOT EXISTS idx_items_rating ON items(rating);

-- Lookup tables; tag ids are local, genre and category ids come from the store
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS genres (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

-- Item relations
CREATE TABLE IF NOT EXISTS item_tags (
    item_id INTEGER NOT NULL REFERENCES items(id),
    tag_id INTEGER NOT NULL REFERENCES tags(id),
    votes INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (item_id, tag_id)
);

CREATE INDEX IF NOT EXISTS idx_item_tags_tag ON item_tags(tag_id);

CREATE TABLE IF NOT EXISTS item_genres (
    item_id INTEGER NOT NULL REFERENCES items(id),
    genre_id INTEGER NOT NULL REFERENCES genres(id),
    PRIMARY KEY (item_id, genre_id)
);

CREATE INDEX IF NOT EXISTS idx_item_genres_genre ON item_genres(genre_id);

CREATE TABLE IF NOT EXISTS item_categories (
    item_id INTEGER NOT NULL REFERENCES items(id),
    category_id INTEGER NOT NULL REFERENCES categories(id),
    PRIMARY KEY (item_id, category_id)
);

CREATE INDEX IF NOT EXISTS idx_item_categories_category ON item_categories(category_id);

-- Items of the wrong type; excluded from regular runs
CREATE TABLE IF NOT EXISTS ineligible_items (
    id INTEGER PRIMARY KEY,
    recorded_at TEXT NOT NULL
);

-- Items above the ownership ceiling; re-fetched on every pass
CREATE TABLE IF NOT EXISTS over_threshold_items (
    id INTEGER PRIMARY KEY,
    min_owners INTEGER NOT NULL,
    recorded_at TEXT NOT NULL
);

-- Latest unresolved failure per item
CREATE TABLE IF NOT EXISTS failed_requests (
    id INTEGER PRIMARY KEY,
    provider TEXT NOT NULL,
    error_kind TEXT NOT NULL,
    status_code INTEGER,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_failed_requests_kind ON failed_requests(error_kind);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
