use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    collections::BTreeMap,
    fs,
    path::PathBuf,
    str::FromStr,
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use shared::domain::{Deck, Slide};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/decks.db";
const MEMORY_DATABASE_URL: &str = "sqlite::memory:";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("stored slides for deck '{name}' are unreadable: {source}")]
    Codec {
        name: String,
        source: serde_json::Error,
    },
    #[error("failed to create parent directory '{}' for database url '{database_url}': {source}", path.display())]
    Directory {
        path: PathBuf,
        database_url: String,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// How `put` treats an existing deck with the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    InsertOnly,
    Overwrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    Overwritten,
    /// `InsertOnly` hit an existing deck; nothing was written.
    Conflict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckSummary {
    pub name: String,
    pub slide_count: usize,
    pub updated_at: DateTime<Utc>,
}

/// Key-value deck store keyed by deck name. Last write wins.
#[async_trait]
pub trait DeckStore: Send + Sync {
    /// Deck names in ascending order.
    async fn list(&self) -> Result<Vec<String>>;
    async fn get(&self, name: &str) -> Result<Option<Deck>>;
    async fn put(&self, deck: &Deck, mode: PutMode) -> Result<PutOutcome>;
    /// Returns whether a deck was removed.
    async fn delete(&self, name: &str) -> Result<bool>;
    async fn summaries(&self) -> Result<Vec<DeckSummary>>;
}

#[derive(Clone)]
pub struct SqliteDeckStore {
    pool: Pool<Sqlite>,
}

impl SqliteDeckStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        let location = DatabaseLocation::of(database_url);
        location.ensure_parent_dir(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool_options = if location.is_memory() {
            // every connection to an in-memory url is a fresh database
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(connect_options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

fn encode_slides(deck: &Deck) -> Result<String> {
    serde_json::to_string(&deck.slides).map_err(|source| StorageError::Codec {
        name: deck.name.clone(),
        source,
    })
}

fn decode_slides(name: &str, raw: &str) -> Result<Vec<Slide>> {
    serde_json::from_str(raw).map_err(|source| StorageError::Codec {
        name: name.to_string(),
        source,
    })
}

#[async_trait]
impl DeckStore for SqliteDeckStore {
    async fn list(&self) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM decks ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    async fn get(&self, name: &str) -> Result<Option<Deck>> {
        let row = sqlx::query("SELECT name, slides FROM decks WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let name: String = row.try_get("name")?;
        let slides: String = row.try_get("slides")?;
        let slides = decode_slides(&name, &slides)?;
        Ok(Some(Deck { name, slides }))
    }

    async fn put(&self, deck: &Deck, mode: PutMode) -> Result<PutOutcome> {
        let slides = encode_slides(deck)?;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, i64>("SELECT 1 FROM decks WHERE name = ?")
            .bind(&deck.name)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();

        let outcome = match (exists, mode) {
            (true, PutMode::InsertOnly) => PutOutcome::Conflict,
            (true, PutMode::Overwrite) => {
                sqlx::query("UPDATE decks SET slides = ?, updated_at = ? WHERE name = ?")
                    .bind(&slides)
                    .bind(now)
                    .bind(&deck.name)
                    .execute(&mut *tx)
                    .await?;
                PutOutcome::Overwritten
            }
            (false, _) => {
                sqlx::query("INSERT INTO decks (name, slides, updated_at) VALUES (?, ?, ?)")
                    .bind(&deck.name)
                    .bind(&slides)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                PutOutcome::Inserted
            }
        };

        tx.commit().await?;
        debug!(deck = %deck.name, ?outcome, "stored deck");
        Ok(outcome)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM decks WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn summaries(&self) -> Result<Vec<DeckSummary>> {
        let rows = sqlx::query("SELECT name, slides, updated_at FROM decks ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| -> Result<DeckSummary> {
                let name: String = row.try_get("name")?;
                let slides: String = row.try_get("slides")?;
                let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
                let slide_count = decode_slides(&name, &slides)?.len();
                Ok(DeckSummary {
                    name,
                    slide_count,
                    updated_at,
                })
            })
            .collect()
    }
}

/// Process-local store; contents vanish with the value.
#[derive(Default)]
pub struct MemoryDeckStore {
    decks: RwLock<BTreeMap<String, (Deck, DateTime<Utc>)>>,
}

impl MemoryDeckStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decks(decks: impl IntoIterator<Item = Deck>) -> Self {
        let now = Utc::now();
        let decks = decks
            .into_iter()
            .map(|deck| (deck.name.clone(), (deck, now)))
            .collect();
        Self {
            decks: RwLock::new(decks),
        }
    }
}

#[async_trait]
impl DeckStore for MemoryDeckStore {
    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.decks.read().await.keys().cloned().collect())
    }

    async fn get(&self, name: &str) -> Result<Option<Deck>> {
        Ok(self
            .decks
            .read()
            .await
            .get(name)
            .map(|(deck, _)| deck.clone()))
    }

    async fn put(&self, deck: &Deck, mode: PutMode) -> Result<PutOutcome> {
        let mut decks = self.decks.write().await;
        let exists = decks.contains_key(&deck.name);
        if exists && mode == PutMode::InsertOnly {
            return Ok(PutOutcome::Conflict);
        }
        decks.insert(deck.name.clone(), (deck.clone(), Utc::now()));
        Ok(if exists {
            PutOutcome::Overwritten
        } else {
            PutOutcome::Inserted
        })
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.decks.write().await.remove(name).is_some())
    }

    async fn summaries(&self) -> Result<Vec<DeckSummary>> {
        Ok(self
            .decks
            .read()
            .await
            .values()
            .map(|(deck, updated_at)| DeckSummary {
                name: deck.name.clone(),
                slide_count: deck.slides.len(),
                updated_at: *updated_at,
            })
            .collect())
    }
}

/// Where a sqlite url keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
    /// Not a sqlite url, or one without a path.
    Other,
}

impl DatabaseLocation {
    pub fn of(database_url: &str) -> Self {
        if database_url.starts_with(MEMORY_DATABASE_URL) {
            return Self::Memory;
        }
        let Some(rest) = database_url.strip_prefix("sqlite:") else {
            return Self::Other;
        };
        let path = rest
            .trim_start_matches("//")
            .split('?')
            .next()
            .unwrap_or_default();
        if path.is_empty() {
            Self::Other
        } else {
            Self::File(PathBuf::from(path))
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }

    fn ensure_parent_dir(&self, database_url: &str) -> Result<()> {
        let Self::File(path) = self else {
            return Ok(());
        };
        let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) else {
            return Ok(());
        };
        fs::create_dir_all(parent).map_err(|source| StorageError::Directory {
            path: parent.to_path_buf(),
            database_url: database_url.to_string(),
            source,
        })
    }
}

/// Normalizes a configured database location and creates its parent directory.
pub fn prepare_database_url(raw_database_url: &str) -> Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    DatabaseLocation::of(&database_url).ensure_parent_dir(&database_url)?;
    Ok(database_url)
}

/// Turns bare paths and `sqlite:path` into `sqlite://` urls; blank means the default.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw = raw_database_url.trim();
    if raw.is_empty() {
        return DEFAULT_DATABASE_URL.to_string();
    }
    if raw.contains("://") || DatabaseLocation::of(raw).is_memory() {
        return raw.to_string();
    }
    let path = raw.strip_prefix("sqlite:").unwrap_or(raw).replace('\\', "/");
    format!("sqlite://{path}")
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
