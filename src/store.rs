//! # Item Store
//! Durable, deduplicated item storage.
//!
//! Uniqueness of the GUID is enforced by the table's primary key; inserts use
//! `INSERT OR IGNORE`, so re-ingesting a known GUID is a no-op (first write wins).
//! Items are never updated or deleted.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use crate::ingest::types::Item;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("item has no identity (empty guid)")]
    MissingGuid,
    #[error("storage task failed: {0}")]
    Task(String),
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert unless an item with the same GUID exists. Returns `true` when a row was added.
    async fn insert_if_absent(&self, item: &Item) -> Result<bool, StoreError>;
    /// Most recent items first (by `published_at`), at most `limit`.
    async fn query_recent(&self, limit: usize) -> Result<Vec<Item>, StoreError>;
    async fn get_by_guid(&self, guid: &str) -> Result<Option<Item>, StoreError>;
}

/// SQLite-backed store. One connection behind a mutex; calls run on the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = db_path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        let store = Self::from_connection(conn)?;
        info!(path = %path.display(), "opened item store");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Total rows; used by diagnostics and tests.
    pub async fn count(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM Items", [], |r| r.get(0))?;
            Ok(n.max(0) as usize)
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Task("connection mutex poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS Items (
            GUID TEXT PRIMARY KEY,
            Title TEXT NOT NULL,
            Link TEXT NOT NULL,
            Description TEXT NOT NULL,
            Date INTEGER NOT NULL,
            Image TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_items_date ON Items(Date DESC)",
        [],
    )?;
    Ok(())
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        guid: row.get(0)?,
        title: row.get(1)?,
        link: row.get(2)?,
        description: row.get(3)?,
        published_at: row.get(4)?,
        image: row.get(5)?,
    })
}

#[async_trait]
impl ItemStore for SqliteStore {
    async fn insert_if_absent(&self, item: &Item) -> Result<bool, StoreError> {
        if item.guid.trim().is_empty() {
            return Err(StoreError::MissingGuid);
        }
        let item = item.clone();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO Items (GUID, Title, Link, Description, Date, Image)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    item.guid,
                    item.title,
                    item.link,
                    item.description,
                    item.published_at,
                    item.image,
                ],
            )?;
            Ok(changed == 1)
        })
        .await
    }

    async fn query_recent(&self, limit: usize) -> Result<Vec<Item>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT GUID, Title, Link, Description, Date, Image FROM Items
                 ORDER BY Date DESC
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map(params![limit as i64], row_to_item)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn get_by_guid(&self, guid: &str) -> Result<Option<Item>, StoreError> {
        let guid = guid.to_string();
        self.with_conn(move |conn| {
            let item = conn
                .query_row(
                    "SELECT GUID, Title, Link, Description, Date, Image FROM Items WHERE GUID = ?1",
                    params![guid],
                    row_to_item,
                )
                .optional()?;
            Ok(item)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(guid: &str, date: i64) -> Item {
        Item {
            guid: guid.into(),
            title: format!("title {guid}"),
            link: format!("https://example.com/{guid}"),
            description: String::new(),
            published_at: date,
            image: None,
        }
    }

    #[tokio::test]
    async fn second_insert_of_same_guid_is_ignored() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.insert_if_absent(&item("a", 1)).await.unwrap());

        let mut changed = item("a", 2);
        changed.title = "rewritten".into();
        assert!(!store.insert_if_absent(&changed).await.unwrap());

        let got = store.get_by_guid("a").await.unwrap().unwrap();
        assert_eq!(got.title, "title a"); // first write wins
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_guid_is_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.insert_if_absent(&item("  ", 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingGuid));
    }

    #[tokio::test]
    async fn recent_is_newest_first_and_limited() {
        let store = SqliteStore::open_in_memory().unwrap();
        for (g, d) in [("old", 10), ("new", 30), ("mid", 20)] {
            store.insert_if_absent(&item(g, d)).await.unwrap();
        }
        let recent = store.query_recent(2).await.unwrap();
        let guids: Vec<_> = recent.iter().map(|i| i.guid.as_str()).collect();
        assert_eq!(guids, vec!["new", "mid"]);
    }

    #[tokio::test]
    async fn image_column_round_trips_null() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut with_img = item("img", 1);
        with_img.image = Some("https://example.com/i.png".into());
        store.insert_if_absent(&with_img).await.unwrap();
        store.insert_if_absent(&item("noimg", 2)).await.unwrap();

        assert_eq!(
            store.get_by_guid("img").await.unwrap().unwrap().image.as_deref(),
            Some("https://example.com/i.png")
        );
        assert_eq!(store.get_by_guid("noimg").await.unwrap().unwrap().image, None);
        assert!(store.get_by_guid("missing").await.unwrap().is_none());
    }
}
