//! SQLite storage for stored searches and resource counts.
//!
//! Stored searches live in two tables: `searches` (one row per search, with
//! its total and creation time) and `search_results` (the ordered result
//! list). Resource counts are read from the `resources` table shared with
//! the persistence layer.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};
use serde_json::Value;
use tracing::{debug, info};

use claimcdr_rest::paging::{SearchResultStore, StoredPage};
use claimcdr_rest::providers::SystemDao;

/// Errors opening or preparing the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The connection pool could not be built or a connection could not be
    /// checked out.
    #[error("SQLite connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A statement failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Pool and retention settings.
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Maximum pooled connections. In-memory databases always use one.
    pub max_connections: u32,
    /// Pool checkout timeout.
    pub connection_timeout: Duration,
    /// How long SQLite waits on a locked database.
    pub busy_timeout: Duration,
    /// Age after which a stored search is treated as expired.
    pub search_retention: chrono::Duration,
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connection_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            search_retention: chrono::Duration::hours(1),
        }
    }
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS searches (
        search_id TEXT PRIMARY KEY,
        total INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS search_results (
        search_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        resource TEXT NOT NULL,
        PRIMARY KEY (search_id, position)
    );
    CREATE TABLE IF NOT EXISTS resources (
        resource_type TEXT NOT NULL,
        id TEXT NOT NULL,
        data TEXT NOT NULL,
        is_deleted INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (resource_type, id)
    );
";

/// SQLite-backed [`SearchResultStore`] and [`SystemDao`].
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteStoreConfig,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Creates an in-memory store.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_config(":memory:", SqliteStoreConfig::default())
    }

    /// Opens or creates a database file and its schema.
    pub fn with_config<P: AsRef<Path>>(path: P, config: SqliteStoreConfig) -> Result<Self, StoreError> {
        let is_memory = path.as_ref().to_string_lossy() == ":memory:";
        let busy_timeout = config.busy_timeout;

        let manager = SqliteConnectionManager::file(path.as_ref()).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            if !is_memory {
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
            }
            Ok(())
        });

        // Every connection to ":memory:" is its own database, so keep exactly one alive
        let builder = if is_memory {
            Pool::builder()
                .max_size(1)
                .min_idle(Some(1))
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            Pool::builder().max_size(config.max_connections)
        };
        let pool = builder
            .connection_timeout(config.connection_timeout)
            .build(manager)?;

        let store = Self { pool, config };
        store.connection()?.execute_batch(SCHEMA)?;

        info!(
            database = %path.as_ref().display(),
            in_memory = is_memory,
            "Initialized SQLite store"
        );
        Ok(store)
    }

    pub(crate) fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
        Ok(self.pool.get()?)
    }

    /// Deletes searches older than the retention period.
    ///
    /// Returns the number of searches removed.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let cutoff = timestamp(self.cutoff());
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM search_results WHERE search_id IN
                (SELECT search_id FROM searches WHERE created_at < ?1)",
            params![cutoff],
        )?;
        let removed = tx.execute("DELETE FROM searches WHERE created_at < ?1", params![cutoff])?;
        tx.commit()?;

        if removed > 0 {
            debug!(removed, "Purged expired searches");
        }
        Ok(removed)
    }

    fn cutoff(&self) -> DateTime<Utc> {
        Utc::now() - self.config.search_retention
    }
}

/// Fixed-width so stored timestamps compare correctly as text.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl SearchResultStore for SqliteStore {
    async fn save(&self, search_id: &str, resources: &[Value]) -> anyhow::Result<()> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO searches (search_id, total, created_at) VALUES (?1, ?2, ?3)",
            params![search_id, i64::try_from(resources.len())?, timestamp(Utc::now())],
        )?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO search_results (search_id, position, resource) VALUES (?1, ?2, ?3)",
            )?;
            for (position, resource) in resources.iter().enumerate() {
                insert.execute(params![search_id, i64::try_from(position)?, resource])?;
            }
        }
        tx.commit()?;

        Ok(())
    }

    async fn load_page(
        &self,
        search_id: &str,
        offset: usize,
        count: usize,
    ) -> anyhow::Result<Option<StoredPage>> {
        let conn = self.connection()?;

        let total: Option<i64> = conn
            .query_row(
                "SELECT total FROM searches WHERE search_id = ?1 AND created_at >= ?2",
                params![search_id, timestamp(self.cutoff())],
                |row| row.get(0),
            )
            .optional()?;
        let Some(total) = total else {
            return Ok(None);
        };
        let total = usize::try_from(total)?;

        if offset >= total {
            return Ok(Some(StoredPage {
                resources: Vec::new(),
                total,
            }));
        }

        let mut stmt = conn.prepare(
            "SELECT resource FROM search_results
             WHERE search_id = ?1
             ORDER BY position
             LIMIT ?2 OFFSET ?3",
        )?;
        let limit = i64::try_from(count)?;
        let offset = i64::try_from(offset)?;
        let resources = stmt
            .query_map(params![search_id, limit, offset], |row| row.get::<_, Value>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(StoredPage { resources, total }))
    }
}

#[async_trait]
impl SystemDao for SqliteStore {
    async fn resource_counts(&self) -> anyhow::Result<BTreeMap<String, u64>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT resource_type, COUNT(*) FROM resources
             WHERE is_deleted = 0
             GROUP BY resource_type",
        )?;
        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patients(count: usize) -> Vec<Value> {
        (0..count)
            .map(|i| json!({"resourceType": "Patient", "id": format!("p{}", i)}))
            .collect()
    }

    fn insert_resource(store: &SqliteStore, resource_type: &str, id: &str, deleted: bool) {
        store
            .connection()
            .unwrap()
            .execute(
                "INSERT INTO resources (resource_type, id, data, is_deleted) VALUES (?1, ?2, '{}', ?3)",
                params![resource_type, id, deleted as i64],
            )
            .unwrap();
    }

    #[tokio::test]
    async fn test_save_and_load_pages() {
        let store = SqliteStore::in_memory().unwrap();
        store.save("s1", &patients(5)).await.unwrap();

        let page = store.load_page("s1", 0, 2).await.unwrap().unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.resources.len(), 2);
        assert_eq!(page.resources[0]["id"], "p0");

        let page = store.load_page("s1", 4, 2).await.unwrap().unwrap();
        assert_eq!(page.resources.len(), 1);
        assert_eq!(page.resources[0]["id"], "p4");
    }

    #[tokio::test]
    async fn test_empty_search_is_found() {
        let store = SqliteStore::in_memory().unwrap();
        store.save("empty", &[]).await.unwrap();

        let page = store.load_page("empty", 0, 10).await.unwrap().unwrap();
        assert_eq!(page.total, 0);
        assert!(page.resources.is_empty());
    }

    #[tokio::test]
    async fn test_offset_beyond_total_is_empty() {
        let store = SqliteStore::in_memory().unwrap();
        store.save("s1", &patients(3)).await.unwrap();

        let page = store.load_page("s1", 3, 10).await.unwrap().unwrap();
        assert_eq!(page.total, 3);
        assert!(page.resources.is_empty());

        let page = store.load_page("s1", usize::MAX, 10).await.unwrap().unwrap();
        assert_eq!(page.total, 3);
        assert!(page.resources.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_search() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.load_page("missing", 0, 10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_search() {
        let store = SqliteStore::with_config(
            ":memory:",
            SqliteStoreConfig {
                search_retention: chrono::Duration::zero() - chrono::Duration::seconds(1),
                ..Default::default()
            },
        )
        .unwrap();
        store.save("old", &patients(3)).await.unwrap();

        assert!(store.load_page("old", 0, 10).await.unwrap().is_none());
        assert_eq!(store.purge_expired().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_resource_counts() {
        let store = SqliteStore::in_memory().unwrap();
        insert_resource(&store, "Patient", "a", false);
        insert_resource(&store, "Patient", "b", false);
        insert_resource(&store, "Claim", "c", false);
        insert_resource(&store, "Claim", "d", true);

        let counts = store.resource_counts().await.unwrap();
        assert_eq!(counts.get("Patient"), Some(&2));
        assert_eq!(counts.get("Claim"), Some(&1));
    }

    #[tokio::test]
    async fn test_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cdr.db");

        let store = SqliteStore::with_config(&path, SqliteStoreConfig::default()).unwrap();
        store.save("s1", &patients(2)).await.unwrap();
        drop(store);

        let reopened = SqliteStore::with_config(&path, SqliteStoreConfig::default()).unwrap();
        let page = reopened.load_page("s1", 0, 10).await.unwrap().unwrap();
        assert_eq!(page.total, 2);
    }
}
