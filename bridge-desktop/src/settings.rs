//! Device preferences persisted in SQLite

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SettingsStore,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::path::Path;
use tracing::{debug, warn};

/// NVS-style storage: every entry lives in a namespace and remembers the
/// kind it was written with.
const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS preferences (
        namespace TEXT NOT NULL,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        value TEXT NOT NULL,
        written_at INTEGER NOT NULL,
        PRIMARY KEY (namespace, name)
    )
"#;

const UPSERT: &str = r#"
    INSERT INTO preferences (namespace, name, kind, value, written_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(namespace, name) DO UPDATE SET
        kind = excluded.kind,
        value = excluded.value,
        written_at = excluded.written_at
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Str,
    I64,
}

impl Kind {
    fn tag(self) -> &'static str {
        match self {
            Kind::Str => "str",
            Kind::I64 => "i64",
        }
    }
}

fn db_error(context: &str, e: sqlx::Error) -> BridgeError {
    BridgeError::DatabaseError(format!("{}: {}", context, e))
}

/// Stand-in for the device's preferences partition.
///
/// All keys share one namespace (default `"bhajan"`). Reading a key with
/// the wrong accessor is an error rather than a silent conversion.
pub struct SqliteSettingsStore {
    pool: SqlitePool,
    namespace: String,
}

impl SqliteSettingsStore {
    /// Open (or create) the database file at `path`.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(BridgeError::Io)?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true),
            )
            .await
            .map_err(|e| db_error("open preferences", e))?;
        debug!(path = ?path, "Preferences database opened");
        Self::from_pool(pool).await
    }

    /// Volatile store, lost when dropped.
    pub async fn in_memory() -> Result<Self> {
        // A single connection, otherwise each one sees its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| db_error("open preferences", e))?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| db_error("create schema", e))?;
        Ok(Self {
            pool,
            namespace: "bhajan".to_string(),
        })
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    async fn put(&self, name: &str, kind: Kind, value: String) -> Result<()> {
        sqlx::query(UPSERT)
            .bind(&self.namespace)
            .bind(name)
            .bind(kind.tag())
            .bind(value)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("write preference", e))?;
        debug!(namespace = %self.namespace, key = name, kind = kind.tag(), "Preference written");
        Ok(())
    }

    async fn fetch(&self, name: &str, kind: Kind) -> Result<Option<String>> {
        let found = sqlx::query(
            "SELECT kind, value FROM preferences WHERE namespace = ?1 AND name = ?2",
        )
        .bind(&self.namespace)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("read preference", e))?;

        let Some(entry) = found else {
            return Ok(None);
        };
        let stored: String = entry.get("kind");
        if stored != kind.tag() {
            warn!(key = name, stored = %stored, wanted = kind.tag(), "Preference kind mismatch");
            return Err(BridgeError::OperationFailed(format!(
                "{} holds a {} value, not {}",
                name,
                stored,
                kind.tag()
            )));
        }
        Ok(Some(entry.get("value")))
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.put(key, Kind::Str, value.to_owned()).await
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.fetch(key, Kind::Str).await
    }

    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.put(key, Kind::I64, value.to_string()).await
    }

    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        self.fetch(key, Kind::I64)
            .await?
            .map(|raw| {
                raw.parse::<i64>().map_err(|e| {
                    BridgeError::OperationFailed(format!("{} is not an integer: {}", key, e))
                })
            })
            .transpose()
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let removed = sqlx::query("DELETE FROM preferences WHERE namespace = ?1 AND name = ?2")
            .bind(&self.namespace)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete preference", e))?;
        debug!(key, rows = removed.rows_affected(), "Preference erased");
        Ok(())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM preferences WHERE namespace = ?1 AND name = ?2",
        )
        .bind(&self.namespace)
        .bind(key)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("probe preference", e))?;
        Ok(count > 0)
    }
}
