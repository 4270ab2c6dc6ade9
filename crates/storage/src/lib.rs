use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use uuid::Uuid;

mod error;
mod path;

pub use error::{StoreError, StoreResult};
pub use path::{normalize_blob_key, CollectionPath, DocumentPath};

/// Field map of one document.
pub type Document = Map<String, Value>;

const SERVER_TIMESTAMP_KEY: &str = "$serverTimestamp";

/// Placeholder field value that the store replaces with its own clock when
/// the document is written.
pub fn server_timestamp() -> Value {
    let mut marker = Map::new();
    marker.insert(SERVER_TIMESTAMP_KEY.to_string(), Value::Bool(true));
    Value::Object(marker)
}

fn is_server_timestamp(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.len() == 1 && map.get(SERVER_TIMESTAMP_KEY) == Some(&Value::Bool(true)))
}

/// Replaces every top-level server timestamp placeholder with `now`.
pub fn resolve_server_timestamps(data: &mut Document, now: DateTime<Utc>) {
    let stamp = now.to_rfc3339_opts(SecondsFormat::Micros, true);
    for value in data.values_mut() {
        if is_server_timestamp(value) {
            *value = Value::String(stamp.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: DocumentPath,
    pub data: Document,
}

impl Snapshot {
    pub fn id(&self) -> &str {
        self.path.id()
    }

    /// Deserializes the document with its key injected as `id`.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        self.decode_keyed("id")
    }

    /// Deserializes the document with its key injected under `id_field`,
    /// unless the document already carries that field.
    pub fn decode_keyed<T: DeserializeOwned>(&self, id_field: &str) -> StoreResult<T> {
        let mut data = self.data.clone();
        data.entry(id_field.to_string())
            .or_insert_with(|| Value::String(self.id().to_string()));
        Ok(serde_json::from_value(Value::Object(data))?)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Snapshot>>;

    async fn exists(&self, path: &DocumentPath) -> StoreResult<bool> {
        Ok(self.get(path).await?.is_some())
    }

    /// Creates the document, failing with `AlreadyExists` if it is present.
    async fn create(&self, path: &DocumentPath, data: Document) -> StoreResult<()>;

    /// Creates the document or overwrites it whole.
    async fn set(&self, path: &DocumentPath, data: Document) -> StoreResult<()>;

    /// Merges `data` into an existing document.
    async fn update(&self, path: &DocumentPath, data: Document) -> StoreResult<()>;

    /// Removes the document. Deleting an absent document succeeds.
    async fn delete(&self, path: &DocumentPath) -> StoreResult<()>;

    /// Appends a document under a store-generated id.
    async fn add(&self, collection: &CollectionPath, data: Document) -> StoreResult<DocumentPath>;

    /// Every document in the collection, in insertion order.
    async fn list(&self, collection: &CollectionPath) -> StoreResult<Vec<Snapshot>>;

    async fn query_eq(
        &self,
        collection: &CollectionPath,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Snapshot>> {
        Ok(self
            .list(collection)
            .await?
            .into_iter()
            .filter(|snapshot| snapshot.data.get(field) == Some(value))
            .collect())
    }

    async fn count(&self, collection: &CollectionPath) -> StoreResult<u64> {
        Ok(self.list(collection).await?.len() as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub path: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `path` and returns the URL that resolves to them.
    async fn upload(&self, path: &str, bytes: &[u8], content_type: Option<&str>)
        -> StoreResult<String>;
    async fn download(&self, path: &str) -> StoreResult<Option<StoredBlob>>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
    public_base_url: String,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            pool,
            public_base_url: String::new(),
        })
    }

    /// Prefix for blob URLs, e.g. `https://pets.example.com`. Empty yields
    /// host-relative URLs.
    pub fn with_public_base_url(mut self, public_base_url: impl Into<String>) -> Self {
        self.public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub fn blob_url(&self, key: &str) -> String {
        format!("{}/blobs/{key}", self.public_base_url)
    }
}

fn encode_document(data: &Document) -> StoreResult<String> {
    Ok(serde_json::to_string(data)?)
}

fn decode_document(raw: &str) -> StoreResult<Document> {
    Ok(serde_json::from_str(raw)?)
}

#[async_trait]
impl DocumentStore for Storage {
    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Snapshot>> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = ? AND doc_id = ?")
            .bind(path.collection().as_str())
            .bind(path.id())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| -> StoreResult<Snapshot> {
            Ok(Snapshot {
                path: path.clone(),
                data: decode_document(&row.try_get::<String, _>("data")?)?,
            })
        })
        .transpose()
    }

    async fn exists(&self, path: &DocumentPath) -> StoreResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM documents WHERE collection = ? AND doc_id = ?")
                .bind(path.collection().as_str())
                .bind(path.id())
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn create(&self, path: &DocumentPath, mut data: Document) -> StoreResult<()> {
        let now = Utc::now();
        resolve_server_timestamps(&mut data, now);
        sqlx::query(
            "INSERT INTO documents (collection, doc_id, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
        )
        .bind(path.collection().as_str())
        .bind(path.id())
        .bind(encode_document(&data)?)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::AlreadyExists(_) => StoreError::AlreadyExists(path.to_string()),
            other => other,
        })?;
        Ok(())
    }

    async fn set(&self, path: &DocumentPath, mut data: Document) -> StoreResult<()> {
        let now = Utc::now();
        resolve_server_timestamps(&mut data, now);
        sqlx::query(
            "INSERT INTO documents (collection, doc_id, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(collection, doc_id) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at",
        )
        .bind(path.collection().as_str())
        .bind(path.id())
        .bind(encode_document(&data)?)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, path: &DocumentPath, mut data: Document) -> StoreResult<()> {
        let now = Utc::now();
        resolve_server_timestamps(&mut data, now);

        let mut tx = self.pool.begin().await?;
        let raw: Option<String> =
            sqlx::query_scalar("SELECT data FROM documents WHERE collection = ? AND doc_id = ?")
                .bind(path.collection().as_str())
                .bind(path.id())
                .fetch_optional(&mut *tx)
                .await?;
        let Some(raw) = raw else {
            return Err(StoreError::NotFound(path.to_string()));
        };

        let mut merged = decode_document(&raw)?;
        merged.extend(data);
        sqlx::query(
            "UPDATE documents SET data = ?, updated_at = ? WHERE collection = ? AND doc_id = ?",
        )
        .bind(encode_document(&merged)?)
        .bind(now)
        .bind(path.collection().as_str())
        .bind(path.id())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, path: &DocumentPath) -> StoreResult<()> {
        sqlx::query("DELETE FROM documents WHERE collection = ? AND doc_id = ?")
            .bind(path.collection().as_str())
            .bind(path.id())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add(&self, collection: &CollectionPath, mut data: Document) -> StoreResult<DocumentPath> {
        let now = Utc::now();
        resolve_server_timestamps(&mut data, now);
        let path = collection.doc(&Uuid::new_v4().simple().to_string())?;
        sqlx::query(
            "INSERT INTO documents (collection, doc_id, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
        )
        .bind(collection.as_str())
        .bind(path.id())
        .bind(encode_document(&data)?)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(path)
    }

    async fn list(&self, collection: &CollectionPath) -> StoreResult<Vec<Snapshot>> {
        let rows = sqlx::query("SELECT doc_id, data FROM documents WHERE collection = ? ORDER BY seq")
            .bind(collection.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| -> StoreResult<Snapshot> {
                let doc_id: String = row.try_get("doc_id")?;
                Ok(Snapshot {
                    path: collection.doc(&doc_id)?,
                    data: decode_document(&row.try_get::<String, _>("data")?)?,
                })
            })
            .collect()
    }

    async fn count(&self, collection: &CollectionPath) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?")
            .bind(collection.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

#[async_trait]
impl BlobStore for Storage {
    async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> StoreResult<String> {
        let key = normalize_blob_key(path)?;
        sqlx::query(
            "INSERT INTO blobs (path, content_type, bytes, created_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(path) DO UPDATE SET
                content_type = excluded.content_type,
                bytes = excluded.bytes,
                created_at = excluded.created_at",
        )
        .bind(&key)
        .bind(content_type)
        .bind(bytes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(self.blob_url(&key))
    }

    async fn download(&self, path: &str) -> StoreResult<Option<StoredBlob>> {
        let key = normalize_blob_key(path)?;
        let row = sqlx::query("SELECT content_type, bytes, created_at FROM blobs WHERE path = ?")
            .bind(&key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| -> StoreResult<StoredBlob> {
            Ok(StoredBlob {
                path: key.clone(),
                content_type: row.try_get("content_type")?,
                bytes: row.try_get("bytes")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .transpose()
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
