use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use storage::{
    CollectionPath, Document, DocumentPath, DocumentStore, Snapshot, Storage, StoreError,
    StoreResult,
};

use crate::{ApiContext, AuthConfig};

pub(crate) fn test_auth() -> AuthConfig {
    AuthConfig {
        jwt_secret: "test-secret".into(),
        session_ttl_seconds: 60,
        bcrypt_cost: 4,
    }
}

pub(crate) async fn context() -> ApiContext {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    ApiContext::new(storage, test_auth())
}

/// Context whose document store rejects every path under `deny_prefix` with
/// a permission error. The returned `Storage` sees the raw data.
pub(crate) async fn denying_context(deny_prefix: &str) -> (ApiContext, Storage) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let ctx = ApiContext {
        store: Arc::new(DenyingStore {
            inner: storage.clone(),
            deny_prefix: deny_prefix.to_string(),
        }),
        blobs: Arc::new(storage.clone()),
        auth: test_auth(),
    };
    (ctx, storage)
}

struct DenyingStore {
    inner: Storage,
    deny_prefix: String,
}

impl DenyingStore {
    fn check(&self, path: &str) -> StoreResult<()> {
        if path.starts_with(&self.deny_prefix) {
            Err(StoreError::PermissionDenied(path.to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for DenyingStore {
    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Snapshot>> {
        self.check(&path.to_string())?;
        self.inner.get(path).await
    }

    async fn create(&self, path: &DocumentPath, data: Document) -> StoreResult<()> {
        self.check(&path.to_string())?;
        self.inner.create(path, data).await
    }

    async fn set(&self, path: &DocumentPath, data: Document) -> StoreResult<()> {
        self.check(&path.to_string())?;
        self.inner.set(path, data).await
    }

    async fn update(&self, path: &DocumentPath, data: Document) -> StoreResult<()> {
        self.check(&path.to_string())?;
        self.inner.update(path, data).await
    }

    async fn delete(&self, path: &DocumentPath) -> StoreResult<()> {
        self.check(&path.to_string())?;
        self.inner.delete(path).await
    }

    async fn add(&self, collection: &CollectionPath, data: Document) -> StoreResult<DocumentPath> {
        self.check(collection.as_str())?;
        self.inner.add(collection, data).await
    }

    async fn list(&self, collection: &CollectionPath) -> StoreResult<Vec<Snapshot>> {
        self.check(collection.as_str())?;
        self.inner.list(collection).await
    }

    async fn query_eq(
        &self,
        collection: &CollectionPath,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Snapshot>> {
        self.check(collection.as_str())?;
        self.inner.query_eq(collection, field, value).await
    }

    async fn count(&self, collection: &CollectionPath) -> StoreResult<u64> {
        self.check(collection.as_str())?;
        self.inner.count(collection).await
    }
}
