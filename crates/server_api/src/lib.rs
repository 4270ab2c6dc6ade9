use std::sync::Arc;

use serde_json::{Map, Value};
use shared::error::{ApiError, ErrorCode};
use storage::{BlobStore, Document, DocumentStore, Storage, StoreError};

pub mod auth;
pub mod interactions;
pub mod paths;
pub mod posts;
pub mod profiles;

pub use auth::AuthConfig;

#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub auth: AuthConfig,
}

impl ApiContext {
    pub fn new(storage: Storage, auth: AuthConfig) -> Self {
        let storage = Arc::new(storage);
        Self {
            store: storage.clone(),
            blobs: storage,
            auth,
        }
    }
}

/// Maps a store failure onto the wire error taxonomy.
pub fn store_error(err: StoreError) -> ApiError {
    let code = match &err {
        StoreError::Unavailable(_) => ErrorCode::Unavailable,
        StoreError::PermissionDenied(_) => ErrorCode::Forbidden,
        StoreError::NotFound(_) => ErrorCode::NotFound,
        StoreError::InvalidPath(_) | StoreError::AlreadyExists(_) => ErrorCode::Validation,
        StoreError::Serialization(_) | StoreError::Backend(_) => ErrorCode::Internal,
    };
    ApiError::new(code, err.to_string())
}

fn validation(message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::Validation, message)
}

fn internal(message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::Internal, message)
}

/// Turns a `json!` object literal into document fields.
fn fields(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Reduces an uploaded file name to characters that are safe in a blob URL
/// path segment. Directories are dropped and anything else becomes `_`.
fn sanitize_filename(raw: &str) -> String {
    let name: String = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        name
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod support;

#[cfg(test)]
#[path = "tests/interactions_tests.rs"]
mod interactions_tests;

#[cfg(test)]
#[path = "tests/pages_tests.rs"]
mod pages_tests;
