use std::fmt;

use crate::error::{StoreError, StoreResult};

/// Path of a collection: an odd number of `/`-separated segments, e.g.
/// `posts` or `posts/{postId}/likes`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(String);

/// Path of a single document: an even number of segments, e.g.
/// `users/{uid}` or `posts/{postId}/likes/{userId}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    collection: CollectionPath,
    id: String,
}

impl CollectionPath {
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let segments = split_segments(raw)?;
        if segments.len() % 2 == 0 {
            return Err(StoreError::InvalidPath(format!(
                "'{raw}' names a document, not a collection"
            )));
        }
        Ok(Self(segments.join("/")))
    }

    pub fn root(name: &str) -> StoreResult<Self> {
        check_segment(name)?;
        Ok(Self(name.to_string()))
    }

    pub fn doc(&self, id: &str) -> StoreResult<DocumentPath> {
        check_segment(id)?;
        Ok(DocumentPath {
            collection: self.clone(),
            id: id.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl DocumentPath {
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let segments = split_segments(raw)?;
        if segments.len() % 2 == 1 {
            return Err(StoreError::InvalidPath(format!(
                "'{raw}' names a collection, not a document"
            )));
        }
        let (id, parent) = segments
            .split_last()
            .ok_or_else(|| StoreError::InvalidPath("empty path".into()))?;
        Ok(Self {
            collection: CollectionPath(parent.join("/")),
            id: (*id).to_string(),
        })
    }

    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Subcollection nested under this document.
    pub fn child(&self, name: &str) -> StoreResult<CollectionPath> {
        check_segment(name)?;
        Ok(CollectionPath(format!("{self}/{name}")))
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

fn split_segments(raw: &str) -> StoreResult<Vec<&str>> {
    let segments: Vec<&str> = raw.trim_matches('/').split('/').collect();
    for segment in &segments {
        check_segment(segment)?;
    }
    Ok(segments)
}

fn check_segment(segment: &str) -> StoreResult<()> {
    if segment.is_empty() || segment.trim().is_empty() {
        return Err(StoreError::InvalidPath("path segment cannot be empty".into()));
    }
    if segment.contains('/') {
        return Err(StoreError::InvalidPath(format!(
            "path segment '{segment}' cannot contain '/'"
        )));
    }
    if segment == "." || segment == ".." {
        return Err(StoreError::InvalidPath(format!(
            "path segment '{segment}' is reserved"
        )));
    }
    Ok(())
}

/// Validates a blob key such as `posts/{uid}/{millis}_{filename}` and returns
/// it in canonical form.
pub fn normalize_blob_key(raw: &str) -> StoreResult<String> {
    Ok(split_segments(raw)?.join("/"))
}
