use chrono::Utc;
use serde_json::{json, Value};
use shared::{
    domain::{UserId, UserProfile},
    error::ApiError,
    protocol::UpdateProfileRequest,
};
use storage::{server_timestamp, BlobStore, DocumentStore};
use tracing::info;

use crate::{fields, paths, sanitize_filename, store_error, validation, ApiContext};

pub async fn create_profile(
    ctx: &ApiContext,
    uid: &UserId,
    username: &str,
    email: &str,
) -> Result<UserProfile, ApiError> {
    ctx.store
        .set(
            &paths::user(uid).map_err(store_error)?,
            fields(json!({
                "username": username,
                "email": email,
                "createdAt": server_timestamp(),
                "photoURL": Value::Null,
                "bio": "",
            })),
        )
        .await
        .map_err(store_error)?;
    Ok(UserProfile {
        uid: uid.clone(),
        username: username.to_string(),
        email: email.to_string(),
        photo_url: None,
        bio: Some(String::new()),
    })
}

pub async fn get_profile(ctx: &ApiContext, uid: &UserId) -> Result<Option<UserProfile>, ApiError> {
    ctx.store
        .get(&paths::user(uid).map_err(store_error)?)
        .await
        .map_err(store_error)?
        .map(|snapshot| snapshot.decode_keyed::<UserProfile>("uid"))
        .transpose()
        .map_err(store_error)
}

pub async fn update_profile(
    ctx: &ApiContext,
    uid: &UserId,
    req: &UpdateProfileRequest,
) -> Result<UserProfile, ApiError> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(validation("username is required"));
    }

    let mut changes = fields(json!({
        "username": username,
        "bio": req.bio,
        "updatedAt": server_timestamp(),
    }));
    if let Some(photo_url) = &req.photo_url {
        changes.insert("photoURL".into(), Value::String(photo_url.clone()));
    }

    ctx.store
        .update(&paths::user(uid).map_err(store_error)?, changes)
        .await
        .map_err(store_error)?;
    info!(%uid, "profile updated");

    get_profile(ctx, uid)
        .await?
        .ok_or_else(|| ApiError::new(shared::error::ErrorCode::NotFound, "profile disappeared"))
}

/// Stores a new profile photo and returns its URL. The profile document is
/// not touched until `update_profile` is called with that URL.
pub async fn upload_profile_photo(
    ctx: &ApiContext,
    uid: &UserId,
    bytes: &[u8],
    filename: &str,
    content_type: Option<&str>,
) -> Result<String, ApiError> {
    if bytes.is_empty() {
        return Err(validation("photo cannot be empty"));
    }
    let key = format!(
        "profiles/{uid}/{}_{}",
        Utc::now().timestamp_millis(),
        sanitize_filename(filename)
    );
    ctx.blobs
        .upload(&key, bytes, content_type)
        .await
        .map_err(store_error)
}
