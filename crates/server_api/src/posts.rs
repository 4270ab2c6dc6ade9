use chrono::Utc;
use serde_json::json;
use shared::{
    domain::{Post, PostId, UserId, UNKNOWN_USERNAME},
    error::ApiError,
};
use storage::{server_timestamp, BlobStore, DocumentStore, Snapshot};
use tracing::info;

use crate::{fields, internal, paths, profiles, sanitize_filename, store_error, validation, ApiContext};

#[derive(Debug, Clone, Copy)]
pub struct ImageUpload<'a> {
    pub bytes: &'a [u8],
    pub filename: &'a str,
    pub content_type: Option<&'a str>,
}

/// Uploads the image, then records the post pointing at it.
pub async fn create_post(
    ctx: &ApiContext,
    author: &UserId,
    image: ImageUpload<'_>,
    caption: &str,
) -> Result<Post, ApiError> {
    if image.bytes.is_empty() {
        return Err(validation("an image is required"));
    }
    if caption.trim().is_empty() {
        return Err(validation("a caption is required"));
    }

    let key = format!(
        "posts/{author}/{}_{}",
        Utc::now().timestamp_millis(),
        sanitize_filename(image.filename)
    );
    let image_url = ctx
        .blobs
        .upload(&key, image.bytes, image.content_type)
        .await
        .map_err(store_error)?;

    let username = profiles::get_profile(ctx, author)
        .await?
        .map(|profile| profile.username)
        .unwrap_or_else(|| UNKNOWN_USERNAME.to_string());

    let created = ctx
        .store
        .add(
            &paths::posts().map_err(store_error)?,
            fields(json!({
                "userId": author,
                "username": username,
                "imageUrl": image_url,
                "caption": caption,
                "createdAt": server_timestamp(),
            })),
        )
        .await
        .map_err(store_error)?;
    info!(post_id = created.id(), %author, "post created");

    get_post(ctx, &PostId::new(created.id()))
        .await?
        .ok_or_else(|| internal("post vanished after creation"))
}

pub async fn get_post(ctx: &ApiContext, post_id: &PostId) -> Result<Option<Post>, ApiError> {
    ctx.store
        .get(&paths::post(post_id).map_err(store_error)?)
        .await
        .map_err(store_error)?
        .map(|snapshot| snapshot.decode::<Post>())
        .transpose()
        .map_err(store_error)
}

/// Every post, newest first.
pub async fn list_posts(ctx: &ApiContext) -> Result<Vec<Post>, ApiError> {
    let snapshots = ctx
        .store
        .list(&paths::posts().map_err(store_error)?)
        .await
        .map_err(store_error)?;
    let mut posts = decode_posts(&snapshots)?;
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(posts)
}

/// Posts whose author is `uid`, in store order.
pub async fn posts_by_user(ctx: &ApiContext, uid: &UserId) -> Result<Vec<Post>, ApiError> {
    let snapshots = ctx
        .store
        .query_eq(
            &paths::posts().map_err(store_error)?,
            "userId",
            &json!(uid),
        )
        .await
        .map_err(store_error)?;
    decode_posts(&snapshots)
}

fn decode_posts(snapshots: &[Snapshot]) -> Result<Vec<Post>, ApiError> {
    snapshots
        .iter()
        .map(|snapshot| snapshot.decode::<Post>().map_err(store_error))
        .collect()
}
