//! Like, comment and follow operations over the document store.
//!
//! Every call goes straight to the store: nothing is cached, retried or
//! locked here, and store errors are returned to the caller unchanged.

use serde_json::json;
use shared::domain::{Comment, FollowEdge, PostId, UserId};
use storage::{server_timestamp, DocumentStore, StoreResult};
use tracing::debug;

use crate::{fields, paths, ApiContext};

/// Flips whether `user_id` likes `post_id`.
///
/// This is a read followed by a write, not an atomic toggle. Two concurrent
/// calls for the same pair can both observe "not liked"; the second create
/// then overwrites the first.
pub async fn toggle_like(ctx: &ApiContext, post_id: &PostId, user_id: &UserId) -> StoreResult<()> {
    let like = paths::like(post_id, user_id)?;
    if ctx.store.exists(&like).await? {
        ctx.store.delete(&like).await?;
        debug!(%post_id, %user_id, "like removed");
    } else {
        ctx.store
            .set(
                &like,
                fields(json!({
                    "userId": user_id,
                    "createdAt": server_timestamp(),
                })),
            )
            .await?;
        debug!(%post_id, %user_id, "like added");
    }
    Ok(())
}

/// Appends a comment. `text` is stored as given.
pub async fn add_comment(
    ctx: &ApiContext,
    post_id: &PostId,
    user_id: &UserId,
    text: &str,
) -> StoreResult<()> {
    let created = ctx
        .store
        .add(
            &paths::comments(post_id)?,
            fields(json!({
                "userId": user_id,
                "content": text,
                "createdAt": server_timestamp(),
            })),
        )
        .await?;
    debug!(%post_id, %user_id, comment_id = created.id(), "comment added");
    Ok(())
}

/// Records that `source` follows `target`.
///
/// Writes the "following" side first and the "followers" side second as two
/// independent writes. If the second fails the first is left in place.
pub async fn follow_user(ctx: &ApiContext, source: &UserId, target: &UserId) -> StoreResult<()> {
    let edge = json!({
        "sourceUserId": source,
        "targetUserId": target,
        "createdAt": server_timestamp(),
    });
    ctx.store
        .set(&paths::following(source)?.doc(target.as_str())?, fields(edge.clone()))
        .await?;
    ctx.store
        .set(&paths::followers(target)?.doc(source.as_str())?, fields(edge))
        .await?;
    debug!(%source, %target, "follow recorded");
    Ok(())
}

/// All comments on a post in the order the store returns them.
pub async fn get_comments(ctx: &ApiContext, post_id: &PostId) -> StoreResult<Vec<Comment>> {
    ctx.store
        .list(&paths::comments(post_id)?)
        .await?
        .iter()
        .map(|snapshot| snapshot.decode::<Comment>())
        .collect()
}

/// Number of like records currently stored under the post.
pub async fn get_like_count(ctx: &ApiContext, post_id: &PostId) -> StoreResult<u64> {
    ctx.store.count(&paths::likes(post_id)?).await
}

pub async fn list_following(ctx: &ApiContext, user_id: &UserId) -> StoreResult<Vec<FollowEdge>> {
    ctx.store
        .list(&paths::following(user_id)?)
        .await?
        .iter()
        .map(|snapshot| snapshot.decode::<FollowEdge>())
        .collect()
}

pub async fn list_followers(ctx: &ApiContext, user_id: &UserId) -> StoreResult<Vec<FollowEdge>> {
    ctx.store
        .list(&paths::followers(user_id)?)
        .await?
        .iter()
        .map(|snapshot| snapshot.decode::<FollowEdge>())
        .collect()
}
