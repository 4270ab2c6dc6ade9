//! Document locations used by the application.

use shared::domain::{PostId, UserId};
use storage::{CollectionPath, DocumentPath, StoreResult};

pub fn posts() -> StoreResult<CollectionPath> {
    CollectionPath::root("posts")
}

pub fn post(post_id: &PostId) -> StoreResult<DocumentPath> {
    posts()?.doc(post_id.as_str())
}

/// `posts/{postId}/likes`
pub fn likes(post_id: &PostId) -> StoreResult<CollectionPath> {
    post(post_id)?.child("likes")
}

/// `posts/{postId}/likes/{userId}`
pub fn like(post_id: &PostId, user_id: &UserId) -> StoreResult<DocumentPath> {
    likes(post_id)?.doc(user_id.as_str())
}

/// `posts/{postId}/comments`
pub fn comments(post_id: &PostId) -> StoreResult<CollectionPath> {
    post(post_id)?.child("comments")
}

/// `follows/{userId}/following`
pub fn following(user_id: &UserId) -> StoreResult<CollectionPath> {
    CollectionPath::root("follows")?
        .doc(user_id.as_str())?
        .child("following")
}

/// `follows/{userId}/followers`
pub fn followers(user_id: &UserId) -> StoreResult<CollectionPath> {
    CollectionPath::root("follows")?
        .doc(user_id.as_str())?
        .child("followers")
}

pub fn user(uid: &UserId) -> StoreResult<DocumentPath> {
    CollectionPath::root("users")?.doc(uid.as_str())
}

pub fn account(email: &str) -> StoreResult<DocumentPath> {
    CollectionPath::root("accounts")?.doc(email)
}
