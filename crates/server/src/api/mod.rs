//! HTTP handlers. Each one authenticates, checks ownership where the route
//! mutates someone's data, then delegates to `server_api`.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use server_api::{auth, interactions, posts, profiles, store_error};
use shared::{
    domain::{Comment, FollowEdge, Post, PostId, UserId, UserProfile},
    error::{ApiError, ErrorCode},
    protocol::{
        AddCommentRequest, FollowRequest, HealthResponse, LikeCountResponse, LoginRequest,
        SessionResponse, SignupRequest, ToggleLikeRequest, UpdateProfileRequest, UploadResponse,
    },
};
use storage::BlobStore;
use tracing::warn;

use crate::app_state::{reject, AppState, CurrentUser, Rejection};

type HttpResult<T> = Result<T, Rejection>;

#[derive(Debug, Deserialize)]
pub(crate) struct CreatePostQuery {
    caption: String,
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PhotoQuery {
    filename: Option<String>,
}

pub(crate) async fn healthz(
    State(state): State<Arc<AppState>>,
) -> HttpResult<Json<HealthResponse>> {
    state.storage.health_check().await.map_err(|e| {
        warn!(error = %e, "health check failed");
        reject(ApiError::new(ErrorCode::Unavailable, e.to_string()))
    })?;
    Ok(Json(HealthResponse {
        status: "ok".into(),
    }))
}

pub(crate) async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> HttpResult<Json<SessionResponse>> {
    auth::signup(&state.api, &req).await.map(Json).map_err(reject)
}

pub(crate) async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> HttpResult<Json<SessionResponse>> {
    auth::login(&state.api, &req).await.map(Json).map_err(reject)
}

pub(crate) async fn me(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> HttpResult<Json<UserProfile>> {
    profile_or_404(&state, &user.0.uid).await
}

pub(crate) async fn get_user(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(uid): Path<String>,
) -> HttpResult<Json<UserProfile>> {
    profile_or_404(&state, &UserId(uid)).await
}

async fn profile_or_404(state: &AppState, uid: &UserId) -> HttpResult<Json<UserProfile>> {
    profiles::get_profile(&state.api, uid)
        .await
        .map_err(reject)?
        .map(Json)
        .ok_or_else(|| reject(ApiError::new(ErrorCode::NotFound, "profile not found")))
}

pub(crate) async fn update_user(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(uid): Path<String>,
    Json(req): Json<UpdateProfileRequest>,
) -> HttpResult<Json<UserProfile>> {
    user.require(&uid)?;
    profiles::update_profile(&state.api, &UserId(uid), &req)
        .await
        .map(Json)
        .map_err(reject)
}

pub(crate) async fn upload_photo(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(uid): Path<String>,
    Query(q): Query<PhotoQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<Json<UploadResponse>> {
    user.require(&uid)?;
    let url = profiles::upload_profile_photo(
        &state.api,
        &UserId(uid),
        &body,
        q.filename.as_deref().unwrap_or("photo"),
        content_type(&headers),
    )
    .await
    .map_err(reject)?;
    Ok(Json(UploadResponse { url }))
}

pub(crate) async fn user_posts(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(uid): Path<String>,
) -> HttpResult<Json<Vec<Post>>> {
    posts::posts_by_user(&state.api, &UserId(uid))
        .await
        .map(Json)
        .map_err(reject)
}

pub(crate) async fn follow(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(target): Path<String>,
    Json(req): Json<FollowRequest>,
) -> HttpResult<StatusCode> {
    user.require(req.source_user_id.as_str())?;
    interactions::follow_user(&state.api, &req.source_user_id, &UserId(target))
        .await
        .map_err(|e| reject(store_error(e)))?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn following(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(uid): Path<String>,
) -> HttpResult<Json<Vec<FollowEdge>>> {
    interactions::list_following(&state.api, &UserId(uid))
        .await
        .map(Json)
        .map_err(|e| reject(store_error(e)))
}

pub(crate) async fn followers(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(uid): Path<String>,
) -> HttpResult<Json<Vec<FollowEdge>>> {
    interactions::list_followers(&state.api, &UserId(uid))
        .await
        .map(Json)
        .map_err(|e| reject(store_error(e)))
}

pub(crate) async fn list_posts(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> HttpResult<Json<Vec<Post>>> {
    posts::list_posts(&state.api).await.map(Json).map_err(reject)
}

pub(crate) async fn create_post(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(q): Query<CreatePostQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResult<(StatusCode, Json<Post>)> {
    let image = posts::ImageUpload {
        bytes: &body,
        filename: q.filename.as_deref().unwrap_or("image"),
        content_type: content_type(&headers),
    };
    let post = posts::create_post(&state.api, &user.0.uid, image, &q.caption)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub(crate) async fn toggle_like(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(post_id): Path<String>,
    Json(req): Json<ToggleLikeRequest>,
) -> HttpResult<StatusCode> {
    user.require(req.user_id.as_str())?;
    interactions::toggle_like(&state.api, &PostId(post_id), &req.user_id)
        .await
        .map_err(|e| reject(store_error(e)))?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn like_count(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(post_id): Path<String>,
) -> HttpResult<Json<LikeCountResponse>> {
    let post_id = PostId(post_id);
    let count = interactions::get_like_count(&state.api, &post_id)
        .await
        .map_err(|e| reject(store_error(e)))?;
    Ok(Json(LikeCountResponse { post_id, count }))
}

pub(crate) async fn comments(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Path(post_id): Path<String>,
) -> HttpResult<Json<Vec<Comment>>> {
    interactions::get_comments(&state.api, &PostId(post_id))
        .await
        .map(Json)
        .map_err(|e| reject(store_error(e)))
}

pub(crate) async fn add_comment(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(post_id): Path<String>,
    Json(req): Json<AddCommentRequest>,
) -> HttpResult<StatusCode> {
    user.require(req.user_id.as_str())?;
    interactions::add_comment(&state.api, &PostId(post_id), &req.user_id, &req.content)
        .await
        .map_err(|e| reject(store_error(e)))?;
    Ok(StatusCode::CREATED)
}

pub(crate) async fn download_blob(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> HttpResult<impl IntoResponse> {
    let blob = state
        .api
        .blobs
        .download(&path)
        .await
        .map_err(|e| reject(store_error(e)))?
        .ok_or_else(|| reject(ApiError::new(ErrorCode::NotFound, "blob not found")))?;

    let mut headers = HeaderMap::new();
    let content_type = blob
        .content_type
        .as_deref()
        .unwrap_or("application/octet-stream");
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    Ok((StatusCode::OK, headers, blob.bytes))
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
