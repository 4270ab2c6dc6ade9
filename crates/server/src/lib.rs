//! PetWalking HTTP server: routes, auth extraction and settings.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

mod api;
pub mod app_state;
pub mod config;

use app_state::AppState;

pub fn build_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(api::healthz))
        .route("/auth/signup", post(api::signup))
        .route("/auth/login", post(api::login))
        .route("/me", get(api::me))
        .route("/users/:uid", get(api::get_user).put(api::update_user))
        .route("/users/:uid/photo", post(api::upload_photo))
        .route("/users/:uid/posts", get(api::user_posts))
        .route(
            "/users/:uid/followers",
            get(api::followers).post(api::follow),
        )
        .route("/users/:uid/following", get(api::following))
        .route("/posts", get(api::list_posts).post(api::create_post))
        .route("/posts/:post_id/likes/toggle", post(api::toggle_like))
        .route("/posts/:post_id/likes/count", get(api::like_count))
        .route(
            "/posts/:post_id/comments",
            get(api::comments).post(api::add_comment),
        )
        .route("/blobs/*path", get(api::download_blob))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .with_state(state)
}
