use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use shared::{
    domain::{Comment, CommentId, PostId, UserId},
    error::{ApiError, ApiException, ErrorCode},
    protocol::{
        AddCommentRequest, FollowRequest, LikeCountResponse, LoginRequest, SessionResponse,
        ToggleLikeRequest,
    },
};
use tokio::{net::TcpListener, sync::Mutex};

use crate::{
    gateway::InteractionGateway,
    http::HttpGateway,
    post_card::PostCard,
    support::test_post,
};

const TOKEN: &str = "stub-token";

#[derive(Clone, Default)]
struct StubState {
    likers: Arc<Mutex<Vec<UserId>>>,
    comments: Arc<Mutex<Vec<Comment>>>,
    follows: Arc<Mutex<Vec<(UserId, UserId)>>>,
}

fn authorized(headers: &HeaderMap) -> Result<(), (StatusCode, Json<ApiError>)> {
    let expected = format!("Bearer {TOKEN}");
    if headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some(expected.as_str()) {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(ApiError::new(ErrorCode::Unauthorized, "missing bearer token")),
        ))
    }
}

async fn login(Json(req): Json<LoginRequest>) -> Result<Json<SessionResponse>, StatusCode> {
    if req.password != "hunter22" {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(Json(SessionResponse {
        token: TOKEN.into(),
        user_id: UserId::new("u2"),
        profile: None,
    }))
}

async fn toggle_like(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
    Json(req): Json<ToggleLikeRequest>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    authorized(&headers)?;
    if post_id == "locked" {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ApiError::new(ErrorCode::Forbidden, "permission denied")),
        ));
    }
    let mut likers = state.likers.lock().await;
    if let Some(pos) = likers.iter().position(|u| *u == req.user_id) {
        likers.remove(pos);
    } else {
        likers.push(req.user_id);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn like_count(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(post_id): Path<String>,
) -> Result<Json<LikeCountResponse>, (StatusCode, Json<ApiError>)> {
    authorized(&headers)?;
    Ok(Json(LikeCountResponse {
        post_id: PostId(post_id),
        count: state.likers.lock().await.len() as u64,
    }))
}

async fn list_comments(
    State(state): State<StubState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Comment>>, (StatusCode, Json<ApiError>)> {
    authorized(&headers)?;
    Ok(Json(state.comments.lock().await.clone()))
}

async fn add_comment(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(req): Json<AddCommentRequest>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    authorized(&headers)?;
    let mut comments = state.comments.lock().await;
    let id = CommentId::new(format!("c{}", comments.len()));
    comments.push(Comment {
        id,
        user_id: req.user_id,
        content: req.content,
        created_at: Utc::now(),
    });
    Ok(StatusCode::CREATED)
}

async fn follow(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(target): Path<String>,
    Json(req): Json<FollowRequest>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    authorized(&headers)?;
    state
        .follows
        .lock()
        .await
        .push((req.source_user_id, UserId(target)));
    Ok(StatusCode::NO_CONTENT)
}

async fn spawn_stub() -> anyhow::Result<(String, StubState)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = StubState::default();
    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/posts/:post_id/likes/toggle", post(toggle_like))
        .route("/posts/:post_id/likes/count", get(like_count))
        .route(
            "/posts/:post_id/comments",
            get(list_comments).post(add_comment),
        )
        .route("/users/:uid/followers", post(follow))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/"), state))
}

async fn signed_in(server_url: &str) -> HttpGateway {
    let (gateway, session) = HttpGateway::login(
        server_url,
        &LoginRequest {
            email: "dubu@example.com".into(),
            password: "hunter22".into(),
        },
    )
    .await
    .expect("login");
    assert_eq!(session.user_id, UserId::new("u2"));
    gateway
}

#[tokio::test]
async fn login_failure_is_an_error() {
    let (server_url, _state) = spawn_stub().await.expect("stub");
    let result = HttpGateway::login(
        &server_url,
        &LoginRequest {
            email: "dubu@example.com".into(),
            password: "wrong".into(),
        },
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn post_card_over_http_toggles_and_comments() {
    let (server_url, state) = spawn_stub().await.expect("stub");
    let gateway = signed_in(&server_url).await;
    let viewer = gateway.user_id().clone();

    let mut card = PostCard::new(test_post(), Some(viewer.clone()), Arc::new(gateway));
    card.mount().await.expect("mount");
    assert_eq!(card.like_count(), 0);

    card.activate_like().await.expect("like");
    assert_eq!(card.like_count(), 1);
    assert_eq!(*state.likers.lock().await, vec![viewer.clone()]);

    card.set_draft(" hello ");
    card.submit_comment().await.expect("comment");
    assert_eq!(card.comments().len(), 1);
    assert_eq!(card.comments()[0].content, "hello");
    assert_eq!(card.comments()[0].user_id, viewer);
}

#[tokio::test]
async fn follow_posts_source_to_target_followers() {
    let (server_url, state) = spawn_stub().await.expect("stub");
    let gateway = signed_in(&server_url).await;
    gateway
        .follow_user(&UserId::new("u2"), &UserId::new("u1"))
        .await
        .expect("follow");
    assert_eq!(
        *state.follows.lock().await,
        vec![(UserId::new("u2"), UserId::new("u1"))]
    );
}

#[tokio::test]
async fn server_api_error_is_recovered() {
    let (server_url, _state) = spawn_stub().await.expect("stub");
    let gateway = signed_in(&server_url).await;
    let err = gateway
        .toggle_like(&PostId::new("locked"), &UserId::new("u2"))
        .await
        .expect_err("forbidden");
    let api = err.downcast_ref::<ApiException>().expect("api error body");
    assert_eq!(api.code, ErrorCode::Forbidden);
    assert_eq!(api.message, "permission denied");
}

#[tokio::test]
async fn bad_token_is_unauthorized() {
    let (server_url, _state) = spawn_stub().await.expect("stub");
    let gateway =
        HttpGateway::with_token(&server_url, "forged", UserId::new("u2")).expect("gateway");
    let err = gateway
        .get_like_count(&PostId::new("1"))
        .await
        .expect_err("unauthorized");
    let api = err.downcast_ref::<ApiException>().expect("api error body");
    assert_eq!(api.code, ErrorCode::Unauthorized);
}

#[tokio::test]
async fn truncated_error_body_reports_the_read_failure() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;
        let _ = socket
            .write_all(
                b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 100\r\nConnection: close\r\n\r\nshort",
            )
            .await;
        let _ = socket.shutdown().await;
    });

    let gateway = HttpGateway::with_token(&format!("http://{addr}"), TOKEN, UserId::new("u2"))
        .expect("gateway");
    let err = gateway
        .get_like_count(&PostId::new("1"))
        .await
        .expect_err("truncated body");
    assert!(
        format!("{err:#}").contains("failed to read"),
        "unexpected error: {err:#}"
    );
    assert!(err.downcast_ref::<ApiException>().is_none());
}
