use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Comment, FollowEdge, Post, PostId, UserId, UserProfile},
    error::{ApiError, ApiException},
    protocol::{
        AddCommentRequest, FollowRequest, LikeCountResponse, LoginRequest, SessionResponse,
        SignupRequest, ToggleLikeRequest, UpdateProfileRequest, UploadResponse,
    },
};
use tracing::info;
use url::Url;

use crate::gateway::InteractionGateway;

/// Signed-in HTTP client for the PetWalking server.
#[derive(Clone)]
pub struct HttpGateway {
    http: Client,
    server_url: Url,
    token: String,
    user_id: UserId,
}

impl HttpGateway {
    pub async fn signup(server_url: &str, req: &SignupRequest) -> Result<(Self, SessionResponse)> {
        Self::open_session(server_url, "auth/signup", req).await
    }

    pub async fn login(server_url: &str, req: &LoginRequest) -> Result<(Self, SessionResponse)> {
        Self::open_session(server_url, "auth/login", req).await
    }

    async fn open_session<B: serde::Serialize>(
        server_url: &str,
        route: &str,
        body: &B,
    ) -> Result<(Self, SessionResponse)> {
        let server_url = parse_base(server_url)?;
        let http = Client::new();
        let response = http
            .post(server_url.join(route)?)
            .json(body)
            .send()
            .await?;
        let session: SessionResponse = read_json(response).await?;
        info!(user_id = %session.user_id, "signed in");
        let gateway = Self {
            http,
            server_url,
            token: session.token.clone(),
            user_id: session.user_id.clone(),
        };
        Ok((gateway, session))
    }

    /// Reuses a token obtained earlier.
    pub fn with_token(server_url: &str, token: impl Into<String>, user_id: UserId) -> Result<Self> {
        Ok(Self {
            http: Client::new(),
            server_url: parse_base(server_url)?,
            token: token.into(),
            user_id,
        })
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Resolves a host-relative blob URL against the server address.
    pub fn absolute_url(&self, url: &str) -> Result<Url> {
        Ok(self.server_url.join(url)?)
    }

    pub async fn me(&self) -> Result<UserProfile> {
        self.get_json("me").await
    }

    pub async fn profile(&self, uid: &UserId) -> Result<UserProfile> {
        self.get_json(&format!("users/{uid}")).await
    }

    pub async fn update_profile(&self, req: &UpdateProfileRequest) -> Result<UserProfile> {
        let request = self
            .authed(self.http.put(self.route(&format!("users/{}", self.user_id))?))
            .json(req);
        read_json(request.send().await?).await
    }

    pub async fn upload_profile_photo(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String> {
        let request = self
            .authed(
                self.http
                    .post(self.route(&format!("users/{}/photo", self.user_id))?),
            )
            .query(&[("filename", filename)])
            .header(header::CONTENT_TYPE, content_type)
            .body(bytes);
        let upload: UploadResponse = read_json(request.send().await?).await?;
        Ok(upload.url)
    }

    /// All posts, newest first.
    pub async fn feed(&self) -> Result<Vec<Post>> {
        self.get_json("posts").await
    }

    pub async fn posts_by_user(&self, uid: &UserId) -> Result<Vec<Post>> {
        self.get_json(&format!("users/{uid}/posts")).await
    }

    pub async fn upload_post(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
        caption: &str,
    ) -> Result<Post> {
        let request = self
            .authed(self.http.post(self.route("posts")?))
            .query(&[("caption", caption), ("filename", filename)])
            .header(header::CONTENT_TYPE, content_type)
            .body(bytes);
        read_json(request.send().await?).await
    }

    pub async fn following(&self, uid: &UserId) -> Result<Vec<FollowEdge>> {
        self.get_json(&format!("users/{uid}/following")).await
    }

    pub async fn followers(&self, uid: &UserId) -> Result<Vec<FollowEdge>> {
        self.get_json(&format!("users/{uid}/followers")).await
    }

    fn route(&self, path: &str) -> Result<Url> {
        Ok(self.server_url.join(path)?)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.token)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.authed(self.http.get(self.route(path)?)).send().await?;
        read_json(response).await
    }

    async fn post_json<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let response = self
            .authed(self.http.post(self.route(path)?))
            .json(body)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl InteractionGateway for HttpGateway {
    async fn toggle_like(&self, post_id: &PostId, user_id: &UserId) -> Result<()> {
        self.post_json(
            &format!("posts/{post_id}/likes/toggle"),
            &ToggleLikeRequest {
                user_id: user_id.clone(),
            },
        )
        .await
    }

    async fn add_comment(&self, post_id: &PostId, user_id: &UserId, text: &str) -> Result<()> {
        self.post_json(
            &format!("posts/{post_id}/comments"),
            &AddCommentRequest {
                user_id: user_id.clone(),
                content: text.to_string(),
            },
        )
        .await
    }

    async fn follow_user(&self, source: &UserId, target: &UserId) -> Result<()> {
        self.post_json(
            &format!("users/{target}/followers"),
            &FollowRequest {
                source_user_id: source.clone(),
            },
        )
        .await
    }

    async fn get_comments(&self, post_id: &PostId) -> Result<Vec<Comment>> {
        self.get_json(&format!("posts/{post_id}/comments")).await
    }

    async fn get_like_count(&self, post_id: &PostId) -> Result<u64> {
        let body: LikeCountResponse = self
            .get_json(&format!("posts/{post_id}/likes/count"))
            .await?;
        Ok(body.count)
    }
}

/// `Url::join` drops the last segment unless the base ends in `/`.
fn parse_base(server_url: &str) -> Result<Url> {
    let trimmed = server_url.trim().trim_end_matches('/');
    Url::parse(&format!("{trimmed}/")).with_context(|| format!("invalid server url '{server_url}'"))
}

/// Turns a non-2xx response into an error, keeping the server's `ApiError`
/// when the body carries one.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .bytes()
        .await
        .with_context(|| format!("failed to read {status} response body"))?;
    match serde_json::from_slice::<ApiError>(&body) {
        Ok(api_error) => Err(ApiException::from(api_error).into()),
        Err(_) => Err(anyhow!(
            "server returned {status}: {}",
            String::from_utf8_lossy(&body)
        )),
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    Ok(check(response).await?.json().await?)
}
