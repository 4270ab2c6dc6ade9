use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::{
    domain::{AuthUser, UserId},
    error::{ApiError, ErrorCode},
    protocol::{LoginRequest, SessionResponse, SignupRequest},
};
use storage::{server_timestamp, DocumentStore, StoreError};
use tracing::info;
use uuid::Uuid;

use crate::{fields, internal, paths, profiles, store_error, validation, ApiContext};

const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl_seconds: i64,
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "devsecret".into(),
            session_ttl_seconds: 7 * 24 * 3600,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountRecord {
    uid: UserId,
    password_hash: String,
}

pub fn mint_session_token(
    cfg: &AuthConfig,
    user: &AuthUser,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::seconds(cfg.session_ttl_seconds);
    let claims = Claims {
        sub: user.uid.to_string(),
        name: user.display_name.clone(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
    )
}

/// Resolves a bearer token to the caller's identity.
pub fn authenticate(cfg: &AuthConfig, token: &str) -> Result<AuthUser, ApiError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| ApiError::new(ErrorCode::Unauthorized, format!("invalid session: {e}")))?;
    Ok(AuthUser {
        uid: UserId(data.claims.sub),
        display_name: data.claims.name,
    })
}

pub async fn signup(ctx: &ApiContext, req: &SignupRequest) -> Result<SessionResponse, ApiError> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(validation("username is required"));
    }
    let email = normalize_email(&req.email)?;
    if req.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(validation(format!(
            "password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }

    let account = paths::account(&email).map_err(store_error)?;
    if ctx.store.exists(&account).await.map_err(store_error)? {
        return Err(validation("email is already registered"));
    }

    let password_hash = hash_password(req.password.clone(), ctx.auth.bcrypt_cost).await?;
    let uid = UserId(Uuid::new_v4().simple().to_string());
    ctx.store
        .create(
            &account,
            fields(json!({
                "uid": uid,
                "passwordHash": password_hash,
                "createdAt": server_timestamp(),
            })),
        )
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists(_) => validation("email is already registered"),
            other => store_error(other),
        })?;
    let profile = profiles::create_profile(ctx, &uid, username, &email).await?;
    info!(%uid, "account created");

    session_for(ctx, uid, Some(profile))
}

pub async fn login(ctx: &ApiContext, req: &LoginRequest) -> Result<SessionResponse, ApiError> {
    let email = normalize_email(&req.email)?;
    let rejected = || ApiError::new(ErrorCode::Unauthorized, "invalid email or password");

    let snapshot = ctx
        .store
        .get(&paths::account(&email).map_err(store_error)?)
        .await
        .map_err(store_error)?
        .ok_or_else(rejected)?;
    let account: AccountRecord = snapshot.decode().map_err(store_error)?;

    if !verify_password(req.password.clone(), account.password_hash).await? {
        return Err(rejected());
    }
    let profile = profiles::get_profile(ctx, &account.uid).await?;
    session_for(ctx, account.uid, profile)
}

fn session_for(
    ctx: &ApiContext,
    uid: UserId,
    profile: Option<shared::domain::UserProfile>,
) -> Result<SessionResponse, ApiError> {
    let user = AuthUser {
        uid: uid.clone(),
        display_name: profile.as_ref().map(|p| p.username.clone()),
    };
    let token = mint_session_token(&ctx.auth, &user)
        .map_err(|e| internal(format!("token mint failed: {e}")))?;
    Ok(SessionResponse {
        token,
        user_id: uid,
        profile,
    })
}

fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty())
        && !email.contains('/');
    if valid {
        Ok(email)
    } else {
        Err(validation("a valid email is required"))
    }
}

async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| internal(e.to_string()))?
        .map_err(|e| internal(format!("password hashing failed: {e}")))
}

async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| internal(e.to_string()))?
        .map_err(|e| internal(format!("password check failed: {e}")))
}
