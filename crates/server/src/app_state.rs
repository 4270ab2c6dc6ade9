use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    Json,
};
use server_api::{auth::authenticate, ApiContext};
use shared::{
    domain::AuthUser,
    error::{ApiError, ErrorCode},
};
use storage::Storage;

#[derive(Clone)]
pub struct AppState {
    pub api: ApiContext,
    pub storage: Storage,
}

pub(crate) type Rejection = (StatusCode, Json<ApiError>);

pub(crate) fn reject(err: ApiError) -> Rejection {
    let status = match err.code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

/// The caller named by the `Authorization: Bearer` header.
pub(crate) struct CurrentUser(pub(crate) AuthUser);

impl CurrentUser {
    /// Rejects requests that act on behalf of someone else.
    pub(crate) fn require(&self, acting_as: &str) -> Result<(), Rejection> {
        if self.0.uid.as_str() == acting_as {
            Ok(())
        } else {
            Err(reject(ApiError::new(
                ErrorCode::Forbidden,
                "cannot act on behalf of another user",
            )))
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = Rejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                reject(ApiError::new(
                    ErrorCode::Unauthorized,
                    "missing bearer token",
                ))
            })?;
        authenticate(&state.api.auth, token)
            .map(CurrentUser)
            .map_err(reject)
    }
}
