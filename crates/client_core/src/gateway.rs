use anyhow::Result;
use async_trait::async_trait;
use server_api::{interactions, ApiContext};
use shared::domain::{Comment, PostId, UserId};

/// The five interaction operations a post card needs.
#[async_trait]
pub trait InteractionGateway: Send + Sync {
    async fn toggle_like(&self, post_id: &PostId, user_id: &UserId) -> Result<()>;
    async fn add_comment(&self, post_id: &PostId, user_id: &UserId, text: &str) -> Result<()>;
    async fn follow_user(&self, source: &UserId, target: &UserId) -> Result<()>;
    async fn get_comments(&self, post_id: &PostId) -> Result<Vec<Comment>>;
    async fn get_like_count(&self, post_id: &PostId) -> Result<u64>;
}

/// In-process gateway straight over the document store. Store errors come
/// back as `StoreError` inside the `anyhow::Error`.
#[derive(Clone)]
pub struct LocalGateway {
    ctx: ApiContext,
}

impl LocalGateway {
    pub fn new(ctx: ApiContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl InteractionGateway for LocalGateway {
    async fn toggle_like(&self, post_id: &PostId, user_id: &UserId) -> Result<()> {
        Ok(interactions::toggle_like(&self.ctx, post_id, user_id).await?)
    }

    async fn add_comment(&self, post_id: &PostId, user_id: &UserId, text: &str) -> Result<()> {
        Ok(interactions::add_comment(&self.ctx, post_id, user_id, text).await?)
    }

    async fn follow_user(&self, source: &UserId, target: &UserId) -> Result<()> {
        Ok(interactions::follow_user(&self.ctx, source, target).await?)
    }

    async fn get_comments(&self, post_id: &PostId) -> Result<Vec<Comment>> {
        Ok(interactions::get_comments(&self.ctx, post_id).await?)
    }

    async fn get_like_count(&self, post_id: &PostId) -> Result<u64> {
        Ok(interactions::get_like_count(&self.ctx, post_id).await?)
    }
}
