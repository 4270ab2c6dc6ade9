//! Presenter for a single post: author, image, caption, like button, comment
//! box and comment list.
//!
//! The card holds no locks. Actions take `&mut self`, so one card runs one
//! action at a time; separate cards over the same post do not coordinate.

use std::{fmt, sync::Arc};

use anyhow::Result;
use shared::domain::{Comment, Post, UserId};
use tracing::{debug, warn};

use crate::gateway::InteractionGateway;

pub const LIKE_LABEL: &str = "Like";
pub const COMMENT_PLACEHOLDER: &str = "Add a comment...";
pub const SUBMIT_LABEL: &str = "Post";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardPhase {
    Loading,
    Ready,
}

pub struct PostCard {
    gateway: Arc<dyn InteractionGateway>,
    post: Post,
    viewer: Option<UserId>,
    phase: CardPhase,
    comments: Vec<Comment>,
    like_count: u64,
    draft: String,
    last_error: Option<String>,
}

impl PostCard {
    /// `viewer` is the signed-in user, if any. Without one the card is
    /// read-only: like and comment do nothing.
    pub fn new(post: Post, viewer: Option<UserId>, gateway: Arc<dyn InteractionGateway>) -> Self {
        Self {
            gateway,
            post,
            viewer,
            phase: CardPhase::Loading,
            comments: Vec::new(),
            like_count: 0,
            draft: String::new(),
            last_error: None,
        }
    }

    pub fn post(&self) -> &Post {
        &self.post
    }

    pub fn phase(&self) -> CardPhase {
        self.phase
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn like_count(&self) -> u64 {
        self.like_count
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Loads comments and like count together. Neither is shown until both
    /// have arrived.
    pub async fn mount(&mut self) -> Result<()> {
        let post_id = &self.post.id;
        let fetched = futures::try_join!(
            self.gateway.get_comments(post_id),
            self.gateway.get_like_count(post_id),
        );
        let (comments, like_count) = self.settle("load", fetched)?;
        self.comments = comments;
        self.like_count = like_count;
        self.phase = CardPhase::Ready;
        Ok(())
    }

    /// Toggles the viewer's like, then shows the recounted total.
    pub async fn activate_like(&mut self) -> Result<()> {
        let Some(viewer) = self.viewer.clone() else {
            debug!(post_id = %self.post.id, "like ignored without a viewer");
            return Ok(());
        };

        let result = async {
            self.gateway.toggle_like(&self.post.id, &viewer).await?;
            self.gateway.get_like_count(&self.post.id).await
        }
        .await;
        self.like_count = self.settle("like", result)?;
        self.phase = CardPhase::Ready;
        Ok(())
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Posts the trimmed draft as the viewer, clears it, then reloads the
    /// comment list. Blank drafts are ignored.
    pub async fn submit_comment(&mut self) -> Result<()> {
        let Some(viewer) = self.viewer.clone() else {
            debug!(post_id = %self.post.id, "comment ignored without a viewer");
            return Ok(());
        };
        let text = self.draft.trim().to_string();
        if text.is_empty() {
            return Ok(());
        }

        let added = self
            .gateway
            .add_comment(&self.post.id, &viewer, &text)
            .await;
        self.settle("comment", added)?;
        self.draft.clear();

        let reloaded = self.gateway.get_comments(&self.post.id).await;
        self.comments = self.settle("comment reload", reloaded)?;
        self.phase = CardPhase::Ready;
        Ok(())
    }

    /// Follows the post's author as the viewer.
    pub async fn follow_author(&mut self) -> Result<()> {
        let Some(viewer) = self.viewer.clone() else {
            return Ok(());
        };
        let followed = self
            .gateway
            .follow_user(&viewer, &self.post.user_id)
            .await;
        self.settle("follow", followed)
    }

    /// Clears the error on success; on failure records it and hands it back.
    fn settle<T>(&mut self, action: &str, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.last_error = None;
                Ok(value)
            }
            Err(err) => {
                warn!(post_id = %self.post.id, action, error = %err, "post card action failed");
                self.last_error = Some(format!("{action} failed: {err}"));
                Err(err)
            }
        }
    }

    pub fn render(&self) -> CardView {
        CardView {
            author: format!("@{}", self.post.username),
            image_url: self.post.image_url.clone(),
            caption: self.post.caption.clone(),
            like_label: format!("{LIKE_LABEL} {}", self.like_count),
            like_count: self.like_count,
            draft: self.draft.clone(),
            can_interact: self.viewer.is_some(),
            loading: self.phase == CardPhase::Loading,
            comments: self
                .comments
                .iter()
                .map(|c| format!("{}: {}", c.user_id, c.content))
                .collect(),
            error: self.last_error.clone(),
        }
    }
}

/// What a card shows at one moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardView {
    pub author: String,
    pub image_url: String,
    pub caption: String,
    pub like_label: String,
    pub like_count: u64,
    pub draft: String,
    pub can_interact: bool,
    pub loading: bool,
    pub comments: Vec<String>,
    pub error: Option<String>,
}

impl fmt::Display for CardView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.author)?;
        writeln!(f, "[image] {}", self.image_url)?;
        writeln!(f, "{}", self.caption)?;
        if self.loading {
            writeln!(f, "(loading...)")?;
        }
        writeln!(f, "<3 {}", self.like_label)?;
        let draft = if self.draft.is_empty() {
            COMMENT_PLACEHOLDER
        } else {
            self.draft.as_str()
        };
        writeln!(f, "[{draft}] ({SUBMIT_LABEL})")?;
        for line in &self.comments {
            writeln!(f, "  {line}")?;
        }
        if let Some(error) = &self.error {
            writeln!(f, "! {error}")?;
        }
        Ok(())
    }
}
