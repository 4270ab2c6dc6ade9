use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use anyhow::{anyhow, Result};
use chrono::Utc;
use async_trait::async_trait;
use shared::domain::{Comment, CommentId, Post, PostId, UserId};

use crate::gateway::InteractionGateway;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    ToggleLike(String, String),
    AddComment(String, String, String),
    Follow(String, String),
    GetComments(String),
    GetLikeCount(String),
}

/// In-memory gateway that records every call and can be told to fail.
#[derive(Default)]
pub(crate) struct RecordingGateway {
    calls: Mutex<Vec<Call>>,
    likes: Mutex<HashMap<String, HashSet<String>>>,
    comments: Mutex<HashMap<String, Vec<Comment>>>,
    failing: Mutex<bool>,
}

impl RecordingGateway {
    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls").clone()
    }

    pub(crate) fn fail_from_now_on(&self, fail: bool) {
        *self.failing.lock().expect("failing") = fail;
    }

    pub(crate) fn seed_comment(&self, post_id: &str, user_id: &str, content: &str) {
        let mut comments = self.comments.lock().expect("comments");
        let list = comments.entry(post_id.to_string()).or_default();
        list.push(comment(list.len(), user_id, content));
    }

    fn record(&self, call: Call) -> Result<()> {
        self.calls.lock().expect("calls").push(call);
        if *self.failing.lock().expect("failing") {
            Err(anyhow!("store unavailable"))
        } else {
            Ok(())
        }
    }
}

fn comment(index: usize, user_id: &str, content: &str) -> Comment {
    Comment {
        id: CommentId::new(format!("c{index}")),
        user_id: UserId::new(user_id),
        content: content.to_string(),
        created_at: Utc::now(),
    }
}

#[async_trait]
impl InteractionGateway for RecordingGateway {
    async fn toggle_like(&self, post_id: &PostId, user_id: &UserId) -> Result<()> {
        self.record(Call::ToggleLike(post_id.to_string(), user_id.to_string()))?;
        let mut likes = self.likes.lock().expect("likes");
        let likers = likes.entry(post_id.to_string()).or_default();
        if !likers.remove(user_id.as_str()) {
            likers.insert(user_id.to_string());
        }
        Ok(())
    }

    async fn add_comment(&self, post_id: &PostId, user_id: &UserId, text: &str) -> Result<()> {
        self.record(Call::AddComment(
            post_id.to_string(),
            user_id.to_string(),
            text.to_string(),
        ))?;
        let mut comments = self.comments.lock().expect("comments");
        let list = comments.entry(post_id.to_string()).or_default();
        list.push(comment(list.len(), user_id.as_str(), text));
        Ok(())
    }

    async fn follow_user(&self, source: &UserId, target: &UserId) -> Result<()> {
        self.record(Call::Follow(source.to_string(), target.to_string()))
    }

    async fn get_comments(&self, post_id: &PostId) -> Result<Vec<Comment>> {
        self.record(Call::GetComments(post_id.to_string()))?;
        Ok(self
            .comments
            .lock()
            .expect("comments")
            .get(post_id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn get_like_count(&self, post_id: &PostId) -> Result<u64> {
        self.record(Call::GetLikeCount(post_id.to_string()))?;
        Ok(self
            .likes
            .lock()
            .expect("likes")
            .get(post_id.as_str())
            .map_or(0, |likers| likers.len() as u64))
    }
}

pub(crate) fn test_post() -> Post {
    Post {
        id: PostId::new("1"),
        user_id: UserId::new("u1"),
        username: "mochi".into(),
        image_url: "https://img.example/1.jpg".into(),
        caption: "Test".into(),
        created_at: Utc::now(),
    }
}
