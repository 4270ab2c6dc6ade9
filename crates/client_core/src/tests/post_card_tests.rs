use std::sync::Arc;

use shared::domain::UserId;

use crate::{
    post_card::{CardPhase, PostCard, COMMENT_PLACEHOLDER},
    support::{test_post, Call, RecordingGateway},
};

fn card(gateway: &Arc<RecordingGateway>, viewer: Option<&str>) -> PostCard {
    PostCard::new(test_post(), viewer.map(UserId::new), gateway.clone())
}

#[tokio::test]
async fn mount_loads_count_and_comments_then_like_refreshes_count() {
    let gateway = Arc::new(RecordingGateway::default());
    let mut card = card(&gateway, Some("u2"));
    assert_eq!(card.phase(), CardPhase::Loading);
    assert!(card.render().loading);

    card.mount().await.expect("mount");
    assert_eq!(card.phase(), CardPhase::Ready);
    assert_eq!(card.like_count(), 0);
    assert!(card.comments().is_empty());

    card.activate_like().await.expect("like");
    assert_eq!(card.like_count(), 1);

    let calls = gateway.calls();
    assert!(calls.contains(&Call::ToggleLike("1".into(), "u2".into())));
    assert_eq!(
        calls.last(),
        Some(&Call::GetLikeCount("1".into())),
        "count is re-fetched after the toggle"
    );

    let view = card.render();
    assert_eq!(view.like_count, 1);
    assert_eq!(view.like_label, "Like 1");
    assert_eq!(view.author, "@mochi");
    assert_eq!(view.caption, "Test");
}

#[tokio::test]
async fn liking_twice_returns_to_zero() {
    let gateway = Arc::new(RecordingGateway::default());
    let mut card = card(&gateway, Some("u2"));
    card.mount().await.expect("mount");
    card.activate_like().await.expect("like");
    card.activate_like().await.expect("unlike");
    assert_eq!(card.like_count(), 0);
}

#[tokio::test]
async fn without_viewer_like_and_comment_make_no_calls() {
    let gateway = Arc::new(RecordingGateway::default());
    let mut card = card(&gateway, None);
    card.mount().await.expect("mount");
    let after_mount = gateway.calls().len();

    card.activate_like().await.expect("like is a no-op");
    card.set_draft("hello");
    card.submit_comment().await.expect("comment is a no-op");
    card.follow_author().await.expect("follow is a no-op");

    assert_eq!(gateway.calls().len(), after_mount);
    assert_eq!(card.draft(), "hello");
    assert!(!card.render().can_interact);
}

#[tokio::test]
async fn blank_draft_is_not_submitted() {
    let gateway = Arc::new(RecordingGateway::default());
    let mut card = card(&gateway, Some("u2"));
    card.mount().await.expect("mount");
    let after_mount = gateway.calls().len();

    card.set_draft("   \n\t");
    card.submit_comment().await.expect("no-op");
    assert_eq!(gateway.calls().len(), after_mount);
    assert_eq!(card.draft(), "   \n\t");
}

#[tokio::test]
async fn submit_comment_trims_clears_draft_and_reloads() {
    let gateway = Arc::new(RecordingGateway::default());
    gateway.seed_comment("1", "u1", "first walk!");
    let mut card = card(&gateway, Some("u2"));
    card.mount().await.expect("mount");
    assert_eq!(card.comments().len(), 1);

    card.set_draft("  so fluffy  ");
    card.submit_comment().await.expect("comment");

    assert_eq!(card.draft(), "");
    let texts: Vec<_> = card.comments().iter().map(|c| c.content.as_str()).collect();
    assert_eq!(texts, vec!["first walk!", "so fluffy"]);
    assert!(gateway
        .calls()
        .contains(&Call::AddComment("1".into(), "u2".into(), "so fluffy".into())));

    let view = card.render();
    assert_eq!(view.comments, vec!["u1: first walk!", "u2: so fluffy"]);
    assert!(view.to_string().contains(COMMENT_PLACEHOLDER));
}

#[tokio::test]
async fn failed_like_keeps_count_and_surfaces_error_until_next_success() {
    let gateway = Arc::new(RecordingGateway::default());
    let mut card = card(&gateway, Some("u2"));
    card.mount().await.expect("mount");
    card.activate_like().await.expect("like");
    assert_eq!(card.like_count(), 1);

    gateway.fail_from_now_on(true);
    card.activate_like().await.expect_err("store down");
    assert_eq!(card.like_count(), 1);
    let error = card.last_error().expect("error recorded").to_string();
    assert!(error.contains("like failed"));
    assert!(card.render().to_string().contains(&error));

    gateway.fail_from_now_on(false);
    card.activate_like().await.expect("like again");
    assert_eq!(card.like_count(), 0);
    assert_eq!(card.last_error(), None);
}

#[tokio::test]
async fn failed_comment_keeps_draft_and_list() {
    let gateway = Arc::new(RecordingGateway::default());
    let mut card = card(&gateway, Some("u2"));
    card.mount().await.expect("mount");

    gateway.fail_from_now_on(true);
    card.set_draft("hello");
    card.submit_comment().await.expect_err("store down");
    assert_eq!(card.draft(), "hello");
    assert!(card.comments().is_empty());
    assert!(card.last_error().is_some());
}

#[tokio::test]
async fn failed_mount_stays_loading() {
    let gateway = Arc::new(RecordingGateway::default());
    gateway.fail_from_now_on(true);
    let mut card = card(&gateway, Some("u2"));
    card.mount().await.expect_err("store down");
    assert_eq!(card.phase(), CardPhase::Loading);
    assert!(card.last_error().is_some());
}

#[tokio::test]
async fn follow_author_follows_post_owner() {
    let gateway = Arc::new(RecordingGateway::default());
    let mut card = card(&gateway, Some("u2"));
    card.follow_author().await.expect("follow");
    assert_eq!(gateway.calls(), vec![Call::Follow("u2".into(), "u1".into())]);
}
