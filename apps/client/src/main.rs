use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{HttpGateway, InteractionGateway, PostCard};
use shared::{
    domain::{PostId, UserId},
    protocol::{LoginRequest, SignupRequest, UpdateProfileRequest},
};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Terminal client: signs in, optionally acts, then prints the feed.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, env = "PETWALKING_SERVER_URL", default_value = "http://127.0.0.1:8443")]
    server_url: String,
    #[arg(long, env = "PETWALKING_EMAIL")]
    email: String,
    #[arg(long, env = "PETWALKING_PASSWORD")]
    password: String,
    /// Create the account with this username instead of logging in.
    #[arg(long)]
    signup: Option<String>,
    /// Toggle your like on a post.
    #[arg(long, value_name = "POST_ID")]
    like: Option<String>,
    /// Comment on a post.
    #[arg(long, num_args = 2, value_names = ["POST_ID", "TEXT"])]
    comment: Option<Vec<String>>,
    /// Follow a user.
    #[arg(long, value_name = "USER_ID")]
    follow: Option<String>,
    /// Upload an image as a new post; requires --caption.
    #[arg(long, requires = "caption")]
    upload: Option<PathBuf>,
    #[arg(long)]
    caption: Option<String>,
    /// Show a profile and its posts instead of the feed. Defaults to your own.
    #[arg(long, value_name = "USER_ID", num_args = 0..=1, default_missing_value = "")]
    profile: Option<String>,
    /// Update your profile; requires --username.
    #[arg(long, requires = "username")]
    edit_profile: bool,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    bio: Option<String>,
    /// Image file to use as your profile photo.
    #[arg(long)]
    photo: Option<PathBuf>,
}

/// Reads an image from disk as `(bytes, filename, content type)`.
async fn read_image(path: &Path) -> Result<(Vec<u8>, String, String)> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("image")
        .to_string();
    let content_type = mime_guess::from_path(path).first_or_octet_stream();
    Ok((bytes, filename, content_type.essence_str().to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let args = Args::parse();

    let (gateway, session) = match &args.signup {
        Some(username) => {
            HttpGateway::signup(
                &args.server_url,
                &SignupRequest {
                    username: username.clone(),
                    email: args.email.clone(),
                    password: args.password.clone(),
                },
            )
            .await?
        }
        None => {
            HttpGateway::login(
                &args.server_url,
                &LoginRequest {
                    email: args.email.clone(),
                    password: args.password.clone(),
                },
            )
            .await?
        }
    };
    let viewer = session.user_id.clone();
    match &session.profile {
        Some(profile) => println!("Signed in as @{} ({viewer})", profile.username),
        None => println!("Signed in as {viewer}"),
    }

    if let Some(path) = &args.upload {
        let (bytes, filename, content_type) = read_image(path).await?;
        let caption = args.caption.as_deref().unwrap_or_default();
        let post = gateway
            .upload_post(bytes, &filename, &content_type, caption)
            .await?;
        println!("Posted {}", post.id);
    }
    if args.edit_profile {
        let photo_url = match &args.photo {
            Some(path) => {
                let (bytes, filename, content_type) = read_image(path).await?;
                Some(
                    gateway
                        .upload_profile_photo(bytes, &filename, &content_type)
                        .await?,
                )
            }
            None => None,
        };
        let profile = gateway
            .update_profile(&UpdateProfileRequest {
                username: args.username.clone().unwrap_or_default(),
                bio: args.bio.clone().unwrap_or_default(),
                photo_url,
            })
            .await?;
        println!("Profile updated: @{}", profile.username);
    }
    if let Some(target) = &args.follow {
        gateway.follow_user(&viewer, &UserId::new(target)).await?;
        println!("Following {target}");
    }

    let posts = match args.profile.as_deref() {
        Some(uid) => {
            let profile = if uid.is_empty() {
                gateway.me().await?
            } else {
                gateway.profile(&UserId::new(uid)).await?
            };
            let following = gateway.following(&profile.uid).await?;
            let followers = gateway.followers(&profile.uid).await?;
            println!("@{} <{}>", profile.username, profile.email);
            if let Some(photo) = &profile.photo_url {
                println!("[photo] {}", gateway.absolute_url(photo)?);
            }
            if let Some(bio) = profile.bio.as_deref().filter(|bio| !bio.is_empty()) {
                println!("{bio}");
            }
            println!(
                "{} following, {} followers",
                following.len(),
                followers.len()
            );
            gateway.posts_by_user(&profile.uid).await?
        }
        None => gateway.feed().await?,
    };
    info!(posts = posts.len(), "posts loaded");

    let gateway = Arc::new(gateway);
    for post in posts {
        let post_id = post.id.clone();
        let mut card = PostCard::new(post, Some(viewer.clone()), gateway.clone());
        card.mount().await?;

        if args.like.as_deref() == Some(post_id.as_str()) {
            card.activate_like().await?;
        }
        if let Some([target, text]) = args.comment.as_deref() {
            if PostId::new(target.as_str()) == post_id {
                card.set_draft(text.as_str());
                card.submit_comment().await?;
            }
        }

        println!("{}", card.render());
    }

    Ok(())
}
