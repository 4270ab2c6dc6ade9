use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{InteractionGateway, LocalGateway, PostCard};
use server_api::{auth, interactions, posts, ApiContext, AuthConfig};
use shared::{
    domain::{PostId, UserId},
    error::ApiException,
    protocol::SignupRequest,
};
use storage::Storage;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Admin tasks run directly against a database file.
#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/petwalking.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateUser {
        username: String,
        email: String,
        password: String,
    },
    CreatePost {
        user_id: String,
        image: PathBuf,
        caption: String,
    },
    Like {
        post_id: String,
        user_id: String,
    },
    Comment {
        post_id: String,
        user_id: String,
        text: String,
    },
    Follow {
        source_user_id: String,
        target_user_id: String,
    },
    /// Print a post as its card would show it.
    ShowPost {
        post_id: String,
        #[arg(long)]
        viewer: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;
    let ctx = ApiContext::new(storage, AuthConfig::default());

    match cli.command {
        Command::CreateUser {
            username,
            email,
            password,
        } => {
            let session = auth::signup(
                &ctx,
                &SignupRequest {
                    username,
                    email,
                    password,
                },
            )
            .await
            .map_err(ApiException::from)?;
            println!("created user_id={}", session.user_id);
        }
        Command::CreatePost {
            user_id,
            image,
            caption,
        } => {
            let bytes = tokio::fs::read(&image)
                .await
                .with_context(|| format!("failed to read {}", image.display()))?;
            let filename = image
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("image");
            let content_type = mime_guess::from_path(&image).first_or_octet_stream();
            let post = posts::create_post(
                &ctx,
                &UserId(user_id),
                posts::ImageUpload {
                    bytes: &bytes,
                    filename,
                    content_type: Some(content_type.essence_str()),
                },
                &caption,
            )
            .await
            .map_err(ApiException::from)?;
            println!("created post_id={} image_url={}", post.id, post.image_url);
        }
        Command::Like { post_id, user_id } => {
            let post_id = PostId(post_id);
            interactions::toggle_like(&ctx, &post_id, &UserId(user_id)).await?;
            let count = interactions::get_like_count(&ctx, &post_id).await?;
            println!("post {post_id} now has {count} likes");
        }
        Command::Comment {
            post_id,
            user_id,
            text,
        } => {
            interactions::add_comment(&ctx, &PostId(post_id), &UserId(user_id), &text).await?;
            println!("comment added");
        }
        Command::Follow {
            source_user_id,
            target_user_id,
        } => {
            LocalGateway::new(ctx)
                .follow_user(&UserId(source_user_id), &UserId(target_user_id))
                .await?;
            println!("follow recorded");
        }
        Command::ShowPost { post_id, viewer } => {
            let post = posts::get_post(&ctx, &PostId(post_id.clone()))
                .await
                .map_err(ApiException::from)?
                .ok_or_else(|| anyhow!("post {post_id} not found"))?;
            let mut card = PostCard::new(
                post,
                viewer.map(UserId),
                Arc::new(LocalGateway::new(ctx)),
            );
            card.mount().await?;
            print!("{}", card.render());
        }
    }

    Ok(())
}
