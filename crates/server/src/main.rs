use std::{net::SocketAddr, sync::Arc};

use server_api::{ApiContext, AuthConfig};
use storage::Storage;
use tracing::{error, info};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use server::{
    app_state::AppState,
    build_router,
    config::{load_settings, prepare_database_url},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = load_settings()?;
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url)
        .await
        .map_err(|error| {
            error!(
                %database_url,
                %error,
                "failed to open SQLite database; verify parent directory exists and permissions are correct"
            );
            error
        })?
        .with_public_base_url(settings.public_base_url.clone());

    let auth = AuthConfig {
        jwt_secret: settings.jwt_secret.clone(),
        session_ttl_seconds: settings.session_ttl_seconds,
        ..AuthConfig::default()
    };
    let state = AppState {
        api: ApiContext::new(storage.clone(), auth),
        storage,
    };
    let app = build_router(Arc::new(state), settings.max_upload_bytes);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
