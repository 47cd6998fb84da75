use std::net::TcpListener;

use anyhow::Context;
use socialapp::{build_state, config::Config, make_router, run_app};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "socialapp=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    let address = format!("{}:{}", config.host, config.port);
    let state = build_state(config).await?;
    let listener =
        TcpListener::bind(&address).with_context(|| format!("Failed to bind {}", address))?;
    info!("Server started on http://{}", address);
    run_app(make_router(state), listener).await
}
