use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use cashguess_backend::config::Config;
use cashguess_backend::payout::PayoutClient;
use cashguess_backend::state::AppState;
use cashguess_backend::{app, broadcast};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // Load env
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    let connect = SqliteConnectOptions::from_str(&config.database_url)
        .context("invalid DATABASE_URL")?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect)
        .await
        .context("failed to connect DB")?;

    broadcast::init_schema(&pool).await?;

    let payout = PayoutClient::new(&config.payout_api_url, config.payout_timeout)?;

    let addr = config.bind_addr;
    let state = AppState { db: pool, config: Arc::new(config), payout };

    let app = app(state);

    tracing::info!("Server running on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
