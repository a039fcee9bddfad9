use std::sync::Arc;

use anyhow::Context;
use backend::config::AppConfig;
use backend::db;
use backend::web_server::{run_server, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("backend=info,tower_http=info,sqlx=warn")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app_config = AppConfig::from_env().context("Failed to load configuration")?;

    let db_pool = db::connect(&app_config.database)
        .await
        .context("Failed to prepare the database")?;

    let app_state = AppState {
        db_pool,
        app_config: Arc::new(app_config),
    };

    run_server(app_state).await
}
