use std::sync::Arc;

use cohabify::{AppState, Config, Mailer, db};
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Arc::new(Config::load());

    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect_lazy(&config.database_url)
        .unwrap();

    // Startup survives a broken database, matching the original server's
    // log-and-continue connect behavior.
    if let Err(e) = db::init_schema(&db_pool).await {
        error!("database unavailable at startup: {e}");
    } else {
        info!("database connected successfully");
    }

    let mailer = Mailer::from_config(&config);
    let port = config.port;

    let app = cohabify::app(AppState {
        db_pool,
        config,
        mailer,
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .unwrap();
    info!("Server running on port {port}");
    axum::serve(listener, app).await.unwrap();
}
