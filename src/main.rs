use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use notes_server::auth::Credentials;
use notes_server::config::Config;
use notes_server::{app, db, AppState};

const DEFAULT_LOG_FILTER: &str = "notes_server=info,tower_http=info";

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "server stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    tracing::info!(?config, "configuration loaded");

    // 初始化数据库连接池
    let pool = db::init_db(&config.database_url, config.max_connections).await?;
    db::migrate(&pool).await?;

    let credentials = Credentials::new(&config.auth)?;
    let router = app(AppState::new(pool, credentials), &config.cors_origin);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
    }
}
