use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info};

use todo_api::{
    app::{build_router, AppState, RouterOptions},
    config::AppConfig,
    infrastructure::{
        database::{ConnectionManager, MySqlConnector},
        logger::Logger,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    Logger::init(&config.log_level);

    info!("Starting todo API server...");

    let db = Arc::new(ConnectionManager::new(MySqlConnector::new(
        &config.database,
    )));

    let result = run(&config, Arc::clone(&db)).await;

    // 无论正常退出还是启动失败，都要关闭连接池和探活任务
    db.shutdown().await;
    if let Err(err) = &result {
        error!("Server stopped with error: {:#}", err);
    } else {
        info!("Server shutdown complete");
    }
    result
}

async fn run(config: &AppConfig, db: Arc<ConnectionManager<MySqlConnector>>) -> anyhow::Result<()> {
    info!(
        host = %config.database.host,
        port = config.database.port,
        database = %config.database.name,
        "Waiting for database"
    );
    db.wait_until_ready(config.readiness.retries, config.readiness.delay())
        .await
        .context("database was not ready in time")?;

    let state = AppState::new(db);
    if !config.database.skip_schema {
        state
            .todos
            .ensure_schema()
            .await
            .context("failed to create table 'todos'")?;
    }

    let app = build_router(state, RouterOptions::from_config(&config.server));

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("🚀 Server running on http://{}", listener.local_addr()?);
    info!("📖 API endpoints:");
    info!("   GET    /api/todos             - List todos");
    info!("   GET    /api/todos/:id         - Get todo");
    info!("   POST   /api/todos             - Create todo");
    info!("   PUT    /api/todos/:id         - Update todo");
    info!("   PATCH  /api/todos/:id/toggle  - Toggle completion");
    info!("   DELETE /api/todos/:id         - Delete todo");
    info!("   GET    /health                - Database liveness");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// 等待 Ctrl+C 或 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown"),
        _ = terminate => info!("Received SIGTERM, starting shutdown"),
    }
}
