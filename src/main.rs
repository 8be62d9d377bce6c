use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod state;

use fulltext_strict::config;
use fulltext_strict::db;
use fulltext_strict::engine::{self, Migrator};
use fulltext_strict::store::{Connection, MySqlStore};
use fulltext_strict::task::JobManager;
use state::AppState;

/// Command given on the command line / 命令行子命令
enum Command {
    Serve,
    Install,
    Uninstall,
}

impl Command {
    fn from_args() -> anyhow::Result<Self> {
        match std::env::args().nth(1).as_deref() {
            None | Some("serve") => Ok(Command::Serve),
            Some("install") => Ok(Command::Install),
            Some("uninstall") => Ok(Command::Uninstall),
            Some(other) => anyhow::bail!("Unknown command: {} (expected serve, install or uninstall)", other),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fulltext_strict=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let command = Command::from_args()?;

    // Load configuration / 加载配置
    let app_config = config::init_config()?.read().clone();

    let conn: Arc<dyn Connection> = Arc::new(
        MySqlStore::connect(&app_config.get_database_url(), app_config.database.max_connections).await?,
    );

    match command {
        Command::Install => {
            let migrator = Migrator::new(conn, app_config.engine.clone());
            let mode = engine::install(&migrator).await;
            tracing::info!("Install finished: {:?}", mode);
            return Ok(());
        }
        Command::Uninstall => {
            let migrator = Migrator::new(conn, app_config.engine.clone());
            engine::uninstall(&migrator).await?;
            return Ok(());
        }
        Command::Serve => {}
    }

    db::run_migrations(conn.as_ref()).await?;

    let mut jobs = JobManager::new();
    jobs.set_db(conn.clone());
    // Load jobs from database, running ones become interrupted / 从数据库加载任务
    jobs.load_jobs_from_db().await;

    let state = Arc::new(AppState::new(conn.clone(), jobs, app_config.clone()));

    if app_config.engine.auto_heal_on_startup {
        let action = engine::bootstrap_self_heal(&state.migrator).await;
        tracing::info!("Startup engine check: {:?}", action);
    }

    let app = Router::new()
        .route("/api/health", get(api::server::health_check))
        // 全文搜索管理API
        .route("/api/admin/fulltext/diagnostics", get(api::admin::get_diagnostics))
        .route("/api/admin/fulltext/reindex/items", post(api::admin::reindex_items))
        .route("/api/admin/fulltext/reindex/items-sets", post(api::admin::reindex_items_and_sets))
        .route("/api/admin/fulltext/reindex/item-sets", post(api::admin::reindex_item_sets))
        .route("/api/admin/fulltext/reindex/media", post(api::admin::reindex_media))
        .route("/api/admin/fulltext/jobs", get(api::admin::list_jobs))
        .route("/api/admin/fulltext/jobs/:id/stop", post(api::admin::stop_job))
        .route("/api/admin/fulltext/engine/enhanced", post(api::admin::switch_to_enhanced))
        .route("/api/admin/fulltext/engine/baseline", post(api::admin::switch_to_baseline))
        .route("/api/search/rewrite", post(api::rewrite::preview_rewrite))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    let bind_addr = app_config.get_bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server running at http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
