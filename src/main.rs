use std::sync::Arc;

use anyhow::Context;
use axum::http::{header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE}, Method};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use fieldops::{
    config::Config,
    db::{db::DBClient, ledgerdb::LedgerStore, memorydb::MemoryStore},
    routes::create_router,
    service::background_jobs::start_deadline_sweep_job,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::init().context("invalid configuration")?;

    let (store, db_client): (Arc<dyn LedgerStore>, Option<Arc<DBClient>>) = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(database_url)
                .await
                .context("failed to connect to the database")?;
            tracing::info!("Connection to the database is successful");

            let db_client = Arc::new(DBClient::new(pool));
            db_client.migrate().await.context("failed to run migrations")?;

            let store: Arc<dyn LedgerStore> = db_client.clone();
            (store, Some(db_client))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; running on the in-memory ledger store");
            let store: Arc<dyn LedgerStore> = Arc::new(MemoryStore::new());
            (store, None)
        }
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST, Method::PUT]);

    let app_state = Arc::new(AppState::new(config.clone(), store, db_client));

    if config.deadline_sweep_secs > 0 {
        tokio::spawn(start_deadline_sweep_job(app_state.clone(), config.deadline_sweep_secs));
    }

    let app = create_router(app_state).layer(cors);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;

    tracing::info!("Server is running on http://localhost:{}", config.port);

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
