use hireflow_backend::{
    config::Config,
    database::pool::{create_pool, run_migrations},
    routes,
    services::mail_service::mailer_from_config,
    store::{MemoryStore, PersonStore, PgStore},
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    let store: Arc<dyn PersonStore> = if config.uses_memory_store() {
        warn!("DATABASE_URL=memory, data will not survive a restart");
        Arc::new(MemoryStore::new())
    } else {
        let pool = create_pool(&config).await?;
        run_migrations(&pool).await?;
        Arc::new(PgStore::new(pool))
    };

    let mailer = mailer_from_config(&config)?;
    let addr: SocketAddr = config.server_address.parse()?;
    let app = routes::router(AppState::new(config, store, mailer));

    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
