//! Rewrites any plaintext password left in the `person` table as an Argon2 hash.

use hireflow_backend::{
    config::Config,
    database::pool::{create_pool, run_migrations},
    services::password_migration::hash_plaintext_passwords,
    store::PgStore,
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let config = Config::from_env()?;
    if config.uses_memory_store() {
        anyhow::bail!("hash-passwords needs a Postgres DATABASE_URL");
    }

    let pool = create_pool(&config).await?;
    run_migrations(&pool).await?;
    let store = PgStore::new(pool);

    let report = hash_plaintext_passwords(&store).await?;
    info!(hashed = report.hashed, skipped = report.skipped, "Password migration finished");
    Ok(())
}
