//! One-shot purge of access log rows older than the retention window.

use anyhow::Context;
use guestbook::access_log::{purge_once, PgAccessLog};
use guestbook::config::{AppConfig, StorageConfig};
use sqlx::postgres::PgPoolOptions;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = AppConfig::from_env()?;
    let StorageConfig::Postgres { url } = &cfg.storage else {
        anyhow::bail!("DATABASE_URL must be set; the access log only exists in Postgres");
    };
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(url)
        .await
        .context("connecting to DATABASE_URL")?;

    let deleted = purge_once(&PgAccessLog::new(pool), cfg.access_log_retention).await?;
    println!("Deleted {deleted} old access logs");
    Ok(())
}
