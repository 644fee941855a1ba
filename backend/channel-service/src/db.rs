use std::sync::Arc;

use anyhow::Context;
use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::repository::PgChannelRepository;
use crate::service::ChannelService;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await?;
    info!("channel-service migrations applied");
    Ok(())
}

/// Connect, migrate, and assemble a Postgres-backed service.
pub async fn bootstrap(config: &Config) -> anyhow::Result<ChannelService> {
    let pool = db_pool::create_pool(&config.database)
        .await
        .context("Failed to create channel database pool")?;
    run_migrations(&pool)
        .await
        .context("Failed to run channel migrations")?;

    Ok(ChannelService::new(
        Arc::new(PgChannelRepository::new(pool)),
        Arc::new(config.authorizer()),
        config.cursor_codec(),
    ))
}
