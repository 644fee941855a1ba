use std::sync::Arc;

use account_client::HttpAccountDirectory;
use anyhow::Context;
use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::counter::HttpChannelCounter;
use crate::registry::SubscriberRegistry;
use crate::store::PgSubscriptionStore;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await?;
    info!("subscriber-service migrations applied");
    Ok(())
}

/// Connect, migrate, and assemble a Postgres-backed registry talking to the
/// account and channel services over HTTP.
pub async fn bootstrap(config: &Config) -> anyhow::Result<SubscriberRegistry> {
    let pool = db_pool::create_pool(&config.database)
        .await
        .context("Failed to create subscriber database pool")?;
    run_migrations(&pool)
        .await
        .context("Failed to run subscriber migrations")?;

    let accounts =
        HttpAccountDirectory::new(&config.account_service_url, config.remote_call_timeout())
            .context("Failed to build account service client")?;
    let counter =
        HttpChannelCounter::new(&config.channel_service_url, config.remote_call_timeout())
            .context("Failed to build channel service client")?;

    Ok(SubscriberRegistry::new(
        Arc::new(PgSubscriptionStore::new(pool)),
        Arc::new(counter),
        Arc::new(accounts),
        Arc::new(config.authorizer()),
        config.cursor_codec(),
    )
    .with_remote_timeout(config.remote_call_timeout()))
}
