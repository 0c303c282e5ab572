use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{error::Error, sync::Arc};

use crate::config::Config;

mod approval;
mod deployment;
mod environment;
mod job;
mod policy;
mod release;
mod target;
mod target_provider;
mod trigger;

pub use approval::ApprovalRelationalPersistence;
pub use deployment::DeploymentRelationalPersistence;
pub use environment::EnvironmentRelationalPersistence;
pub use job::JobRelationalPersistence;
pub use policy::PolicyRelationalPersistence;
pub use release::ReleaseRelationalPersistence;
pub use target::TargetRelationalPersistence;
pub use target_provider::TargetProviderRelationalPersistence;
pub use trigger::TriggerRelationalPersistence;

/// Connects to the configured database and applies pending migrations.
#[tracing::instrument(name = "relational::connect", skip(config))]
pub async fn connect(config: &Config) -> anyhow::Result<Arc<PgPool>> {
    let db = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(config.require_database_url()?)
        .await?;

    sqlx::migrate!().run(&db).await?;

    Ok(Arc::new(db))
}

fn decode_error<E>(error: E) -> sqlx::Error
where
    E: Into<Box<dyn Error + Send + Sync>>,
{
    sqlx::Error::Decode(error.into())
}

#[cfg(test)]
pub(crate) async fn connect_test_db() -> std::sync::Arc<sqlx::PgPool> {
    dotenvy::from_filename(".env.test").ok();

    let database_url = dotenvy::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("failed to connect to DATABASE_URL");

    sqlx::migrate!().run(&db).await.expect("failed to migrate");

    std::sync::Arc::new(db)
}
