use dotenvy::dotenv;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trellis::{
    config::Config,
    persistence::relational,
    reconciliation::Reconciler,
    services::{Persistences, Services},
};
use trellis_core::EventStream;
use trellis_postgresql_stream::PostgresqlEventStream;

const RECONCILER_SERVICE_NAME: &str = "reconciler";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let tracer = opentelemetry_jaeger::new_agent_pipeline()
        .with_service_name(RECONCILER_SERVICE_NAME)
        .install_simple()
        .expect("Failed to instantiate OpenTelemetry / Jaeger tracing");

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .expect("Failed to register tracer with registry");

    tracing::info!("reconciler: starting");

    let config = Config::from_env()?;
    let db = relational::connect(&config).await?;

    let event_stream: Arc<dyn EventStream> = Arc::new(PostgresqlEventStream {
        db: Arc::clone(&db),
        subscribers: config.subscribers.clone(),
    });

    let services = Services::new(Persistences::relational(&db), event_stream);
    let reconciler = Reconciler::from_config(&config, &services)?;

    tracing::info!(
        "reconciler: scanning every {}s",
        config.scan_interval.as_secs()
    );

    let mut interval = tokio::time::interval(config.scan_interval);

    loop {
        interval.tick().await;

        match reconciler.reconcile_all().await {
            Ok(reports) => {
                for report in reports {
                    if report.errors.is_empty() {
                        tracing::info!(
                            "provider {}: {} targets upserted",
                            report.provider_id,
                            report.upserted
                        );
                    } else {
                        tracing::warn!(
                            "provider {}: {} targets upserted, {} errors",
                            report.provider_id,
                            report.upserted,
                            report.errors.len()
                        );
                    }
                }
            }
            Err(err) => tracing::error!("reconciliation pass failed: {:#}", err),
        }
    }
}
