use dotenvy::dotenv;
use std::sync::Arc;
use tokio::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trellis::{
    config::Config,
    persistence::relational,
    processor::DispatchProcessor,
    services::{Persistences, Services},
};
use trellis_core::EventStream;
use trellis_postgresql_stream::PostgresqlEventStream;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    let tracer = opentelemetry_jaeger::new_agent_pipeline()
        .with_service_name(&config.dispatcher_consumer_id)
        .install_simple()
        .expect("Failed to instantiate OpenTelemetry / Jaeger tracing");

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .expect("Failed to register tracer with registry");

    tracing::info!("dispatcher: starting");

    let db = relational::connect(&config).await?;

    let event_stream: Arc<dyn EventStream> = Arc::new(PostgresqlEventStream {
        db: Arc::clone(&db),
        subscribers: config.subscribers.clone(),
    });

    let services = Services::new(Persistences::relational(&db), Arc::clone(&event_stream));

    let processor = DispatchProcessor {
        dispatcher: Arc::clone(&services.dispatcher),
    };

    let consumer_id = &config.dispatcher_consumer_id;

    tracing::info!("dispatcher: starting event loop as {}", consumer_id);

    loop {
        let events = event_stream.receive(consumer_id).await?;

        for event in events.iter() {
            match processor.process(event).await {
                Ok(Some(report)) => tracing::info!(
                    "event {}: {} jobs created, {} triggers skipped",
                    event.id,
                    report.jobs.len(),
                    report.skipped.len()
                ),
                Ok(None) => {}
                Err(err) => tracing::error!("event {} failed: {:#}", event.id, err),
            }

            event_stream.delete(event, consumer_id).await?;
        }

        if events.is_empty() {
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}
