use std::sync::Arc;
use trellis::{
    config::Config,
    persistence::relational,
    services::{Persistences, Services},
};
use trellis_core::EventStream;
use trellis_postgresql_stream::PostgresqlEventStream;

pub struct Context {
    pub config: Config,
    pub services: Services,
}

impl Context {
    pub async fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::from_env()?;
        let db = relational::connect(&config).await?;

        let event_stream: Arc<dyn EventStream> = Arc::new(PostgresqlEventStream {
            db: Arc::clone(&db),
            subscribers: config.subscribers.clone(),
        });

        let services = Services::new(Persistences::relational(&db), event_stream);

        Ok(Self { config, services })
    }
}

pub fn required<'a>(matches: &'a clap::ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("{name} expected"))
}
