use std::time::Duration;

const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 20;
const DEFAULT_SCAN_INTERVAL_SECS: u64 = 300;
const DEFAULT_SCAN_UNIT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CLUSTER_TIMEOUT_SECS: u64 = 15;
const DEFAULT_DISPATCHER_CONSUMER_ID: &str = "dispatcher";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    pub scan_interval: Duration,
    pub scan_unit_timeout: Duration,
    pub cluster_timeout: Duration,

    pub subscribers: Vec<String>,
    pub dispatcher_consumer_id: String,

    pub google_access_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            scan_interval: Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS),
            scan_unit_timeout: Duration::from_secs(DEFAULT_SCAN_UNIT_TIMEOUT_SECS),
            cluster_timeout: Duration::from_secs(DEFAULT_CLUSTER_TIMEOUT_SECS),
            subscribers: vec![DEFAULT_DISPATCHER_CONSUMER_ID.to_string()],
            dispatcher_consumer_id: DEFAULT_DISPATCHER_CONSUMER_ID.to_string(),
            google_access_token: None,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let parse_secs = |key: &str, default: Duration| -> anyhow::Result<Duration> {
            match lookup(key) {
                Some(value) => {
                    let secs = value
                        .parse::<u64>()
                        .map_err(|err| anyhow::anyhow!("{key} must be whole seconds: {err}"))?;
                    Ok(Duration::from_secs(secs))
                }
                None => Ok(default),
            }
        };

        let database_max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value.parse::<u32>().map_err(|err| {
                anyhow::anyhow!("DATABASE_MAX_CONNECTIONS must be a number: {err}")
            })?,
            None => defaults.database_max_connections,
        };

        let subscribers = match lookup("SUBSCRIBERS") {
            Some(value) => value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => defaults.subscribers,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL"),
            database_max_connections,
            scan_interval: parse_secs("SCAN_INTERVAL_SECS", defaults.scan_interval)?,
            scan_unit_timeout: parse_secs("SCAN_UNIT_TIMEOUT_SECS", defaults.scan_unit_timeout)?,
            cluster_timeout: parse_secs("CLUSTER_TIMEOUT_SECS", defaults.cluster_timeout)?,
            subscribers,
            dispatcher_consumer_id: lookup("DISPATCHER_CONSUMER_ID")
                .unwrap_or(defaults.dispatcher_consumer_id),
            google_access_token: lookup("GOOGLE_ACCESS_TOKEN"),
        })
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))
    }
}
