use futures::future::join_all;
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    config::Config,
    credentials::{CredentialProvider, GoogleCredentialProvider, StaticCredentialProvider},
    error::ProviderError,
    models::{Target, TargetProvider},
    providers::{GkeClusterApi, GoogleProviderAdapter, ProviderAdapter, ScanContext},
    services::{Services, TargetProviderService, TargetService},
};

/// Outcome of reconciling one provider. Unit failures are reported here and
/// never abort sibling units.
#[derive(Debug)]
pub struct ReconcileReport {
    pub provider_id: String,
    pub upserted: usize,
    pub errors: Vec<ProviderError>,
}

impl ReconcileReport {
    fn failed(provider: &TargetProvider, error: ProviderError) -> Self {
        Self {
            provider_id: provider.id.clone(),
            upserted: 0,
            errors: vec![error],
        }
    }
}

/// Keeps the target inventory in line with what each provider reports.
/// Different providers reconcile concurrently; the same provider is
/// reconciled by at most one caller at a time.
#[derive(Debug)]
pub struct Reconciler {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    credentials: Arc<dyn CredentialProvider>,

    target_service: Arc<TargetService>,
    target_provider_service: Arc<TargetProviderService>,

    unit_timeout: Duration,
    provider_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Reconciler {
    pub fn new(
        adapters: Vec<Arc<dyn ProviderAdapter>>,
        credentials: Arc<dyn CredentialProvider>,
        target_service: Arc<TargetService>,
        target_provider_service: Arc<TargetProviderService>,
        unit_timeout: Duration,
    ) -> Self {
        Self {
            adapters,
            credentials,
            target_service,
            target_provider_service,
            unit_timeout,
            provider_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Reconciler with every built-in adapter, using a static token when one
    /// is configured and the metadata server otherwise.
    pub fn from_config(config: &Config, services: &Services) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.scan_unit_timeout)
            .build()?;

        let credentials: Arc<dyn CredentialProvider> = match &config.google_access_token {
            Some(token) => Arc::new(StaticCredentialProvider::new(token)),
            None => Arc::new(GoogleCredentialProvider::new(client.clone())),
        };

        let cluster_api = Arc::new(GkeClusterApi::new(client, config.cluster_timeout));
        let google_adapter = GoogleProviderAdapter::new(cluster_api, config.cluster_timeout);

        Ok(Self::new(
            vec![Arc::new(google_adapter)],
            credentials,
            Arc::clone(&services.target),
            Arc::clone(&services.target_provider),
            config.scan_unit_timeout,
        ))
    }

    fn provider_lock(&self, provider_id: &str) -> anyhow::Result<Arc<tokio::sync::Mutex<()>>> {
        let mut provider_locks = match self.provider_locks.lock() {
            Ok(provider_locks) => provider_locks,
            Err(_) => return Err(anyhow::anyhow!("failed to acquire lock")),
        };

        Ok(Arc::clone(
            provider_locks.entry(provider_id.to_string()).or_default(),
        ))
    }

    /// Drops locks of providers that no longer exist.
    fn retain_provider_locks(&self, providers: &[TargetProvider]) -> anyhow::Result<()> {
        let mut provider_locks = match self.provider_locks.lock() {
            Ok(provider_locks) => provider_locks,
            Err(_) => return Err(anyhow::anyhow!("failed to acquire lock")),
        };

        let live: HashSet<&str> = providers.iter().map(|provider| provider.id.as_str()).collect();
        provider_locks.retain(|provider_id, _| live.contains(provider_id.as_str()));

        Ok(())
    }

    /// Scans every unit of `provider` concurrently and upserts the merged
    /// result. Only storage failures are returned as errors.
    #[tracing::instrument(name = "reconciler::reconcile", skip(self, provider), fields(provider_id = %provider.id))]
    pub async fn reconcile(&self, provider: &TargetProvider) -> anyhow::Result<ReconcileReport> {
        let provider_lock = self.provider_lock(&provider.id)?;
        let _guard = provider_lock.lock().await;

        let adapter = match self
            .adapters
            .iter()
            .find(|adapter| adapter.supports(&provider.config))
        {
            Some(adapter) => adapter,
            None => {
                return Err(anyhow::anyhow!(
                    "no adapter for {} provider {}",
                    provider.config.kind(),
                    provider.id
                ))
            }
        };

        let credential = match self
            .credentials
            .get_credential(provider.config.principal())
            .await
        {
            Ok(credential) => credential,
            Err(err) => {
                tracing::warn!("provider {}: {}", provider.id, err);
                return Ok(ReconcileReport::failed(provider, err));
            }
        };

        let context = ScanContext {
            credential,
            credentials: Arc::clone(&self.credentials),
        };

        let units = adapter.scan_units(provider);
        let scans = units.iter().map(|unit| {
            let context = &context;
            async move {
                let scanned = tokio::time::timeout(
                    self.unit_timeout,
                    adapter.scan_unit(provider, unit, context),
                )
                .await
                .unwrap_or_else(|_| {
                    Err(ProviderError::UnitTimedOut {
                        unit: unit.clone(),
                        after: self.unit_timeout,
                    })
                });

                (unit, scanned)
            }
        });
        let outcomes = join_all(scans).await;

        let mut errors = Vec::new();
        let mut targets = Vec::new();
        let mut succeeded = 0;

        for (unit, scanned) in outcomes {
            match scanned {
                Ok(unit_targets) => {
                    succeeded += 1;
                    targets.extend(unit_targets);
                }
                Err(err) => {
                    tracing::warn!("provider {}: scan of {} failed: {}", provider.id, unit, err);
                    errors.push(ProviderError::UnitFailed {
                        unit: unit.clone(),
                        source: Box::new(err),
                    });
                }
            }
        }

        if !units.is_empty() && succeeded == 0 {
            let unreachable = ProviderError::ProviderUnreachable {
                provider_id: provider.id.clone(),
                reason: format!("all {} scan units failed", units.len()),
            };
            tracing::warn!("{}", unreachable);
            errors.push(unreachable);

            return Ok(ReconcileReport {
                provider_id: provider.id.clone(),
                upserted: 0,
                errors,
            });
        }

        let targets = dedupe_by_identifier(targets);
        let upserted = self.target_service.upsert_many(&targets, &None).await?;

        tracing::info!(
            "provider {} reconciled: {} targets upserted, {} errors",
            provider.id,
            upserted,
            errors.len()
        );

        Ok(ReconcileReport {
            provider_id: provider.id.clone(),
            upserted,
            errors,
        })
    }

    /// Reconciles every configured provider concurrently. A provider whose
    /// reconciliation fails outright is logged and left out of the result.
    #[tracing::instrument(name = "reconciler::reconcile_all", skip(self))]
    pub async fn reconcile_all(&self) -> anyhow::Result<Vec<ReconcileReport>> {
        let providers = self.target_provider_service.list().await?;
        self.retain_provider_locks(&providers)?;

        let results = join_all(providers.iter().map(|provider| self.reconcile(provider))).await;

        let mut reports = Vec::with_capacity(results.len());
        for (provider, result) in providers.iter().zip(results) {
            match result {
                Ok(report) => reports.push(report),
                Err(err) => tracing::error!("reconciling provider {} failed: {}", provider.id, err),
            }
        }

        Ok(reports)
    }
}

/// First occurrence wins, so the order units reported targets in is kept.
fn dedupe_by_identifier(targets: Vec<Target>) -> Vec<Target> {
    let mut seen = HashSet::new();

    targets
        .into_iter()
        .filter(|target| seen.insert((target.workspace_id.clone(), target.identifier.clone())))
        .collect()
}
