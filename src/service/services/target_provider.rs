use std::sync::Arc;
use trellis_core::{create_event, EventStream, EventType, ModelType, OperationId};

use crate::{models::TargetProvider, persistence::Persistence};

#[derive(Debug)]
pub struct TargetProviderService {
    pub persistence: Box<dyn Persistence<TargetProvider>>,
    pub event_stream: Arc<dyn EventStream>,
}

impl TargetProviderService {
    #[tracing::instrument(name = "service::target_provider::upsert", skip(self))]
    pub async fn upsert(
        &self,
        provider: &TargetProvider,
        operation_id: &Option<OperationId>,
    ) -> anyhow::Result<OperationId> {
        let previous = self.get_by_id(&provider.id).await?;

        self.persistence.upsert(provider).await?;

        let event_type = match previous {
            Some(_) => EventType::Updated,
            None => EventType::Created,
        };

        let operation_id = OperationId::unwrap_or_create(operation_id);
        let upsert_event = create_event(
            &previous,
            &Some(provider.clone()),
            event_type,
            ModelType::TargetProvider,
            &operation_id,
        )?;

        self.event_stream.send(&upsert_event).await?;

        tracing::info!("target provider upserted: {:?}", provider);

        Ok(operation_id)
    }

    #[tracing::instrument(name = "service::target_provider::get_by_id", skip(self))]
    pub async fn get_by_id(&self, provider_id: &str) -> anyhow::Result<Option<TargetProvider>> {
        self.persistence.get_by_id(provider_id).await
    }

    #[tracing::instrument(name = "service::target_provider::list", skip(self))]
    pub async fn list(&self) -> anyhow::Result<Vec<TargetProvider>> {
        self.persistence.list().await
    }

    #[tracing::instrument(name = "service::target_provider::delete", skip(self))]
    pub async fn delete(
        &self,
        provider_id: &str,
        operation_id: &Option<OperationId>,
    ) -> anyhow::Result<OperationId> {
        let provider = match self.get_by_id(provider_id).await? {
            Some(provider) => provider,
            None => return Err(anyhow::anyhow!("Target provider id {provider_id} not found")),
        };

        let deleted_count = self.persistence.delete(provider_id).await?;

        if deleted_count == 0 {
            return Err(anyhow::anyhow!("Target provider id {provider_id} not found"));
        }

        let operation_id = OperationId::unwrap_or_create(operation_id);

        let delete_event = create_event(
            &Some(provider),
            &None,
            EventType::Deleted,
            ModelType::TargetProvider,
            &operation_id,
        )?;

        self.event_stream.send(&delete_event).await?;

        Ok(operation_id)
    }
}
