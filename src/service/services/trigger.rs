use std::sync::Arc;
use trellis_core::{create_event, EventStream, EventType, ModelType, OperationId};

use crate::{
    models::ReleaseJobTrigger,
    persistence::{Persistence, TriggerPersistence},
};

#[derive(Debug)]
pub struct TriggerService {
    pub persistence: Box<dyn TriggerPersistence>,
    pub event_stream: Arc<dyn EventStream>,
}

impl TriggerService {
    /// Persists a batch of triggers and emits one created event per trigger.
    #[tracing::instrument(name = "service::trigger::create_many", skip(self, triggers))]
    pub async fn create_many(
        &self,
        triggers: &[ReleaseJobTrigger],
        operation_id: &Option<OperationId>,
    ) -> anyhow::Result<OperationId> {
        let operation_id = OperationId::unwrap_or_create(operation_id);
        let mut events = Vec::with_capacity(triggers.len());

        for trigger in triggers {
            self.persistence.upsert(trigger).await?;

            events.push(create_event(
                &None,
                &Some(trigger.clone()),
                EventType::Created,
                ModelType::Trigger,
                &operation_id,
            )?);
        }

        self.event_stream.send_many(&events).await?;

        tracing::info!("created {} triggers", triggers.len());

        Ok(operation_id)
    }

    #[tracing::instrument(name = "service::trigger::get_by_id", skip(self))]
    pub async fn get_by_id(&self, trigger_id: &str) -> anyhow::Result<Option<ReleaseJobTrigger>> {
        self.persistence.get_by_id(trigger_id).await
    }

    #[tracing::instrument(name = "service::trigger::get_by_release_id", skip(self))]
    pub async fn get_by_release_id(
        &self,
        release_id: &str,
    ) -> anyhow::Result<Vec<ReleaseJobTrigger>> {
        self.persistence.get_by_release_id(release_id).await
    }
}
