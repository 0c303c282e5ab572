use async_trait::async_trait;

use super::MemoryPersistence;
use crate::{
    models::ReleaseJobTrigger,
    persistence::{Persistence, TriggerPersistence},
};

#[derive(Debug, Default)]
pub struct TriggerMemoryPersistence {
    models: MemoryPersistence<ReleaseJobTrigger>,
}

#[async_trait]
impl Persistence<ReleaseJobTrigger> for TriggerMemoryPersistence {
    async fn upsert(&self, trigger: &ReleaseJobTrigger) -> anyhow::Result<u64> {
        self.models.upsert(trigger).await
    }

    async fn delete(&self, trigger_id: &str) -> anyhow::Result<u64> {
        self.models.delete(trigger_id).await
    }

    async fn get_by_id(&self, trigger_id: &str) -> anyhow::Result<Option<ReleaseJobTrigger>> {
        self.models.get_by_id(trigger_id).await
    }

    async fn list(&self) -> anyhow::Result<Vec<ReleaseJobTrigger>> {
        self.models.list().await
    }
}

#[async_trait]
impl TriggerPersistence for TriggerMemoryPersistence {
    async fn get_by_release_id(
        &self,
        release_id: &str,
    ) -> anyhow::Result<Vec<ReleaseJobTrigger>> {
        let mut triggers = self
            .models
            .filter(|trigger| trigger.release_id == release_id)?;

        triggers.sort_by_key(|trigger| trigger.created_at);

        Ok(triggers)
    }
}
