use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::MemoryPersistence;
use crate::{
    models::Target,
    persistence::{Persistence, TargetPersistence},
};

#[derive(Debug, Default)]
pub struct TargetMemoryPersistence {
    models: MemoryPersistence<Target>,
}

#[async_trait]
impl Persistence<Target> for TargetMemoryPersistence {
    async fn upsert(&self, target: &Target) -> anyhow::Result<u64> {
        self.models.upsert(target).await
    }

    async fn delete(&self, target_id: &str) -> anyhow::Result<u64> {
        self.models.delete(target_id).await
    }

    async fn get_by_id(&self, target_id: &str) -> anyhow::Result<Option<Target>> {
        self.models.get_by_id(target_id).await
    }

    async fn list(&self) -> anyhow::Result<Vec<Target>> {
        self.models.list().await
    }
}

#[async_trait]
impl TargetPersistence for TargetMemoryPersistence {
    async fn upsert_by_identifier(&self, target: &Target) -> anyhow::Result<Target> {
        let mut locked_targets = self.models.get_models_locked()?;

        let existing = locked_targets
            .values()
            .find(|existing| existing.same_key(target))
            .cloned();

        let stored = match existing {
            Some(existing) => Target {
                id: existing.id,
                locked_at: existing.locked_at,
                ..target.clone()
            },
            None => target.clone(),
        };

        locked_targets.insert(stored.id.clone(), stored.clone());

        Ok(stored)
    }

    async fn get_by_identifier(
        &self,
        workspace_id: &str,
        identifier: &str,
    ) -> anyhow::Result<Option<Target>> {
        let matching = self.models.filter(|target| {
            target.workspace_id == workspace_id && target.identifier == identifier
        })?;

        Ok(matching.into_iter().next())
    }

    async fn get_by_provider_id(&self, provider_id: &str) -> anyhow::Result<Vec<Target>> {
        self.models
            .filter(|target| target.provider_id.as_deref() == Some(provider_id))
    }

    async fn set_locked_at(
        &self,
        target_id: &str,
        locked_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<u64> {
        let mut locked_targets = self.models.get_models_locked()?;

        match locked_targets.get_mut(target_id) {
            Some(target) => {
                target.locked_at = locked_at;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::get_target_fixture;

    #[tokio::test]
    async fn test_upsert_by_identifier_keeps_id_and_lock() {
        let target_persistence = TargetMemoryPersistence::default();

        let target = get_target_fixture(None);
        let stored = target_persistence
            .upsert_by_identifier(&target)
            .await
            .unwrap();
        assert_eq!(stored.id, target.id);

        let locked_at = Utc::now();
        target_persistence
            .set_locked_at(&target.id, Some(locked_at))
            .await
            .unwrap();

        let mut rescanned = get_target_fixture(None);
        rescanned.id = "fresh-scan-id".to_owned();
        rescanned.name = "renamed".to_owned();

        let stored = target_persistence
            .upsert_by_identifier(&rescanned)
            .await
            .unwrap();

        assert_eq!(stored.id, target.id);
        assert_eq!(stored.name, "renamed");
        assert_eq!(stored.locked_at, Some(locked_at));
        assert_eq!(target_persistence.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_by_identifier_and_provider() {
        let target_persistence = TargetMemoryPersistence::default();
        let target = get_target_fixture(None);

        target_persistence.upsert(&target).await.unwrap();

        let fetched = target_persistence
            .get_by_identifier(&target.workspace_id, &target.identifier)
            .await
            .unwrap();
        assert_eq!(fetched, Some(target.clone()));

        let by_provider = target_persistence
            .get_by_provider_id(target.provider_id.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(by_provider.len(), 1);

        let missing = target_persistence
            .get_by_identifier("other-workspace", &target.identifier)
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
