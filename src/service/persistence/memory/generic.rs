use async_trait::async_trait;
use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::persistence::{Persistable, Persistence};

#[derive(Debug)]
pub struct MemoryPersistence<Model>
where
    Model: Persistable<Model>,
{
    models: Arc<Mutex<HashMap<String, Model>>>,
}

#[async_trait]
impl<Model> Persistence<Model> for MemoryPersistence<Model>
where
    Model: Persistable<Model> + Clone + Debug + Send + Sync,
{
    async fn upsert(&self, model: &Model) -> anyhow::Result<u64> {
        let mut locked_models = self.get_models_locked()?;

        locked_models.insert(model.get_id(), model.clone());

        Ok(1)
    }

    async fn delete(&self, model_id: &str) -> anyhow::Result<u64> {
        let mut locked_models = self.get_models_locked()?;

        match locked_models.remove(model_id) {
            Some(_) => Ok(1),
            None => Ok(0),
        }
    }

    async fn get_by_id(&self, model_id: &str) -> anyhow::Result<Option<Model>> {
        let locked_models = self.get_models_locked()?;

        Ok(locked_models.get(model_id).cloned())
    }

    async fn list(&self) -> anyhow::Result<Vec<Model>> {
        let locked_models = self.get_models_locked()?;

        Ok(locked_models.values().cloned().collect())
    }
}

impl<Model> Default for MemoryPersistence<Model>
where
    Model: Persistable<Model>,
{
    fn default() -> Self {
        Self {
            models: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<Model> MemoryPersistence<Model>
where
    Model: Persistable<Model> + Clone,
{
    pub(crate) fn get_models_locked(&self) -> anyhow::Result<MutexGuard<HashMap<String, Model>>> {
        match self.models.lock() {
            Ok(locked_models) => Ok(locked_models),
            Err(_) => Err(anyhow::anyhow!("failed to acquire lock")),
        }
    }

    pub(crate) fn filter<F>(&self, predicate: F) -> anyhow::Result<Vec<Model>>
    where
        F: Fn(&Model) -> bool,
    {
        let locked_models = self.get_models_locked()?;

        Ok(locked_models
            .values()
            .filter(|model| predicate(model))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::Environment, test::get_environment_fixture};

    #[tokio::test]
    async fn test_upsert_get_delete() {
        let environment_persistence = MemoryPersistence::<Environment>::default();
        let environment = get_environment_fixture(None);

        let upserted_count = environment_persistence.upsert(&environment).await.unwrap();
        assert_eq!(upserted_count, 1);

        let fetched_environment = environment_persistence
            .get_by_id(&environment.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched_environment, environment);

        let deleted_count = environment_persistence
            .delete(&environment.id)
            .await
            .unwrap();
        assert_eq!(deleted_count, 1);

        let deleted_count = environment_persistence
            .delete(&environment.id)
            .await
            .unwrap();
        assert_eq!(deleted_count, 0);
    }
}
