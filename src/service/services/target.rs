use chrono::Utc;
use std::sync::Arc;
use trellis_core::{create_event, EventStream, EventType, ModelType, OperationId};

use crate::{
    models::Target,
    persistence::{Persistence, TargetPersistence},
};

#[derive(Debug)]
pub struct TargetService {
    pub persistence: Box<dyn TargetPersistence>,
    pub event_stream: Arc<dyn EventStream>,
}

impl TargetService {
    /// Writes each target keyed by `(workspace_id, identifier)`. Stored rows
    /// keep their id and lock. Rows whose content did not change produce no
    /// event. Returns the number of targets written.
    #[tracing::instrument(name = "service::target::upsert_many", skip(self, targets))]
    pub async fn upsert_many(
        &self,
        targets: &[Target],
        operation_id: &Option<OperationId>,
    ) -> anyhow::Result<usize> {
        let operation_id = OperationId::unwrap_or_create(operation_id);
        let mut events = Vec::new();

        for target in targets {
            let previous = self
                .persistence
                .get_by_identifier(&target.workspace_id, &target.identifier)
                .await?;

            let stored = self.persistence.upsert_by_identifier(target).await?;

            let event_type = match &previous {
                Some(previous) if *previous == stored => continue,
                Some(_) => EventType::Updated,
                None => EventType::Created,
            };

            events.push(create_event(
                &previous,
                &Some(stored),
                event_type,
                ModelType::Target,
                &operation_id,
            )?);
        }

        self.event_stream.send_many(&events).await?;

        tracing::info!(
            "upserted {} targets, {} changed",
            targets.len(),
            events.len()
        );

        Ok(targets.len())
    }

    #[tracing::instrument(name = "service::target::get_by_id", skip(self))]
    pub async fn get_by_id(&self, target_id: &str) -> anyhow::Result<Option<Target>> {
        self.persistence.get_by_id(target_id).await
    }

    #[tracing::instrument(name = "service::target::get_by_identifier", skip(self))]
    pub async fn get_by_identifier(
        &self,
        workspace_id: &str,
        identifier: &str,
    ) -> anyhow::Result<Option<Target>> {
        self.persistence
            .get_by_identifier(workspace_id, identifier)
            .await
    }

    #[tracing::instrument(name = "service::target::get_by_provider_id", skip(self))]
    pub async fn get_by_provider_id(&self, provider_id: &str) -> anyhow::Result<Vec<Target>> {
        self.persistence.get_by_provider_id(provider_id).await
    }

    #[tracing::instrument(name = "service::target::list", skip(self))]
    pub async fn list(&self) -> anyhow::Result<Vec<Target>> {
        self.persistence.list().await
    }

    #[tracing::instrument(name = "service::target::lock", skip(self))]
    pub async fn lock(
        &self,
        target_id: &str,
        operation_id: &Option<OperationId>,
    ) -> anyhow::Result<Target> {
        let target = self.set_locked_at(target_id, true, operation_id).await?;

        tracing::info!("target {} locked", target.identifier);

        Ok(target)
    }

    #[tracing::instrument(name = "service::target::unlock", skip(self))]
    pub async fn unlock(
        &self,
        target_id: &str,
        operation_id: &Option<OperationId>,
    ) -> anyhow::Result<Target> {
        let target = self.set_locked_at(target_id, false, operation_id).await?;

        tracing::info!("target {} unlocked", target.identifier);

        Ok(target)
    }

    async fn set_locked_at(
        &self,
        target_id: &str,
        locked: bool,
        operation_id: &Option<OperationId>,
    ) -> anyhow::Result<Target> {
        let previous = match self.get_by_id(target_id).await? {
            Some(target) => target,
            None => return Err(anyhow::anyhow!("Target id {target_id} not found")),
        };

        // Locking an already locked target keeps the original timestamp.
        if previous.is_locked() == locked {
            return Ok(previous);
        }

        let locked_at = if locked { Some(Utc::now()) } else { None };
        self.persistence.set_locked_at(target_id, locked_at).await?;

        let current = Target {
            locked_at,
            ..previous.clone()
        };

        let operation_id = OperationId::unwrap_or_create(operation_id);
        let update_event = create_event(
            &Some(previous),
            &Some(current.clone()),
            EventType::Updated,
            ModelType::Target,
            &operation_id,
        )?;

        self.event_stream.send(&update_event).await?;

        Ok(current)
    }

    #[tracing::instrument(name = "service::target::delete", skip(self))]
    pub async fn delete(
        &self,
        target_id: &str,
        operation_id: &Option<OperationId>,
    ) -> anyhow::Result<OperationId> {
        let target = match self.get_by_id(target_id).await? {
            Some(target) => target,
            None => return Err(anyhow::anyhow!("Target id {target_id} not found")),
        };

        let deleted_count = self.persistence.delete(target_id).await?;

        if deleted_count == 0 {
            return Err(anyhow::anyhow!("Target id {target_id} not found"));
        }

        let operation_id = OperationId::unwrap_or_create(operation_id);

        let delete_event = create_event(
            &Some(target),
            &None,
            EventType::Deleted,
            ModelType::Target,
            &operation_id,
        )?;

        self.event_stream.send(&delete_event).await?;

        Ok(operation_id)
    }
}
