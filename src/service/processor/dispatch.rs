use std::sync::Arc;
use trellis_core::{get_current_or_previous_model, Event, EventType, ModelType};

use crate::{
    models::{ApprovalStatus, EnvironmentPolicyApproval, ReleaseJobTrigger, TriggerType},
    services::{DispatchReport, Dispatcher},
};

/// Reacts to trigger and approval events by dispatching jobs.
#[derive(Debug)]
pub struct DispatchProcessor {
    pub dispatcher: Arc<Dispatcher>,
}

impl DispatchProcessor {
    #[tracing::instrument(name = "processor::dispatch::process", skip(self, event), fields(event_id = %event.id))]
    pub async fn process(&self, event: &Event) -> anyhow::Result<Option<DispatchReport>> {
        match (event.model_type, event.event_type) {
            (ModelType::Trigger, EventType::Created) => self.process_trigger_created(event).await,
            (ModelType::Approval, EventType::Updated) => self.process_approval_updated(event).await,
            (model_type, event_type) => {
                tracing::debug!("{} {} event => NOP", model_type, event_type);

                Ok(None)
            }
        }
    }

    async fn process_trigger_created(&self, event: &Event) -> anyhow::Result<Option<DispatchReport>> {
        let trigger: ReleaseJobTrigger = get_current_or_previous_model(event)?;

        // forced releases create their job synchronously
        if trigger.trigger_type == TriggerType::ForceDeploy {
            return Ok(None);
        }

        let report = self
            .dispatcher
            .dispatch_existing(&[trigger], &Some(event.operation_id.clone()))
            .await?;

        Ok(Some(report))
    }

    async fn process_approval_updated(&self, event: &Event) -> anyhow::Result<Option<DispatchReport>> {
        let approval: EnvironmentPolicyApproval = get_current_or_previous_model(event)?;

        if approval.status != ApprovalStatus::Approved {
            return Ok(None);
        }

        let report = self
            .dispatcher
            .resume_release(&approval.release_id, &Some(event.operation_id.clone()))
            .await?;

        Ok(Some(report))
    }
}
