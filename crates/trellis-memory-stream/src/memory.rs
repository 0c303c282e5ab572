use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::collections::VecDeque;

use trellis_core::{Event, EventStream};

#[derive(Debug)]
pub struct MemoryEventStream {
    events: Arc<Mutex<VecDeque<Event>>>,
}

impl MemoryEventStream {
    pub fn new() -> anyhow::Result<Self> {
        let event_stream = MemoryEventStream {
            events: Arc::new(Mutex::new(VecDeque::new())),
        };

        Ok(event_stream)
    }

    fn get_events_locked(&self) -> anyhow::Result<MutexGuard<VecDeque<Event>>> {
        match self.events.lock() {
            Ok(locked_events) => Ok(locked_events),
            Err(_) => Err(anyhow::anyhow!("failed to acquire lock")),
        }
    }
}

#[async_trait]
impl EventStream for MemoryEventStream {
    async fn delete(&self, event: &Event, _: &str) -> anyhow::Result<u64> {
        let mut events = self.get_events_locked()?;

        let starting_len = events.len();
        events.retain(|e| e.id != event.id);
        let deleted_count = starting_len - events.len();

        Ok(deleted_count as u64)
    }

    async fn send(&self, event: &Event) -> anyhow::Result<()> {
        let mut events = self.get_events_locked()?;

        events.push_back(event.clone());

        Ok(())
    }

    async fn send_many(&self, events: &[Event]) -> anyhow::Result<()> {
        for event in events.iter() {
            self.send(event).await?;
        }

        Ok(())
    }

    async fn receive(&self, _: &str) -> anyhow::Result<Vec<Event>> {
        let events = self.get_events_locked()?;

        Ok(events.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use trellis_core::{
        create_event, get_current_or_previous_model, EventType, ModelType, OperationId,
    };

    use super::*;

    #[derive(Debug, Deserialize, Serialize)]
    struct TargetStub {
        identifier: String,
    }

    #[tokio::test]
    async fn test_send_receive_delete_target_event() {
        let target = TargetStub {
            identifier: "my-project/prod-cluster".to_owned(),
        };

        let event_stream = MemoryEventStream::new().unwrap();

        let create_target_event = create_event(
            &None,
            &Some(target),
            EventType::Created,
            ModelType::Target,
            &OperationId::create(),
        )
        .unwrap();

        event_stream.send(&create_target_event).await.unwrap();

        let received_events = event_stream.receive("").await.unwrap();
        assert_eq!(received_events.len(), 1);

        let received_event = received_events.first().unwrap();
        assert_eq!(received_event.event_type, EventType::Created);
        assert_eq!(received_event.model_type, ModelType::Target);

        let target: TargetStub = get_current_or_previous_model(received_event).unwrap();
        assert_eq!(target.identifier, "my-project/prod-cluster");

        let deleted_count = event_stream.delete(received_event, "").await.unwrap();
        assert_eq!(deleted_count, 1);

        assert!(event_stream.receive("").await.unwrap().is_empty());
    }
}
