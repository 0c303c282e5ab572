use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

use trellis_core::{Event, EventStream};

use crate::event::EventModel;

/// Durable event queue. Each sent event is fanned out to one row per
/// subscriber so consumers acknowledge independently.
#[derive(Debug)]
pub struct PostgresqlEventStream {
    pub db: Arc<PgPool>,
    pub subscribers: Vec<String>,
}

#[async_trait]
impl EventStream for PostgresqlEventStream {
    #[tracing::instrument(name = "postgresql::event_stream::delete", skip(self))]
    async fn delete(&self, event: &Event, consumer_id: &str) -> anyhow::Result<u64> {
        let id = EventModel::make_id(&event.id, consumer_id);

        let result = sqlx::query("DELETE FROM event_queue WHERE id = $1")
            .bind(id)
            .execute(&*self.db)
            .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(name = "postgresql::event_stream::send", skip(self))]
    async fn send(&self, event: &Event) -> anyhow::Result<()> {
        let mut transaction = self.db.begin().await?;

        for consumer_id in &self.subscribers {
            let model = EventModel::from_event(event, consumer_id);

            sqlx::query(
                r#"
                INSERT INTO event_queue
                    (id, event_id, consumer_id, operation_id, model_type, event_type,
                     serialized_current_model, serialized_previous_model, event_timestamp)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(model.id)
            .bind(model.event_id)
            .bind(model.consumer_id)
            .bind(model.operation_id)
            .bind(model.model_type)
            .bind(model.event_type)
            .bind(model.serialized_current_model)
            .bind(model.serialized_previous_model)
            .bind(model.event_timestamp)
            .execute(&mut transaction)
            .await?;
        }

        transaction.commit().await?;

        Ok(())
    }

    async fn send_many(&self, events: &[Event]) -> anyhow::Result<()> {
        for event in events {
            self.send(event).await?;
        }

        Ok(())
    }

    #[tracing::instrument(name = "postgresql::event_stream::receive", skip(self))]
    async fn receive(&self, consumer_id: &str) -> anyhow::Result<Vec<Event>> {
        let models: Vec<EventModel> = sqlx::query_as(
            "SELECT * FROM event_queue WHERE consumer_id = $1 ORDER BY event_timestamp LIMIT 100",
        )
        .bind(consumer_id)
        .fetch_all(&*self.db)
        .await?;

        models.into_iter().map(Event::try_from).collect()
    }
}
