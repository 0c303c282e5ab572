use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, FromRow, Row};
use trellis_core::{Event, OperationId};

#[derive(Clone, Debug)]
pub struct EventModel {
    pub id: String,
    pub event_id: String,
    pub consumer_id: String,
    pub operation_id: String,

    pub model_type: String,
    pub event_type: String,

    pub serialized_current_model: Option<Vec<u8>>,
    pub serialized_previous_model: Option<Vec<u8>>,

    pub event_timestamp: DateTime<Utc>,
}

impl EventModel {
    pub fn make_id(event_id: &str, consumer_id: &str) -> String {
        format!("{event_id}|{consumer_id}")
    }

    pub fn from_event(event: &Event, consumer_id: &str) -> Self {
        Self {
            id: Self::make_id(&event.id, consumer_id),
            event_id: event.id.clone(),
            consumer_id: consumer_id.to_string(),
            operation_id: event.operation_id.id.clone(),
            model_type: event.model_type.to_string(),
            event_type: event.event_type.to_string(),
            serialized_current_model: event.serialized_current_model.clone(),
            serialized_previous_model: event.serialized_previous_model.clone(),
            event_timestamp: event.timestamp,
        }
    }
}

impl<'r> FromRow<'r, PgRow> for EventModel {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            event_id: row.try_get("event_id")?,
            consumer_id: row.try_get("consumer_id")?,
            operation_id: row.try_get("operation_id")?,
            model_type: row.try_get("model_type")?,
            event_type: row.try_get("event_type")?,
            serialized_current_model: row.try_get("serialized_current_model")?,
            serialized_previous_model: row.try_get("serialized_previous_model")?,
            event_timestamp: row.try_get("event_timestamp")?,
        })
    }
}

impl TryFrom<EventModel> for Event {
    type Error = anyhow::Error;

    fn try_from(model: EventModel) -> anyhow::Result<Self> {
        Ok(Event {
            id: model.event_id,
            operation_id: OperationId {
                id: model.operation_id,
            },
            model_type: model.model_type.parse()?,
            event_type: model.event_type.parse()?,
            serialized_current_model: model.serialized_current_model,
            serialized_previous_model: model.serialized_previous_model,
            timestamp: model.event_timestamp,
        })
    }
}
