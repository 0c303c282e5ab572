use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct OperationId {
    pub id: String,
}

impl OperationId {
    pub fn create() -> Self {
        OperationId {
            id: Uuid::new_v4().to_string(),
        }
    }

    pub fn unwrap_or_create(current_operation_id: &Option<OperationId>) -> OperationId {
        match current_operation_id {
            Some(current_operation_id) => current_operation_id.clone(),
            None => OperationId::create(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    Approval,
    Job,
    Target,
    TargetProvider,
    Trigger,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Created,
    Updated,
    Deleted,
}

string_enum!(ModelType {
    Approval => "approval",
    Job => "job",
    Target => "target",
    TargetProvider => "target_provider",
    Trigger => "trigger",
});

string_enum!(EventType {
    Created => "created",
    Updated => "updated",
    Deleted => "deleted",
});

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Event {
    pub id: String,
    pub operation_id: OperationId,
    pub model_type: ModelType,
    pub event_type: EventType,

    pub serialized_previous_model: Option<Vec<u8>>,
    pub serialized_current_model: Option<Vec<u8>>,

    pub timestamp: DateTime<Utc>,
}

fn serialize_model_option<Model: Serialize>(
    model: &Option<Model>,
) -> anyhow::Result<Option<Vec<u8>>> {
    match model {
        Some(model) => Ok(Some(serde_json::to_vec(model)?)),
        None => Ok(None),
    }
}

pub fn create_event<Model: Serialize>(
    previous_model: &Option<Model>,
    current_model: &Option<Model>,
    event_type: EventType,
    model_type: ModelType,
    operation_id: &OperationId,
) -> anyhow::Result<Event> {
    Ok(Event {
        id: Uuid::new_v4().to_string(),
        operation_id: operation_id.clone(),
        model_type,
        event_type,
        serialized_previous_model: serialize_model_option(previous_model)?,
        serialized_current_model: serialize_model_option(current_model)?,
        timestamp: Utc::now(),
    })
}

pub fn get_current_or_previous_model<Model: DeserializeOwned>(
    event: &Event,
) -> anyhow::Result<Model> {
    let serialized_model = match (
        &event.serialized_current_model,
        &event.serialized_previous_model,
    ) {
        (Some(current), _) => current,
        (None, Some(previous)) => previous,
        (None, None) => {
            return Err(anyhow::anyhow!(
                "event {} received without previous or current model",
                event.id
            ))
        }
    };

    Ok(serde_json::from_slice(serialized_model)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq, Serialize)]
    struct Widget {
        id: String,
    }

    #[test]
    fn test_create_event_prefers_current_model() -> anyhow::Result<()> {
        let previous = Widget {
            id: "before".to_owned(),
        };
        let current = Widget {
            id: "after".to_owned(),
        };

        let event = create_event(
            &Some(previous),
            &Some(current),
            EventType::Updated,
            ModelType::Target,
            &OperationId::create(),
        )?;

        let widget: Widget = get_current_or_previous_model(&event)?;
        assert_eq!(widget.id, "after");
        assert_eq!(event.operation_id.id.len(), 36);

        Ok(())
    }

    #[test]
    fn test_deleted_event_falls_back_to_previous_model() -> anyhow::Result<()> {
        let event = create_event(
            &Some(Widget {
                id: "gone".to_owned(),
            }),
            &None,
            EventType::Deleted,
            ModelType::Job,
            &OperationId::create(),
        )?;

        let widget: Widget = get_current_or_previous_model(&event)?;
        assert_eq!(widget.id, "gone");

        Ok(())
    }

    #[test]
    fn test_event_without_models_is_rejected() {
        let event = create_event::<Widget>(
            &None,
            &None,
            EventType::Created,
            ModelType::Trigger,
            &OperationId::create(),
        )
        .unwrap();

        assert!(get_current_or_previous_model::<Widget>(&event).is_err());
    }

    #[test]
    fn test_model_type_round_trips_through_text() {
        assert_eq!(
            "target_provider".parse::<ModelType>().unwrap(),
            ModelType::TargetProvider
        );
        assert_eq!(EventType::Deleted.to_string(), "deleted");
        assert!("widget".parse::<ModelType>().is_err());
    }
}
