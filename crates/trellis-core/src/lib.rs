#[macro_use]
mod macros;

mod event;
mod event_stream;

pub use event::{
    create_event, get_current_or_previous_model, Event, EventType, ModelType, OperationId,
};
pub use event_stream::EventStream;
pub use macros::ParseEnumError;
