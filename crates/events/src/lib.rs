//! Domain events and the emitter contract used to publish them.

pub mod emitter;
pub mod event;
pub mod recording;

pub use emitter::{EmitError, EventEmitter};
pub use event::{DomainEvent, EventName};
pub use recording::RecordingEmitter;
