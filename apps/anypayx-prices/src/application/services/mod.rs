//! Application Services
//!
//! - `events`: Event kinds and payloads observed by application code
//! - `event_bus`: Handler registry that fans events out in registration order

pub mod event_bus;
pub mod events;

pub use event_bus::{EventBus, EventHandler, HandlerId};
pub use events::{ClientEvent, EventKind, UnknownEventKind};
