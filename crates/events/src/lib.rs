//! `trattoria-events`: event mechanics shared by the domain and infra crates.
//!
//! Nothing here knows about menus or orders: just the event trait, the stream
//! envelope, the pub/sub bus and the projection contract.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;
pub mod projection;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use projection::Projection;
