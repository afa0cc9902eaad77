//! Event bus used by the dispatcher.
//!
//! The bus abstraction lives in `trattoria-events` as pure mechanics. This
//! module adds [`ProjectingEventBus`], which keeps read models consistent with
//! the store before anything else sees an envelope.

mod projecting;

pub use projecting::{ProjectingEventBus, SharedProjection};
