//! Infrastructure layer: event stores, dispatch, read models and the
//! orchestration that spans aggregates (checkout, replay, notifications).

pub mod checkout;
pub mod command_dispatcher;
pub mod dashboard;
pub mod event_bus;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod replay;
pub mod unique_index;
pub mod workers;

pub use checkout::{CartLine, Checkout, CheckoutRequest, PlacedOrder, Quote, quote};
pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_bus::{ProjectingEventBus, SharedProjection};
pub use projections::ReadModels;
pub use unique_index::{Namespace, UniqueIndex};
