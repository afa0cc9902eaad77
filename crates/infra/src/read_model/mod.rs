//! Disposable read model storage.
//!
//! Read models are rebuilt from the event store at startup, so they only
//! live in memory.

pub mod store;

pub use store::{InMemoryReadStore, ReadStore};
