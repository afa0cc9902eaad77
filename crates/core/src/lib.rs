//! `trattoria-core`: domain building blocks shared by every bounded context.
//!
//! Pure domain code only: no IO, no HTTP, no storage.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;
pub mod slug;
pub mod validate;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::AggregateId;
pub use money::Money;
pub use slug::{slugify, unique_slug};
pub use value_object::ValueObject;
