//! Projection implementations (read model builders).
//!
//! Projections consume committed envelopes and build query-optimized views.
//! All projections are:
//! - **Rebuildable**: reconstructed from the event store on startup
//! - **Idempotent**: safe for at-least-once delivery (per-stream cursors)

pub mod cursor;

pub mod blog;
pub mod catalog;
pub mod messages;
pub mod orders;
pub mod reservations;
pub mod users;

pub use blog::{BlogProjection, PostView};
pub use catalog::{CategoriesProjection, CategoryView, FoodQuery, FoodSort, FoodView, FoodsProjection};
pub use cursor::{ProjectionError, StreamCursors};
pub use messages::{MessageView, MessagesProjection};
pub use orders::{OrderQuery, OrderView, OrdersProjection};
pub use reservations::{ReservationView, ReservationsProjection};
pub use users::{UserView, UsersProjection};

use std::sync::Arc;

use crate::event_bus::SharedProjection;

/// Every read model the application queries, shared with the bus.
#[derive(Clone)]
pub struct ReadModels {
    pub categories: Arc<CategoriesProjection>,
    pub foods: Arc<FoodsProjection>,
    pub orders: Arc<OrdersProjection>,
    pub users: Arc<UsersProjection>,
    pub posts: Arc<BlogProjection>,
    pub reservations: Arc<ReservationsProjection>,
    pub messages: Arc<MessagesProjection>,
}

impl ReadModels {
    pub fn in_memory() -> Self {
        Self {
            categories: Arc::new(CategoriesProjection::in_memory()),
            foods: Arc::new(FoodsProjection::in_memory()),
            orders: Arc::new(OrdersProjection::in_memory()),
            users: Arc::new(UsersProjection::in_memory()),
            posts: Arc::new(BlogProjection::in_memory()),
            reservations: Arc::new(ReservationsProjection::in_memory()),
            messages: Arc::new(MessagesProjection::in_memory()),
        }
    }

    /// Handles for [`crate::event_bus::ProjectingEventBus`].
    pub fn projections(&self) -> Vec<SharedProjection> {
        vec![
            self.categories.clone() as SharedProjection,
            self.foods.clone() as SharedProjection,
            self.orders.clone() as SharedProjection,
            self.users.clone() as SharedProjection,
            self.posts.clone() as SharedProjection,
            self.reservations.clone() as SharedProjection,
            self.messages.clone() as SharedProjection,
        ]
    }
}
