//! Orders domain module (event-sourced).
//!
//! Checkout prices lines against the catalog before an order is placed; from
//! then on the order owns its lines, totals and status timeline.

pub mod order;
pub mod status;
pub mod totals;
pub mod tracking;

pub use order::{
    CancelOrder, ChangeOrderStatus, Order, OrderCancelled, OrderCommand, OrderContact, OrderEvent,
    OrderId, OrderLine, OrderPlaced, OrderStatusChanged, PaymentMethod, PlaceOrder, StatusChange,
};
pub use status::OrderStatus;
pub use totals::{DeliveryPolicy, Fulfillment, OrderTotals, compute_totals};
pub use tracking::TrackingCode;
