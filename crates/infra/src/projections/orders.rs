//! Order read model: admin listing, customer history and public tracking.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::warn;

use trattoria_core::AggregateId;
use trattoria_events::{EventEnvelope, Projection};
use trattoria_orders::{
    Fulfillment, OrderContact, OrderEvent, OrderId, OrderLine, OrderStatus, OrderTotals, PaymentMethod,
    StatusChange, TrackingCode, order,
};

use super::cursor::{ProjectionError, StreamCursors};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderView {
    pub id: OrderId,
    pub tracking_code: TrackingCode,
    pub customer_id: Option<AggregateId>,
    pub contact: OrderContact,
    pub fulfillment: Fulfillment,
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub status: OrderStatus,
    pub history: Vec<StatusChange>,
    pub cancel_reason: Option<String>,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin listing filters; `from` is inclusive, `to` exclusive.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub customer_id: Option<AggregateId>,
}

pub struct OrdersProjection<S = Arc<InMemoryReadStore<OrderId, OrderView>>> {
    store: S,
    cursors: StreamCursors,
}

impl OrdersProjection {
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryReadStore::new()))
    }
}

impl<S> OrdersProjection<S>
where
    S: ReadStore<OrderId, OrderView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &OrderId) -> Option<OrderView> {
        self.store.get(id)
    }

    pub fn by_tracking_code(&self, code: &TrackingCode) -> Option<OrderView> {
        self.store.list().into_iter().find(|o| &o.tracking_code == code)
    }

    /// Matching orders, newest first.
    pub fn query(&self, q: &OrderQuery) -> Vec<OrderView> {
        let mut found: Vec<OrderView> = self
            .store
            .list()
            .into_iter()
            .filter(|o| q.status.is_none_or(|s| o.status == s))
            .filter(|o| q.from.is_none_or(|from| o.placed_at >= from))
            .filter(|o| q.to.is_none_or(|to| o.placed_at < to))
            .filter(|o| q.customer_id.is_none_or(|c| o.customer_id == Some(c)))
            .collect();
        found.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        found
    }

    pub fn all(&self) -> Vec<OrderView> {
        self.store.list()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let Some(ev) = self.cursors.decode::<OrderEvent>(order::AGGREGATE_TYPE, envelope)? else {
            return Ok(());
        };

        match ev {
            OrderEvent::Placed(e) => self.store.upsert(
                e.order_id,
                OrderView {
                    id: e.order_id,
                    tracking_code: e.tracking_code,
                    customer_id: e.customer_id,
                    contact: e.contact,
                    fulfillment: e.fulfillment,
                    lines: e.lines,
                    totals: e.totals,
                    payment_method: e.payment_method,
                    notes: e.notes,
                    status: OrderStatus::Pending,
                    history: vec![StatusChange {
                        status: OrderStatus::Pending,
                        note: None,
                        at: e.occurred_at,
                    }],
                    cancel_reason: None,
                    placed_at: e.occurred_at,
                    updated_at: e.occurred_at,
                },
            ),
            OrderEvent::StatusChanged(e) => {
                if let Some(mut view) = self.store.get(&e.order_id) {
                    view.status = e.to;
                    view.history.push(StatusChange {
                        status: e.to,
                        note: e.note,
                        at: e.occurred_at,
                    });
                    view.updated_at = e.occurred_at;
                    self.store.upsert(e.order_id, view);
                }
            }
            OrderEvent::Cancelled(e) => {
                if let Some(mut view) = self.store.get(&e.order_id) {
                    view.status = OrderStatus::Cancelled;
                    view.history.push(StatusChange {
                        status: OrderStatus::Cancelled,
                        note: e.reason.clone(),
                        at: e.occurred_at,
                    });
                    view.cancel_reason = e.reason;
                    view.updated_at = e.occurred_at;
                    self.store.upsert(e.order_id, view);
                }
            }
        }

        self.cursors.advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }
}

impl<S> Projection for OrdersProjection<S>
where
    S: ReadStore<OrderId, OrderView>,
{
    type Payload = JsonValue;

    fn name(&self) -> &'static str {
        "orders.orders"
    }

    fn apply(&self, envelope: &EventEnvelope<JsonValue>) {
        if let Err(err) = self.apply_envelope(envelope) {
            warn!(projection = self.name(), error = %err, "projection apply failed");
        }
    }

    fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}
