use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::warn;

use trattoria_core::AggregateId;
use trattoria_events::{EventEnvelope, Projection};
use trattoria_reservations::{ReservationEvent, ReservationId, ReservationStatus, reservation};

use super::cursor::{ProjectionError, StreamCursors};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationView {
    pub id: ReservationId,
    pub user_id: Option<AggregateId>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub party_size: u32,
    pub reserved_for: DateTime<Utc>,
    pub notes: Option<String>,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct ReservationsProjection<S = Arc<InMemoryReadStore<ReservationId, ReservationView>>> {
    store: S,
    cursors: StreamCursors,
}

impl ReservationsProjection {
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryReadStore::new()))
    }
}

impl<S> ReservationsProjection<S>
where
    S: ReadStore<ReservationId, ReservationView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &ReservationId) -> Option<ReservationView> {
        self.store.get(id)
    }

    /// Soonest first.
    pub fn list(&self, status: Option<ReservationStatus>, user_id: Option<AggregateId>) -> Vec<ReservationView> {
        let mut found: Vec<ReservationView> = self
            .store
            .list()
            .into_iter()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .filter(|r| user_id.is_none_or(|u| r.user_id == Some(u)))
            .collect();
        found.sort_by(|a, b| a.reserved_for.cmp(&b.reserved_for));
        found
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let Some(ev) = self
            .cursors
            .decode::<ReservationEvent>(reservation::AGGREGATE_TYPE, envelope)?
        else {
            return Ok(());
        };

        match ev {
            ReservationEvent::Requested(e) => self.store.upsert(
                e.reservation_id,
                ReservationView {
                    id: e.reservation_id,
                    user_id: e.user_id,
                    name: e.name,
                    email: e.email,
                    phone: e.phone,
                    party_size: e.party_size,
                    reserved_for: e.reserved_for,
                    notes: e.notes,
                    status: ReservationStatus::Pending,
                    created_at: e.occurred_at,
                    updated_at: e.occurred_at,
                },
            ),
            ReservationEvent::StatusChanged(e) => self.set_status(&e.reservation_id, e.to, e.occurred_at),
            ReservationEvent::Cancelled(e) => {
                self.set_status(&e.reservation_id, ReservationStatus::Cancelled, e.occurred_at)
            }
        }

        self.cursors.advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    fn set_status(&self, id: &ReservationId, status: ReservationStatus, at: DateTime<Utc>) {
        if let Some(mut view) = self.store.get(id) {
            view.status = status;
            view.updated_at = at;
            self.store.upsert(*id, view);
        }
    }
}

impl<S> Projection for ReservationsProjection<S>
where
    S: ReadStore<ReservationId, ReservationView>,
{
    type Payload = JsonValue;

    fn name(&self) -> &'static str {
        "reservations.reservations"
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
