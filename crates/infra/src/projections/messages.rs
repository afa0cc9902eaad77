use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::warn;

use trattoria_contact::{MessageEvent, MessageId, message};
use trattoria_events::{EventEnvelope, Projection};

use super::cursor::{ProjectionError, StreamCursors};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    pub id: MessageId,
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub body: String,
    pub read: bool,
    pub received_at: DateTime<Utc>,
}

pub struct MessagesProjection<S = Arc<InMemoryReadStore<MessageId, MessageView>>> {
    store: S,
    cursors: StreamCursors,
}

impl MessagesProjection {
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryReadStore::new()))
    }
}

impl<S> MessagesProjection<S>
where
    S: ReadStore<MessageId, MessageView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &MessageId) -> Option<MessageView> {
        self.store.get(id)
    }

    /// Newest first; `unread = Some(true)` keeps unread messages only.
    pub fn list(&self, unread: Option<bool>) -> Vec<MessageView> {
        let mut found: Vec<MessageView> = self
            .store
            .list()
            .into_iter()
            .filter(|m| unread.is_none_or(|u| m.read != u))
            .collect();
        found.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        found
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let Some(ev) = self.cursors.decode::<MessageEvent>(message::AGGREGATE_TYPE, envelope)? else {
            return Ok(());
        };

        match ev {
            MessageEvent::Received(e) => self.store.upsert(
                e.message_id,
                MessageView {
                    id: e.message_id,
                    name: e.name,
                    email: e.email,
                    subject: e.subject,
                    body: e.body,
                    read: false,
                    received_at: e.occurred_at,
                },
            ),
            MessageEvent::Read(e) => {
                if let Some(mut view) = self.store.get(&e.message_id) {
                    view.read = true;
                    self.store.upsert(e.message_id, view);
                }
            }
            MessageEvent::Deleted(e) => {
                self.store.remove(&e.message_id);
            }
        }

        self.cursors.advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }
}

impl<S> Projection for MessagesProjection<S>
where
    S: ReadStore<MessageId, MessageView>,
{
    type Payload = JsonValue;

    fn name(&self) -> &'static str {
        "contact.messages"
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
