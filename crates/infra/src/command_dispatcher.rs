//! Command execution pipeline.
//!
//! ```text
//! Command
//!   -> 1. load the aggregate's stream
//!   -> 2. rehydrate (apply history)
//!   -> 3. handle (pure decision, produces events)
//!   -> 4. append with ExpectedVersion::Exact(loaded version)
//!   -> 5. publish committed envelopes
//! ```
//!
//! Nothing is published unless the append succeeded. If publishing fails the
//! events are already durable and the error is returned (at-least-once).

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use trattoria_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use trattoria_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Stale aggregate version, or a command the current state cannot repeat.
    #[error("conflict: {0}")]
    Concurrency(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{field} '{value}' is already in use")]
    Duplicate { field: String, value: String },
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    /// Stored payloads no longer decode into the aggregate's event type.
    #[error("failed to decode stored event: {0}")]
    Deserialize(String),
    #[error(transparent)]
    Store(EventStoreError),
    /// Publication failed after a successful append.
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::Duplicate { field, value } => DispatchError::Duplicate { field, value },
            DomainError::Unauthorized => DispatchError::Unauthorized,
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Runs commands against event-sourced aggregates.
///
/// Generic over the store and the bus so tests can use the in-memory pair and
/// production can swap in Postgres without touching handlers.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch `command` to the aggregate stored under `aggregate_id`.
    ///
    /// `make_aggregate` builds the empty aggregate that history is applied
    /// to (e.g. `Food::empty`). Returns the committed events; an aggregate
    /// that decides nothing returns an empty vec and appends nothing.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: trattoria_events::Event + Serialize + DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(aggregate_id, aggregate_type.clone(), Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;
        debug!(
            aggregate_type = %aggregate_type,
            aggregate_id = %aggregate_id,
            events = committed.len(),
            "command committed"
        );

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }

    /// Rebuild an aggregate from its stream without running a command.
    pub fn load<A>(&self, aggregate_id: AggregateId, make_aggregate: impl FnOnce(AggregateId) -> A) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok(aggregate)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(aggregate_id: AggregateId, stream: &[StoredEvent]) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event =
            serde_json::from_value(stored.payload.clone()).map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use trattoria_contact::{ContactMessage, MarkMessageRead, MessageCommand, MessageId, SubmitMessage};
    use trattoria_events::InMemoryEventBus;

    use crate::event_store::InMemoryEventStore;

    type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

    fn dispatcher() -> Dispatcher {
        CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), Arc::new(InMemoryEventBus::new()))
    }

    fn submit(id: MessageId) -> MessageCommand {
        MessageCommand::Submit(SubmitMessage {
            message_id: id,
            name: "Ada".into(),
            email: "ada@example.com".into(),
            subject: None,
            body: "Is the terrace open in winter?".into(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn commits_then_publishes() {
        let d = dispatcher();
        let sub = d.bus().subscribe();
        let id = MessageId::generate();

        let committed = d
            .dispatch(id.0, "contact.message", submit(id), |aid| ContactMessage::empty(MessageId(aid)))
            .unwrap();

        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].sequence_number, 1);
        let env = sub.try_recv().unwrap();
        assert_eq!(env.event_type(), "contact.message.received");
        assert_eq!(env.sequence_number(), 1);
    }

    #[test]
    fn history_is_replayed_before_handling() {
        let d = dispatcher();
        let id = MessageId::generate();
        d.dispatch(id.0, "contact.message", submit(id), |aid| ContactMessage::empty(MessageId(aid)))
            .unwrap();
        let read = MessageCommand::MarkRead(MarkMessageRead { message_id: id, occurred_at: Utc::now() });
        d.dispatch(id.0, "contact.message", read.clone(), |aid| ContactMessage::empty(MessageId(aid)))
            .unwrap();

        let err = d
            .dispatch(id.0, "contact.message", read, |aid| ContactMessage::empty(MessageId(aid)))
            .unwrap_err();
        assert!(matches!(err, DispatchError::Concurrency(_)));

        let msg = d.load(id.0, |aid| ContactMessage::empty(MessageId(aid))).unwrap();
        assert!(msg.is_read());
    }

    #[test]
    fn domain_errors_append_nothing() {
        let d = dispatcher();
        let id = MessageId::generate();
        let read = MessageCommand::MarkRead(MarkMessageRead { message_id: id, occurred_at: Utc::now() });
        let err = d
            .dispatch(id.0, "contact.message", read, |aid| ContactMessage::empty(MessageId(aid)))
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound));
        assert!(d.store().load_stream(id.0).unwrap().is_empty());
    }
}
