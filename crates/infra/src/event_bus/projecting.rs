use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value as JsonValue;
use tracing::{debug, trace};

use trattoria_core::AggregateId;
use trattoria_events::{EventBus, EventEnvelope, InMemoryBusError, InMemoryEventBus, Projection, Subscription};

pub type SharedProjection = Arc<dyn Projection<Payload = JsonValue>>;

type Envelope = EventEnvelope<JsonValue>;

/// Applies every registered projection synchronously on publish, then fans
/// the envelope out to subscribers.
///
/// Queries issued right after a command therefore observe its effects.
/// Subscribers (notifier, live tracking) run on their own threads and may lag.
///
/// Two dispatchers can append to the same stream and publish in the opposite
/// order. Envelopes that arrive ahead of their predecessor are held per
/// stream and released once the gap closes, so projections and subscribers
/// always see a stream in sequence order.
pub struct ProjectingEventBus {
    projections: Vec<SharedProjection>,
    inner: InMemoryEventBus<Envelope>,
    sequencer: Mutex<Sequencer>,
}

#[derive(Default)]
struct Sequencer {
    applied: HashMap<AggregateId, u64>,
    held: HashMap<AggregateId, BTreeMap<u64, Envelope>>,
}

impl Sequencer {
    /// Admit `envelope`; returns the envelopes that are now deliverable, in order.
    fn admit(&mut self, envelope: Envelope) -> Vec<Envelope> {
        let id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        let last = self.applied.get(&id).copied().unwrap_or(0);

        // Redelivery: projections skip it via their cursors.
        if seq <= last {
            return vec![envelope];
        }
        if seq > last + 1 {
            debug!(aggregate_id = %id, expected = last + 1, found = seq, "holding envelope until the stream catches up");
            self.held.entry(id).or_default().insert(seq, envelope);
            return Vec::new();
        }

        let mut ready = vec![envelope];
        let mut next = seq;
        if let Some(held) = self.held.get_mut(&id) {
            while let Some(env) = held.remove(&(next + 1)) {
                next += 1;
                ready.push(env);
            }
            if held.is_empty() {
                self.held.remove(&id);
            }
        }
        self.applied.insert(id, next);
        ready
    }

    fn held(&self) -> usize {
        self.held.values().map(BTreeMap::len).sum()
    }
}

impl ProjectingEventBus {
    pub fn new(projections: Vec<SharedProjection>) -> Self {
        Self {
            projections,
            inner: InMemoryEventBus::new(),
            sequencer: Mutex::new(Sequencer::default()),
        }
    }

    pub fn projections(&self) -> &[SharedProjection] {
        &self.projections
    }

    /// Feed an envelope to the projections only (replay path; no fan-out).
    pub fn project(&self, envelope: &Envelope) {
        let mut sequencer = self.sequencer();
        for env in sequencer.admit(envelope.clone()) {
            self.apply(&env);
        }
    }

    pub fn reset_projections(&self) {
        let mut sequencer = self.sequencer();
        *sequencer = Sequencer::default();
        for p in &self.projections {
            p.reset();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriber_count()
    }

    /// Envelopes waiting for an earlier sequence number on their stream.
    pub fn held_count(&self) -> usize {
        self.sequencer().held()
    }

    fn apply(&self, envelope: &Envelope) {
        for p in &self.projections {
            trace!(projection = p.name(), event_type = envelope.event_type(), "projecting");
            p.apply(envelope);
        }
    }

    // Projections never panic while holding the lock, but a poisoned
    // sequencer still holds consistent maps.
    fn sequencer(&self) -> MutexGuard<'_, Sequencer> {
        self.sequencer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventBus<Envelope> for ProjectingEventBus {
    type Error = InMemoryBusError;

    fn publish(&self, message: Envelope) -> Result<(), Self::Error> {
        // Held across fan-out so subscribers observe the same order.
        let mut sequencer = self.sequencer();
        for env in sequencer.admit(message) {
            self.apply(&env);
            self.inner.publish(env)?;
        }
        Ok(())
    }

    fn subscribe(&self) -> Subscription<Envelope> {
        self.inner.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    #[derive(Default)]
    struct Counting {
        applied: AtomicUsize,
    }

    impl Projection for Counting {
        type Payload = JsonValue;

        fn name(&self) -> &'static str {
            "test.counting"
        }

        fn apply(&self, _envelope: &EventEnvelope<JsonValue>) {
            self.applied.fetch_add(1, Ordering::SeqCst);
        }

        fn reset(&self) {
            self.applied.store(0, Ordering::SeqCst);
        }
    }

    /// Records the sequence numbers it saw, in order.
    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<u64>>,
    }

    impl Projection for Recording {
        type Payload = JsonValue;

        fn name(&self) -> &'static str {
            "test.recording"
        }

        fn apply(&self, envelope: &EventEnvelope<JsonValue>) {
            self.seen.lock().unwrap().push(envelope.sequence_number());
        }

        fn reset(&self) {
            self.seen.lock().unwrap().clear();
        }
    }

    fn envelope() -> EventEnvelope<JsonValue> {
        numbered(AggregateId::new(), 1)
    }

    fn numbered(aggregate_id: AggregateId, sequence_number: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            aggregate_id,
            "test.thing",
            sequence_number,
            "test.thing.happened",
            Utc::now(),
            serde_json::json!({}),
        )
    }

    #[test]
    fn projections_run_before_subscribers_see_the_envelope() {
        let counting = Arc::new(Counting::default());
        let bus = ProjectingEventBus::new(vec![counting.clone()]);
        let sub = bus.subscribe();

        bus.publish(envelope()).unwrap();

        assert_eq!(counting.applied.load(Ordering::SeqCst), 1);
        assert!(sub.try_recv().is_ok());
    }

    #[test]
    fn project_skips_fan_out() {
        let counting = Arc::new(Counting::default());
        let bus = ProjectingEventBus::new(vec![counting.clone()]);
        let sub = bus.subscribe();

        bus.project(&envelope());
        assert_eq!(counting.applied.load(Ordering::SeqCst), 1);
        assert!(sub.try_recv().is_err());

        bus.reset_projections();
        assert_eq!(counting.applied.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn out_of_order_publishes_are_held_until_the_gap_closes() {
        let recording = Arc::new(Recording::default());
        let bus = ProjectingEventBus::new(vec![recording.clone()]);
        let sub = bus.subscribe();
        let id = AggregateId::new();

        bus.publish(numbered(id, 2)).unwrap();
        assert!(recording.seen.lock().unwrap().is_empty());
        assert!(sub.try_recv().is_err());
        assert_eq!(bus.held_count(), 1);

        bus.publish(numbered(id, 1)).unwrap();
        bus.publish(numbered(id, 3)).unwrap();

        assert_eq!(*recording.seen.lock().unwrap(), vec![1, 2, 3]);
        let delivered: Vec<u64> = std::iter::from_fn(|| sub.try_recv().ok())
            .map(|env| env.sequence_number())
            .collect();
        assert_eq!(delivered, vec![1, 2, 3]);
        assert_eq!(bus.held_count(), 0);
    }

    #[test]
    fn streams_are_sequenced_independently() {
        let recording = Arc::new(Recording::default());
        let bus = ProjectingEventBus::new(vec![recording.clone()]);
        let (a, b) = (AggregateId::new(), AggregateId::new());

        bus.publish(numbered(a, 2)).unwrap();
        bus.publish(numbered(b, 1)).unwrap();

        assert_eq!(*recording.seen.lock().unwrap(), vec![1]);
        assert_eq!(bus.held_count(), 1);
    }

    #[test]
    fn replayed_streams_continue_from_their_last_sequence() {
        let recording = Arc::new(Recording::default());
        let bus = ProjectingEventBus::new(vec![recording.clone()]);
        let id = AggregateId::new();

        bus.project(&numbered(id, 1));
        bus.project(&numbered(id, 2));
        bus.publish(numbered(id, 3)).unwrap();
        assert_eq!(*recording.seen.lock().unwrap(), vec![1, 2, 3]);

        bus.reset_projections();
        bus.publish(numbered(id, 4)).unwrap();
        assert!(recording.seen.lock().unwrap().is_empty());
        assert_eq!(bus.held_count(), 1);
    }
}
