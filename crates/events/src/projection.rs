use crate::EventEnvelope;

/// Builds a read model from an append-only stream of envelopes.
///
/// Read models are disposable: they can be cleared and rebuilt by replaying
/// the event store. Because the bus delivers at least once, `apply` must be
/// idempotent; infra projections track the last applied sequence number per
/// stream and skip anything at or below it.
///
/// Envelopes for aggregate types a projection does not care about are ignored.
pub trait Projection: Send + Sync {
    type Payload;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn apply(&self, envelope: &EventEnvelope<Self::Payload>);

    /// Drop all state (used before a full replay).
    fn reset(&self);
}
