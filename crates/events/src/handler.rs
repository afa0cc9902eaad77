/// Decide and evolve in one step, without a store or a bus.
///
/// `handle` the command, then `apply` every resulting event to the same
/// aggregate. Handy in domain tests; the dispatcher in `trattoria-infra` does
/// the persisted version of this.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: trattoria_core::Aggregate,
{
    let events = aggregate.handle(command)?;
    for ev in &events {
        aggregate.apply(ev);
    }
    Ok(events)
}
