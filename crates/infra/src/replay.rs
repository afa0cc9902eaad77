//! Startup rebuild of read models and the unique index from the event store.
//!
//! Read models live in memory, so every process start replays `load_all()`
//! in global order. Claims in the unique index are derived from the rebuilt
//! views: a deleted food or post no longer holds its slug.

use std::collections::HashSet;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use trattoria_core::AggregateId;

use crate::event_bus::ProjectingEventBus;
use crate::event_store::{EventStore, EventStoreError};
use crate::projections::{FoodQuery, ReadModels};
use crate::unique_index::{Namespace, UniqueIndex};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("event store error: {0}")]
    EventStore(#[from] EventStoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub events: usize,
    pub streams: usize,
    pub claims: usize,
}

pub fn rebuild<S: EventStore>(
    store: &S,
    bus: &ProjectingEventBus,
    read_models: &ReadModels,
    index: &UniqueIndex,
) -> Result<ReplayReport, ReplayError> {
    let started = Instant::now();
    bus.reset_projections();
    index.clear();

    let events = store.load_all()?;
    let mut streams: HashSet<AggregateId> = HashSet::new();
    for stored in &events {
        streams.insert(stored.aggregate_id);
        bus.project(&stored.to_envelope());
    }

    let claims = reindex(read_models, index);
    let report = ReplayReport {
        events: events.len(),
        streams: streams.len(),
        claims,
    };
    info!(
        events = report.events,
        streams = report.streams,
        claims = report.claims,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "read models rebuilt"
    );
    Ok(report)
}

fn reindex(read_models: &ReadModels, index: &UniqueIndex) -> usize {
    let mut claims: Vec<(Namespace, String, AggregateId)> = Vec::new();

    for c in read_models.categories.list() {
        claims.push((Namespace::CategorySlug, c.slug, c.id.aggregate_id()));
    }
    let all_foods = FoodQuery {
        include_unavailable: true,
        ..FoodQuery::default()
    };
    for f in read_models.foods.search(&all_foods) {
        claims.push((Namespace::FoodSlug, f.slug, f.id.aggregate_id()));
        claims.push((Namespace::Sku, f.sku, f.id.aggregate_id()));
    }
    for p in read_models.posts.all() {
        claims.push((Namespace::PostSlug, p.slug, p.id.aggregate_id()));
    }
    for u in read_models.users.list() {
        claims.push((Namespace::Email, u.email, u.id.aggregate_id()));
    }
    for o in read_models.orders.all() {
        claims.push((Namespace::TrackingCode, o.tracking_code.to_string(), o.id.aggregate_id()));
    }

    let mut claimed = 0;
    for (ns, value, owner) in claims {
        match index.claim(ns, &value, owner) {
            Ok(()) => claimed += 1,
            Err(err) => warn!(namespace = ?ns, value = %value, error = %err, "conflicting claim during replay"),
        }
    }
    claimed
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use trattoria_catalog::{Category, CategoryCommand, CategoryDetails, CategoryId, CreateCategory, category};
    use trattoria_core::DomainError;

    use super::*;
    use crate::command_dispatcher::CommandDispatcher;
    use crate::event_store::InMemoryEventStore;

    fn create_category(name: &str, slug: &str) -> (CategoryId, CategoryCommand) {
        let category_id = CategoryId::generate();
        let cmd = CategoryCommand::Create(CreateCategory {
            category_id,
            slug: slug.into(),
            details: CategoryDetails {
                name: name.into(),
                description: None,
                image_url: None,
                sort_order: 0,
            },
            occurred_at: Utc::now(),
        });
        (category_id, cmd)
    }

    #[test]
    fn rebuild_restores_views_and_claims_from_the_store() {
        let store = Arc::new(InMemoryEventStore::new());

        // First process: write through a bus with its own read models.
        let first = ReadModels::in_memory();
        let first_bus = Arc::new(ProjectingEventBus::new(first.projections()));
        let dispatcher = CommandDispatcher::new(store.clone(), first_bus);
        let (pizza, cmd) = create_category("Pizza", "pizza");
        dispatcher
            .dispatch(pizza.aggregate_id(), category::AGGREGATE_TYPE, cmd, |id| Category::empty(CategoryId::new(id)))
            .unwrap();

        // Second process: empty read models until rebuilt.
        let second = ReadModels::in_memory();
        let bus = ProjectingEventBus::new(second.projections());
        let index = UniqueIndex::new();
        assert!(second.categories.by_slug("pizza").is_none());

        let report = rebuild(&store, &bus, &second, &index).unwrap();

        assert_eq!(report.events, 1);
        assert_eq!(report.streams, 1);
        assert_eq!(second.categories.by_slug("pizza").unwrap().id, pizza);
        let err = index
            .claim(Namespace::CategorySlug, "pizza", AggregateId::new())
            .unwrap_err();
        assert!(matches!(err, DomainError::Duplicate { .. }));
    }

    #[test]
    fn rebuild_is_repeatable() {
        let store = InMemoryEventStore::new();
        let models = ReadModels::in_memory();
        let bus = ProjectingEventBus::new(models.projections());
        let index = UniqueIndex::new();

        let first = rebuild(&store, &bus, &models, &index).unwrap();
        let second = rebuild(&store, &bus, &models, &index).unwrap();
        assert_eq!(first, second);
    }
}
