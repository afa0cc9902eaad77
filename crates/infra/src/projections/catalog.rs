//! Menu read models: categories and foods.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::warn;

use trattoria_catalog::{CategoryEvent, CategoryId, FoodDetails, FoodEvent, FoodId, category, food};
use trattoria_core::Money;
use trattoria_events::{EventEnvelope, Projection};

use super::cursor::{ProjectionError, StreamCursors};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryView {
    pub id: CategoryId,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct CategoriesProjection<S = Arc<InMemoryReadStore<CategoryId, CategoryView>>> {
    store: S,
    cursors: StreamCursors,
}

impl CategoriesProjection {
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryReadStore::new()))
    }
}

impl<S> CategoriesProjection<S>
where
    S: ReadStore<CategoryId, CategoryView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &CategoryId) -> Option<CategoryView> {
        self.store.get(id)
    }

    pub fn by_slug(&self, slug: &str) -> Option<CategoryView> {
        self.store.list().into_iter().find(|c| c.slug == slug)
    }

    /// Menu order: `sort_order`, then name.
    pub fn list(&self) -> Vec<CategoryView> {
        let mut all = self.store.list();
        all.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
        all
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let Some(ev) = self.cursors.decode::<CategoryEvent>(category::AGGREGATE_TYPE, envelope)? else {
            return Ok(());
        };

        match ev {
            CategoryEvent::Created(e) => self.store.upsert(
                e.category_id,
                CategoryView {
                    id: e.category_id,
                    slug: e.slug,
                    name: e.details.name,
                    description: e.details.description,
                    image_url: e.details.image_url,
                    sort_order: e.details.sort_order,
                    created_at: e.occurred_at,
                    updated_at: e.occurred_at,
                },
            ),
            CategoryEvent::Updated(e) => {
                if let Some(mut view) = self.store.get(&e.category_id) {
                    view.slug = e.slug;
                    view.name = e.details.name;
                    view.description = e.details.description;
                    view.image_url = e.details.image_url;
                    view.sort_order = e.details.sort_order;
                    view.updated_at = e.occurred_at;
                    self.store.upsert(e.category_id, view);
                }
            }
            CategoryEvent::Deleted(e) => {
                self.store.remove(&e.category_id);
            }
        }

        self.cursors.advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }
}

impl<S> Projection for CategoriesProjection<S>
where
    S: ReadStore<CategoryId, CategoryView>,
{
    type Payload = JsonValue;

    fn name(&self) -> &'static str {
        "catalog.categories"
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

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoodView {
    pub id: FoodId,
    pub slug: String,
    pub sku: String,
    #[serde(flatten)]
    pub details: FoodDetails,
    /// Cheapest variant (or base price) with the discount applied.
    pub price: Money,
    pub available: bool,
    /// `None` when stock is not tracked.
    pub stock: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FoodView {
    /// Orderable right now: available and not sold out.
    pub fn orderable(&self) -> bool {
        self.available && self.stock != Some(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FoodSort {
    #[default]
    Name,
    PriceAsc,
    PriceDesc,
    Newest,
}

impl FoodSort {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "name" => Some(FoodSort::Name),
            "price_asc" | "price" => Some(FoodSort::PriceAsc),
            "price_desc" => Some(FoodSort::PriceDesc),
            "newest" => Some(FoodSort::Newest),
            _ => None,
        }
    }
}

/// Storefront filters. Unavailable foods are hidden unless
/// `include_unavailable` is set (admin listing).
#[derive(Debug, Clone, Default)]
pub struct FoodQuery {
    pub category_id: Option<CategoryId>,
    pub search: Option<String>,
    pub featured: Option<bool>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub sort: FoodSort,
    pub include_unavailable: bool,
}

pub struct FoodsProjection<S = Arc<InMemoryReadStore<FoodId, FoodView>>> {
    store: S,
    cursors: StreamCursors,
}

impl FoodsProjection {
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryReadStore::new()))
    }
}

impl<S> FoodsProjection<S>
where
    S: ReadStore<FoodId, FoodView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &FoodId) -> Option<FoodView> {
        self.store.get(id)
    }

    pub fn by_slug(&self, slug: &str) -> Option<FoodView> {
        self.store.list().into_iter().find(|f| f.slug == slug)
    }

    pub fn count_in_category(&self, category_id: &CategoryId) -> usize {
        self.store
            .list()
            .iter()
            .filter(|f| &f.details.category_id == category_id)
            .count()
    }

    pub fn search(&self, query: &FoodQuery) -> Vec<FoodView> {
        let needle = query
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut found: Vec<FoodView> = self
            .store
            .list()
            .into_iter()
            .filter(|f| query.include_unavailable || f.available)
            .filter(|f| query.category_id.is_none_or(|c| f.details.category_id == c))
            .filter(|f| query.featured.is_none_or(|want| f.details.featured == want))
            .filter(|f| query.min_price.is_none_or(|min| f.price >= min))
            .filter(|f| query.max_price.is_none_or(|max| f.price <= max))
            .filter(|f| match &needle {
                None => true,
                Some(n) => {
                    f.details.name.to_lowercase().contains(n)
                        || f.details.description.to_lowercase().contains(n)
                        || f.details.tags.iter().any(|t| t.contains(n))
                }
            })
            .collect();

        match query.sort {
            FoodSort::Name => found.sort_by(|a, b| a.details.name.cmp(&b.details.name)),
            FoodSort::PriceAsc => found.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.details.name.cmp(&b.details.name))),
            FoodSort::PriceDesc => found.sort_by(|a, b| b.price.cmp(&a.price).then_with(|| a.details.name.cmp(&b.details.name))),
            FoodSort::Newest => found.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
        found
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let Some(ev) = self.cursors.decode::<FoodEvent>(food::AGGREGATE_TYPE, envelope)? else {
            return Ok(());
        };

        match ev {
            FoodEvent::Created(e) => self.store.upsert(
                e.food_id,
                FoodView {
                    id: e.food_id,
                    slug: e.slug,
                    sku: e.sku,
                    price: e.details.display_price(),
                    details: e.details,
                    available: e.available,
                    stock: e.stock,
                    created_at: e.occurred_at,
                    updated_at: e.occurred_at,
                },
            ),
            FoodEvent::Updated(e) => self.update(&e.food_id, e.occurred_at, |v| {
                v.slug = e.slug;
                v.sku = e.sku;
                v.price = e.details.display_price();
                v.details = e.details;
            }),
            FoodEvent::AvailabilityChanged(e) => self.update(&e.food_id, e.occurred_at, |v| v.available = e.available),
            FoodEvent::StockLevelSet(e) => self.update(&e.food_id, e.occurred_at, |v| v.stock = e.stock),
            FoodEvent::StockReserved(e) => self.update(&e.food_id, e.occurred_at, |v| v.stock = e.remaining),
            FoodEvent::StockReleased(e) => self.update(&e.food_id, e.occurred_at, |v| v.stock = e.remaining),
            FoodEvent::Deleted(e) => {
                self.store.remove(&e.food_id);
            }
        }

        self.cursors.advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    fn update(&self, id: &FoodId, at: DateTime<Utc>, change: impl FnOnce(&mut FoodView)) {
        if let Some(mut view) = self.store.get(id) {
            change(&mut view);
            view.updated_at = at;
            self.store.upsert(*id, view);
        }
    }
}

impl<S> Projection for FoodsProjection<S>
where
    S: ReadStore<FoodId, FoodView>,
{
    type Payload = JsonValue;

    fn name(&self) -> &'static str {
        "catalog.foods"
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
