//! Food items on the menu (event-sourced).

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trattoria_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, ValueObject, validate};
use trattoria_events::Event;

use crate::category::CategoryId;

trattoria_core::typed_id!(FoodId);

pub const AGGREGATE_TYPE: &str = "catalog.food";

/// A size or style with its own price (e.g. "Large").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    pub price: Money,
}

impl ValueObject for Variant {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionChoice {
    pub name: String,
    #[serde(default)]
    pub price_delta: Money,
}

impl ValueObject for OptionChoice {}

/// A group of add-ons (e.g. "Extra toppings", pick up to 3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionGroup {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_max_select")]
    pub max_select: u8,
    pub choices: Vec<OptionChoice>,
}

fn default_max_select() -> u8 {
    1
}

/// Editable attributes of a food item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodDetails {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category_id: CategoryId,
    pub base_price: Money,
    #[serde(default)]
    pub discount_percent: u8,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub option_groups: Vec<OptionGroup>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub featured: bool,
}

impl FoodDetails {
    /// Trim, normalize and check every field.
    pub fn normalized(&self) -> Result<Self, DomainError> {
        let name = validate::require("name", &self.name)?;
        validate::max_len("name", &name, 120)?;
        let description = self.description.trim().to_string();
        validate::max_len("description", &description, 2000)?;

        if self.discount_percent > 100 {
            return Err(DomainError::validation("discount_percent must be between 0 and 100"));
        }
        if self.variants.is_empty() && self.base_price.is_zero() {
            return Err(DomainError::validation("base_price must be greater than zero"));
        }

        let mut variant_names = HashSet::new();
        let mut variants = Vec::with_capacity(self.variants.len());
        for v in &self.variants {
            let vname = validate::require("variant name", &v.name)?;
            if !variant_names.insert(vname.to_lowercase()) {
                return Err(DomainError::validation(format!("duplicate variant '{vname}'")));
            }
            if v.price.is_zero() {
                return Err(DomainError::validation(format!("variant '{vname}' needs a price")));
            }
            variants.push(Variant { name: vname, price: v.price });
        }

        let mut group_names = HashSet::new();
        let mut option_groups = Vec::with_capacity(self.option_groups.len());
        for g in &self.option_groups {
            let gname = validate::require("option group name", &g.name)?;
            if !group_names.insert(gname.to_lowercase()) {
                return Err(DomainError::validation(format!("duplicate option group '{gname}'")));
            }
            if g.max_select == 0 {
                return Err(DomainError::validation(format!(
                    "option group '{gname}' must allow at least one choice"
                )));
            }
            if g.choices.is_empty() {
                return Err(DomainError::validation(format!("option group '{gname}' has no choices")));
            }
            let mut choice_names = HashSet::new();
            let mut choices = Vec::with_capacity(g.choices.len());
            for c in &g.choices {
                let cname = validate::require("choice name", &c.name)?;
                if !choice_names.insert(cname.to_lowercase()) {
                    return Err(DomainError::validation(format!(
                        "duplicate choice '{cname}' in group '{gname}'"
                    )));
                }
                choices.push(OptionChoice { name: cname, price_delta: c.price_delta });
            }
            option_groups.push(OptionGroup {
                name: gname,
                required: g.required,
                max_select: g.max_select,
                choices,
            });
        }

        let mut images = Vec::with_capacity(self.images.len());
        for url in &self.images {
            let url = url.trim();
            if url.is_empty() {
                continue;
            }
            validate::max_len("image url", url, 500)?;
            images.push(url.to_string());
        }

        let mut tags: Vec<String> = Vec::new();
        for t in &self.tags {
            let t = t.trim().to_lowercase();
            if !t.is_empty() && !tags.contains(&t) {
                tags.push(t);
            }
        }

        Ok(Self {
            name,
            description,
            category_id: self.category_id,
            base_price: self.base_price,
            discount_percent: self.discount_percent,
            variants,
            option_groups,
            images,
            tags,
            featured: self.featured,
        })
    }

    /// Lowest price a customer can pay (before options), discount applied.
    pub fn display_price(&self) -> Money {
        let list = self
            .variants
            .iter()
            .map(|v| v.price)
            .min()
            .unwrap_or(self.base_price);
        list.percent_off(self.discount_percent)
    }
}

/// Aggregate root: Food.
///
/// # Invariants
/// - SKU is uppercase and non-empty.
/// - Tracked stock never goes below zero; `None` means untracked.
/// - Stock reservations are remembered per order so a release can never
///   return more than was taken.
#[derive(Debug, Clone)]
pub struct Food {
    id: FoodId,
    slug: String,
    sku: String,
    details: Option<FoodDetails>,
    available: bool,
    stock: Option<u32>,
    reservations: BTreeMap<AggregateId, u32>,
    deleted: bool,
    version: u64,
}

impl Food {
    pub fn empty(id: FoodId) -> Self {
        Self {
            id,
            slug: String::new(),
            sku: String::new(),
            details: None,
            available: false,
            stock: None,
            reservations: BTreeMap::new(),
            deleted: false,
            version: 0,
        }
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn details(&self) -> Option<&FoodDetails> {
        self.details.as_ref()
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn stock(&self) -> Option<u32> {
        self.stock
    }

    pub fn reserved_for(&self, order_id: AggregateId) -> u32 {
        self.reservations.get(&order_id).copied().unwrap_or(0)
    }

    fn ensure_live(&self) -> Result<(), DomainError> {
        if self.details.is_none() || self.deleted {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }
}

impl AggregateRoot for Food {
    type Id = FoodId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// Commands

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFood {
    pub food_id: FoodId,
    pub slug: String,
    pub sku: String,
    pub details: FoodDetails,
    pub available: bool,
    pub stock: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateFood {
    pub food_id: FoodId,
    pub slug: String,
    pub sku: String,
    pub details: FoodDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAvailability {
    pub food_id: FoodId,
    pub available: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Set the tracked stock level, or stop tracking with `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restock {
    pub food_id: FoodId,
    pub quantity: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveStock {
    pub food_id: FoodId,
    pub order_id: AggregateId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseStock {
    pub food_id: FoodId,
    pub order_id: AggregateId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteFood {
    pub food_id: FoodId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FoodCommand {
    Create(CreateFood),
    Update(UpdateFood),
    SetAvailability(SetAvailability),
    Restock(Restock),
    ReserveStock(ReserveStock),
    ReleaseStock(ReleaseStock),
    Delete(DeleteFood),
}

// Events

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodCreated {
    pub food_id: FoodId,
    pub slug: String,
    pub sku: String,
    pub details: FoodDetails,
    pub available: bool,
    pub stock: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodUpdated {
    pub food_id: FoodId,
    pub slug: String,
    pub sku: String,
    pub details: FoodDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityChanged {
    pub food_id: FoodId,
    pub available: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevelSet {
    pub food_id: FoodId,
    pub stock: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReserved {
    pub food_id: FoodId,
    pub order_id: AggregateId,
    pub quantity: u32,
    /// Tracked stock after the reservation.
    pub remaining: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReleased {
    pub food_id: FoodId,
    pub order_id: AggregateId,
    pub quantity: u32,
    pub remaining: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodDeleted {
    pub food_id: FoodId,
    pub slug: String,
    pub sku: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FoodEvent {
    Created(FoodCreated),
    Updated(FoodUpdated),
    AvailabilityChanged(AvailabilityChanged),
    StockLevelSet(StockLevelSet),
    StockReserved(StockReserved),
    StockReleased(StockReleased),
    Deleted(FoodDeleted),
}

impl Event for FoodEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FoodEvent::Created(_) => "catalog.food.created",
            FoodEvent::Updated(_) => "catalog.food.updated",
            FoodEvent::AvailabilityChanged(_) => "catalog.food.availability_changed",
            FoodEvent::StockLevelSet(_) => "catalog.food.stock_level_set",
            FoodEvent::StockReserved(_) => "catalog.food.stock_reserved",
            FoodEvent::StockReleased(_) => "catalog.food.stock_released",
            FoodEvent::Deleted(_) => "catalog.food.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            FoodEvent::Created(e) => e.occurred_at,
            FoodEvent::Updated(e) => e.occurred_at,
            FoodEvent::AvailabilityChanged(e) => e.occurred_at,
            FoodEvent::StockLevelSet(e) => e.occurred_at,
            FoodEvent::StockReserved(e) => e.occurred_at,
            FoodEvent::StockReleased(e) => e.occurred_at,
            FoodEvent::Deleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Food {
    type Command = FoodCommand;
    type Event = FoodEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            FoodEvent::Created(e) => {
                self.id = e.food_id;
                self.slug = e.slug.clone();
                self.sku = e.sku.clone();
                self.details = Some(e.details.clone());
                self.available = e.available;
                self.stock = e.stock;
            }
            FoodEvent::Updated(e) => {
                self.slug = e.slug.clone();
                self.sku = e.sku.clone();
                self.details = Some(e.details.clone());
            }
            FoodEvent::AvailabilityChanged(e) => self.available = e.available,
            FoodEvent::StockLevelSet(e) => self.stock = e.stock,
            FoodEvent::StockReserved(e) => {
                self.stock = e.remaining;
                *self.reservations.entry(e.order_id).or_insert(0) += e.quantity;
            }
            FoodEvent::StockReleased(e) => {
                self.stock = e.remaining;
                if let Some(held) = self.reservations.get_mut(&e.order_id) {
                    *held = held.saturating_sub(e.quantity);
                    if *held == 0 {
                        self.reservations.remove(&e.order_id);
                    }
                }
            }
            FoodEvent::Deleted(_) => self.deleted = true,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            FoodCommand::Create(cmd) => self.handle_create(cmd),
            FoodCommand::Update(cmd) => self.handle_update(cmd),
            FoodCommand::SetAvailability(cmd) => self.handle_set_availability(cmd),
            FoodCommand::Restock(cmd) => self.handle_restock(cmd),
            FoodCommand::ReserveStock(cmd) => self.handle_reserve(cmd),
            FoodCommand::ReleaseStock(cmd) => self.handle_release(cmd),
            FoodCommand::Delete(cmd) => self.handle_delete(cmd),
        }
    }
}

fn normalize_sku(sku: &str) -> Result<String, DomainError> {
    let sku = validate::require("sku", sku)?.to_uppercase();
    validate::max_len("sku", &sku, 40)?;
    if sku.chars().any(char::is_whitespace) {
        return Err(DomainError::validation("sku cannot contain spaces"));
    }
    Ok(sku)
}

impl Food {
    fn handle_create(&self, cmd: &CreateFood) -> Result<Vec<FoodEvent>, DomainError> {
        if self.details.is_some() {
            return Err(DomainError::conflict("food already exists"));
        }
        Ok(vec![FoodEvent::Created(FoodCreated {
            food_id: cmd.food_id,
            slug: validate::require("slug", &cmd.slug)?,
            sku: normalize_sku(&cmd.sku)?,
            details: cmd.details.normalized()?,
            available: cmd.available,
            stock: cmd.stock,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateFood) -> Result<Vec<FoodEvent>, DomainError> {
        self.ensure_live()?;
        Ok(vec![FoodEvent::Updated(FoodUpdated {
            food_id: self.id,
            slug: validate::require("slug", &cmd.slug)?,
            sku: normalize_sku(&cmd.sku)?,
            details: cmd.details.normalized()?,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_availability(&self, cmd: &SetAvailability) -> Result<Vec<FoodEvent>, DomainError> {
        self.ensure_live()?;
        if self.available == cmd.available {
            return Ok(vec![]);
        }
        Ok(vec![FoodEvent::AvailabilityChanged(AvailabilityChanged {
            food_id: self.id,
            available: cmd.available,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_restock(&self, cmd: &Restock) -> Result<Vec<FoodEvent>, DomainError> {
        self.ensure_live()?;
        Ok(vec![FoodEvent::StockLevelSet(StockLevelSet {
            food_id: self.id,
            stock: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reserve(&self, cmd: &ReserveStock) -> Result<Vec<FoodEvent>, DomainError> {
        self.ensure_live()?;
        let name = self.details.as_ref().map(|d| d.name.as_str()).unwrap_or_default();
        if !self.available {
            return Err(DomainError::validation(format!("'{name}' is currently unavailable")));
        }
        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }
        let remaining = match self.stock {
            Some(level) if cmd.quantity > level => {
                return Err(DomainError::validation(format!(
                    "insufficient stock for '{name}': requested {}, available {level}",
                    cmd.quantity
                )));
            }
            Some(level) => Some(level - cmd.quantity),
            None => None,
        };
        Ok(vec![FoodEvent::StockReserved(StockReserved {
            food_id: self.id,
            order_id: cmd.order_id,
            quantity: cmd.quantity,
            remaining,
            occurred_at: cmd.occurred_at,
        })])
    }

    /// Releasing more than the order holds releases what it holds; releasing
    /// for an unknown order is a no-op.
    fn handle_release(&self, cmd: &ReleaseStock) -> Result<Vec<FoodEvent>, DomainError> {
        if self.details.is_none() {
            return Err(DomainError::NotFound);
        }
        let held = self.reserved_for(cmd.order_id);
        let quantity = cmd.quantity.min(held);
        if quantity == 0 {
            return Ok(vec![]);
        }
        Ok(vec![FoodEvent::StockReleased(StockReleased {
            food_id: self.id,
            order_id: cmd.order_id,
            quantity,
            remaining: self.stock.map(|s| s.saturating_add(quantity)),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteFood) -> Result<Vec<FoodEvent>, DomainError> {
        self.ensure_live()?;
        Ok(vec![FoodEvent::Deleted(FoodDeleted {
            food_id: self.id,
            slug: self.slug.clone(),
            sku: self.sku.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use trattoria_events::execute;

    pub(crate) fn pizza_details() -> FoodDetails {
        FoodDetails {
            name: "Margherita".into(),
            description: "Tomato, mozzarella, basil".into(),
            category_id: CategoryId::generate(),
            base_price: Money::from_cents(900),
            discount_percent: 0,
            variants: vec![
                Variant { name: "Small".into(), price: Money::from_cents(900) },
                Variant { name: "Large".into(), price: Money::from_cents(1400) },
            ],
            option_groups: vec![
                OptionGroup {
                    name: "Crust".into(),
                    required: true,
                    max_select: 1,
                    choices: vec![
                        OptionChoice { name: "Classic".into(), price_delta: Money::ZERO },
                        OptionChoice { name: "Gluten free".into(), price_delta: Money::from_cents(200) },
                    ],
                },
                OptionGroup {
                    name: "Extras".into(),
                    required: false,
                    max_select: 2,
                    choices: vec![
                        OptionChoice { name: "Olives".into(), price_delta: Money::from_cents(100) },
                        OptionChoice { name: "Anchovies".into(), price_delta: Money::from_cents(150) },
                        OptionChoice { name: "Basil".into(), price_delta: Money::from_cents(50) },
                    ],
                },
            ],
            images: vec![" https://cdn.example.com/margherita.jpg ".into(), "".into()],
            tags: vec!["Vegetarian".into(), "vegetarian".into(), " Classic ".into()],
            featured: true,
        }
    }

    fn created(stock: Option<u32>) -> Food {
        let id = FoodId::generate();
        let mut food = Food::empty(id);
        execute(
            &mut food,
            &FoodCommand::Create(CreateFood {
                food_id: id,
                slug: "margherita".into(),
                sku: "piz-001".into(),
                details: pizza_details(),
                available: true,
                stock,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        food
    }

    fn reserve(food: &mut Food, order: AggregateId, quantity: u32) -> Result<Vec<FoodEvent>, DomainError> {
        execute(
            food,
            &FoodCommand::ReserveStock(ReserveStock {
                food_id: food.id,
                order_id: order,
                quantity,
                occurred_at: Utc::now(),
            }),
        )
    }

    fn release(food: &mut Food, order: AggregateId, quantity: u32) -> Vec<FoodEvent> {
        execute(
            food,
            &FoodCommand::ReleaseStock(ReleaseStock {
                food_id: food.id,
                order_id: order,
                quantity,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap()
    }

    #[test]
    fn create_normalizes_sku_tags_and_images() {
        let food = created(None);
        let details = food.details().unwrap();
        assert_eq!(food.sku(), "PIZ-001");
        assert_eq!(details.tags, vec!["vegetarian".to_string(), "classic".to_string()]);
        assert_eq!(details.images, vec!["https://cdn.example.com/margherita.jpg".to_string()]);
    }

    #[test]
    fn duplicate_variant_names_are_rejected() {
        let mut details = pizza_details();
        details.variants.push(Variant { name: "large".into(), price: Money::from_cents(1500) });
        assert!(matches!(details.normalized(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn zero_max_select_is_rejected() {
        let mut details = pizza_details();
        details.option_groups[1].max_select = 0;
        assert!(matches!(details.normalized(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn discount_over_100_is_rejected() {
        let mut details = pizza_details();
        details.discount_percent = 101;
        assert!(details.normalized().is_err());
    }

    #[test]
    fn reserve_decrements_tracked_stock() {
        let mut food = created(Some(5));
        let order = AggregateId::new();
        reserve(&mut food, order, 3).unwrap();
        assert_eq!(food.stock(), Some(2));
        assert_eq!(food.reserved_for(order), 3);
    }

    #[test]
    fn reserve_beyond_stock_is_a_validation_error() {
        let mut food = created(Some(2));
        let err = reserve(&mut food, AggregateId::new(), 3).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("insufficient stock")));
        assert_eq!(food.stock(), Some(2));
    }

    #[test]
    fn reserve_untracked_never_runs_out() {
        let mut food = created(None);
        reserve(&mut food, AggregateId::new(), 1000).unwrap();
        assert_eq!(food.stock(), None);
    }

    #[test]
    fn reserve_on_unavailable_food_fails() {
        let mut food = created(Some(10));
        let food_id = food.id;
        execute(
            &mut food,
            &FoodCommand::SetAvailability(SetAvailability {
                food_id,
                available: false,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert!(reserve(&mut food, AggregateId::new(), 1).is_err());
    }

    #[test]
    fn release_returns_only_what_the_order_holds() {
        let mut food = created(Some(10));
        let order = AggregateId::new();
        reserve(&mut food, order, 4).unwrap();

        release(&mut food, order, 10);
        assert_eq!(food.stock(), Some(10));
        assert_eq!(food.reserved_for(order), 0);

        // Second release is a no-op.
        assert!(release(&mut food, order, 4).is_empty());
        assert_eq!(food.stock(), Some(10));
    }

    #[test]
    fn restock_none_stops_tracking() {
        let mut food = created(Some(1));
        let food_id = food.id;
        execute(
            &mut food,
            &FoodCommand::Restock(Restock { food_id, quantity: None, occurred_at: Utc::now() }),
        )
        .unwrap();
        assert_eq!(food.stock(), None);
    }

    #[test]
    fn deleted_food_rejects_reservations() {
        let mut food = created(None);
        let food_id = food.id;
        execute(&mut food, &FoodCommand::Delete(DeleteFood { food_id, occurred_at: Utc::now() }))
            .unwrap();
        assert_eq!(reserve(&mut food, AggregateId::new(), 1).unwrap_err(), DomainError::NotFound);
    }

    #[test]
    fn display_price_uses_cheapest_variant_and_discount() {
        let mut details = pizza_details();
        details.discount_percent = 10;
        assert_eq!(details.display_price(), Money::from_cents(810));
    }
}
