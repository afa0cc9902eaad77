//! Catalog domain module (event-sourced).
//!
//! Menu categories, food items and the pricing of a customer's selection.
//! Pure domain logic: slug and SKU uniqueness are checked by the caller.

pub mod category;
pub mod food;
pub mod pricing;

pub use category::{
    Category, CategoryCommand, CategoryCreated, CategoryDeleted, CategoryDetails, CategoryEvent,
    CategoryId, CategoryUpdated, CreateCategory, DeleteCategory, UpdateCategory,
};
pub use food::{
    AvailabilityChanged, CreateFood, DeleteFood, Food, FoodCommand, FoodCreated, FoodDeleted,
    FoodDetails, FoodEvent, FoodId, FoodUpdated, OptionChoice, OptionGroup, ReleaseStock,
    ReserveStock, Restock, SetAvailability, StockLevelSet, StockReleased, StockReserved,
    UpdateFood, Variant,
};
pub use pricing::{PricedSelection, Selection, SelectedOption, price_selection};
