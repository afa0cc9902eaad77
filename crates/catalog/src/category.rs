use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trattoria_core::{Aggregate, AggregateRoot, DomainError, validate};
use trattoria_events::Event;

trattoria_core::typed_id!(CategoryId);

pub const AGGREGATE_TYPE: &str = "catalog.category";

/// Editable attributes of a menu category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CategoryDetails {
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Lower sorts first on the menu.
    #[serde(default)]
    pub sort_order: i32,
}

impl CategoryDetails {
    fn normalized(&self) -> Result<Self, DomainError> {
        let name = validate::require("name", &self.name)?;
        validate::max_len("name", &name, 80)?;
        let description = trimmed(self.description.as_deref());
        if let Some(d) = &description {
            validate::max_len("description", d, 1000)?;
        }
        let image_url = trimmed(self.image_url.as_deref());
        if let Some(url) = &image_url {
            validate::max_len("image_url", url, 500)?;
        }
        Ok(Self {
            name,
            description,
            image_url,
            sort_order: self.sort_order,
        })
    }
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

#[derive(Debug, Clone)]
pub struct Category {
    id: CategoryId,
    slug: String,
    details: CategoryDetails,
    deleted: bool,
    version: u64,
    created: bool,
}

impl Category {
    pub fn empty(id: CategoryId) -> Self {
        Self {
            id,
            slug: String::new(),
            details: CategoryDetails::default(),
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn details(&self) -> &CategoryDetails {
        &self.details
    }

    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }
}

impl AggregateRoot for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCategory {
    pub category_id: CategoryId,
    pub slug: String,
    pub details: CategoryDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCategory {
    pub category_id: CategoryId,
    pub slug: String,
    pub details: CategoryDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteCategory {
    pub category_id: CategoryId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CategoryCommand {
    Create(CreateCategory),
    Update(UpdateCategory),
    Delete(DeleteCategory),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCreated {
    pub category_id: CategoryId,
    pub slug: String,
    pub details: CategoryDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUpdated {
    pub category_id: CategoryId,
    pub slug: String,
    pub details: CategoryDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDeleted {
    pub category_id: CategoryId,
    pub slug: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryEvent {
    Created(CategoryCreated),
    Updated(CategoryUpdated),
    Deleted(CategoryDeleted),
}

impl Event for CategoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CategoryEvent::Created(_) => "catalog.category.created",
            CategoryEvent::Updated(_) => "catalog.category.updated",
            CategoryEvent::Deleted(_) => "catalog.category.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CategoryEvent::Created(e) => e.occurred_at,
            CategoryEvent::Updated(e) => e.occurred_at,
            CategoryEvent::Deleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Category {
    type Command = CategoryCommand;
    type Event = CategoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CategoryEvent::Created(e) => {
                self.id = e.category_id;
                self.slug = e.slug.clone();
                self.details = e.details.clone();
                self.created = true;
            }
            CategoryEvent::Updated(e) => {
                self.slug = e.slug.clone();
                self.details = e.details.clone();
            }
            CategoryEvent::Deleted(_) => {
                self.deleted = true;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CategoryCommand::Create(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("category already exists"));
                }
                let slug = validate::require("slug", &cmd.slug)?;
                Ok(vec![CategoryEvent::Created(CategoryCreated {
                    category_id: cmd.category_id,
                    slug,
                    details: cmd.details.normalized()?,
                    occurred_at: cmd.occurred_at,
                })])
            }
            CategoryCommand::Update(cmd) => {
                self.ensure_live()?;
                let slug = validate::require("slug", &cmd.slug)?;
                Ok(vec![CategoryEvent::Updated(CategoryUpdated {
                    category_id: self.id,
                    slug,
                    details: cmd.details.normalized()?,
                    occurred_at: cmd.occurred_at,
                })])
            }
            CategoryCommand::Delete(cmd) => {
                self.ensure_live()?;
                Ok(vec![CategoryEvent::Deleted(CategoryDeleted {
                    category_id: self.id,
                    slug: self.slug.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trattoria_events::execute;

    fn details(name: &str) -> CategoryDetails {
        CategoryDetails {
            name: name.to_string(),
            description: Some("  ".into()),
            image_url: None,
            sort_order: 2,
        }
    }

    fn created() -> Category {
        let id = CategoryId::generate();
        let mut cat = Category::empty(id);
        execute(
            &mut cat,
            &CategoryCommand::Create(CreateCategory {
                category_id: id,
                slug: "pizza".into(),
                details: details(" Pizza "),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        cat
    }

    #[test]
    fn create_trims_fields() {
        let cat = created();
        assert_eq!(cat.details().name, "Pizza");
        assert_eq!(cat.details().description, None);
        assert_eq!(cat.slug(), "pizza");
    }

    #[test]
    fn create_rejects_blank_name() {
        let id = CategoryId::generate();
        let err = Category::empty(id)
            .handle(&CategoryCommand::Create(CreateCategory {
                category_id: id,
                slug: "x".into(),
                details: details("  "),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn deleted_category_is_gone() {
        let mut cat = created();
        let category_id = cat.id;
        execute(
            &mut cat,
            &CategoryCommand::Delete(DeleteCategory { category_id, occurred_at: Utc::now() }),
        )
        .unwrap();

        let err = cat
            .handle(&CategoryCommand::Update(UpdateCategory {
                category_id: cat.id,
                slug: "pizza".into(),
                details: details("Pizza"),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }
}
