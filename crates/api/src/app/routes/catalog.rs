use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::Utc;
use serde::Serialize;

use trattoria_auth::permissions as perm;
use trattoria_catalog::{
    Category, CategoryCommand, CategoryDetails, CategoryId, CreateCategory, CreateFood, DeleteCategory, DeleteFood,
    Food, FoodCommand, FoodId, Restock, SetAvailability, UpdateCategory, UpdateFood, category, food,
};
use trattoria_core::{Money, validate};
use trattoria_infra::Namespace;
use trattoria_infra::projections::{CategoryView, FoodQuery, FoodSort, FoodView};

use crate::app::dto::{self, Page, paginate};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::{claim_slug, parse_id, settle_claim};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn public_router() -> Router {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/:slug", get(get_category))
        .route("/foods", get(list_foods))
        .route("/foods/:slug", get(get_food))
}

pub fn admin_categories_router() -> Router {
    Router::new()
        .route("/", post(create_category))
        .route("/:id", put(update_category).delete(delete_category))
}

pub fn admin_foods_router() -> Router {
    Router::new()
        .route("/", get(admin_list_foods).post(create_food))
        .route("/:id", put(update_food).delete(delete_food))
        .route("/:id/availability", post(set_availability))
        .route("/:id/stock", post(set_stock))
}

#[derive(Debug, Serialize)]
pub struct CategorySummary {
    #[serde(flatten)]
    pub category: CategoryView,
    pub food_count: usize,
}

#[derive(Debug, Serialize)]
pub struct CategoryWithFoods {
    #[serde(flatten)]
    pub category: CategoryView,
    pub foods: Vec<FoodView>,
}

// -------------------------
// Storefront
// -------------------------

pub async fn list_categories(Extension(services): Extension<Arc<AppServices>>) -> Json<Vec<CategorySummary>> {
    let rm = &services.read_models;
    let categories = rm
        .categories
        .list()
        .into_iter()
        .map(|category| CategorySummary {
            food_count: rm.foods.count_in_category(&category.id),
            category,
        })
        .collect();
    Json(categories)
}

pub async fn get_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(slug): Path<String>,
) -> ApiResult<Json<CategoryWithFoods>> {
    let rm = &services.read_models;
    let category = rm.categories.by_slug(&slug).ok_or(ApiError::NotFound("category"))?;
    let foods = rm.foods.search(&FoodQuery {
        category_id: Some(category.id),
        ..FoodQuery::default()
    });
    Ok(Json(CategoryWithFoods { category, foods }))
}

pub async fn list_foods(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<dto::FoodListQuery>,
) -> ApiResult<Json<Page<FoodView>>> {
    search_foods(&services, q, false)
}

pub async fn get_food(
    Extension(services): Extension<Arc<AppServices>>,
    Path(slug): Path<String>,
) -> ApiResult<Json<FoodView>> {
    services
        .read_models
        .foods
        .by_slug(&slug)
        .map(Json)
        .ok_or(ApiError::NotFound("food"))
}

fn search_foods(services: &AppServices, q: dto::FoodListQuery, include_unavailable: bool) -> ApiResult<Json<Page<FoodView>>> {
    let sort = match q.sort.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => FoodSort::default(),
        Some(raw) => FoodSort::parse(raw).ok_or_else(|| {
            ApiError::validation(format!("unknown sort '{raw}' (expected name, price_asc, price_desc or newest)"))
        })?,
    };
    if let (Some(min), Some(max)) = (q.min_price, q.max_price) {
        if min > max {
            return Err(ApiError::validation("min_price cannot exceed max_price"));
        }
    }

    let category_id = match q.category.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(slug) => match services.read_models.categories.by_slug(slug) {
            Some(c) => Some(c.id),
            // Unknown category: nothing matches.
            None => return Ok(Json(paginate(Vec::new(), q.page, q.per_page))),
        },
    };

    let foods = services.read_models.foods.search(&FoodQuery {
        category_id,
        search: q.q,
        featured: q.featured,
        min_price: q.min_price.map(Money::from_cents),
        max_price: q.max_price.map(Money::from_cents),
        sort,
        include_unavailable,
    });
    Ok(Json(paginate(foods, q.page, q.per_page)))
}

// -------------------------
// Admin: categories
// -------------------------

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<CategoryDetails>,
) -> ApiResult<(StatusCode, Json<CategoryView>)> {
    authz::require(&principal, perm::CATALOG_MANAGE)?;

    let category_id = CategoryId::generate();
    let owner = category_id.aggregate_id();
    let name = validate::require("name", &body.name)?;
    let slug = claim_slug(&services.index, Namespace::CategorySlug, &name, owner, None)?;

    let cmd = CategoryCommand::Create(CreateCategory {
        category_id,
        slug: slug.clone(),
        details: body,
        occurred_at: Utc::now(),
    });
    if let Err(err) = services.dispatch(owner, category::AGGREGATE_TYPE, cmd, |id| {
        Category::empty(CategoryId::new(id))
    }) {
        services.index.release(Namespace::CategorySlug, &slug, owner);
        return Err(err);
    }

    let view = services
        .read_models
        .categories
        .get(&category_id)
        .ok_or(ApiError::NotFound("category"))?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn update_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<CategoryDetails>,
) -> ApiResult<Json<CategoryView>> {
    authz::require(&principal, perm::CATALOG_MANAGE)?;
    let category_id: CategoryId = parse_id(&id, "category")?;
    let current = services
        .read_models
        .categories
        .get(&category_id)
        .ok_or(ApiError::NotFound("category"))?;

    let owner = category_id.aggregate_id();
    let name = validate::require("name", &body.name)?;
    let slug = claim_slug(
        &services.index,
        Namespace::CategorySlug,
        &name,
        owner,
        Some((&current.name, &current.slug)),
    )?;

    let cmd = CategoryCommand::Update(UpdateCategory {
        category_id,
        slug: slug.clone(),
        details: body,
        occurred_at: Utc::now(),
    });
    let result = services.dispatch(owner, category::AGGREGATE_TYPE, cmd, |id| {
        Category::empty(CategoryId::new(id))
    });
    settle_claim(&services.index, Namespace::CategorySlug, owner, &current.slug, &slug, result.is_ok());
    result?;

    let view = services
        .read_models
        .categories
        .get(&category_id)
        .ok_or(ApiError::NotFound("category"))?;
    Ok(Json(view))
}

pub async fn delete_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    authz::require(&principal, perm::CATALOG_MANAGE)?;
    let category_id: CategoryId = parse_id(&id, "category")?;
    let current = services
        .read_models
        .categories
        .get(&category_id)
        .ok_or(ApiError::NotFound("category"))?;

    let in_use = services.read_models.foods.count_in_category(&category_id);
    if in_use > 0 {
        return Err(ApiError::InvariantViolation(format!(
            "category '{}' still has {in_use} food(s); move or delete them first",
            current.name
        )));
    }

    let cmd = CategoryCommand::Delete(DeleteCategory {
        category_id,
        occurred_at: Utc::now(),
    });
    services.dispatch(category_id.aggregate_id(), category::AGGREGATE_TYPE, cmd, |id| {
        Category::empty(CategoryId::new(id))
    })?;
    services
        .index
        .release(Namespace::CategorySlug, &current.slug, category_id.aggregate_id());
    Ok(StatusCode::NO_CONTENT)
}

// -------------------------
// Admin: foods
// -------------------------

pub async fn admin_list_foods(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(q): Query<dto::FoodListQuery>,
) -> ApiResult<Json<Page<FoodView>>> {
    authz::require(&principal, perm::CATALOG_MANAGE)?;
    search_foods(&services, q, true)
}

pub async fn create_food(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::FoodRequest>,
) -> ApiResult<(StatusCode, Json<FoodView>)> {
    authz::require(&principal, perm::CATALOG_MANAGE)?;
    ensure_category(&services, &body)?;

    let food_id = FoodId::generate();
    let owner = food_id.aggregate_id();
    let name = validate::require("name", &body.details.name)?;
    let sku = validate::require("sku", &body.sku)?.to_uppercase();

    services.index.claim(Namespace::Sku, &sku, owner)?;
    let slug = match claim_slug(&services.index, Namespace::FoodSlug, &name, owner, None) {
        Ok(slug) => slug,
        Err(err) => {
            services.index.release(Namespace::Sku, &sku, owner);
            return Err(err);
        }
    };

    let cmd = FoodCommand::Create(CreateFood {
        food_id,
        slug: slug.clone(),
        sku: sku.clone(),
        details: body.details,
        available: body.available.unwrap_or(true),
        stock: body.stock,
        occurred_at: Utc::now(),
    });
    if let Err(err) = services.dispatch(owner, food::AGGREGATE_TYPE, cmd, |id| Food::empty(FoodId::new(id))) {
        services.index.release(Namespace::Sku, &sku, owner);
        services.index.release(Namespace::FoodSlug, &slug, owner);
        return Err(err);
    }

    let view = services.read_models.foods.get(&food_id).ok_or(ApiError::NotFound("food"))?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn update_food(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::FoodRequest>,
) -> ApiResult<Json<FoodView>> {
    authz::require(&principal, perm::CATALOG_MANAGE)?;
    let food_id: FoodId = parse_id(&id, "food")?;
    let current = services.read_models.foods.get(&food_id).ok_or(ApiError::NotFound("food"))?;
    ensure_category(&services, &body)?;

    let owner = food_id.aggregate_id();
    let name = validate::require("name", &body.details.name)?;
    let sku = validate::require("sku", &body.sku)?.to_uppercase();

    services.index.claim(Namespace::Sku, &sku, owner)?;
    let slug = match claim_slug(
        &services.index,
        Namespace::FoodSlug,
        &name,
        owner,
        Some((&current.details.name, &current.slug)),
    ) {
        Ok(slug) => slug,
        Err(err) => {
            settle_claim(&services.index, Namespace::Sku, owner, &current.sku, &sku, false);
            return Err(err);
        }
    };

    let cmd = FoodCommand::Update(UpdateFood {
        food_id,
        slug: slug.clone(),
        sku: sku.clone(),
        details: body.details,
        occurred_at: Utc::now(),
    });
    let result = services.dispatch(owner, food::AGGREGATE_TYPE, cmd, |id| Food::empty(FoodId::new(id)));
    settle_claim(&services.index, Namespace::Sku, owner, &current.sku, &sku, result.is_ok());
    settle_claim(&services.index, Namespace::FoodSlug, owner, &current.slug, &slug, result.is_ok());
    result?;

    let view = services.read_models.foods.get(&food_id).ok_or(ApiError::NotFound("food"))?;
    Ok(Json(view))
}

pub async fn set_availability(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AvailabilityRequest>,
) -> ApiResult<Json<FoodView>> {
    authz::require(&principal, perm::CATALOG_MANAGE)?;
    let food_id: FoodId = parse_id(&id, "food")?;

    let cmd = FoodCommand::SetAvailability(SetAvailability {
        food_id,
        available: body.available,
        occurred_at: Utc::now(),
    });
    dispatch_food(&services, food_id, cmd)
}

pub async fn set_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::StockRequest>,
) -> ApiResult<Json<FoodView>> {
    authz::require(&principal, perm::CATALOG_MANAGE)?;
    let food_id: FoodId = parse_id(&id, "food")?;

    let cmd = FoodCommand::Restock(Restock {
        food_id,
        quantity: body.quantity,
        occurred_at: Utc::now(),
    });
    dispatch_food(&services, food_id, cmd)
}

pub async fn delete_food(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    authz::require(&principal, perm::CATALOG_MANAGE)?;
    let food_id: FoodId = parse_id(&id, "food")?;
    let current = services.read_models.foods.get(&food_id).ok_or(ApiError::NotFound("food"))?;

    let cmd = FoodCommand::Delete(DeleteFood {
        food_id,
        occurred_at: Utc::now(),
    });
    services.dispatch(food_id.aggregate_id(), food::AGGREGATE_TYPE, cmd, |id| {
        Food::empty(FoodId::new(id))
    })?;

    let owner = food_id.aggregate_id();
    services.index.release(Namespace::Sku, &current.sku, owner);
    services.index.release(Namespace::FoodSlug, &current.slug, owner);
    Ok(StatusCode::NO_CONTENT)
}

fn ensure_category(services: &AppServices, body: &dto::FoodRequest) -> ApiResult<()> {
    if services.read_models.categories.get(&body.details.category_id).is_none() {
        return Err(ApiError::validation(format!(
            "category {} does not exist",
            body.details.category_id
        )));
    }
    Ok(())
}

fn dispatch_food(services: &AppServices, food_id: FoodId, cmd: FoodCommand) -> ApiResult<Json<FoodView>> {
    services.dispatch(food_id.aggregate_id(), food::AGGREGATE_TYPE, cmd, |id| {
        Food::empty(FoodId::new(id))
    })?;
    services
        .read_models
        .foods
        .get(&food_id)
        .map(Json)
        .ok_or(ApiError::NotFound("food"))
}
