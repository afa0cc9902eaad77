use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;

use trattoria_auth::permissions as perm;
use trattoria_blog::{
    BlogPost, CreatePost, DeletePost, PostCommand, PostId, PublishPost, UnpublishPost, UpdatePost, post,
};
use trattoria_core::validate;
use trattoria_infra::Namespace;
use trattoria_infra::projections::PostView;

use crate::app::dto::{self, Page, paginate};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::routes::{claim_slug, parse_id, settle_claim};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn public_router() -> Router {
    Router::new()
        .route("/blog", get(list_posts))
        .route("/blog/:slug", get(get_post))
}

pub fn admin_router() -> Router {
    Router::new()
        .route("/", get(admin_list_posts).post(create_post))
        .route("/:id", get(admin_get_post).put(update_post).delete(delete_post))
        .route("/:id/publish", post(publish_post))
        .route("/:id/unpublish", post(unpublish_post))
}

// -------------------------
// Public
// -------------------------

pub async fn list_posts(
    Extension(services): Extension<Arc<AppServices>>,
    Query(q): Query<dto::BlogQuery>,
) -> ApiResult<Json<Page<PostView>>> {
    let posts = services.read_models.posts.published(q.tag.as_deref());
    Ok(Json(paginate(posts, q.page, q.per_page)))
}

/// Drafts are invisible to the public: same 404 as a missing slug.
pub async fn get_post(
    Extension(services): Extension<Arc<AppServices>>,
    Path(slug): Path<String>,
) -> ApiResult<Json<PostView>> {
    services
        .read_models
        .posts
        .by_slug(&slug)
        .filter(|p| p.published)
        .map(Json)
        .ok_or(ApiError::NotFound("post"))
}

// -------------------------
// Admin
// -------------------------

pub async fn admin_list_posts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(q): Query<dto::PageQuery>,
) -> ApiResult<Json<Page<PostView>>> {
    authz::require(&principal, perm::BLOG_MANAGE)?;
    Ok(Json(paginate(services.read_models.posts.all(), q.page, q.per_page)))
}

pub async fn admin_get_post(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<PostView>> {
    authz::require(&principal, perm::BLOG_MANAGE)?;
    existing_post(&services, &id).map(Json)
}

pub async fn create_post(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::PostRequest>,
) -> ApiResult<(StatusCode, Json<PostView>)> {
    authz::require(&principal, perm::BLOG_MANAGE)?;

    let post_id = PostId::generate();
    let owner = post_id.aggregate_id();
    let title = validate::require("title", &body.body.title)?;
    let slug = claim_slug(&services.index, Namespace::PostSlug, &title, owner, None)?;

    let now = Utc::now();
    let cmd = PostCommand::Create(CreatePost {
        post_id,
        slug: slug.clone(),
        body: body.body,
        author_id: Some(principal.user_id().aggregate_id()),
        occurred_at: now,
    });
    if let Err(err) = dispatch(&services, post_id, cmd) {
        services.index.release(Namespace::PostSlug, &slug, owner);
        return Err(err);
    }

    if body.publish {
        dispatch(
            &services,
            post_id,
            PostCommand::Publish(PublishPost {
                post_id,
                occurred_at: now,
            }),
        )?;
    }

    let view = services.read_models.posts.get(&post_id).ok_or(ApiError::NotFound("post"))?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn update_post(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PostRequest>,
) -> ApiResult<Json<PostView>> {
    authz::require(&principal, perm::BLOG_MANAGE)?;
    let current = existing_post(&services, &id)?;
    let owner = current.id.aggregate_id();

    let title = validate::require("title", &body.body.title)?;
    let slug = claim_slug(
        &services.index,
        Namespace::PostSlug,
        &title,
        owner,
        Some((&current.title, &current.slug)),
    )?;

    let now = Utc::now();
    let cmd = PostCommand::Update(UpdatePost {
        post_id: current.id,
        slug: slug.clone(),
        body: body.body,
        occurred_at: now,
    });
    let result = dispatch(&services, current.id, cmd);
    settle_claim(&services.index, Namespace::PostSlug, owner, &current.slug, &slug, result.is_ok());
    result?;

    if body.publish && !current.published {
        dispatch(
            &services,
            current.id,
            PostCommand::Publish(PublishPost {
                post_id: current.id,
                occurred_at: now,
            }),
        )?;
    }

    services
        .read_models
        .posts
        .get(&current.id)
        .map(Json)
        .ok_or(ApiError::NotFound("post"))
}

pub async fn publish_post(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<PostView>> {
    authz::require(&principal, perm::BLOG_MANAGE)?;
    let post_id: PostId = parse_id(&id, "post")?;

    let cmd = PostCommand::Publish(PublishPost {
        post_id,
        occurred_at: Utc::now(),
    });
    dispatch(&services, post_id, cmd)?;
    services
        .read_models
        .posts
        .get(&post_id)
        .map(Json)
        .ok_or(ApiError::NotFound("post"))
}

pub async fn unpublish_post(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<Json<PostView>> {
    authz::require(&principal, perm::BLOG_MANAGE)?;
    let post_id: PostId = parse_id(&id, "post")?;

    let cmd = PostCommand::Unpublish(UnpublishPost {
        post_id,
        occurred_at: Utc::now(),
    });
    dispatch(&services, post_id, cmd)?;
    services
        .read_models
        .posts
        .get(&post_id)
        .map(Json)
        .ok_or(ApiError::NotFound("post"))
}

pub async fn delete_post(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    authz::require(&principal, perm::BLOG_MANAGE)?;
    let current = existing_post(&services, &id)?;

    let cmd = PostCommand::Delete(DeletePost {
        post_id: current.id,
        occurred_at: Utc::now(),
    });
    dispatch(&services, current.id, cmd)?;
    services
        .index
        .release(Namespace::PostSlug, &current.slug, current.id.aggregate_id());
    Ok(StatusCode::NO_CONTENT)
}

fn existing_post(services: &AppServices, raw_id: &str) -> ApiResult<PostView> {
    let post_id: PostId = parse_id(raw_id, "post")?;
    services.read_models.posts.get(&post_id).ok_or(ApiError::NotFound("post"))
}

fn dispatch(services: &AppServices, post_id: PostId, cmd: PostCommand) -> ApiResult<()> {
    services.dispatch(post_id.aggregate_id(), post::AGGREGATE_TYPE, cmd, |id| {
        BlogPost::empty(PostId::new(id))
    })?;
    Ok(())
}
