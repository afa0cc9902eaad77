use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::warn;

use trattoria_blog::{PostEvent, PostId, post};
use trattoria_core::AggregateId;
use trattoria_events::{EventEnvelope, Projection};

use super::cursor::{ProjectionError, StreamCursors};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostView {
    pub id: PostId,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub cover_image: Option<String>,
    pub tags: Vec<String>,
    pub author_id: Option<AggregateId>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct BlogProjection<S = Arc<InMemoryReadStore<PostId, PostView>>> {
    store: S,
    cursors: StreamCursors,
}

impl BlogProjection {
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryReadStore::new()))
    }
}

impl<S> BlogProjection<S>
where
    S: ReadStore<PostId, PostView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &PostId) -> Option<PostView> {
        self.store.get(id)
    }

    pub fn by_slug(&self, slug: &str) -> Option<PostView> {
        self.store.list().into_iter().find(|p| p.slug == slug)
    }

    /// Published posts, newest publication first, optionally by tag.
    pub fn published(&self, tag: Option<&str>) -> Vec<PostView> {
        let tag = tag.map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty());
        let mut posts: Vec<PostView> = self
            .store
            .list()
            .into_iter()
            .filter(|p| p.published)
            .filter(|p| tag.as_ref().is_none_or(|t| p.tags.contains(t)))
            .collect();
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        posts
    }

    /// Every post including drafts, most recently edited first.
    pub fn all(&self) -> Vec<PostView> {
        let mut posts = self.store.list();
        posts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        posts
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let Some(ev) = self.cursors.decode::<PostEvent>(post::AGGREGATE_TYPE, envelope)? else {
            return Ok(());
        };

        match ev {
            PostEvent::Created(e) => self.store.upsert(
                e.post_id,
                PostView {
                    id: e.post_id,
                    slug: e.slug,
                    title: e.body.title,
                    excerpt: e.body.excerpt.unwrap_or_default(),
                    content: e.body.content,
                    cover_image: e.body.cover_image,
                    tags: e.body.tags,
                    author_id: e.author_id,
                    published: false,
                    published_at: None,
                    created_at: e.occurred_at,
                    updated_at: e.occurred_at,
                },
            ),
            PostEvent::Updated(e) => self.update(&e.post_id, e.occurred_at, |v| {
                v.slug = e.slug;
                v.title = e.body.title;
                v.excerpt = e.body.excerpt.unwrap_or_default();
                v.content = e.body.content;
                v.cover_image = e.body.cover_image;
                v.tags = e.body.tags;
            }),
            PostEvent::Published(e) => self.update(&e.post_id, e.occurred_at, |v| {
                v.published = true;
                v.published_at = Some(e.published_at);
            }),
            PostEvent::Unpublished(e) => self.update(&e.post_id, e.occurred_at, |v| v.published = false),
            PostEvent::Deleted(e) => {
                self.store.remove(&e.post_id);
            }
        }

        self.cursors.advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    fn update(&self, id: &PostId, at: DateTime<Utc>, change: impl FnOnce(&mut PostView)) {
        if let Some(mut view) = self.store.get(id) {
            change(&mut view);
            view.updated_at = at;
            self.store.upsert(*id, view);
        }
    }
}

impl<S> Projection for BlogProjection<S>
where
    S: ReadStore<PostId, PostView>,
{
    type Payload = JsonValue;

    fn name(&self) -> &'static str {
        "blog.posts"
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
