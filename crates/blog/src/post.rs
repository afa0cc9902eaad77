use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trattoria_core::{Aggregate, AggregateId, AggregateRoot, DomainError, validate};
use trattoria_events::Event;

trattoria_core::typed_id!(PostId);

pub const AGGREGATE_TYPE: &str = "blog.post";

pub const EXCERPT_LEN: usize = 160;

/// Editable body of a post.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostContent {
    pub title: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub content: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl PostContent {
    fn normalized(&self) -> Result<Self, DomainError> {
        let title = validate::require("title", &self.title)?;
        validate::max_len("title", &title, 200)?;
        let content = validate::require("content", &self.content)?;

        let excerpt = match self.excerpt.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            Some(e) => {
                validate::max_len("excerpt", e, 500)?;
                e.to_string()
            }
            None => default_excerpt(&content),
        };

        let cover_image = self
            .cover_image
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let mut tags: Vec<String> = Vec::new();
        for tag in &self.tags {
            let tag = tag.trim().to_lowercase();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        Ok(Self {
            title,
            excerpt: Some(excerpt),
            content,
            cover_image,
            tags,
        })
    }
}

/// First [`EXCERPT_LEN`] characters of `content`, cut back to the last word
/// boundary, with an ellipsis when anything was dropped.
pub fn default_excerpt(content: &str) -> String {
    let flat: String = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_LEN {
        return flat;
    }

    let head: String = flat.chars().take(EXCERPT_LEN).collect();
    let next_is_space = flat.chars().nth(EXCERPT_LEN) == Some(' ');
    let cut = if next_is_space {
        head.as_str()
    } else {
        match head.rfind(' ') {
            Some(idx) if idx > 0 => &head[..idx],
            _ => head.as_str(),
        }
    };
    format!("{}…", cut.trim_end_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation()))
}

/// Aggregate root: BlogPost.
#[derive(Debug, Clone)]
pub struct BlogPost {
    id: PostId,
    slug: String,
    body: PostContent,
    author_id: Option<AggregateId>,
    published: bool,
    published_at: Option<DateTime<Utc>>,
    created: bool,
    deleted: bool,
    version: u64,
}

impl BlogPost {
    pub fn empty(id: PostId) -> Self {
        Self {
            id,
            slug: String::new(),
            body: PostContent::default(),
            author_id: None,
            published: false,
            published_at: None,
            created: false,
            deleted: false,
            version: 0,
        }
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn body(&self) -> &PostContent {
        &self.body
    }

    pub fn author_id(&self) -> Option<AggregateId> {
        self.author_id
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }
}

impl AggregateRoot for BlogPost {
    type Id = PostId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePost {
    pub post_id: PostId,
    pub slug: String,
    pub body: PostContent,
    pub author_id: Option<AggregateId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePost {
    pub post_id: PostId,
    pub slug: String,
    pub body: PostContent,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishPost {
    pub post_id: PostId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnpublishPost {
    pub post_id: PostId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletePost {
    pub post_id: PostId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PostCommand {
    Create(CreatePost),
    Update(UpdatePost),
    Publish(PublishPost),
    Unpublish(UnpublishPost),
    Delete(DeletePost),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCreated {
    pub post_id: PostId,
    pub slug: String,
    pub body: PostContent,
    pub author_id: Option<AggregateId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostUpdated {
    pub post_id: PostId,
    pub slug: String,
    pub body: PostContent,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPublished {
    pub post_id: PostId,
    /// First publication time; republishing keeps it.
    pub published_at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostUnpublished {
    pub post_id: PostId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDeleted {
    pub post_id: PostId,
    pub slug: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostEvent {
    Created(PostCreated),
    Updated(PostUpdated),
    Published(PostPublished),
    Unpublished(PostUnpublished),
    Deleted(PostDeleted),
}

impl Event for PostEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PostEvent::Created(_) => "blog.post.created",
            PostEvent::Updated(_) => "blog.post.updated",
            PostEvent::Published(_) => "blog.post.published",
            PostEvent::Unpublished(_) => "blog.post.unpublished",
            PostEvent::Deleted(_) => "blog.post.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PostEvent::Created(e) => e.occurred_at,
            PostEvent::Updated(e) => e.occurred_at,
            PostEvent::Published(e) => e.occurred_at,
            PostEvent::Unpublished(e) => e.occurred_at,
            PostEvent::Deleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for BlogPost {
    type Command = PostCommand;
    type Event = PostEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PostEvent::Created(e) => {
                self.id = e.post_id;
                self.slug = e.slug.clone();
                self.body = e.body.clone();
                self.author_id = e.author_id;
                self.created = true;
            }
            PostEvent::Updated(e) => {
                self.slug = e.slug.clone();
                self.body = e.body.clone();
            }
            PostEvent::Published(e) => {
                self.published = true;
                self.published_at = Some(e.published_at);
            }
            PostEvent::Unpublished(_) => self.published = false,
            PostEvent::Deleted(_) => self.deleted = true,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PostCommand::Create(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("post already exists"));
                }
                Ok(vec![PostEvent::Created(PostCreated {
                    post_id: cmd.post_id,
                    slug: validate::require("slug", &cmd.slug)?,
                    body: cmd.body.normalized()?,
                    author_id: cmd.author_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            PostCommand::Update(cmd) => {
                self.ensure_live()?;
                Ok(vec![PostEvent::Updated(PostUpdated {
                    post_id: self.id,
                    slug: validate::require("slug", &cmd.slug)?,
                    body: cmd.body.normalized()?,
                    occurred_at: cmd.occurred_at,
                })])
            }
            PostCommand::Publish(cmd) => {
                self.ensure_live()?;
                if self.published {
                    return Err(DomainError::conflict("post is already published"));
                }
                Ok(vec![PostEvent::Published(PostPublished {
                    post_id: self.id,
                    published_at: self.published_at.unwrap_or(cmd.occurred_at),
                    occurred_at: cmd.occurred_at,
                })])
            }
            PostCommand::Unpublish(cmd) => {
                self.ensure_live()?;
                if !self.published {
                    return Err(DomainError::conflict("post is not published"));
                }
                Ok(vec![PostEvent::Unpublished(PostUnpublished {
                    post_id: self.id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            PostCommand::Delete(cmd) => {
                self.ensure_live()?;
                Ok(vec![PostEvent::Deleted(PostDeleted {
                    post_id: self.id,
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
    use chrono::Duration;
    use trattoria_events::execute;

    fn body(content: &str) -> PostContent {
        PostContent {
            title: " Spring menu ".into(),
            excerpt: None,
            content: content.into(),
            cover_image: Some("".into()),
            tags: vec![" News ".into(), "news".into(), "Menu".into(), " ".into()],
        }
    }

    fn created(content: &str) -> BlogPost {
        let id = PostId::generate();
        let mut post = BlogPost::empty(id);
        execute(
            &mut post,
            &PostCommand::Create(CreatePost {
                post_id: id,
                slug: "spring-menu".into(),
                body: body(content),
                author_id: None,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        post
    }

    #[test]
    fn create_normalizes_tags_and_fills_excerpt() {
        let post = created("Fresh peas are back.");
        assert_eq!(post.body().title, "Spring menu");
        assert_eq!(post.body().tags, vec!["news".to_string(), "menu".to_string()]);
        assert_eq!(post.body().excerpt.as_deref(), Some("Fresh peas are back."));
        assert_eq!(post.body().cover_image, None);
        assert!(!post.is_published());
    }

    #[test]
    fn long_content_is_cut_at_a_word_boundary() {
        let word = "antipasto ";
        let content = word.repeat(30);
        let excerpt = default_excerpt(&content);
        assert!(excerpt.ends_with('…'));
        let without = excerpt.trim_end_matches('…');
        assert!(without.chars().count() <= EXCERPT_LEN);
        assert!(without.split(' ').all(|w| w == "antipasto"));
    }

    #[test]
    fn short_content_has_no_ellipsis() {
        assert_eq!(default_excerpt("  Ciao\n\n a tutti "), "Ciao a tutti");
    }

    #[test]
    fn first_publish_date_is_preserved() {
        let mut post = created("Body text here.");
        let first = Utc::now() - Duration::days(3);
        let id = *post.id();
        execute(&mut post, &PostCommand::Publish(PublishPost { post_id: id, occurred_at: first })).unwrap();
        execute(&mut post, &PostCommand::Unpublish(UnpublishPost { post_id: id, occurred_at: Utc::now() }))
            .unwrap();
        execute(&mut post, &PostCommand::Publish(PublishPost { post_id: id, occurred_at: Utc::now() }))
            .unwrap();
        assert!(post.is_published());
        assert_eq!(post.published_at(), Some(first));
    }

    #[test]
    fn publish_twice_is_a_conflict() {
        let mut post = created("Body text here.");
        let id = *post.id();
        execute(&mut post, &PostCommand::Publish(PublishPost { post_id: id, occurred_at: Utc::now() })).unwrap();
        let err = post
            .handle(&PostCommand::Publish(PublishPost { post_id: id, occurred_at: Utc::now() }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn deleted_post_is_gone() {
        let mut post = created("Body text here.");
        let id = *post.id();
        execute(&mut post, &PostCommand::Delete(DeletePost { post_id: id, occurred_at: Utc::now() })).unwrap();
        let err = post
            .handle(&PostCommand::Publish(PublishPost { post_id: id, occurred_at: Utc::now() }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn empty_title_is_rejected() {
        let id = PostId::generate();
        let mut b = body("x");
        b.title = "   ".into();
        let err = BlogPost::empty(id)
            .handle(&PostCommand::Create(CreatePost {
                post_id: id,
                slug: "x".into(),
                body: b,
                author_id: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
