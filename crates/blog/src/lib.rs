//! Blog domain module (event-sourced).

pub mod post;

pub use post::{
    BlogPost, CreatePost, DeletePost, PostCommand, PostContent, PostCreated, PostDeleted, PostEvent,
    PostId, PostPublished, PostUnpublished, PostUpdated, PublishPost, UnpublishPost, UpdatePost,
    default_excerpt,
};
