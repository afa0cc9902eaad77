//! Contact form messages (event-sourced).

pub mod message;

pub use message::{
    ContactMessage, DeleteMessage, MarkMessageRead, MessageCommand, MessageDeleted, MessageEvent,
    MessageId, MessageRead, MessageReceived, SubmitMessage,
};
