use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trattoria_core::{Aggregate, AggregateRoot, DomainError, validate};
use trattoria_events::Event;

trattoria_core::typed_id!(MessageId);

pub const AGGREGATE_TYPE: &str = "contact.message";

pub const MIN_BODY: usize = 10;
pub const MAX_BODY: usize = 5000;

#[derive(Debug, Clone)]
pub struct ContactMessage {
    id: MessageId,
    received: bool,
    read: bool,
    deleted: bool,
    version: u64,
}

impl ContactMessage {
    pub fn empty(id: MessageId) -> Self {
        Self {
            id,
            received: false,
            read: false,
            deleted: false,
            version: 0,
        }
    }

    pub fn is_read(&self) -> bool {
        self.read
    }

    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.received || self.deleted {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }
}

impl AggregateRoot for ContactMessage {
    type Id = MessageId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitMessage {
    pub message_id: MessageId,
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub body: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkMessageRead {
    pub message_id: MessageId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteMessage {
    pub message_id: MessageId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessageCommand {
    Submit(SubmitMessage),
    MarkRead(MarkMessageRead),
    Delete(DeleteMessage),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReceived {
    pub message_id: MessageId,
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub body: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRead {
    pub message_id: MessageId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDeleted {
    pub message_id: MessageId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageEvent {
    Received(MessageReceived),
    Read(MessageRead),
    Deleted(MessageDeleted),
}

impl Event for MessageEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MessageEvent::Received(_) => "contact.message.received",
            MessageEvent::Read(_) => "contact.message.read",
            MessageEvent::Deleted(_) => "contact.message.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            MessageEvent::Received(e) => e.occurred_at,
            MessageEvent::Read(e) => e.occurred_at,
            MessageEvent::Deleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ContactMessage {
    type Command = MessageCommand;
    type Event = MessageEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            MessageEvent::Received(e) => {
                self.id = e.message_id;
                self.received = true;
            }
            MessageEvent::Read(_) => self.read = true,
            MessageEvent::Deleted(_) => self.deleted = true,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            MessageCommand::Submit(cmd) => {
                if self.received {
                    return Err(DomainError::conflict("message already received"));
                }
                let name = validate::require("name", &cmd.name)?;
                validate::max_len("name", &name, 120)?;
                let email = validate::email(&cmd.email)?;
                let subject = cmd
                    .subject
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
                if let Some(s) = &subject {
                    validate::max_len("subject", s, 200)?;
                }
                let body = cmd.body.trim().to_string();
                let len = body.chars().count();
                if !(MIN_BODY..=MAX_BODY).contains(&len) {
                    return Err(DomainError::validation(format!(
                        "message must be between {MIN_BODY} and {MAX_BODY} characters"
                    )));
                }
                Ok(vec![MessageEvent::Received(MessageReceived {
                    message_id: cmd.message_id,
                    name,
                    email,
                    subject,
                    body,
                    occurred_at: cmd.occurred_at,
                })])
            }
            MessageCommand::MarkRead(cmd) => {
                self.ensure_live()?;
                if self.read {
                    return Err(DomainError::conflict("message is already read"));
                }
                Ok(vec![MessageEvent::Read(MessageRead {
                    message_id: self.id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            MessageCommand::Delete(cmd) => {
                self.ensure_live()?;
                Ok(vec![MessageEvent::Deleted(MessageDeleted {
                    message_id: self.id,
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

    fn submit(body: &str) -> SubmitMessage {
        SubmitMessage {
            message_id: MessageId::generate(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            subject: Some("  ".into()),
            body: body.into(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn body_length_is_checked() {
        let short = submit("too short");
        assert!(matches!(
            ContactMessage::empty(short.message_id).handle(&MessageCommand::Submit(short)),
            Err(DomainError::Validation(_))
        ));
        let long = submit(&"x".repeat(MAX_BODY + 1));
        assert!(ContactMessage::empty(long.message_id).handle(&MessageCommand::Submit(long)).is_err());
    }

    #[test]
    fn mark_read_once() {
        let cmd = submit("Do you cater for weddings?");
        let id = cmd.message_id;
        let mut msg = ContactMessage::empty(id);
        let events = execute(&mut msg, &MessageCommand::Submit(cmd)).unwrap();
        assert!(matches!(&events[0], MessageEvent::Received(e) if e.subject.is_none()));

        let read = MessageCommand::MarkRead(MarkMessageRead { message_id: id, occurred_at: Utc::now() });
        execute(&mut msg, &read).unwrap();
        assert!(msg.is_read());
        assert!(matches!(msg.handle(&read), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn deleted_messages_are_gone() {
        let cmd = submit("Do you cater for weddings?");
        let id = cmd.message_id;
        let mut msg = ContactMessage::empty(id);
        execute(&mut msg, &MessageCommand::Submit(cmd)).unwrap();
        execute(&mut msg, &MessageCommand::Delete(DeleteMessage { message_id: id, occurred_at: Utc::now() }))
            .unwrap();
        let read = MessageCommand::MarkRead(MarkMessageRead { message_id: id, occurred_at: Utc::now() });
        assert_eq!(msg.handle(&read).unwrap_err(), DomainError::NotFound);
    }
}
