//! User directory read model with an email index for login.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::warn;

use trattoria_auth::{Role, UserEvent, UserId, user};
use trattoria_events::{EventEnvelope, Projection};

use super::cursor::{ProjectionError, StreamCursors};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub default_address: Option<String>,
    pub role: Role,
    pub blocked: bool,
    pub block_reason: Option<String>,
    /// Needed for login; never serialized.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct UsersProjection<S = Arc<InMemoryReadStore<UserId, UserView>>> {
    store: S,
    by_email: RwLock<HashMap<String, UserId>>,
    cursors: StreamCursors,
}

impl UsersProjection {
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryReadStore::new()))
    }
}

impl<S> UsersProjection<S>
where
    S: ReadStore<UserId, UserView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            by_email: RwLock::new(HashMap::new()),
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &UserId) -> Option<UserView> {
        self.store.get(id)
    }

    pub fn by_email(&self, email: &str) -> Option<UserView> {
        let key = email.trim().to_lowercase();
        let id = self.by_email.read().ok()?.get(&key).copied()?;
        self.store.get(&id)
    }

    /// All users, newest registration first.
    pub fn list(&self) -> Vec<UserView> {
        let mut all = self.store.list();
        all.sort_by(|a, b| b.registered_at.cmp(&a.registered_at));
        all
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let Some(ev) = self.cursors.decode::<UserEvent>(user::AGGREGATE_TYPE, envelope)? else {
            return Ok(());
        };

        match ev {
            UserEvent::Registered(e) => {
                if let Ok(mut idx) = self.by_email.write() {
                    idx.insert(e.email.clone(), e.user_id);
                }
                self.store.upsert(
                    e.user_id,
                    UserView {
                        id: e.user_id,
                        name: e.name,
                        email: e.email,
                        phone: e.phone,
                        default_address: None,
                        role: e.role,
                        blocked: false,
                        block_reason: None,
                        password_hash: e.password_hash,
                        registered_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            UserEvent::ProfileUpdated(e) => self.update(&e.user_id, e.occurred_at, |v| {
                v.name = e.name;
                v.phone = e.phone;
                v.default_address = e.default_address;
            }),
            UserEvent::PasswordChanged(e) => {
                self.update(&e.user_id, e.occurred_at, |v| v.password_hash = e.password_hash)
            }
            UserEvent::RoleAssigned(e) => self.update(&e.user_id, e.occurred_at, |v| v.role = e.role),
            UserEvent::Blocked(e) => self.update(&e.user_id, e.occurred_at, |v| {
                v.blocked = true;
                v.block_reason = Some(e.reason);
            }),
            UserEvent::Unblocked(e) => self.update(&e.user_id, e.occurred_at, |v| {
                v.blocked = false;
                v.block_reason = None;
            }),
        }

        self.cursors.advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    fn update(&self, id: &UserId, at: DateTime<Utc>, change: impl FnOnce(&mut UserView)) {
        if let Some(mut view) = self.store.get(id) {
            change(&mut view);
            view.updated_at = at;
            self.store.upsert(*id, view);
        }
    }
}

impl<S> Projection for UsersProjection<S>
where
    S: ReadStore<UserId, UserView>,
{
    type Payload = JsonValue;

    fn name(&self) -> &'static str {
        "auth.users"
    }

    fn apply(&self, envelope: &EventEnvelope<JsonValue>) {
        if let Err(err) = self.apply_envelope(envelope) {
            warn!(projection = self.name(), error = %err, "projection apply failed");
        }
    }

    fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
        if let Ok(mut idx) = self.by_email.write() {
            idx.clear();
        }
    }
}
