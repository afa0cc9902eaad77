//! User accounts (event-sourced).
//!
//! Email uniqueness is enforced before dispatch (unique index); the aggregate
//! only guards its own lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trattoria_core::{Aggregate, AggregateRoot, DomainError, validate};
use trattoria_events::Event;

use crate::Role;

trattoria_core::typed_id!(
    /// Identifier of a registered user.
    UserId
);

pub const AGGREGATE_TYPE: &str = "auth.user";

/// Aggregate root: User.
///
/// # Invariants
/// - Email and password hash are set at registration.
/// - A blocked user cannot be blocked again, an active user cannot be unblocked.
/// - Role is always `admin` or `customer`.
#[derive(Debug, Clone)]
pub struct User {
    id: UserId,
    name: String,
    email: String,
    phone: Option<String>,
    default_address: Option<String>,
    password_hash: String,
    role: Role,
    blocked: bool,
    block_reason: Option<String>,
    registered_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl User {
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            name: String::new(),
            email: String::new(),
            phone: None,
            default_address: None,
            password_hash: String::new(),
            role: Role::CUSTOMER,
            blocked: false,
            block_reason: None,
            registered_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }
}

impl AggregateRoot for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// Commands

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUser {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Already hashed (argon2 PHC string).
    pub password_hash: String,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub user_id: UserId,
    pub name: String,
    pub phone: Option<String>,
    pub default_address: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePassword {
    pub user_id: UserId,
    pub password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRole {
    pub user_id: UserId,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockUser {
    pub user_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnblockUser {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UserCommand {
    Register(RegisterUser),
    UpdateProfile(UpdateProfile),
    ChangePassword(ChangePassword),
    AssignRole(AssignRole),
    Block(BlockUser),
    Unblock(UnblockUser),
}

// Events

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistered {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdated {
    pub user_id: UserId,
    pub name: String,
    pub phone: Option<String>,
    pub default_address: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordChanged {
    pub user_id: UserId,
    pub password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssigned {
    pub user_id: UserId,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBlocked {
    pub user_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUnblocked {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEvent {
    Registered(UserRegistered),
    ProfileUpdated(ProfileUpdated),
    PasswordChanged(PasswordChanged),
    RoleAssigned(RoleAssigned),
    Blocked(UserBlocked),
    Unblocked(UserUnblocked),
}

impl Event for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::Registered(_) => "auth.user.registered",
            UserEvent::ProfileUpdated(_) => "auth.user.profile_updated",
            UserEvent::PasswordChanged(_) => "auth.user.password_changed",
            UserEvent::RoleAssigned(_) => "auth.user.role_assigned",
            UserEvent::Blocked(_) => "auth.user.blocked",
            UserEvent::Unblocked(_) => "auth.user.unblocked",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::Registered(e) => e.occurred_at,
            UserEvent::ProfileUpdated(e) => e.occurred_at,
            UserEvent::PasswordChanged(e) => e.occurred_at,
            UserEvent::RoleAssigned(e) => e.occurred_at,
            UserEvent::Blocked(e) => e.occurred_at,
            UserEvent::Unblocked(e) => e.occurred_at,
        }
    }
}

impl Aggregate for User {
    type Command = UserCommand;
    type Event = UserEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UserEvent::Registered(e) => {
                self.id = e.user_id;
                self.name = e.name.clone();
                self.email = e.email.clone();
                self.phone = e.phone.clone();
                self.password_hash = e.password_hash.clone();
                self.role = e.role.clone();
                self.registered_at = Some(e.occurred_at);
                self.created = true;
            }
            UserEvent::ProfileUpdated(e) => {
                self.name = e.name.clone();
                self.phone = e.phone.clone();
                self.default_address = e.default_address.clone();
            }
            UserEvent::PasswordChanged(e) => {
                self.password_hash = e.password_hash.clone();
            }
            UserEvent::RoleAssigned(e) => {
                self.role = e.role.clone();
            }
            UserEvent::Blocked(e) => {
                self.blocked = true;
                self.block_reason = Some(e.reason.clone());
            }
            UserEvent::Unblocked(_) => {
                self.blocked = false;
                self.block_reason = None;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UserCommand::Register(cmd) => self.handle_register(cmd),
            UserCommand::UpdateProfile(cmd) => self.handle_update_profile(cmd),
            UserCommand::ChangePassword(cmd) => self.handle_change_password(cmd),
            UserCommand::AssignRole(cmd) => self.handle_assign_role(cmd),
            UserCommand::Block(cmd) => self.handle_block(cmd),
            UserCommand::Unblock(cmd) => self.handle_unblock(cmd),
        }
    }
}

impl User {
    fn handle_register(&self, cmd: &RegisterUser) -> Result<Vec<UserEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("user already exists"));
        }

        let name = validate::require("name", &cmd.name)?;
        validate::max_len("name", &name, 120)?;
        let email = validate::email(&cmd.email)?;
        let phone = normalize_phone(cmd.phone.as_deref())?;
        if cmd.password_hash.trim().is_empty() {
            return Err(DomainError::validation("password hash cannot be empty"));
        }
        let role = Role::parse(cmd.role.as_str())?;

        Ok(vec![UserEvent::Registered(UserRegistered {
            user_id: cmd.user_id,
            name,
            email,
            phone,
            password_hash: cmd.password_hash.clone(),
            role,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_profile(&self, cmd: &UpdateProfile) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists()?;

        let name = validate::require("name", &cmd.name)?;
        validate::max_len("name", &name, 120)?;
        let phone = normalize_phone(cmd.phone.as_deref())?;
        let default_address = cmd
            .default_address
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        if let Some(addr) = &default_address {
            validate::max_len("default_address", addr, 500)?;
        }

        Ok(vec![UserEvent::ProfileUpdated(ProfileUpdated {
            user_id: self.id,
            name,
            phone,
            default_address,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_password(&self, cmd: &ChangePassword) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists()?;
        if cmd.password_hash.trim().is_empty() {
            return Err(DomainError::validation("password hash cannot be empty"));
        }
        Ok(vec![UserEvent::PasswordChanged(PasswordChanged {
            user_id: self.id,
            password_hash: cmd.password_hash.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign_role(&self, cmd: &AssignRole) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists()?;
        let role = Role::parse(cmd.role.as_str())?;
        if role == self.role {
            return Err(DomainError::conflict(format!("user already has role '{role}'")));
        }
        Ok(vec![UserEvent::RoleAssigned(RoleAssigned {
            user_id: self.id,
            role,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_block(&self, cmd: &BlockUser) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists()?;
        if self.blocked {
            return Err(DomainError::conflict("user is already blocked"));
        }
        let reason = cmd.reason.trim().to_string();
        validate::max_len("reason", &reason, 500)?;
        Ok(vec![UserEvent::Blocked(UserBlocked {
            user_id: self.id,
            reason,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_unblock(&self, cmd: &UnblockUser) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists()?;
        if !self.blocked {
            return Err(DomainError::conflict("user is not blocked"));
        }
        Ok(vec![UserEvent::Unblocked(UserUnblocked {
            user_id: self.id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn normalize_phone(phone: Option<&str>) -> Result<Option<String>, DomainError> {
    match phone.map(str::trim).filter(|s| !s.is_empty()) {
        Some(p) => validate::phone(p).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trattoria_events::execute;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn registered() -> User {
        let id = UserId::generate();
        let mut user = User::empty(id);
        execute(
            &mut user,
            &UserCommand::Register(RegisterUser {
                user_id: id,
                name: "Giulia Rossi".into(),
                email: "Giulia@Example.com".into(),
                phone: Some("+39 333 123 4567".into()),
                password_hash: "$argon2id$v=19$stub".into(),
                role: Role::CUSTOMER,
                occurred_at: now(),
            }),
        )
        .unwrap();
        user
    }

    #[test]
    fn register_normalizes_email_and_phone() {
        let user = registered();
        assert_eq!(user.email(), "giulia@example.com");
        assert_eq!(user.phone.as_deref(), Some("+393331234567"));
        assert_eq!(user.role(), &Role::CUSTOMER);
        assert_eq!(user.version(), 1);
    }

    #[test]
    fn register_twice_conflicts() {
        let user = registered();
        let err = user
            .handle(&UserCommand::Register(RegisterUser {
                user_id: user.id,
                name: "Again".into(),
                email: "again@example.com".into(),
                phone: None,
                password_hash: "x".into(),
                role: Role::CUSTOMER,
                occurred_at: now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn register_rejects_unknown_role() {
        let id = UserId::generate();
        let err = User::empty(id)
            .handle(&UserCommand::Register(RegisterUser {
                user_id: id,
                name: "Chef".into(),
                email: "chef@example.com".into(),
                phone: None,
                password_hash: "x".into(),
                role: Role::new("chef"),
                occurred_at: now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn block_and_unblock_cycle() {
        let mut user = registered();
        let block = UserCommand::Block(BlockUser {
            user_id: user.id,
            reason: "abusive reviews".into(),
            occurred_at: now(),
        });

        execute(&mut user, &block).unwrap();
        assert!(user.is_blocked());
        assert!(matches!(user.handle(&block), Err(DomainError::Conflict(_))));

        let user_id = user.id;
        execute(&mut user, &UserCommand::Unblock(UnblockUser { user_id, occurred_at: now() })).unwrap();
        assert!(!user.is_blocked());
        assert!(matches!(
            user.handle(&UserCommand::Unblock(UnblockUser { user_id: user.id, occurred_at: now() })),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn assign_same_role_conflicts() {
        let mut user = registered();
        let promote = UserCommand::AssignRole(AssignRole {
            user_id: user.id,
            role: Role::ADMIN,
            occurred_at: now(),
        });
        execute(&mut user, &promote).unwrap();
        assert!(user.role().is_admin());
        assert!(matches!(user.handle(&promote), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn update_profile_keeps_email() {
        let mut user = registered();
        let user_id = user.id;
        execute(
            &mut user,
            &UserCommand::UpdateProfile(UpdateProfile {
                user_id,
                name: " Giulia R. ".into(),
                phone: None,
                default_address: Some(" Via Roma 1, Milano ".into()),
                occurred_at: now(),
            }),
        )
        .unwrap();
        assert_eq!(user.name(), "Giulia R.");
        assert_eq!(user.default_address.as_deref(), Some("Via Roma 1, Milano"));
        assert_eq!(user.email(), "giulia@example.com");
    }

    #[test]
    fn commands_on_missing_user_are_not_found() {
        let user = User::empty(UserId::generate());
        let err = user
            .handle(&UserCommand::ChangePassword(ChangePassword {
                user_id: user.id,
                password_hash: "x".into(),
                occurred_at: now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }
}
