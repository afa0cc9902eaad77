//! `trattoria-auth`: authentication and authorization boundary.
//!
//! Decoupled from HTTP and storage: the API crate extracts tokens and the
//! infra crate persists users; this crate decides who may do what.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod user;

pub use authorize::{AuthzError, authorize};
pub use claims::{JwtClaims, TokenError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtIssuer, JwtValidator};
pub use password::{PasswordError, hash_password, validate_password_strength, verify_password};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::{Role, permissions_for_role};
pub use user::{
    AssignRole, BlockUser, ChangePassword, PasswordChanged, ProfileUpdated, RegisterUser,
    RoleAssigned, UnblockUser, UpdateProfile, User, UserBlocked, UserCommand, UserEvent, UserId,
    UserRegistered, UserUnblocked,
};
