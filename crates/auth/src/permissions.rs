use std::borrow::Cow;

use serde::{Deserialize, Serialize};

pub const ALL: &str = "*";

pub const CATALOG_MANAGE: &str = "catalog.manage";
pub const ORDERS_MANAGE: &str = "orders.manage";
pub const USERS_MANAGE: &str = "users.manage";
pub const BLOG_MANAGE: &str = "blog.manage";
pub const RESERVATIONS_MANAGE: &str = "reservations.manage";
pub const MESSAGES_MANAGE: &str = "messages.manage";
pub const DASHBOARD_VIEW: &str = "dashboard.view";

pub const PROFILE_MANAGE: &str = "profile.manage";
pub const ORDERS_OWN: &str = "orders.own";
pub const RESERVATIONS_OWN: &str = "reservations.own";

/// Permission identifier (e.g. "catalog.manage").
///
/// `"*"` is the wildcard granted to staff.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == ALL
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
