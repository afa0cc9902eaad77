//! Uniqueness claims that the event store alone cannot enforce.
//!
//! Streams are keyed by aggregate id, so two commands creating foods with the
//! same SKU would both succeed. Handlers claim the value here first and
//! release it if the command is rejected.

use std::collections::HashMap;
use std::sync::RwLock;

use trattoria_core::{AggregateId, DomainError};

/// What a claimed value identifies. Doubles as the `field` of the
/// `Duplicate` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Sku,
    FoodSlug,
    CategorySlug,
    PostSlug,
    Email,
    TrackingCode,
}

impl Namespace {
    pub fn field(self) -> &'static str {
        match self {
            Namespace::Sku => "sku",
            Namespace::FoodSlug => "slug",
            Namespace::CategorySlug => "slug",
            Namespace::PostSlug => "slug",
            Namespace::Email => "email",
            Namespace::TrackingCode => "tracking_code",
        }
    }
}

#[derive(Debug, Default)]
pub struct UniqueIndex {
    claims: RwLock<HashMap<(Namespace, String), AggregateId>>,
}

fn key(ns: Namespace, value: &str) -> (Namespace, String) {
    (ns, value.trim().to_lowercase())
}

impl UniqueIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claims `value` for `owner`. Re-claiming by the same owner
    /// succeeds.
    pub fn claim(&self, ns: Namespace, value: &str, owner: AggregateId) -> Result<(), DomainError> {
        let mut claims = self
            .claims
            .write()
            .map_err(|_| DomainError::invariant("unique index lock poisoned"))?;
        match claims.get(&key(ns, value)) {
            Some(existing) if *existing != owner => Err(DomainError::duplicate(ns.field(), value.trim())),
            _ => {
                claims.insert(key(ns, value), owner);
                Ok(())
            }
        }
    }

    /// Releases `value` if `owner` holds it. Returns whether anything was freed.
    pub fn release(&self, ns: Namespace, value: &str, owner: AggregateId) -> bool {
        let Ok(mut claims) = self.claims.write() else {
            return false;
        };
        let k = key(ns, value);
        if claims.get(&k) == Some(&owner) {
            claims.remove(&k);
            true
        } else {
            false
        }
    }

    /// Moves `owner`'s claim from `old` to `new`. `old` is kept if `new` is taken.
    pub fn swap(&self, ns: Namespace, old: &str, new: &str, owner: AggregateId) -> Result<(), DomainError> {
        if key(ns, old) == key(ns, new) {
            return self.claim(ns, new, owner);
        }
        self.claim(ns, new, owner)?;
        self.release(ns, old, owner);
        Ok(())
    }

    pub fn owner(&self, ns: Namespace, value: &str) -> Option<AggregateId> {
        self.claims.read().ok()?.get(&key(ns, value)).copied()
    }

    pub fn is_taken(&self, ns: Namespace, value: &str) -> bool {
        self.owner(ns, value).is_some()
    }

    pub fn clear(&self) {
        if let Ok(mut claims) = self.claims.write() {
            claims.clear();
        }
    }
}
