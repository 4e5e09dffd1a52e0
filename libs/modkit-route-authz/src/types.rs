use std::collections::HashMap;
use std::collections::hash_map;
use std::sync::Arc;

use arc_swap::ArcSwap;
use http::Method;
use serde::{Deserialize, Serialize};

/// Permission record for a single policy key.
///
/// `accepted` holds the expanded permissions of the action followed by those
/// of its controller, deduplicated in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthPermissions {
    pub auth_not_required: bool,
    pub accepted: Vec<String>,
}

impl AuthPermissions {
    /// A record that lets every request through without consulting the resolver.
    #[must_use]
    pub fn public() -> Self {
        Self {
            auth_not_required: true,
            accepted: Vec::new(),
        }
    }

    /// A record that requires one of `accepted`.
    #[must_use]
    pub fn accepting<I, P>(accepted: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            auth_not_required: false,
            accepted: accepted.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn with_auth_not_required(mut self, auth_not_required: bool) -> Self {
        self.auth_not_required = auth_not_required;
        self
    }

    /// True only for a no-auth record that declares no permissions.
    ///
    /// A no-auth record with declared permissions still enforces them.
    #[must_use]
    pub fn is_free_pass(&self) -> bool {
        self.auth_not_required && self.accepted.is_empty()
    }

    /// True when `accepted` is non-empty and shares a permission with `held`.
    #[must_use]
    pub fn is_satisfied_by<S: AsRef<str>>(&self, held: &[S]) -> bool {
        !self.accepted.is_empty()
            && held
                .iter()
                .any(|perm| self.accepted.iter().any(|a| a == perm.as_ref()))
    }
}

/// Policy key for a verb-constrained route: `"<VERB>:<template>"`.
#[must_use]
pub fn verb_key(method: &Method, template: &str) -> String {
    format!("{}:{template}", method.as_str())
}

/// Mapping from policy key to permission record.
///
/// Keys are either a bare route template or a `"<VERB>:<template>"` key.
/// Inserts never overwrite: the first record stored for a key wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyTable {
    entries: HashMap<String, AuthPermissions>,
}

impl PolicyTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `permissions` under `key` unless the key is already present.
    ///
    /// Returns `false` when the key was taken and the record was dropped.
    pub fn insert(&mut self, key: impl Into<String>, permissions: AuthPermissions) -> bool {
        match self.entries.entry(key.into()) {
            hash_map::Entry::Occupied(_) => false,
            hash_map::Entry::Vacant(slot) => {
                slot.insert(permissions);
                true
            }
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AuthPermissions> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Look up the record for a request: the verb-qualified key first, then the
    /// bare template.
    #[must_use]
    pub fn lookup(&self, method: &Method, template: &str) -> Option<&AuthPermissions> {
        self.get(&verb_key(method, template))
            .or_else(|| self.get(template))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn iter(&self) -> hash_map::Iter<'_, String, AuthPermissions> {
        self.entries.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, AuthPermissions)> for PolicyTable {
    fn from_iter<T: IntoIterator<Item = (K, AuthPermissions)>>(iter: T) -> Self {
        let mut table = Self::new();
        for (key, permissions) in iter {
            table.insert(key, permissions);
        }
        table
    }
}

impl<'a> IntoIterator for &'a PolicyTable {
    type Item = (&'a String, &'a AuthPermissions);
    type IntoIter = hash_map::Iter<'a, String, AuthPermissions>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Shared, atomically replaceable reference to the current policy table.
///
/// Readers take a snapshot with [`PolicyTableHandle::load`] and keep it for
/// the whole evaluation; a rebuild publishes a new table with
/// [`PolicyTableHandle::replace`] without touching the old one.
#[derive(Debug, Clone)]
pub struct PolicyTableHandle {
    current: Arc<ArcSwap<PolicyTable>>,
}

impl PolicyTableHandle {
    #[must_use]
    pub fn new(table: PolicyTable) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(table)),
        }
    }

    #[must_use]
    pub fn load(&self) -> Arc<PolicyTable> {
        self.current.load_full()
    }

    /// Publish `table` and return the one it replaced.
    #[must_use]
    pub fn replace(&self, table: PolicyTable) -> Arc<PolicyTable> {
        self.current.swap(Arc::new(table))
    }
}

impl From<PolicyTable> for PolicyTableHandle {
    fn from(table: PolicyTable) -> Self {
        Self::new(table)
    }
}
