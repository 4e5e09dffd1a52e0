use serde::{Deserialize, Serialize};

/// Separator between a parent permission and its child, e.g. `metrics:read`.
pub const HIERARCHY_SEPARATOR: char = ':';

/// Expand a permission declaration into every permission that satisfies it.
///
/// `"metrics:read"` expands to `["metrics", "metrics:read"]`: a caller holding
/// either the coarse parent or the exact permission is accepted. Declarations
/// without a separator, or with an empty parent (`":read"`), expand to
/// themselves.
#[must_use]
pub fn expand(declaration: &str) -> Vec<String> {
    match declaration.split_once(HIERARCHY_SEPARATOR) {
        Some((parent, _)) if !parent.is_empty() => {
            vec![parent.to_owned(), declaration.to_owned()]
        }
        _ => vec![declaration.to_owned()],
    }
}

/// A permission declared on an action or on its controller.
///
/// A request is allowed if the caller holds the declared permission or, for
/// `parent:child` declarations, the parent permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequiresAuth {
    allowed_if_has: String,
}

impl RequiresAuth {
    #[must_use]
    pub fn new(allowed_if_has: impl Into<String>) -> Self {
        Self {
            allowed_if_has: allowed_if_has.into(),
        }
    }

    #[must_use]
    pub fn allowed_if_has(&self) -> &str {
        &self.allowed_if_has
    }

    #[must_use]
    pub fn expand(&self) -> Vec<String> {
        expand(&self.allowed_if_has)
    }
}

/// Authorization marker attached to a controller or action at definition time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "permission", rename_all = "snake_case")]
pub enum AuthMarker {
    /// The endpoint is reachable by a caller holding this permission.
    RequiresAuth(RequiresAuth),
    /// The endpoint is public unless it also declares permissions.
    RequiresNoAuth,
}

impl AuthMarker {
    #[must_use]
    pub fn requires_auth(permission: impl Into<String>) -> Self {
        Self::RequiresAuth(RequiresAuth::new(permission))
    }

    #[must_use]
    pub fn as_requires_auth(&self) -> Option<&RequiresAuth> {
        match self {
            Self::RequiresAuth(requirement) => Some(requirement),
            Self::RequiresNoAuth => None,
        }
    }
}
