//! Endpoint descriptors and their authorization markers.
//!
//! A controller groups actions. Both carry markers declared when the
//! application is assembled; the policy builder reads them once and merges
//! action markers with controller markers (never through inheritance).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::permission::AuthMarker;
use crate::route::RouteTarget;

/// Read access to the authorization markers of a controller or action.
pub trait AuthMarked {
    fn auth_markers(&self) -> &[AuthMarker];

    fn declares_no_auth(&self) -> bool {
        self.auth_markers()
            .iter()
            .any(|marker| matches!(marker, AuthMarker::RequiresNoAuth))
    }

    /// Expanded permissions of every `RequiresAuth` marker, in declaration order.
    fn expanded_permissions(&self) -> Vec<String> {
        self.auth_markers()
            .iter()
            .filter_map(AuthMarker::as_requires_auth)
            .flat_map(crate::permission::RequiresAuth::expand)
            .collect()
    }
}

/// A request-handling method of a controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub name: String,
    #[serde(default)]
    pub markers: Vec<AuthMarker>,
}

impl ActionDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            markers: Vec::new(),
        }
    }

    #[must_use]
    pub fn requires_auth(mut self, permission: impl Into<String>) -> Self {
        self.markers.push(AuthMarker::requires_auth(permission));
        self
    }

    #[must_use]
    pub fn requires_no_auth(mut self) -> Self {
        self.markers.push(AuthMarker::RequiresNoAuth);
        self
    }
}

impl AuthMarked for ActionDescriptor {
    fn auth_markers(&self) -> &[AuthMarker] {
        &self.markers
    }
}

/// A group of actions sharing controller-level markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerDescriptor {
    pub name: String,
    #[serde(default)]
    pub markers: Vec<AuthMarker>,
    #[serde(default)]
    pub actions: Vec<ActionDescriptor>,
}

impl ControllerDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            markers: Vec::new(),
            actions: Vec::new(),
        }
    }

    #[must_use]
    pub fn requires_auth(mut self, permission: impl Into<String>) -> Self {
        self.markers.push(AuthMarker::requires_auth(permission));
        self
    }

    #[must_use]
    pub fn requires_no_auth(mut self) -> Self {
        self.markers.push(AuthMarker::RequiresNoAuth);
        self
    }

    #[must_use]
    pub fn action(mut self, action: ActionDescriptor) -> Self {
        self.actions.push(action);
        self
    }

    /// Action with exactly this name.
    #[must_use]
    pub fn find_action(&self, name: &str) -> Option<&ActionDescriptor> {
        self.actions.iter().find(|action| action.name == name)
    }
}

impl AuthMarked for ControllerDescriptor {
    fn auth_markers(&self) -> &[AuthMarker] {
        &self.markers
    }
}

/// The controller and action a route dispatches to.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedEndpoint<'a> {
    pub controller: &'a ControllerDescriptor,
    pub action: &'a ActionDescriptor,
}

/// Maps a route's controller/action identity to its descriptors.
pub trait EndpointResolver: Send + Sync {
    fn resolve(&self, target: RouteTarget<'_>) -> Option<ResolvedEndpoint<'_>>;
}

/// In-memory controller registry.
///
/// Controller names match case-insensitively; action names match exactly.
#[derive(Debug, Clone, Default)]
pub struct ControllerCatalog {
    controllers: HashMap<String, ControllerDescriptor>,
}

impl ControllerCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller, replacing any previous one with the same name.
    #[must_use]
    pub fn with_controller(mut self, controller: ControllerDescriptor) -> Self {
        self.register(controller);
        self
    }

    pub fn register(&mut self, controller: ControllerDescriptor) {
        self.controllers
            .insert(controller.name.to_lowercase(), controller);
    }

    #[must_use]
    pub fn controller(&self, name: &str) -> Option<&ControllerDescriptor> {
        self.controllers.get(&name.to_lowercase())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

impl FromIterator<ControllerDescriptor> for ControllerCatalog {
    fn from_iter<T: IntoIterator<Item = ControllerDescriptor>>(iter: T) -> Self {
        let mut catalog = Self::new();
        for controller in iter {
            catalog.register(controller);
        }
        catalog
    }
}

impl EndpointResolver for ControllerCatalog {
    fn resolve(&self, target: RouteTarget<'_>) -> Option<ResolvedEndpoint<'_>> {
        let controller = self.controller(target.controller)?;
        let action = controller.find_action(target.action)?;
        Some(ResolvedEndpoint { controller, action })
    }
}
