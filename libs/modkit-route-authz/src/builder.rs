use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::endpoint::{AuthMarked, EndpointResolver, ResolvedEndpoint};
use crate::errors::ConfigError;
use crate::route::{RouteConfiguration, RouteDefinition, RouteEnumerator};
use crate::types::{AuthPermissions, PolicyTable, verb_key};

/// Called for every route whose endpoint cannot be resolved.
///
/// Receives the route and the table built so far; the callback may record the
/// route in the table.
pub type UndefinedRouteCallback<'a> = Box<dyn FnMut(&RouteDefinition, &mut PolicyTable) + 'a>;

/// Undefined-route callback kept across rebuilds.
pub type SharedUndefinedRouteCallback =
    Arc<dyn Fn(&RouteDefinition, &mut PolicyTable) + Send + Sync>;

/// What to do when two routes produce the same policy key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    /// Keep the first record and drop later ones silently.
    #[default]
    FirstWins,
    /// Fail the build with [`ConfigError::DuplicatePolicyKey`].
    Reject,
}

/// Compiles configured routes and their endpoint markers into a [`PolicyTable`].
///
/// For each route the builder:
/// 1. resolves the controller/action the route targets (unresolved routes go to
///    the undefined-route callback, or are skipped);
/// 2. marks the record `auth_not_required` if the action OR the controller
///    carries a no-auth marker;
/// 3. collects expanded permissions, action first then controller, deduplicated;
/// 4. emits one `"<VERB>:<template>"` key per allowed verb except `OPTIONS`, or
///    the bare template when the route has no gated verbs;
/// 5. inserts each key unless it is already present.
pub struct PolicyBuilder<'a> {
    routes: &'a dyn RouteEnumerator,
    endpoint_resolver: Option<Arc<dyn EndpointResolver>>,
    undefined_route: Option<UndefinedRouteCallback<'a>>,
    duplicate_keys: DuplicateKeyPolicy,
}

impl<'a> PolicyBuilder<'a> {
    #[must_use]
    pub fn new(configuration: &'a RouteConfiguration) -> Self {
        Self {
            routes: configuration,
            endpoint_resolver: configuration.endpoint_resolver(),
            undefined_route: None,
            duplicate_keys: DuplicateKeyPolicy::default(),
        }
    }

    /// Builder over an arbitrary route source.
    #[must_use]
    pub fn from_parts(
        routes: &'a dyn RouteEnumerator,
        endpoint_resolver: Option<Arc<dyn EndpointResolver>>,
    ) -> Self {
        Self {
            routes,
            endpoint_resolver,
            undefined_route: None,
            duplicate_keys: DuplicateKeyPolicy::default(),
        }
    }

    #[must_use]
    pub fn on_undefined_route<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&RouteDefinition, &mut PolicyTable) + 'a,
    {
        self.undefined_route = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn duplicate_keys(mut self, policy: DuplicateKeyPolicy) -> Self {
        self.duplicate_keys = policy;
        self
    }

    /// Build the permission table.
    ///
    /// # Errors
    /// - [`ConfigError::EndpointResolverMissing`] if no endpoint resolver is configured
    /// - [`ConfigError::DuplicatePolicyKey`] if a key repeats under [`DuplicateKeyPolicy::Reject`]
    pub fn build(mut self) -> Result<PolicyTable, ConfigError> {
        let resolver = self
            .endpoint_resolver
            .clone()
            .ok_or(ConfigError::EndpointResolverMissing)?;

        let routes = self.routes.routes();
        let mut table = PolicyTable::new();
        let mut unresolved = 0_usize;

        for route in &routes {
            let Some(endpoint) = route.target().and_then(|target| resolver.resolve(target)) else {
                unresolved += 1;
                tracing::debug!(template = %route.template, "Route has no resolvable endpoint");
                if let Some(callback) = self.undefined_route.as_mut() {
                    callback(route, &mut table);
                }
                continue;
            };

            let permissions = endpoint_permissions(endpoint);
            for key in policy_keys(route) {
                self.insert(&mut table, key, permissions.clone())?;
            }
        }

        tracing::info!(
            routes = routes.len(),
            policy_keys = table.len(),
            unresolved,
            "Route permission table built"
        );

        Ok(table)
    }

    fn insert(
        &self,
        table: &mut PolicyTable,
        key: String,
        permissions: AuthPermissions,
    ) -> Result<(), ConfigError> {
        if !table.contains_key(&key) {
            table.insert(key, permissions);
            return Ok(());
        }

        match self.duplicate_keys {
            DuplicateKeyPolicy::FirstWins => {
                tracing::debug!(%key, "Policy key already defined, keeping the first record");
                Ok(())
            }
            DuplicateKeyPolicy::Reject => Err(ConfigError::DuplicatePolicyKey { key }),
        }
    }
}

/// Merge action and controller markers into a single record.
fn endpoint_permissions(endpoint: ResolvedEndpoint<'_>) -> AuthPermissions {
    let auth_not_required =
        endpoint.action.declares_no_auth() || endpoint.controller.declares_no_auth();

    let mut accepted: Vec<String> = Vec::new();
    for permission in endpoint
        .action
        .expanded_permissions()
        .into_iter()
        .chain(endpoint.controller.expanded_permissions())
    {
        if !accepted.contains(&permission) {
            accepted.push(permission);
        }
    }

    AuthPermissions {
        auth_not_required,
        accepted,
    }
}

fn policy_keys(route: &RouteDefinition) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for method in route.gated_methods() {
        let key = verb_key(method, &route.template);
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    if keys.is_empty() {
        keys.push(route.template.clone());
    }
    keys
}
