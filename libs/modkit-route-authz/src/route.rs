use std::collections::BTreeMap;
use std::sync::Arc;

use http::Method;

use crate::endpoint::EndpointResolver;

/// Route default naming the controller that serves the route.
pub const CONTROLLER_KEY: &str = "controller";
/// Route default naming the action (handler method) that serves the route.
pub const ACTION_KEY: &str = "action";

/// A configured route as seen by the routing layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteDefinition {
    /// Route template, e.g. `api/users/{id}`.
    pub template: String,
    /// Route defaults; `controller` and `action` identify the endpoint.
    pub defaults: BTreeMap<String, String>,
    /// HTTP methods the route is restricted to. Empty means unconstrained.
    pub allowed_methods: Vec<Method>,
}

impl RouteDefinition {
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            ..Self::default()
        }
    }

    /// Route served by `controller`/`action`.
    #[must_use]
    pub fn to_action(
        template: impl Into<String>,
        controller: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self::new(template)
            .with_default(CONTROLLER_KEY, controller)
            .with_default(ACTION_KEY, action)
    }

    #[must_use]
    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_methods<I: IntoIterator<Item = Method>>(mut self, methods: I) -> Self {
        self.allowed_methods.extend(methods);
        self
    }

    /// Controller/action pair from the route defaults, if both are present.
    #[must_use]
    pub fn target(&self) -> Option<RouteTarget<'_>> {
        Some(RouteTarget {
            controller: self.defaults.get(CONTROLLER_KEY)?,
            action: self.defaults.get(ACTION_KEY)?,
        })
    }

    /// Allowed verbs that are subject to authorization.
    ///
    /// `OPTIONS` is always dropped: preflight requests are not gated here.
    pub fn gated_methods(&self) -> impl Iterator<Item = &Method> {
        self.allowed_methods
            .iter()
            .filter(|method| **method != Method::OPTIONS)
    }
}

/// Identity of the endpoint a route dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteTarget<'a> {
    pub controller: &'a str,
    pub action: &'a str,
}

/// Source of every configured route, in configuration order.
pub trait RouteEnumerator: Send + Sync {
    fn routes(&self) -> Vec<RouteDefinition>;
}

impl RouteEnumerator for Vec<RouteDefinition> {
    fn routes(&self) -> Vec<RouteDefinition> {
        self.clone()
    }
}

/// Routing configuration handed to the policy builder.
///
/// Carries the configured routes and the service that maps a route's
/// controller/action to its endpoint descriptor. A configuration without an
/// endpoint resolver cannot be compiled.
#[derive(Clone, Default)]
pub struct RouteConfiguration {
    routes: Vec<RouteDefinition>,
    endpoint_resolver: Option<Arc<dyn EndpointResolver>>,
}

impl RouteConfiguration {
    #[must_use]
    pub fn new(endpoint_resolver: Arc<dyn EndpointResolver>) -> Self {
        Self {
            routes: Vec::new(),
            endpoint_resolver: Some(endpoint_resolver),
        }
    }

    /// Configuration with no endpoint resolver registered.
    #[must_use]
    pub fn without_resolver() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_route(mut self, route: RouteDefinition) -> Self {
        self.routes.push(route);
        self
    }

    pub fn add_route(&mut self, route: RouteDefinition) {
        self.routes.push(route);
    }

    pub fn set_endpoint_resolver(&mut self, resolver: Option<Arc<dyn EndpointResolver>>) {
        self.endpoint_resolver = resolver;
    }

    #[must_use]
    pub fn endpoint_resolver(&self) -> Option<Arc<dyn EndpointResolver>> {
        self.endpoint_resolver.clone()
    }
}

impl RouteEnumerator for RouteConfiguration {
    fn routes(&self) -> Vec<RouteDefinition> {
        self.routes.clone()
    }
}

impl std::fmt::Debug for RouteConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteConfiguration")
            .field("routes", &self.routes)
            .field("endpoint_resolver", &self.endpoint_resolver.is_some())
            .finish()
    }
}
