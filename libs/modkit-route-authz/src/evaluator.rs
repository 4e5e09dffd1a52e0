use std::sync::Arc;

use http::request::Parts;

use crate::errors::AuthzError;
use crate::router::{ExtensionRouter, MatchedRoute, RequestRouter};
use crate::types::{AuthPermissions, PolicyTable, PolicyTableHandle};

/// Supplies the permissions the caller of a request currently holds.
pub trait PermissionResolver: Send + Sync {
    /// # Errors
    /// Implementation-defined; the error reaches the caller of the evaluator unchanged.
    fn permissions(&self, request: &Parts) -> Result<Vec<String>, AuthzError>;
}

impl<F> PermissionResolver for F
where
    F: Fn(&Parts) -> Result<Vec<String>, AuthzError> + Send + Sync,
{
    fn permissions(&self, request: &Parts) -> Result<Vec<String>, AuthzError> {
        self(request)
    }
}

/// Resolver for callers that hold no permissions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPermissions;

impl PermissionResolver for NoPermissions {
    fn permissions(&self, _request: &Parts) -> Result<Vec<String>, AuthzError> {
        Ok(Vec::new())
    }
}

/// Decides requests whose route is not in the policy table.
pub trait UndefinedRoutePolicy: Send + Sync {
    /// # Errors
    /// Implementation-defined; the error reaches the caller of the evaluator unchanged.
    fn allow(&self, request: &Parts) -> Result<bool, AuthzError>;
}

impl<F> UndefinedRoutePolicy for F
where
    F: Fn(&Parts) -> Result<bool, AuthzError> + Send + Sync,
{
    fn allow(&self, request: &Parts) -> Result<bool, AuthzError> {
        self(request)
    }
}

/// Denies every undefined route.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyUndefined;

impl UndefinedRoutePolicy for DenyUndefined {
    fn allow(&self, _request: &Parts) -> Result<bool, AuthzError> {
        Ok(false)
    }
}

/// Allows every undefined route.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowUndefined;

impl UndefinedRoutePolicy for AllowUndefined {
    fn allow(&self, _request: &Parts) -> Result<bool, AuthzError> {
        Ok(true)
    }
}

/// Optional collaborators of [`RoutePermissions`].
///
/// Unset fields fall back to [`ExtensionRouter`], [`NoPermissions`] and
/// [`DenyUndefined`].
#[derive(Clone, Default)]
pub struct EvaluatorOptions {
    pub router: Option<Arc<dyn RequestRouter>>,
    pub permission_resolver: Option<Arc<dyn PermissionResolver>>,
    pub undefined_route_policy: Option<Arc<dyn UndefinedRoutePolicy>>,
}

impl EvaluatorOptions {
    #[must_use]
    pub fn with_router(mut self, router: Arc<dyn RequestRouter>) -> Self {
        self.router = Some(router);
        self
    }

    #[must_use]
    pub fn with_permission_resolver(mut self, resolver: Arc<dyn PermissionResolver>) -> Self {
        self.permission_resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn with_undefined_route_policy(mut self, policy: Arc<dyn UndefinedRoutePolicy>) -> Self {
        self.undefined_route_policy = Some(policy);
        self
    }
}

enum Decision<'t> {
    /// No route, or no record for it; carries the undefined-route verdict.
    Undefined(bool),
    /// No-auth record without declared permissions.
    FreePass,
    /// Record that gates on the caller's permissions.
    Gated(&'t AuthPermissions),
}

/// Per-request authorization against a route permission table.
///
/// Lookup order: the route matched for the request (first sub-route, else the
/// top-level route), then the `"<VERB>:<template>"` key, then the bare
/// template. Requests without a record are undefined and go to the
/// undefined-route policy; the permission resolver is only consulted for
/// routes that gate on permissions.
#[derive(Clone)]
pub struct RoutePermissions {
    table: PolicyTableHandle,
    router: Arc<dyn RequestRouter>,
    permission_resolver: Arc<dyn PermissionResolver>,
    undefined_route_policy: Arc<dyn UndefinedRoutePolicy>,
}

impl RoutePermissions {
    #[must_use]
    pub fn new(table: impl Into<PolicyTableHandle>, options: EvaluatorOptions) -> Self {
        Self {
            table: table.into(),
            router: options.router.unwrap_or_else(|| Arc::new(ExtensionRouter)),
            permission_resolver: options
                .permission_resolver
                .unwrap_or_else(|| Arc::new(NoPermissions)),
            undefined_route_policy: options
                .undefined_route_policy
                .unwrap_or_else(|| Arc::new(DenyUndefined)),
        }
    }

    /// Handle to the table in use; publish a rebuilt table through it.
    #[must_use]
    pub fn table(&self) -> &PolicyTableHandle {
        &self.table
    }

    /// Route matched for `request`, if any.
    #[must_use]
    pub fn find_route(&self, request: &Parts) -> Option<MatchedRoute> {
        self.router.find_route(request)
    }

    /// Whether `request` may proceed, resolving the caller's permissions if needed.
    ///
    /// # Errors
    /// Propagates failures of the permission resolver or undefined-route policy.
    pub fn is_allowed(&self, request: &Parts) -> Result<bool, AuthzError> {
        let table = self.table.load();
        match self.decide(&table, request)? {
            Decision::Undefined(allowed) => Ok(allowed),
            Decision::FreePass => Ok(true),
            Decision::Gated(permissions) => {
                let held = self.permission_resolver.permissions(request)?;
                Ok(Self::check(permissions, &held, request))
            }
        }
    }

    /// Whether `request` may proceed for a caller holding `requested`.
    ///
    /// The permission resolver is not consulted.
    ///
    /// # Errors
    /// Propagates failures of the undefined-route policy.
    pub fn is_allowed_with<S: AsRef<str>>(
        &self,
        request: &Parts,
        requested: &[S],
    ) -> Result<bool, AuthzError> {
        let table = self.table.load();
        match self.decide(&table, request)? {
            Decision::Undefined(allowed) => Ok(allowed),
            Decision::FreePass => Ok(true),
            Decision::Gated(permissions) => Ok(Self::check(permissions, requested, request)),
        }
    }

    /// Whether `request` passes without any permission check.
    ///
    /// True for no-auth routes without declared permissions, and for undefined
    /// routes the undefined-route policy allows. Never calls the permission
    /// resolver.
    ///
    /// # Errors
    /// Propagates failures of the undefined-route policy.
    pub fn auth_not_required(&self, request: &Parts) -> Result<bool, AuthzError> {
        let table = self.table.load();
        Ok(match self.decide(&table, request)? {
            Decision::Undefined(allowed) => allowed,
            Decision::FreePass => true,
            Decision::Gated(_) => false,
        })
    }

    fn decide<'t>(
        &self,
        table: &'t PolicyTable,
        request: &Parts,
    ) -> Result<Decision<'t>, AuthzError> {
        let permissions = self.router.find_route(request).and_then(|route| {
            let template = route.effective_template();
            let found = table.lookup(&request.method, template);
            if found.is_none() {
                tracing::trace!(%template, method = %request.method, "Route has no permission record");
            }
            found
        });

        match permissions {
            None => {
                let allowed = self.undefined_route_policy.allow(request)?;
                tracing::debug!(
                    path = request.uri.path(),
                    allowed,
                    "Undefined route evaluated by undefined-route policy"
                );
                Ok(Decision::Undefined(allowed))
            }
            Some(permissions) if permissions.is_free_pass() => Ok(Decision::FreePass),
            Some(permissions) => Ok(Decision::Gated(permissions)),
        }
    }

    fn check<S: AsRef<str>>(permissions: &AuthPermissions, held: &[S], request: &Parts) -> bool {
        let allowed = permissions.is_satisfied_by(held);
        if !allowed {
            tracing::debug!(
                path = request.uri.path(),
                method = %request.method,
                accepted = ?permissions.accepted,
                "Caller holds none of the accepted permissions"
            );
        }
        allowed
    }
}
