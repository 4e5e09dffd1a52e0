//! Axum middleware for route authorization

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderMap, Method, Request, StatusCode, request::Parts},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tower::{Layer, Service};

use crate::{
    builder::{DuplicateKeyPolicy, PolicyBuilder, SharedUndefinedRouteCallback},
    config::RouteAuthzConfig,
    errors::ConfigError,
    evaluator::{AllowUndefined, EvaluatorOptions, RoutePermissions},
    route::{RouteConfiguration, RouteDefinition},
    router::{MatchedRoute, RequestRouter},
    types::PolicyTable,
};

/// JSON error body shared by deny and failure responses.
pub(crate) fn error_body(status: StatusCode, message: &str) -> Response {
    let body = Json(json!({
        "error": message,
        "status": status.as_u16(),
    }));

    (status, body).into_response()
}

/// Route lookup for requests dispatched by an axum `Router`.
///
/// A [`MatchedRoute`] extension wins when present; otherwise the
/// [`MatchedPath`] axum recorded during routing is used as the template.
/// The middleware must be installed with `Router::layer` or
/// `Router::route_layer` so it runs after routing.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchedPathRouter;

impl RequestRouter for MatchedPathRouter {
    fn find_route(&self, request: &Parts) -> Option<MatchedRoute> {
        if let Some(route) = request.extensions.get::<MatchedRoute>() {
            return Some(route.clone());
        }
        request
            .extensions
            .get::<MatchedPath>()
            .map(|path| MatchedRoute::new(path.as_str()))
    }
}

struct RouteAuthzState {
    permissions: RoutePermissions,
    enabled: bool,
    skip_preflight: bool,
    unauthorized_message: Option<String>,
    duplicate_keys: DuplicateKeyPolicy,
    undefined_route: Option<SharedUndefinedRouteCallback>,
}

fn build_table(
    routes: &RouteConfiguration,
    duplicate_keys: DuplicateKeyPolicy,
    undefined_route: Option<&SharedUndefinedRouteCallback>,
) -> Result<PolicyTable, ConfigError> {
    let mut builder = PolicyBuilder::new(routes).duplicate_keys(duplicate_keys);
    if let Some(callback) = undefined_route.cloned() {
        builder = builder.on_undefined_route(move |route, table| callback(route, table));
    }
    builder.build()
}

/// Layer that denies requests the route permission table does not allow.
///
/// # Example
/// ```ignore
/// let layer = RouteAuthzLayer::from_configuration(&config, &routes, EvaluatorOptions::default())?;
/// router = router.layer(layer);
/// ```
#[derive(Clone)]
pub struct RouteAuthzLayer {
    state: Arc<RouteAuthzState>,
}

impl RouteAuthzLayer {
    #[must_use]
    pub fn new(permissions: RoutePermissions, config: &RouteAuthzConfig) -> Self {
        Self::assemble(permissions, config, None)
    }

    fn assemble(
        permissions: RoutePermissions,
        config: &RouteAuthzConfig,
        undefined_route: Option<SharedUndefinedRouteCallback>,
    ) -> Self {
        if !config.enabled {
            tracing::warn!("Route authorization is disabled, every request will be let through");
        }

        Self {
            state: Arc::new(RouteAuthzState {
                permissions,
                enabled: config.enabled,
                skip_preflight: config.skip_preflight,
                unauthorized_message: config.unauthorized_message.clone(),
                duplicate_keys: config.duplicate_keys,
                undefined_route,
            }),
        }
    }

    /// Build the permission table from `routes` and wrap an evaluator over it.
    ///
    /// Unset options default to [`MatchedPathRouter`] and, when
    /// `config.allow_undefined` is set, [`AllowUndefined`].
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the table cannot be built.
    pub fn from_configuration(
        config: &RouteAuthzConfig,
        routes: &RouteConfiguration,
        options: EvaluatorOptions,
    ) -> Result<Self, ConfigError> {
        Self::build(config, routes, options, None)
    }

    /// Same as [`RouteAuthzLayer::from_configuration`], with a callback for
    /// routes whose endpoint cannot be resolved.
    ///
    /// The callback may record the route in the table; it runs again on every
    /// [`RouteAuthzLayer::rebuild`].
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the table cannot be built.
    pub fn from_configuration_with<F>(
        config: &RouteAuthzConfig,
        routes: &RouteConfiguration,
        options: EvaluatorOptions,
        undefined_route: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&RouteDefinition, &mut PolicyTable) + Send + Sync + 'static,
    {
        let callback: SharedUndefinedRouteCallback = Arc::new(undefined_route);
        Self::build(config, routes, options, Some(callback))
    }

    fn build(
        config: &RouteAuthzConfig,
        routes: &RouteConfiguration,
        mut options: EvaluatorOptions,
        undefined_route: Option<SharedUndefinedRouteCallback>,
    ) -> Result<Self, ConfigError> {
        let table = build_table(routes, config.duplicate_keys, undefined_route.as_ref())?;

        if options.router.is_none() {
            options.router = Some(Arc::new(MatchedPathRouter));
        }
        if options.undefined_route_policy.is_none() && config.allow_undefined {
            options.undefined_route_policy = Some(Arc::new(AllowUndefined));
        }

        Ok(Self::assemble(
            RoutePermissions::new(table, options),
            config,
            undefined_route,
        ))
    }

    #[must_use]
    pub fn permissions(&self) -> &RoutePermissions {
        &self.state.permissions
    }

    /// Rebuild the table from `routes` and publish it to every service of this layer.
    ///
    /// On error the current table stays in place.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the table cannot be built.
    pub fn rebuild(&self, routes: &RouteConfiguration) -> Result<(), ConfigError> {
        let table = build_table(
            routes,
            self.state.duplicate_keys,
            self.state.undefined_route.as_ref(),
        )?;
        let policy_keys = table.len();
        let previous = self.state.permissions.table().replace(table);
        tracing::info!(
            previous_keys = previous.len(),
            policy_keys,
            "Route permission table replaced"
        );
        Ok(())
    }
}

impl<S> Layer<S> for RouteAuthzLayer {
    type Service = RouteAuthzService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RouteAuthzService {
            inner,
            state: self.state.clone(),
        }
    }
}

/// Service that checks each request against the route permission table.
#[derive(Clone)]
pub struct RouteAuthzService<S> {
    inner: S,
    state: Arc<RouteAuthzState>,
}

impl<S> Service<Request<Body>> for RouteAuthzService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let state = self.state.clone();
        let not_ready_inner = self.inner.clone();
        let mut ready_inner = std::mem::replace(&mut self.inner, not_ready_inner);

        Box::pin(async move {
            if !state.enabled
                || (state.skip_preflight
                    && is_preflight_request(request.method(), request.headers()))
            {
                return ready_inner.call(request).await;
            }

            let (parts, body) = request.into_parts();
            match state.permissions.is_allowed(&parts) {
                Ok(true) => ready_inner.call(Request::from_parts(parts, body)).await,
                Ok(false) => {
                    tracing::debug!(
                        method = %parts.method,
                        path = parts.uri.path(),
                        "Request denied by route authorization"
                    );
                    let message = state
                        .unauthorized_message
                        .as_deref()
                        .unwrap_or("Unauthorized");
                    Ok(error_body(StatusCode::UNAUTHORIZED, message))
                }
                Err(err) => Ok(err.into_response()),
            }
        })
    }
}

/// Check if this is a CORS preflight request
///
/// Preflight requests are OPTIONS requests with:
/// - Origin header present
/// - Access-Control-Request-Method header present
fn is_preflight_request(method: &Method, headers: &HeaderMap) -> bool {
    method == Method::OPTIONS
        && headers.contains_key(axum::http::header::ORIGIN)
        && headers.contains_key(axum::http::header::ACCESS_CONTROL_REQUEST_METHOD)
}

// Note: end-to-end tests for RouteAuthzLayer are in tests/axum_middleware.rs
