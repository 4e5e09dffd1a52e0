#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Route permission tables for `ModKit` HTTP services
//!
//! This crate compiles authorization markers declared on controllers and
//! actions into a table keyed by route template (optionally qualified by
//! verb), and evaluates inbound requests against it:
//! - `RequiresAuth("parent:child")` grants `parent` or `parent:child`
//! - `RequiresNoAuth` on the action or its controller makes the route public
//! - Verb keys (`GET:api/users`) take precedence over bare template keys
//! - Undefined routes are denied unless a policy says otherwise
//!
//! The caller's held permissions come from a [`PermissionResolver`] supplied by
//! the host; this crate never authenticates.
//!
//! # Example
//!
//! ```ignore
//! use modkit_route_authz::{
//!     ActionDescriptor, ControllerCatalog, ControllerDescriptor, EvaluatorOptions,
//!     PolicyBuilder, RouteConfiguration, RouteDefinition, RoutePermissions,
//! };
//! use std::sync::Arc;
//!
//! let catalog = ControllerCatalog::new().with_controller(
//!     ControllerDescriptor::new("Metrics")
//!         .action(ActionDescriptor::new("Read").requires_auth("metrics:read")),
//! );
//! let routes = RouteConfiguration::new(Arc::new(catalog))
//!     .with_route(RouteDefinition::to_action("/metrics", "Metrics", "Read"));
//!
//! let table = PolicyBuilder::new(&routes).build()?;
//! let permissions = RoutePermissions::new(table, EvaluatorOptions::default());
//! ```

pub mod builder;
pub mod config;
pub mod endpoint;
pub mod errors;
pub mod evaluator;
pub mod permission;
pub mod route;
pub mod router;
pub mod types;

#[cfg(feature = "axum-ext")]
pub mod axum_ext;

pub use builder::{
    DuplicateKeyPolicy, PolicyBuilder, SharedUndefinedRouteCallback, UndefinedRouteCallback,
};
pub use config::RouteAuthzConfig;
pub use endpoint::{
    ActionDescriptor, AuthMarked, ControllerCatalog, ControllerDescriptor, EndpointResolver,
    ResolvedEndpoint,
};
pub use errors::{AuthzError, ConfigError};
pub use evaluator::{
    AllowUndefined, DenyUndefined, EvaluatorOptions, NoPermissions, PermissionResolver,
    RoutePermissions, UndefinedRoutePolicy,
};
pub use permission::{AuthMarker, RequiresAuth};
pub use route::{RouteConfiguration, RouteDefinition, RouteEnumerator, RouteTarget};
pub use router::{ExtensionRouter, MatchedRoute, RequestRouter, TemplateRouter};
pub use types::{AuthPermissions, PolicyTable, PolicyTableHandle};

#[cfg(feature = "axum-ext")]
pub use axum_ext::{MatchedPathRouter, RouteAuthzLayer, RouteAuthzService};
