#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end tests: markers compiled into a table, then requests evaluated against it

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use http::{Method, Request, request::Parts};
use modkit_route_authz::{
    ActionDescriptor, AuthPermissions, AuthzError, ControllerCatalog, ControllerDescriptor,
    EndpointResolver, EvaluatorOptions, MatchedRoute, PermissionResolver, PolicyBuilder, PolicyTable,
    RouteConfiguration, RouteDefinition, RoutePermissions, TemplateRouter,
};

/// Resolver that reports a fixed permission set and counts its calls
struct FixedResolver {
    held: Vec<String>,
    calls: AtomicUsize,
}

impl FixedResolver {
    fn new(held: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            held: held.iter().map(|p| (*p).to_owned()).collect(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PermissionResolver for FixedResolver {
    fn permissions(&self, _request: &Parts) -> Result<Vec<String>, AuthzError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.held.clone())
    }
}

fn request(method: Method, uri: &str) -> Parts {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(())
        .unwrap()
        .into_parts()
        .0
}

fn routed(method: Method, template: &str) -> Parts {
    let mut parts = request(method, "http://localhost/");
    parts.extensions.insert(MatchedRoute::new(template));
    parts
}

fn evaluator(table: PolicyTable, resolver: &Arc<FixedResolver>) -> RoutePermissions {
    RoutePermissions::new(
        table,
        EvaluatorOptions::default().with_permission_resolver(resolver.clone()),
    )
}

fn single(key: &str, permissions: AuthPermissions) -> PolicyTable {
    [(key, permissions)].into_iter().collect()
}

#[test]
fn route_without_valid_permissions_is_denied() {
    let resolver = FixedResolver::new(&["write", "admin"]);
    let permissions = evaluator(single("tpl", AuthPermissions::default()), &resolver);

    assert!(!permissions.is_allowed(&routed(Method::GET, "tpl")).unwrap());
}

#[test]
fn caller_holding_an_accepted_permission_is_allowed() {
    let resolver = FixedResolver::new(&["write"]);
    let permissions = evaluator(
        single("tpl", AuthPermissions::accepting(["write", "write2"])),
        &resolver,
    );

    assert!(permissions.is_allowed(&routed(Method::GET, "tpl")).unwrap());
    assert_eq!(resolver.calls(), 1);
}

#[test]
fn verb_record_for_another_verb_leaves_route_undefined() {
    let resolver = FixedResolver::new(&["write"]);
    let permissions = evaluator(
        single("GET:tpl", AuthPermissions::accepting(["write"])),
        &resolver,
    );

    assert!(!permissions.is_allowed(&routed(Method::POST, "tpl")).unwrap());
    assert_eq!(resolver.calls(), 0);
}

#[test]
fn no_auth_record_with_permissions_still_requires_them() {
    let resolver = FixedResolver::new(&[]);
    let permissions = evaluator(
        single(
            "tpl",
            AuthPermissions::accepting(["read"]).with_auth_not_required(true),
        ),
        &resolver,
    );

    assert!(!permissions.is_allowed(&routed(Method::GET, "tpl")).unwrap());
    assert!(!permissions.auth_not_required(&routed(Method::GET, "tpl")).unwrap());
}

/// Users API declared the way an application would
fn users_api() -> RouteConfiguration {
    let catalog = ControllerCatalog::new()
        .with_controller(
            ControllerDescriptor::new("Users")
                .requires_auth("users")
                .action(ActionDescriptor::new("List").requires_auth("users:read"))
                .action(ActionDescriptor::new("Get").requires_auth("users:read"))
                .action(ActionDescriptor::new("Create").requires_auth("users:write"))
                .action(ActionDescriptor::new("Avatar").requires_no_auth()),
        )
        .with_controller(
            ControllerDescriptor::new("Health")
                .requires_no_auth()
                .action(ActionDescriptor::new("Check")),
        );

    RouteConfiguration::new(Arc::new(catalog))
        .with_route(
            RouteDefinition::to_action("api/users", "users", "List")
                .with_methods([Method::GET, Method::OPTIONS]),
        )
        .with_route(
            RouteDefinition::to_action("api/users", "USERS", "Create").with_methods([Method::POST]),
        )
        .with_route(RouteDefinition::to_action("api/users/{id}", "Users", "Get"))
        .with_route(RouteDefinition::to_action("api/users/{id}/avatar", "Users", "Avatar"))
        .with_route(RouteDefinition::to_action("health", "Health", "Check"))
        .with_route(RouteDefinition::to_action("api/legacy", "Legacy", "Index"))
}

fn users_evaluator(resolver: &Arc<FixedResolver>) -> RoutePermissions {
    let config = users_api();
    let table = PolicyBuilder::new(&config).build().unwrap();
    let router = TemplateRouter::new([
        "api/users",
        "api/users/{id}",
        "api/users/{id}/avatar",
        "health",
        "api/legacy",
    ])
    .unwrap();

    RoutePermissions::new(
        table,
        EvaluatorOptions::default()
            .with_router(Arc::new(router))
            .with_permission_resolver(resolver.clone()),
    )
}

#[test]
fn built_table_contains_verb_and_bare_keys() {
    let config = users_api();
    let table = PolicyBuilder::new(&config).build().unwrap();

    let mut keys: Vec<_> = table.iter().map(|(key, _)| key.as_str()).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec![
            "GET:api/users",
            "POST:api/users",
            "api/users/{id}",
            "api/users/{id}/avatar",
            "health",
        ]
    );
    assert_eq!(
        table.get("GET:api/users").unwrap().accepted,
        vec!["users", "users:read"]
    );
}

#[test]
fn parent_permission_grants_every_child() -> anyhow::Result<()> {
    let resolver = FixedResolver::new(&["users"]);
    let permissions = users_evaluator(&resolver);

    assert!(permissions.is_allowed(&request(Method::GET, "/api/users"))?);
    assert!(permissions.is_allowed(&request(Method::POST, "/api/users"))?);
    assert!(permissions.is_allowed(&request(Method::DELETE, "/api/users/7"))?);
    Ok(())
}

#[test]
fn child_permission_grants_only_its_actions() -> anyhow::Result<()> {
    let resolver = FixedResolver::new(&["users:read"]);
    let permissions = users_evaluator(&resolver);

    assert!(permissions.is_allowed(&request(Method::GET, "/api/users"))?);
    assert!(permissions.is_allowed(&request(Method::GET, "/api/users/7"))?);
    assert!(!permissions.is_allowed(&request(Method::POST, "/api/users"))?);
    Ok(())
}

#[test]
fn verb_outside_route_constraint_is_undefined() {
    let resolver = FixedResolver::new(&["users"]);
    let permissions = users_evaluator(&resolver);

    assert!(!permissions.is_allowed(&request(Method::PUT, "/api/users")).unwrap());
    assert!(!permissions.is_allowed(&request(Method::OPTIONS, "/api/users")).unwrap());
    assert_eq!(resolver.calls(), 0);
}

#[test]
fn public_routes_skip_the_resolver() {
    let resolver = FixedResolver::new(&[]);
    let permissions = users_evaluator(&resolver);

    assert!(permissions.is_allowed(&request(Method::GET, "/health")).unwrap());
    assert!(permissions.auth_not_required(&request(Method::GET, "/health")).unwrap());
    assert_eq!(resolver.calls(), 0);
}

#[test]
fn no_auth_action_keeps_controller_permissions() {
    let config = users_api();
    let table = PolicyBuilder::new(&config).build().unwrap();
    let avatar = table.get("api/users/{id}/avatar").unwrap();
    assert!(avatar.auth_not_required);
    assert_eq!(avatar.accepted, vec!["users"]);

    let anonymous = FixedResolver::new(&[]);
    let permissions = users_evaluator(&anonymous);
    let request = request(Method::GET, "/api/users/7/avatar");
    assert!(!permissions.auth_not_required(&request).unwrap());
    assert!(!permissions.is_allowed(&request).unwrap());
    assert_eq!(anonymous.calls(), 1);

    let member = FixedResolver::new(&["users"]);
    assert!(users_evaluator(&member).is_allowed(&request).unwrap());
}

#[test]
fn unresolved_and_unknown_routes_are_denied() {
    let resolver = FixedResolver::new(&["users"]);
    let permissions = users_evaluator(&resolver);

    assert!(!permissions.is_allowed(&request(Method::GET, "/api/legacy")).unwrap());
    assert!(!permissions.is_allowed(&request(Method::GET, "/api/orders")).unwrap());
    assert_eq!(resolver.calls(), 0);
}

#[test]
fn find_route_reports_the_matched_template() {
    let resolver = FixedResolver::new(&[]);
    let permissions = users_evaluator(&resolver);

    let route = permissions
        .find_route(&request(Method::GET, "/api/users/42"))
        .unwrap();
    assert_eq!(route.template, "api/users/{id}");
}

#[test]
fn rebuilt_table_is_published_to_the_evaluator() {
    let resolver = FixedResolver::new(&[]);
    let permissions = users_evaluator(&resolver);
    let health = request(Method::GET, "/health");
    assert!(permissions.is_allowed(&health).unwrap());

    let routes = vec![RouteDefinition::to_action("health", "Users", "List")];
    let catalog = ControllerCatalog::new().with_controller(
        ControllerDescriptor::new("Users")
            .action(ActionDescriptor::new("List").requires_auth("users:read")),
    );
    let endpoints: Arc<dyn EndpointResolver> = Arc::new(catalog);
    let rebuilt = PolicyBuilder::from_parts(&routes, Some(endpoints))
        .build()
        .unwrap();
    let previous = permissions.table().replace(rebuilt);

    assert!(previous.contains_key("health"));
    assert!(!permissions.is_allowed(&health).unwrap());
    assert_eq!(resolver.calls(), 1);
}
