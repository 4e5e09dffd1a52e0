use std::collections::HashSet;

use http::request::Parts;

use crate::route::RouteDefinition;

/// Route matched for an inbound request.
///
/// Attribute-style routing dispatches through a top-level route whose
/// sub-routes carry the real templates; authorization uses the first
/// sub-route when there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute {
    pub template: String,
    pub sub_routes: Vec<MatchedRoute>,
}

impl MatchedRoute {
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            sub_routes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_sub_route(mut self, sub_route: MatchedRoute) -> Self {
        self.sub_routes.push(sub_route);
        self
    }

    /// First sub-route, else this route.
    #[must_use]
    pub fn effective(&self) -> &MatchedRoute {
        self.sub_routes.first().unwrap_or(self)
    }

    #[must_use]
    pub fn effective_template(&self) -> &str {
        &self.effective().template
    }
}

/// Resolves an inbound request to the route it matched.
pub trait RequestRouter: Send + Sync {
    fn find_route(&self, request: &Parts) -> Option<MatchedRoute>;
}

/// Reads the [`MatchedRoute`] the routing layer stored in request extensions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionRouter;

impl RequestRouter for ExtensionRouter {
    fn find_route(&self, request: &Parts) -> Option<MatchedRoute> {
        request.extensions.get::<MatchedRoute>().cloned()
    }
}

/// Matches the request path against configured route templates.
///
/// Templates use `{param}` / `{*rest}` placeholders. A template without a
/// leading `/` is matched as if it had one, but is reported unchanged so it
/// lines up with the policy table keys.
#[derive(Clone)]
pub struct TemplateRouter {
    matcher: matchit::Router<String>,
}

impl TemplateRouter {
    /// Build a matcher over `templates`, skipping repeats.
    ///
    /// # Errors
    /// Returns [`matchit::InsertError`] if two distinct templates conflict.
    pub fn new<I, T>(templates: I) -> Result<Self, matchit::InsertError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut matcher = matchit::Router::new();
        let mut seen = HashSet::new();

        for template in templates {
            let template: String = template.into();
            if !seen.insert(template.clone()) {
                continue;
            }
            let path = if template.starts_with('/') {
                template.clone()
            } else {
                format!("/{template}")
            };
            matcher.insert(path, template)?;
        }

        Ok(Self { matcher })
    }

    /// Matcher over the templates of `routes`.
    ///
    /// # Errors
    /// Returns [`matchit::InsertError`] if two distinct templates conflict.
    pub fn from_routes(routes: &[RouteDefinition]) -> Result<Self, matchit::InsertError> {
        Self::new(routes.iter().map(|route| route.template.as_str()))
    }

    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<&str> {
        self.matcher.at(path).ok().map(|m| m.value.as_str())
    }
}

impl RequestRouter for TemplateRouter {
    fn find_route(&self, request: &Parts) -> Option<MatchedRoute> {
        self.match_path(request.uri.path()).map(MatchedRoute::new)
    }
}
