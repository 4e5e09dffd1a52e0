use thiserror::Error;

/// Errors raised while compiling the route permission table.
///
/// These are configuration problems: they surface immediately from
/// [`crate::builder::PolicyBuilder::build`] and are never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate an endpoint resolver in the route configuration")]
    EndpointResolverMissing,

    #[error("duplicate policy key: {key}")]
    DuplicatePolicyKey { key: String },
}

/// Errors raised while authorizing a request.
///
/// The evaluator never produces these on its own; they come from the
/// caller-supplied permission resolver or undefined-route policy and are
/// passed through unchanged.
#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("permission resolver failed: {0}")]
    ResolverFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(feature = "axum-ext")]
impl axum::response::IntoResponse for AuthzError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        tracing::error!(error = %self, "Route authorization failed");
        crate::axum_ext::error_body(StatusCode::INTERNAL_SERVER_ERROR, &self.to_string())
    }
}
