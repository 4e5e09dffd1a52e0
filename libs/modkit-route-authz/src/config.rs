use serde::{Deserialize, Serialize};

use crate::builder::DuplicateKeyPolicy;

fn default_enabled() -> bool {
    true
}

fn default_skip_preflight() -> bool {
    true
}

/// Route authorization configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RouteAuthzConfig {
    /// When false the middleware lets every request through.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Allow requests whose route has no permission record.
    /// Ignored when a custom undefined-route policy is supplied.
    pub allow_undefined: bool,

    /// Let CORS preflight requests through without evaluation.
    #[serde(default = "default_skip_preflight")]
    pub skip_preflight: bool,

    /// Detail text for the 401 response body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unauthorized_message: Option<String>,

    pub duplicate_keys: DuplicateKeyPolicy,
}

impl Default for RouteAuthzConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            allow_undefined: false,
            skip_preflight: default_skip_preflight(),
            unauthorized_message: None,
            duplicate_keys: DuplicateKeyPolicy::default(),
        }
    }
}
