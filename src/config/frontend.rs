use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::saml::binding::Binding;

/// Endpoint category name for the single sign-on service.
pub const SINGLE_SIGN_ON_SERVICE: &str = "single_sign_on_service";

/// Endpoint category → function name → relative path.
///
/// For `single_sign_on_service` the function name is the binding URN.
pub type EndpointDeclarations = BTreeMap<String, BTreeMap<String, String>>;

/// Identity-provider frontend configuration.
///
/// `idp_config` is handed to the protocol engine after the registrar has
/// filled in `service.idp.endpoints`; its remaining contents are opaque here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrontendConfig {
    /// Base URL (or path) every provider endpoint is published under.
    pub base: String,

    /// Declared endpoints, relative to `{base}/{provider}`.
    pub endpoints: EndpointDeclarations,

    /// Engine configuration. Must contain a `service.idp` table.
    pub idp_config: serde_json::Value,

    /// Bindings this frontend is willing to answer with, in preference order.
    #[serde(default = "default_response_bindings")]
    pub response_bindings: Vec<Binding>,
}

fn default_response_bindings() -> Vec<Binding> {
    vec![Binding::HttpPost, Binding::HttpRedirect]
}

impl FrontendConfig {
    /// Build and validate a frontend configuration.
    pub fn new(
        idp_config: serde_json::Value,
        endpoints: EndpointDeclarations,
        base: impl Into<String>,
    ) -> Result<Self, String> {
        let config = Self {
            base: base.into(),
            endpoints,
            idp_config,
            response_bindings: default_response_bindings(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.base.trim().is_empty() {
            return Err("frontend.base must not be empty".into());
        }
        if self.endpoints.is_empty() {
            return Err("frontend.endpoints must declare at least one category".into());
        }
        let sso = self.endpoints.get(SINGLE_SIGN_ON_SERVICE).ok_or_else(|| {
            format!("frontend.endpoints must declare '{SINGLE_SIGN_ON_SERVICE}'")
        })?;
        if sso.is_empty() {
            return Err(format!(
                "frontend.endpoints.{SINGLE_SIGN_ON_SERVICE} must declare at least one binding"
            ));
        }
        for binding in sso.keys() {
            Binding::from_urn(binding).map_err(|e| {
                format!("frontend.endpoints.{SINGLE_SIGN_ON_SERVICE}: {e}")
            })?;
        }
        if !self.idp_config.is_object() {
            return Err("frontend.idp_config must be a table".into());
        }
        if !self.idp_config["service"]["idp"].is_object() {
            return Err("frontend.idp_config must contain a [service.idp] table".into());
        }
        if self.response_bindings.is_empty() {
            return Err("frontend.response_bindings must not be empty".into());
        }
        Ok(())
    }

    /// Base without a trailing slash.
    pub fn base_trimmed(&self) -> &str {
        self.base.trim_end_matches('/')
    }
}

/// Continuation token configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContinuationConfig {
    /// HMAC key for continuation tokens. Tokens are unsigned when absent.
    #[serde(default)]
    pub signing_key: Option<String>,
}

impl ContinuationConfig {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(key) = &self.signing_key
            && key.is_empty()
        {
            return Err("continuation.signing_key must not be empty when set".into());
        }
        Ok(())
    }
}
