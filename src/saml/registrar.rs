//! Endpoint registration and the routing table.
//!
//! Registration runs once per provider set: it publishes one endpoint per
//! (category, function, provider) into the engine configuration, then builds
//! the path patterns the HTTP layer dispatches on. Both are derived from the
//! same declarations so the engine never parses a request for a path that
//! does not route.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::{FrontendError, binding::Binding};
use crate::config::{FrontendConfig, SINGLE_SIGN_ON_SERVICE};

/// A published endpoint URL and the function (binding URN for SSO) it serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdpEndpoint {
    pub url: String,
    pub function: String,
}

/// Endpoint category → published endpoints.
pub type IdpEndpoints = BTreeMap<String, Vec<IdpEndpoint>>;

/// Engine configuration with `service.idp.endpoints` filled in.
///
/// Only the registrar can build one, so an engine is never constructed from
/// a configuration that disagrees with the routing table.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedIdpConfig(Value);

impl FinalizedIdpConfig {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// `[url, function]` pairs published for `category`.
    pub fn endpoints(&self, category: &str) -> Option<&Vec<Value>> {
        self.0["service"]["idp"]["endpoints"][category].as_array()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteHandler {
    /// Inbound `<samlp:AuthnRequest>`.
    AuthnRequest,
}

/// One routing entry: a path pattern, the handler, and the transport binding.
#[derive(Debug, Clone)]
pub struct Route {
    pattern: String,
    regex: Regex,
    pub handler: RouteHandler,
    /// Transport name (`redirect` or `post`).
    pub binding: &'static str,
}

impl Route {
    fn new(pattern: String, handler: RouteHandler, binding: &'static str) -> Result<Self, FrontendError> {
        let regex = Regex::new(&pattern).map_err(|e| {
            FrontendError::Configuration(format!("Invalid route pattern '{pattern}': {e}"))
        })?;
        Ok(Self {
            pattern,
            regex,
            handler,
            binding,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl PartialEq for Route {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
            && self.handler == other.handler
            && self.binding == other.binding
    }
}

impl Eq for Route {}

/// A successful path match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    /// Provider identifier recovered from the path.
    pub provider: String,
    /// Extra segment after the declared path, if any.
    pub trailing: Option<String>,
}

/// Ordered routes, relative to the configured base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    base_path: String,
    routes: Vec<Route>,
}

impl RoutingTable {
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Match an absolute request path. The first matching route wins.
    pub fn match_path(&self, path: &str) -> Option<RouteMatch<'_>> {
        let relative = path.strip_prefix(self.base_path.as_str())?;
        if !self.base_path.is_empty() && !relative.starts_with('/') {
            return None;
        }
        let relative = relative.trim_start_matches('/');

        self.routes.iter().find_map(|route| {
            let caps = route.regex.captures(relative)?;
            Some(RouteMatch {
                route,
                provider: caps.get(1)?.as_str().to_string(),
                trailing: caps.get(2).map(|m| m.as_str().to_string()),
            })
        })
    }
}

/// Output of the configuration half of registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub idp_config: FinalizedIdpConfig,
    pub endpoints: IdpEndpoints,
    pub routes: RoutingTable,
}

/// Derives engine endpoints and routes from a [`FrontendConfig`].
///
/// Never mutates the configuration it borrows, so registering the same
/// provider set twice yields equal results.
pub struct EndpointRegistrar<'a> {
    config: &'a FrontendConfig,
}

impl<'a> EndpointRegistrar<'a> {
    pub fn new(config: &'a FrontendConfig) -> Self {
        Self { config }
    }

    pub fn register(&self, providers: &[String]) -> Result<Registration, FrontendError> {
        validate_providers(providers)?;

        let endpoints = self.endpoints(providers);
        let idp_config = self.finalize(&endpoints)?;
        let routes = self.routing_table(providers)?;

        tracing::debug!(
            providers = ?providers,
            categories = endpoints.len(),
            routes = routes.len(),
            "Registered SAML frontend endpoints"
        );

        Ok(Registration {
            idp_config,
            endpoints,
            routes,
        })
    }

    /// One endpoint per (category, function, provider).
    fn endpoints(&self, providers: &[String]) -> IdpEndpoints {
        let base = self.config.base_trimmed();
        self.config
            .endpoints
            .iter()
            .map(|(category, functions)| {
                let published = functions
                    .iter()
                    .flat_map(|(function, endpoint)| {
                        let endpoint = endpoint.trim_start_matches('/');
                        providers.iter().map(move |provider| IdpEndpoint {
                            url: format!("{base}/{provider}/{endpoint}"),
                            function: function.clone(),
                        })
                    })
                    .collect();
                (category.clone(), published)
            })
            .collect()
    }

    /// Deep-copy the engine configuration and write the endpoints into it.
    fn finalize(&self, endpoints: &IdpEndpoints) -> Result<FinalizedIdpConfig, FrontendError> {
        let mut config = self.config.idp_config.clone();

        let idp = config
            .get_mut("service")
            .and_then(|service| service.get_mut("idp"))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| {
                FrontendError::Configuration(
                    "idp_config must contain a [service.idp] table".to_string(),
                )
            })?;

        let published = idp
            .entry("endpoints")
            .or_insert_with(|| Value::Object(Default::default()));
        let published = published.as_object_mut().ok_or_else(|| {
            FrontendError::Configuration("idp_config service.idp.endpoints must be a table".into())
        })?;

        for (category, list) in endpoints {
            let pairs = list
                .iter()
                .map(|e| Value::Array(vec![e.url.clone().into(), e.function.clone().into()]))
                .collect();
            published.insert(category.clone(), Value::Array(pairs));
        }

        Ok(FinalizedIdpConfig(config))
    }

    /// Provider-alternation routes for every declared single sign-on binding.
    fn routing_table(&self, providers: &[String]) -> Result<RoutingTable, FrontendError> {
        let alternation = providers
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");

        let mut routes = Vec::new();
        if let Some(sso) = self.config.endpoints.get(SINGLE_SIGN_ON_SERVICE) {
            for (binding_urn, endpoint) in sso {
                let binding = Binding::from_urn(binding_urn)?.transport_name();
                let path = regex::escape(endpoint_path(endpoint));
                routes.push(Route::new(
                    format!("^({alternation})/{path}$"),
                    RouteHandler::AuthnRequest,
                    binding,
                )?);
                routes.push(Route::new(
                    format!("^({alternation})/{path}/(.*)$"),
                    RouteHandler::AuthnRequest,
                    binding,
                )?);
            }
        }

        Ok(RoutingTable {
            base_path: base_path(&self.config.base).to_string(),
            routes,
        })
    }
}

fn validate_providers(providers: &[String]) -> Result<(), FrontendError> {
    if providers.is_empty() {
        return Err(FrontendError::Configuration(
            "At least one provider must be registered".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for provider in providers {
        if provider.is_empty() || provider.contains('/') {
            return Err(FrontendError::Configuration(format!(
                "Invalid provider identifier '{provider}'"
            )));
        }
        if !seen.insert(provider.as_str()) {
            return Err(FrontendError::Configuration(format!(
                "Provider '{provider}' registered twice"
            )));
        }
    }
    Ok(())
}

/// Path component of a declared endpoint, without a leading slash.
fn endpoint_path(endpoint: &str) -> &str {
    let path = match endpoint.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |i| &rest[i..]),
        None => endpoint,
    };
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.trim_matches('/')
}

/// Path component of the base, without a trailing slash.
fn base_path(base: &str) -> &str {
    let path = match base.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |i| &rest[i..]),
        None => base,
    };
    path.trim_end_matches('/')
}
