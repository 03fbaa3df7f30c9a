//! Interface to the SAML protocol engine.
//!
//! The engine owns everything XML: parsing and verifying AuthnRequests,
//! metadata lookups, building and signing Responses, and encoding messages
//! for a binding. The frontend only sequences these calls, so any SAML
//! implementation can sit behind [`ProtocolEngine`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{binding::Binding, registrar::FinalizedIdpConfig};

/// Attribute name to values, as released in the assertion.
pub type Attributes = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("Unknown principal: {0}")]
    UnknownPrincipal(String),

    #[error("Unsupported binding: {0}")]
    UnsupportedBinding(String),

    /// No endpoint matches the requested service and bindings
    #[error("No usable endpoint: {0}")]
    NoEndpoint(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Invalid engine configuration: {0}")]
    Configuration(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub name_id: String,
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameIdPolicy {
    pub format: Option<String>,
    pub sp_name_qualifier: Option<String>,
    pub allow_create: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditions {
    pub not_before: Option<DateTime<Utc>>,
    pub not_on_or_after: Option<DateTime<Utc>>,
    pub audiences: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedAuthnContext {
    pub class_refs: Vec<String>,
    /// `exact`, `minimum`, `maximum` or `better`
    pub comparison: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scoping {
    pub proxy_count: Option<u32>,
    pub idp_entries: Vec<String>,
    pub requester_ids: Vec<String>,
}

/// A parsed and verified `<samlp:AuthnRequest>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthnRequest {
    pub id: String,
    /// Issuer entity id of the requesting service provider.
    pub issuer: Option<String>,
    pub destination: Option<String>,
    pub assertion_consumer_service_url: Option<String>,
    pub protocol_binding: Option<Binding>,
    pub subject: Option<Subject>,
    pub name_id_policy: Option<NameIdPolicy>,
    pub conditions: Option<Conditions>,
    pub requested_authn_context: Option<RequestedAuthnContext>,
    pub scoping: Option<Scoping>,
    pub force_authn: Option<bool>,
    pub is_passive: Option<bool>,
    /// The request exactly as serialized by the engine.
    pub xml: String,
}

/// Where and how to send the reply to an AuthnRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseArgs {
    pub binding: Binding,
    pub destination: String,
    pub in_response_to: String,
    pub sp_entity_id: Option<String>,
    pub name_id_policy: Option<NameIdPolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameId {
    pub value: String,
    pub format: Option<String>,
}

impl NameId {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: None,
        }
    }
}

/// How the subject authenticated upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthnInfo {
    pub class_ref: String,
    pub authenticating_authority: Option<String>,
    pub instant: Option<DateTime<Utc>>,
}

/// Transport encoding of a message for one binding.
///
/// Form-post produces `data` (an auto-submitting HTML page); redirect produces
/// a `Location` header and no data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpArgs {
    pub headers: Vec<(String, String)>,
    pub data: Option<String>,
}

impl HttpArgs {
    /// First header with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A SAML identity-provider implementation.
///
/// Implementations must be safe to call concurrently; the frontend never
/// mutates an engine after construction.
pub trait ProtocolEngine: Send + Sync {
    /// Decode, parse and verify a transport-encoded AuthnRequest.
    fn parse_authn_request(
        &self,
        payload: &str,
        binding: Binding,
        signature: Option<&RedirectSignature>,
    ) -> Result<AuthnRequest, EngineError>;

    /// Rebuild a request from the XML previously stored in [`AuthnRequest::xml`].
    fn authn_request_from_string(&self, xml: &str) -> Result<AuthnRequest, EngineError>;

    /// Pick the assertion consumer service binding and location for `entity_id`.
    fn pick_binding(
        &self,
        bindings: &[Binding],
        entity_id: &str,
        request: &AuthnRequest,
    ) -> Result<(Binding, String), EngineError>;

    fn response_args(
        &self,
        request: &AuthnRequest,
        bindings: &[Binding],
    ) -> Result<ResponseArgs, EngineError>;

    /// Build a serialized `<samlp:Response>` carrying an assertion.
    fn create_authn_response(
        &self,
        identity: &Attributes,
        name_id: &NameId,
        authn: &AuthnInfo,
        sign_response: bool,
        args: &ResponseArgs,
    ) -> Result<String, EngineError>;

    /// Build a serialized error `<samlp:Response>` describing `error`.
    fn create_error_response(
        &self,
        in_response_to: &str,
        destination: &str,
        error: &EngineError,
    ) -> Result<String, EngineError>;

    fn apply_binding(
        &self,
        binding: Binding,
        message: &str,
        destination: &str,
        relay_state: Option<&str>,
        is_response: bool,
    ) -> Result<HttpArgs, EngineError>;
}

/// Detached redirect-binding signature, checked by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectSignature {
    pub sig_alg: String,
    pub signature: String,
}

/// Builds an engine once the registrar has finalized its configuration.
pub trait EngineFactory {
    type Engine: ProtocolEngine + 'static;

    fn build(&self, config: &FinalizedIdpConfig) -> Result<Self::Engine, EngineError>;
}

impl<F, E> EngineFactory for F
where
    F: Fn(&FinalizedIdpConfig) -> Result<E, EngineError>,
    E: ProtocolEngine + 'static,
{
    type Engine = E;

    fn build(&self, config: &FinalizedIdpConfig) -> Result<E, EngineError> {
        self(config)
    }
}
