//! In-memory protocol engine and dispatch callback for tests.
//!
//! `FakeEngine` treats the transport payload as URL-safe base64 of the JSON
//! serialization of an [`AuthnRequest`], and that JSON stands in for the
//! request XML. Outgoing messages are URL-safe base64 as well, so tests can
//! assert on the whole exchange without XML or percent-encoding.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::json;

use super::{
    binding::{Binding, HTTP_REDIRECT_URN},
    engine::{
        Attributes, AuthnInfo, AuthnRequest, EngineError, HttpArgs, NameId, ProtocolEngine,
        RedirectSignature, ResponseArgs,
    },
    frontend::{RegisteredFrontend, SamlFrontend},
    http::HttpResponse,
    registrar::FinalizedIdpConfig,
    request::{AuthDispatch, RequestContext, VerifiedAuthnRequest},
    response::AuthenticationResult,
    state::{ContinuationCodec, ContinuationToken},
};
use crate::config::{FrontendConfig, SINGLE_SIGN_ON_SERVICE};

pub const SP_ENTITY_ID: &str = "https://sp.example.com/metadata";
pub const SP_ACS_URL: &str = "https://sp.example.com/acs";
pub const BACKEND_LOGIN_URL: &str = "https://backend.example.org/login";

/// Frontend config publishing SSO over redirect at `/proxy/{provider}/sso`.
pub fn frontend_config() -> FrontendConfig {
    FrontendConfig::new(
        json!({
            "entityid": "https://proxy.example.org/idp",
            "service": { "idp": { "name": "Proxy IdP" } }
        }),
        BTreeMap::from([(
            SINGLE_SIGN_ON_SERVICE.to_string(),
            BTreeMap::from([(HTTP_REDIRECT_URN.to_string(), "sso".to_string())]),
        )]),
        "/proxy",
    )
    .expect("test frontend config is valid")
}

pub fn authn_request(id: &str) -> AuthnRequest {
    AuthnRequest {
        id: id.to_string(),
        issuer: Some(SP_ENTITY_ID.to_string()),
        destination: Some("https://proxy.example.org/idpA/sso".to_string()),
        assertion_consumer_service_url: None,
        protocol_binding: None,
        subject: None,
        name_id_policy: None,
        conditions: None,
        requested_authn_context: None,
        scoping: None,
        force_authn: None,
        is_passive: None,
        xml: String::new(),
    }
}

/// Transport payload understood by [`FakeEngine::parse_authn_request`].
pub fn payload(request: &AuthnRequest) -> String {
    URL_SAFE_NO_PAD.encode(serde_json::to_string(request).expect("request serializes"))
}

pub fn authentication_result(user: &str) -> AuthenticationResult {
    AuthenticationResult {
        attributes: Attributes::from([
            ("uid".to_string(), vec![user.to_string()]),
            ("mail".to_string(), vec![format!("{user}@example.org")]),
        ]),
        name_id: NameId::new(user),
        auth_info: AuthnInfo {
            class_ref: "urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport"
                .to_string(),
            authenticating_authority: Some("https://upstream.example.org/idp".to_string()),
            instant: None,
        },
    }
}

/// Register `frontend_config()` for providers `idpA` and `idpB`.
pub fn register(
    engine: FakeEngine,
    dispatch: Arc<RecordingDispatch>,
) -> RegisteredFrontend<FakeEngine> {
    register_frontend(SamlFrontend::new(frontend_config()).unwrap(), engine, dispatch)
}

pub fn register_with_codec(
    engine: FakeEngine,
    codec: ContinuationCodec,
) -> RegisteredFrontend<FakeEngine> {
    register_frontend(
        SamlFrontend::new(frontend_config()).unwrap().with_codec(codec),
        engine,
        Arc::new(RecordingDispatch::default()),
    )
}

fn register_frontend(
    frontend: SamlFrontend,
    engine: FakeEngine,
    dispatch: Arc<RecordingDispatch>,
) -> RegisteredFrontend<FakeEngine> {
    let engine = Mutex::new(Some(engine));
    frontend
        .register_endpoints(
            &["idpA".to_string(), "idpB".to_string()],
            &|config: &FinalizedIdpConfig| -> Result<FakeEngine, EngineError> {
                let engine = engine.lock().unwrap().take().expect("factory called once");
                Ok(engine.with_config(config.clone()))
            },
            dispatch,
        )
        .unwrap()
}

/// Scriptable [`ProtocolEngine`] that records every call.
#[derive(Debug)]
pub struct FakeEngine {
    acs: BTreeMap<String, (Binding, String)>,
    parse_error: Option<EngineError>,
    response_args_error: Option<EngineError>,
    empty_transport: bool,
    config: Option<FinalizedIdpConfig>,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEngine {
    /// Knows one SP, answered over form-post at [`SP_ACS_URL`].
    pub fn new() -> Self {
        Self {
            acs: BTreeMap::from([(
                SP_ENTITY_ID.to_string(),
                (Binding::HttpPost, SP_ACS_URL.to_string()),
            )]),
            parse_error: None,
            response_args_error: None,
            empty_transport: false,
            config: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_acs(mut self, binding: Binding, url: &str) -> Self {
        self.acs
            .insert(SP_ENTITY_ID.to_string(), (binding, url.to_string()));
        self
    }

    pub fn without_acs(mut self) -> Self {
        self.acs.clear();
        self
    }

    pub fn with_parse_error(mut self, error: EngineError) -> Self {
        self.parse_error = Some(error);
        self
    }

    pub fn with_response_args_error(mut self, error: EngineError) -> Self {
        self.response_args_error = Some(error);
        self
    }

    /// `apply_binding` returns neither a body nor a `Location`.
    pub fn with_empty_transport(mut self) -> Self {
        self.empty_transport = true;
        self
    }

    pub fn with_config(mut self, config: FinalizedIdpConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn config(&self) -> Option<&FinalizedIdpConfig> {
        self.config.as_ref()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn parse(&self, xml: &str) -> Result<AuthnRequest, EngineError> {
        let mut request: AuthnRequest = serde_json::from_str(xml)
            .map_err(|e| EngineError::InvalidMessage(e.to_string()))?;
        request.xml = xml.to_string();
        Ok(request)
    }
}

impl ProtocolEngine for FakeEngine {
    fn parse_authn_request(
        &self,
        payload: &str,
        binding: Binding,
        signature: Option<&RedirectSignature>,
    ) -> Result<AuthnRequest, EngineError> {
        let signed = if signature.is_some() { "signed" } else { "unsigned" };
        self.record(format!(
            "parse_authn_request:{}:{signed}",
            binding.transport_name()
        ));
        if let Some(err) = &self.parse_error {
            return Err(err.clone());
        }
        let decoded = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| EngineError::InvalidMessage(e.to_string()))?;
        let xml =
            String::from_utf8(decoded).map_err(|e| EngineError::InvalidMessage(e.to_string()))?;
        self.parse(&xml)
    }

    fn authn_request_from_string(&self, xml: &str) -> Result<AuthnRequest, EngineError> {
        self.record("authn_request_from_string".to_string());
        self.parse(xml)
    }

    fn pick_binding(
        &self,
        bindings: &[Binding],
        entity_id: &str,
        _request: &AuthnRequest,
    ) -> Result<(Binding, String), EngineError> {
        self.record(format!("pick_binding:{entity_id}"));
        match self.acs.get(entity_id) {
            Some((binding, url)) if bindings.contains(binding) => Ok((*binding, url.clone())),
            Some((binding, _)) => Err(EngineError::UnsupportedBinding(binding.to_string())),
            None => Err(EngineError::NoEndpoint(entity_id.to_string())),
        }
    }

    fn response_args(
        &self,
        request: &AuthnRequest,
        bindings: &[Binding],
    ) -> Result<ResponseArgs, EngineError> {
        self.record("response_args".to_string());
        if let Some(err) = &self.response_args_error {
            return Err(err.clone());
        }
        let issuer = request
            .issuer
            .as_deref()
            .ok_or_else(|| EngineError::InvalidMessage("no issuer".into()))?;
        let (binding, destination) = self.pick_binding(bindings, issuer, request)?;
        Ok(ResponseArgs {
            binding,
            destination,
            in_response_to: request.id.clone(),
            sp_entity_id: Some(issuer.to_string()),
            name_id_policy: request.name_id_policy.clone(),
        })
    }

    fn create_authn_response(
        &self,
        identity: &Attributes,
        name_id: &NameId,
        _authn: &AuthnInfo,
        sign_response: bool,
        args: &ResponseArgs,
    ) -> Result<String, EngineError> {
        let signed = if sign_response { "signed" } else { "unsigned" };
        self.record(format!("create_authn_response:{}:{signed}", name_id.value));
        Ok(format!(
            r#"<samlp:Response InResponseTo="{}" Destination="{}"><saml:NameID>{}</saml:NameID><attributes>{}</attributes></samlp:Response>"#,
            args.in_response_to,
            args.destination,
            name_id.value,
            identity.len()
        ))
    }

    fn create_error_response(
        &self,
        in_response_to: &str,
        destination: &str,
        error: &EngineError,
    ) -> Result<String, EngineError> {
        self.record(format!("create_error_response:{in_response_to}"));
        Ok(format!(
            r#"<samlp:Response InResponseTo="{in_response_to}" Destination="{destination}"><samlp:Status>{error}</samlp:Status></samlp:Response>"#
        ))
    }

    fn apply_binding(
        &self,
        binding: Binding,
        message: &str,
        destination: &str,
        relay_state: Option<&str>,
        is_response: bool,
    ) -> Result<HttpArgs, EngineError> {
        self.record(format!("apply_binding:{}", binding.transport_name()));
        if self.empty_transport {
            return Ok(HttpArgs::default());
        }
        let param = if is_response { "SAMLResponse" } else { "SAMLRequest" };
        let encoded = URL_SAFE_NO_PAD.encode(message);
        Ok(match binding {
            Binding::HttpRedirect => {
                let mut location = format!("{destination}?{param}={encoded}");
                if let Some(relay_state) = relay_state {
                    location.push_str(&format!("&RelayState={relay_state}"));
                }
                HttpArgs {
                    headers: vec![("Location".to_string(), location)],
                    data: None,
                }
            }
            Binding::HttpPost => {
                let relay = relay_state
                    .map(|rs| format!(r#"<input type="hidden" name="RelayState" value="{rs}"/>"#))
                    .unwrap_or_default();
                HttpArgs {
                    headers: vec![(
                        "Content-Type".to_string(),
                        "text/html; charset=utf-8".to_string(),
                    )],
                    data: Some(format!(
                        r#"<html><body onload="document.forms[0].submit()"><form method="post" action="{destination}"><input type="hidden" name="{param}" value="{encoded}"/>{relay}</form></body></html>"#
                    )),
                }
            }
        })
    }
}

/// Records dispatched requests and redirects to a fixed backend login page.
#[derive(Default)]
pub struct RecordingDispatch {
    calls: Mutex<Vec<(RequestContext, VerifiedAuthnRequest, ContinuationToken)>>,
}

impl RecordingDispatch {
    pub fn calls(&self) -> Vec<(RequestContext, VerifiedAuthnRequest, ContinuationToken)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthDispatch for RecordingDispatch {
    async fn dispatch(
        &self,
        context: RequestContext,
        request: VerifiedAuthnRequest,
        state: ContinuationToken,
    ) -> HttpResponse {
        let location = format!("{BACKEND_LOGIN_URL}?state={state}");
        self.calls.lock().unwrap().push((context, request, state));
        HttpResponse::Redirect { location }
    }
}
