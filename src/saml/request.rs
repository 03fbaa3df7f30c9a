//! Inbound AuthnRequest handling.
//!
//! A request ends in one of three ways:
//! - rejected with an HTTP error (no payload, unparseable payload);
//! - answered immediately with a SAML error response produced by the engine;
//! - suspended: the original request and relay state are packed into a
//!   continuation token and handed to the [`AuthDispatch`] callback, whose
//!   response is returned verbatim.

use async_trait::async_trait;
use serde::Deserialize;

use super::{
    FrontendError,
    binding::Binding,
    engine::{
        AuthnRequest, Conditions, EngineError, NameIdPolicy, ProtocolEngine, RedirectSignature,
        RequestedAuthnContext, ResponseArgs, Scoping, Subject,
    },
    frontend::RegisteredFrontend,
    http::HttpResponse,
    state::{ContinuationState, ContinuationToken},
};

/// Parameters of an inbound SSO request, from the query string (redirect)
/// or the form body (post).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InboundRequest {
    #[serde(rename = "SAMLRequest")]
    pub saml_request: Option<String>,
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
    /// Out-of-band target entity id; never used to resolve the reply.
    #[serde(rename = "entityID")]
    pub entity_id: Option<String>,
    #[serde(rename = "SigAlg")]
    pub sig_alg: Option<String>,
    #[serde(rename = "Signature")]
    pub signature: Option<String>,
}

impl InboundRequest {
    fn redirect_signature(&self) -> Option<RedirectSignature> {
        match (&self.sig_alg, &self.signature) {
            (Some(sig_alg), Some(signature)) => Some(RedirectSignature {
                sig_alg: sig_alg.clone(),
                signature: signature.clone(),
            }),
            _ => None,
        }
    }
}

/// Request-scoped metadata passed to the dispatch callback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Provider identifier recovered from the request path.
    pub provider: Option<String>,
    /// `entityID` supplied alongside the SAML payload, if any.
    pub target_entity_id: Option<String>,
}

/// Optional AuthnRequest elements the frontend forwards to authentication.
///
/// Absent elements stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestQualifiers {
    pub subject: Option<Subject>,
    pub name_id_policy: Option<NameIdPolicy>,
    pub conditions: Option<Conditions>,
    pub requested_authn_context: Option<RequestedAuthnContext>,
    pub scoping: Option<Scoping>,
    pub force_authn: Option<bool>,
    pub is_passive: Option<bool>,
}

impl RequestQualifiers {
    pub fn from_request(request: &AuthnRequest) -> Self {
        Self {
            subject: request.subject.clone(),
            name_id_policy: request.name_id_policy.clone(),
            conditions: request.conditions.clone(),
            requested_authn_context: request.requested_authn_context.clone(),
            scoping: request.scoping.clone(),
            force_authn: request.force_authn,
            is_passive: request.is_passive,
        }
    }
}

/// Everything the dispatch callback learns about a verified request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAuthnRequest {
    pub response_args: ResponseArgs,
    /// Always `None` for dispatched requests; engine error responses are
    /// answered immediately instead.
    pub error_response: Option<String>,
    pub authn_request: AuthnRequest,
    pub qualifiers: RequestQualifiers,
}

/// Hands a suspended exchange to external authentication.
///
/// The returned response is sent to the client unchanged. The token must
/// come back to [`RegisteredFrontend::handle_authn_response`] once
/// authentication completes.
#[async_trait]
pub trait AuthDispatch: Send + Sync {
    async fn dispatch(
        &self,
        context: RequestContext,
        request: VerifiedAuthnRequest,
        state: ContinuationToken,
    ) -> HttpResponse;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthnRequestOutcome {
    /// Answered with an HTTP error before reaching the engine's response logic.
    Rejected(HttpResponse),
    /// Answered with a SAML error response from the engine.
    Immediate {
        response: HttpResponse,
        response_args: ResponseArgs,
    },
    /// Handed to external authentication; holds the callback's response.
    Suspended(HttpResponse),
}

impl AuthnRequestOutcome {
    pub fn into_http_response(self) -> HttpResponse {
        match self {
            AuthnRequestOutcome::Rejected(response)
            | AuthnRequestOutcome::Immediate { response, .. }
            | AuthnRequestOutcome::Suspended(response) => response,
        }
    }
}

impl<E: ProtocolEngine> RegisteredFrontend<E> {
    /// Handle an inbound AuthnRequest received over `binding_in` (`redirect`
    /// or `post`, as carried by the routing table).
    #[tracing::instrument(
        name = "saml.authn_request",
        skip(self, context, request),
        fields(provider = context.provider.as_deref())
    )]
    pub async fn handle_authn_request(
        &self,
        mut context: RequestContext,
        request: InboundRequest,
        binding_in: &str,
    ) -> Result<AuthnRequestOutcome, FrontendError> {
        let binding = Binding::from_transport(binding_in)?;

        let Some(payload) = request.saml_request.as_deref().filter(|p| !p.is_empty()) else {
            let err = FrontendError::MissingPayload;
            tracing::info!(error = %err, "Rejecting request as unauthenticated");
            return Ok(AuthnRequestOutcome::Rejected(HttpResponse::unauthorized(
                "Unknown user",
            )));
        };

        let authn_request = match self.engine.parse_authn_request(
            payload,
            binding,
            request.redirect_signature().as_ref(),
        ) {
            Ok(authn_request) => authn_request,
            Err(err) => {
                let err = parse_failure(err);
                tracing::error!(error = %err, binding = %binding, "Failed to parse AuthnRequest");
                return Ok(AuthnRequestOutcome::Rejected(HttpResponse::service_error(
                    err.to_string(),
                )));
            }
        };
        tracing::debug!(request_id = %authn_request.id, "Parsed AuthnRequest");

        let issuer = authn_request.issuer.clone().ok_or_else(|| {
            tracing::error!(request_id = %authn_request.id, "AuthnRequest has no issuer");
            FrontendError::DestinationResolution("AuthnRequest has no issuer".to_string())
        })?;

        let (binding_out, destination) = self
            .engine
            .pick_binding(&self.response_bindings, &issuer, &authn_request)
            .map_err(|e| {
                tracing::error!(error = %e, issuer = %issuer, "Couldn't find receiver endpoint");
                FrontendError::DestinationResolution(e.to_string())
            })?;
        tracing::debug!(binding = %binding_out, destination = %destination, "Resolved response destination");

        let response_args = match self
            .engine
            .response_args(&authn_request, &self.response_bindings)
        {
            Ok(args) => args,
            Err(err @ (EngineError::UnknownPrincipal(_) | EngineError::UnsupportedBinding(_))) => {
                tracing::warn!(error = %err, issuer = %issuer, "Answering with SAML error response");
                let message =
                    self.engine
                        .create_error_response(&authn_request.id, &destination, &err)?;
                let http_args = self.engine.apply_binding(
                    binding_out,
                    &message,
                    &destination,
                    request.relay_state.as_deref(),
                    true,
                )?;
                return Ok(AuthnRequestOutcome::Immediate {
                    response: HttpResponse::from_http_args(http_args),
                    response_args: ResponseArgs {
                        binding: binding_out,
                        destination,
                        in_response_to: authn_request.id.clone(),
                        sp_entity_id: Some(issuer),
                        name_id_policy: authn_request.name_id_policy.clone(),
                    },
                });
            }
            Err(err) => return Err(err.into()),
        };

        if let Some(entity_id) = request.entity_id {
            context.target_entity_id = Some(entity_id);
        }

        let token = self.codec.encode(&ContinuationState {
            origin_authn_req: authn_request.xml.clone(),
            relay_state: request.relay_state,
        })?;

        tracing::info!(
            request_id = %authn_request.id,
            issuer = %issuer,
            "Suspending AuthnRequest for external authentication"
        );

        let verified = VerifiedAuthnRequest {
            response_args,
            error_response: None,
            qualifiers: RequestQualifiers::from_request(&authn_request),
            authn_request,
        };
        let response = self.dispatcher.dispatch(context, verified, token).await;
        Ok(AuthnRequestOutcome::Suspended(response))
    }
}

/// Parse failures always surface as a principal or binding problem.
fn parse_failure(err: EngineError) -> FrontendError {
    match err {
        EngineError::UnknownPrincipal(msg) => FrontendError::UnknownPrincipal(msg),
        other => FrontendError::UnsupportedBinding(other.to_string()),
    }
}
