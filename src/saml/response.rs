//! Resuming a suspended exchange with the result of external authentication.

use super::{
    FrontendError,
    engine::{Attributes, AuthnInfo, NameId, ProtocolEngine, ResponseArgs},
    frontend::RegisteredFrontend,
    http::HttpResponse,
};

/// Outcome of successful external authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResult {
    pub attributes: Attributes,
    pub name_id: NameId,
    pub auth_info: AuthnInfo,
}

impl<E: ProtocolEngine> RegisteredFrontend<E> {
    /// Complete the exchange identified by `state`, answering the original
    /// requester with a signed assertion for `result`.
    ///
    /// Reply arguments are recomputed from the stored request, so the
    /// destination always matches what the engine would pick for it today.
    #[tracing::instrument(name = "saml.authn_response", skip_all)]
    pub async fn handle_authn_response(
        &self,
        state: &str,
        result: AuthenticationResult,
    ) -> Result<HttpResponse, FrontendError> {
        let state = self.codec.decode(state)?;

        let request = self
            .engine
            .authn_request_from_string(&state.origin_authn_req)
            .map_err(|e| {
                tracing::warn!(error = %e, "Stored AuthnRequest no longer parses");
                FrontendError::InvalidContinuation(format!("stored request is unreadable: {e}"))
            })?;

        let response_args = self
            .engine
            .response_args(&request, &self.response_bindings)?;
        tracing::debug!(
            request_id = %request.id,
            destination = %response_args.destination,
            binding = %response_args.binding,
            "Resuming AuthnRequest"
        );

        self.construct_authn_response(
            &result.attributes,
            &result.name_id,
            &result.auth_info,
            &response_args,
            state.relay_state.as_deref(),
            true,
        )
    }

    /// Build, sign and transport-encode an assertion response.
    pub fn construct_authn_response(
        &self,
        identity: &Attributes,
        name_id: &NameId,
        authn: &AuthnInfo,
        args: &ResponseArgs,
        relay_state: Option<&str>,
        sign_response: bool,
    ) -> Result<HttpResponse, FrontendError> {
        let message =
            self.engine
                .create_authn_response(identity, name_id, authn, sign_response, args)?;
        let http_args = self.engine.apply_binding(
            args.binding,
            &message,
            &args.destination,
            relay_state,
            true,
        )?;

        let response = HttpResponse::from_http_args(http_args);
        if let HttpResponse::ServiceError { message } = &response {
            tracing::error!(
                binding = %args.binding,
                destination = %args.destination,
                "{message}"
            );
        } else {
            tracing::info!(
                in_response_to = %args.in_response_to,
                destination = %args.destination,
                "Sending AuthnResponse"
            );
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::saml::{
        binding::Binding,
        engine::EngineError,
        state::{ContinuationCodec, ContinuationState},
        test_utils::{
            FakeEngine, RecordingDispatch, SP_ACS_URL, authentication_result, authn_request,
            register, register_with_codec,
        },
    };

    fn token_for(codec: &ContinuationCodec, relay_state: Option<&str>) -> String {
        let xml = serde_json::to_string(&authn_request("_req1")).unwrap();
        codec
            .encode(&ContinuationState {
                origin_authn_req: xml,
                relay_state: relay_state.map(str::to_string),
            })
            .unwrap()
            .into_inner()
    }

    #[tokio::test]
    async fn test_resume_posts_signed_assertion() {
        let frontend = register(FakeEngine::new(), Arc::new(RecordingDispatch::default()));
        let token = token_for(&ContinuationCodec::new(), Some("xyz"));

        let response = frontend
            .handle_authn_response(&token, authentication_result("alice"))
            .await
            .unwrap();

        let HttpResponse::Content { body, .. } = response else {
            panic!("expected form-post body");
        };
        assert!(body.contains(&format!(r#"action="{SP_ACS_URL}""#)));
        assert!(body.contains(r#"name="RelayState" value="xyz""#));
        assert!(
            frontend
                .engine()
                .calls()
                .contains(&"create_authn_response:alice:signed".to_string())
        );
    }

    #[tokio::test]
    async fn test_resume_without_relay_state() {
        let frontend = register(
            FakeEngine::new().with_acs(Binding::HttpRedirect, SP_ACS_URL),
            Arc::new(RecordingDispatch::default()),
        );
        let token = token_for(&ContinuationCodec::new(), None);

        let response = frontend
            .handle_authn_response(&token, authentication_result("alice"))
            .await
            .unwrap();

        let HttpResponse::Redirect { location } = response else {
            panic!("expected redirect");
        };
        assert!(location.starts_with(SP_ACS_URL));
        assert!(!location.contains("RelayState"));
    }

    #[tokio::test]
    async fn test_garbage_state_rejected() {
        let frontend = register(FakeEngine::new(), Arc::new(RecordingDispatch::default()));
        let result = frontend
            .handle_authn_response("%%%not-a-token", authentication_result("alice"))
            .await;
        assert!(matches!(result, Err(FrontendError::InvalidContinuation(_))));
        assert!(frontend.engine().calls().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_stored_request_rejected() {
        let frontend = register(FakeEngine::new(), Arc::new(RecordingDispatch::default()));
        let token = ContinuationCodec::new()
            .encode(&ContinuationState {
                origin_authn_req: "<samlp:AuthnRequest".into(),
                relay_state: None,
            })
            .unwrap();

        let result = frontend
            .handle_authn_response(token.as_str(), authentication_result("alice"))
            .await;
        assert!(matches!(result, Err(FrontendError::InvalidContinuation(_))));
    }

    #[tokio::test]
    async fn test_signed_state_must_match_key() {
        let frontend = register_with_codec(
            FakeEngine::new(),
            ContinuationCodec::with_signing_key("frontend-key"),
        );
        let forged = token_for(&ContinuationCodec::with_signing_key("other-key"), Some("xyz"));

        let result = frontend
            .handle_authn_response(&forged, authentication_result("alice"))
            .await;
        assert!(matches!(result, Err(FrontendError::InvalidContinuation(_))));

        let genuine = token_for(&ContinuationCodec::with_signing_key("frontend-key"), Some("xyz"));
        assert!(
            frontend
                .handle_authn_response(&genuine, authentication_result("alice"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_engine_failure_during_resume_propagates() {
        let frontend = register(
            FakeEngine::new()
                .with_response_args_error(EngineError::UnknownPrincipal("sp".into())),
            Arc::new(RecordingDispatch::default()),
        );
        let token = token_for(&ContinuationCodec::new(), None);

        let result = frontend
            .handle_authn_response(&token, authentication_result("alice"))
            .await;
        assert!(matches!(result, Err(FrontendError::UnknownPrincipal(_))));
    }

    #[tokio::test]
    async fn test_empty_transport_output_is_service_error() {
        let frontend = register(
            FakeEngine::new().with_empty_transport(),
            Arc::new(RecordingDispatch::default()),
        );
        let token = token_for(&ContinuationCodec::new(), None);

        let response = frontend
            .handle_authn_response(&token, authentication_result("alice"))
            .await
            .unwrap();
        assert_eq!(
            response,
            HttpResponse::service_error("Don't know how to return response")
        );
    }

    #[test]
    fn test_construct_unsigned_response() {
        let frontend = register(FakeEngine::new(), Arc::new(RecordingDispatch::default()));
        let result = authentication_result("bob");
        let args = ResponseArgs {
            binding: Binding::HttpPost,
            destination: SP_ACS_URL.into(),
            in_response_to: "_req9".into(),
            sp_entity_id: None,
            name_id_policy: None,
        };

        let response = frontend
            .construct_authn_response(
                &result.attributes,
                &result.name_id,
                &result.auth_info,
                &args,
                None,
                false,
            )
            .unwrap();

        assert!(matches!(response, HttpResponse::Content { .. }));
        assert!(
            frontend
                .engine()
                .calls()
                .contains(&"create_authn_response:bob:unsigned".to_string())
        );
    }
}
