//! HTTP adapter exposing a registered SAML frontend as an axum router.
//!
//! Routes are matched against the frontend's own routing table rather than
//! axum's path router, so provider alternation and trailing segments behave
//! exactly as registered.

use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{OriginalUri, State, rejection::FormRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::saml::{
    InboundRequest, ProtocolEngine, RegisteredFrontend, RequestContext,
    registrar::RouteHandler,
};

/// Build a router serving every route registered on `frontend`.
pub fn saml_router<E: ProtocolEngine + 'static>(frontend: Arc<RegisteredFrontend<E>>) -> Router {
    Router::new()
        .fallback(saml_endpoint::<E>)
        .with_state(frontend)
}

async fn saml_endpoint<E: ProtocolEngine + 'static>(
    State(frontend): State<Arc<RegisteredFrontend<E>>>,
    OriginalUri(uri): OriginalUri,
    form: Result<Form<InboundRequest>, FormRejection>,
) -> Response {
    // An unreadable body carries no payload; the handler answers 401 for that
    let request = match form {
        Ok(Form(request)) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unreadable SAML request parameters");
            InboundRequest::default()
        }
    };

    let Some(matched) = frontend.routes().match_path(uri.path()) else {
        tracing::debug!(path = %uri.path(), "No SAML route matched");
        return not_found();
    };

    let context = RequestContext {
        provider: Some(matched.provider.clone()),
        target_entity_id: None,
    };
    let binding = matched.route.binding;

    match matched.route.handler {
        RouteHandler::AuthnRequest => {
            match frontend
                .handle_authn_request(context, request, binding)
                .await
            {
                Ok(outcome) => outcome.into_http_response().into_response(),
                Err(e) => e.into_response(),
            }
        }
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": {
                "code": "not_found",
                "message": "No SAML endpoint at this path",
            }
        })),
    )
        .into_response()
}
