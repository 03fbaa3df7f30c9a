//! SAML2 identity-provider frontend.
//!
//! The frontend receives `<samlp:AuthnRequest>` messages from service
//! providers, suspends them while authentication happens elsewhere, and
//! answers with an assertion once the result comes back:
//!
//! 1. [`SamlFrontend::register_endpoints`] publishes SSO endpoints for each
//!    provider into the engine configuration and returns the routing table.
//! 2. [`RegisteredFrontend::handle_authn_request`] verifies the request and
//!    hands it to an [`AuthDispatch`] together with a [`ContinuationToken`].
//! 3. [`RegisteredFrontend::handle_authn_response`] takes the token back and
//!    produces the signed response.
//!
//! All XML work is delegated to a [`ProtocolEngine`].

pub mod binding;
pub mod engine;
mod error;
pub mod frontend;
pub mod http;
pub mod registrar;
pub mod request;
pub mod response;
pub mod state;

#[cfg(test)]
pub(crate) mod test_utils;

pub use binding::Binding;
pub use engine::{EngineError, EngineFactory, ProtocolEngine};
pub use error::FrontendError;
pub use frontend::{RegisteredFrontend, SamlFrontend};
pub use http::HttpResponse;
pub use registrar::{EndpointRegistrar, RoutingTable};
pub use request::{AuthDispatch, AuthnRequestOutcome, InboundRequest, RequestContext};
pub use response::AuthenticationResult;
pub use state::{ContinuationCodec, ContinuationState, ContinuationToken};
