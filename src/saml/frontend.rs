use std::sync::Arc;

use super::{
    FrontendError,
    binding::Binding,
    engine::{EngineFactory, ProtocolEngine},
    registrar::{EndpointRegistrar, RoutingTable},
    request::AuthDispatch,
    state::ContinuationCodec,
};
use crate::config::{BridgeConfig, FrontendConfig};

/// SAML identity-provider frontend before endpoint registration.
///
/// Holds validated configuration only. Call [`SamlFrontend::register_endpoints`]
/// once per provider set to obtain a [`RegisteredFrontend`] that can serve
/// requests.
#[derive(Debug, Clone)]
pub struct SamlFrontend {
    config: FrontendConfig,
    codec: ContinuationCodec,
}

impl SamlFrontend {
    pub fn new(config: FrontendConfig) -> Result<Self, FrontendError> {
        config.validate().map_err(FrontendError::Configuration)?;
        Ok(Self {
            config,
            codec: ContinuationCodec::new(),
        })
    }

    /// Build from a loaded configuration file, including token signing.
    pub fn from_config(config: &BridgeConfig) -> Result<Self, FrontendError> {
        let frontend = Self::new(config.frontend.clone())?;
        Ok(match &config.continuation.signing_key {
            Some(key) => frontend.with_codec(ContinuationCodec::with_signing_key(key.as_bytes())),
            None => frontend,
        })
    }

    pub fn with_codec(mut self, codec: ContinuationCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn config(&self) -> &FrontendConfig {
        &self.config
    }

    pub fn codec(&self) -> &ContinuationCodec {
        &self.codec
    }

    /// Publish endpoints for `providers`, build the engine, and return a frontend
    /// ready to serve the resulting routing table.
    pub fn register_endpoints<F: EngineFactory>(
        &self,
        providers: &[String],
        factory: &F,
        dispatcher: Arc<dyn AuthDispatch>,
    ) -> Result<RegisteredFrontend<F::Engine>, FrontendError> {
        let registration = EndpointRegistrar::new(&self.config).register(providers)?;

        let engine = factory.build(&registration.idp_config).map_err(|e| {
            FrontendError::Configuration(format!("Failed to build SAML protocol engine: {e}"))
        })?;

        tracing::info!(
            providers = ?providers,
            routes = registration.routes.len(),
            signed_state = self.codec.is_signed(),
            "SAML frontend registered"
        );

        Ok(RegisteredFrontend {
            engine: Arc::new(engine),
            routes: registration.routes,
            response_bindings: self.config.response_bindings.clone(),
            codec: self.codec.clone(),
            dispatcher,
        })
    }
}

/// A frontend bound to one provider set and one engine instance.
///
/// Immutable after construction; the request and response handlers take
/// `&self` and may run concurrently.
pub struct RegisteredFrontend<E> {
    pub(super) engine: Arc<E>,
    pub(super) routes: RoutingTable,
    pub(super) response_bindings: Vec<Binding>,
    pub(super) codec: ContinuationCodec,
    pub(super) dispatcher: Arc<dyn AuthDispatch>,
}

impl<E: ProtocolEngine> RegisteredFrontend<E> {
    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn codec(&self) -> &ContinuationCodec {
        &self.codec
    }
}
