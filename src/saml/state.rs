//! Continuation state carried across the external authentication step.
//!
//! The token is the only link between the request and response halves of an
//! exchange, which may run on different instances. It is base64 (URL-safe
//! alphabet) of a small JSON object, optionally followed by `.` and an
//! HMAC-SHA256 tag over the encoded payload.

use std::fmt;

use base64::{
    Engine,
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::FrontendError;

type HmacSha256 = Hmac<Sha256>;

const TAG_SEPARATOR: char = '.';

/// Everything needed to resume an exchange after external authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContinuationState {
    /// The original AuthnRequest, verbatim as serialized by the engine.
    pub origin_authn_req: String,
    pub relay_state: Option<String>,
}

/// Opaque, URL-safe encoding of a [`ContinuationState`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encodes and decodes continuation tokens.
#[derive(Clone, Default)]
pub struct ContinuationCodec {
    signing_key: Option<Vec<u8>>,
}

impl fmt::Debug for ContinuationCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContinuationCodec")
            .field("signed", &self.signing_key.is_some())
            .finish()
    }
}

impl ContinuationCodec {
    /// Codec producing unsigned tokens.
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec that tags every token with HMAC-SHA256 under `key`.
    pub fn with_signing_key(key: impl Into<Vec<u8>>) -> Self {
        Self {
            signing_key: Some(key.into()),
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signing_key.is_some()
    }

    pub fn encode(&self, state: &ContinuationState) -> Result<ContinuationToken, FrontendError> {
        let json = serde_json::to_vec(state).map_err(|e| {
            FrontendError::InvalidContinuation(format!("Failed to serialize state: {e}"))
        })?;
        let payload = URL_SAFE.encode(json);

        let token = match &self.signing_key {
            Some(key) => {
                let tag = URL_SAFE_NO_PAD.encode(Self::mac(key, &payload)?.finalize().into_bytes());
                format!("{payload}{TAG_SEPARATOR}{tag}")
            }
            None => payload,
        };
        Ok(ContinuationToken(token))
    }

    pub fn decode(&self, token: &str) -> Result<ContinuationState, FrontendError> {
        let payload = match (&self.signing_key, token.split_once(TAG_SEPARATOR)) {
            (Some(key), Some((payload, tag))) => {
                let tag = URL_SAFE_NO_PAD.decode(tag).map_err(|_| {
                    FrontendError::InvalidContinuation("Malformed integrity tag".to_string())
                })?;
                Self::mac(key, payload)?.verify_slice(&tag).map_err(|_| {
                    FrontendError::InvalidContinuation("Integrity check failed".to_string())
                })?;
                payload
            }
            (Some(_), None) => {
                return Err(FrontendError::InvalidContinuation(
                    "Missing integrity tag".to_string(),
                ));
            }
            (None, Some(_)) => {
                return Err(FrontendError::InvalidContinuation(
                    "Unexpected integrity tag".to_string(),
                ));
            }
            (None, None) => token,
        };

        let json = URL_SAFE.decode(payload).map_err(|e| {
            FrontendError::InvalidContinuation(format!("Token is not valid base64: {e}"))
        })?;
        let state: ContinuationState = serde_json::from_slice(&json).map_err(|e| {
            FrontendError::InvalidContinuation(format!("Token does not hold a valid state: {e}"))
        })?;

        if state.origin_authn_req.trim().is_empty() {
            return Err(FrontendError::InvalidContinuation(
                "Token holds an empty authentication request".to_string(),
            ));
        }
        Ok(state)
    }

    fn mac(key: &[u8], payload: &str) -> Result<HmacSha256, FrontendError> {
        let mut mac = HmacSha256::new_from_slice(key).map_err(|e| {
            FrontendError::Configuration(format!("Invalid continuation signing key: {e}"))
        })?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }
}
