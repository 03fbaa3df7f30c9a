//! SAML protocol bindings and their transport names.
//!
//! Routes carry the short transport name (`redirect`, `post`); the protocol
//! engine only ever sees the canonical binding.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::FrontendError;

pub const HTTP_REDIRECT_URN: &str = "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect";
pub const HTTP_POST_URN: &str = "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST";

/// A SAML 2.0 transport binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Binding {
    #[serde(rename = "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect", alias = "redirect")]
    HttpRedirect,
    #[serde(rename = "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST", alias = "post")]
    HttpPost,
}

impl Binding {
    /// Canonical binding URN.
    pub fn urn(&self) -> &'static str {
        match self {
            Binding::HttpRedirect => HTTP_REDIRECT_URN,
            Binding::HttpPost => HTTP_POST_URN,
        }
    }

    /// Short name used in routing tables.
    pub fn transport_name(&self) -> &'static str {
        match self {
            Binding::HttpRedirect => "redirect",
            Binding::HttpPost => "post",
        }
    }

    /// Map a transport name as received from the routing layer.
    pub fn from_transport(name: &str) -> Result<Self, FrontendError> {
        match name {
            "redirect" => Ok(Binding::HttpRedirect),
            "post" => Ok(Binding::HttpPost),
            other => Err(FrontendError::UnknownBinding(other.to_string())),
        }
    }

    /// Map a binding URN from configuration.
    pub fn from_urn(urn: &str) -> Result<Self, FrontendError> {
        match urn {
            HTTP_REDIRECT_URN => Ok(Binding::HttpRedirect),
            HTTP_POST_URN => Ok(Binding::HttpPost),
            other => Err(FrontendError::UnknownBinding(other.to_string())),
        }
    }
}

impl FromStr for Binding {
    type Err = FrontendError;

    /// Accepts either the URN or the short transport name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Binding::from_urn(s).or_else(|_| Binding::from_transport(s))
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.urn())
    }
}
