//! samlbridge: a SAML2 identity-provider frontend that suspends incoming
//! authentication requests behind an opaque continuation token and resumes
//! them once external authentication completes.

pub mod config;
pub mod observability;
pub mod routes;
pub mod saml;

#[cfg(test)]
mod tests;
