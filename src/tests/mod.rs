//! Cross-module tests.
//!
//! These drive the full suspend/resume exchange through the HTTP adapter,
//! starting from a TOML configuration.
