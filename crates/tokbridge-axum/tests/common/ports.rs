//! Test port constants for tokbridge-axum tests.
//!
//! Centralized port definitions to prevent hardcoded values.

/// Fixed port for the live server test; binds `127.0.0.1` only.
pub const TEST_SERVER_PORT: u16 = 19_310;
