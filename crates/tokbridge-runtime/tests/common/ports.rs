//! Test port constants for tokbridge-runtime tests.

/// Port with no listener, for readiness failures. Nothing in the test suite
/// binds it.
pub const TEST_CLOSED_PORT: u16 = 19_320;
