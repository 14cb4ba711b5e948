//! Test port constants for tokbridge-cli tests.
//!
//! One port per test: the tests run in parallel and each launches its own
//! `tokbridge serve-split` subprocess.

pub const TEST_TOKENS_PORT: u16 = 19_330;
pub const TEST_WORDS_PORT: u16 = 19_331;
pub const TEST_CLI_PORT: u16 = 19_332;
pub const TEST_EOF_PORT: u16 = 19_333;
