//! Shared harness for supervisor tests.
//!
//! The supervised child is a plain shell loop that exits on `stop`; the HTTP
//! side is an in-process tokbridge-axum server on a free port. Together they
//! behave like a real tokenizer server from the supervisor's point of view.

#![allow(dead_code)]

pub mod ports;

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokbridge_axum::{ServerHandle, TokenizerServer};
use tokbridge_core::TokenizerEngine;
use tokbridge_runtime::{CmdOptions, HealthPolicy, TokenizerConfig};

/// Child that idles until it reads the stop keyword.
pub fn stop_aware_child() -> CmdOptions {
    CmdOptions::new("sh").with_args([
        "-c",
        r#"while read line; do [ "$line" = stop ] && exit 0; done"#,
    ])
}

/// Child that ignores its stdin entirely.
pub fn deaf_child() -> CmdOptions {
    CmdOptions::new("sleep").with_arg("30")
}

/// Fast polling and short grace periods.
pub fn fast_config() -> TokenizerConfig {
    TokenizerConfig::default()
        .with_health(HealthPolicy::new(Duration::from_millis(20), 50))
        .with_stop_grace(Duration::from_secs(5))
        .with_kill_grace(Duration::from_secs(1))
}

pub async fn serve<E: TokenizerEngine>(engine: E) -> ServerHandle {
    TokenizerServer::bind(Arc::new(engine), SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .unwrap()
        .spawn()
}
