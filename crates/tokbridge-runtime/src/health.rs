//! Health check utilities for tokenizer servers.
//!
//! A server is ready once `GET /healthz` answers a success status whose body
//! starts with the readiness token line. Anything else, including connection
//! refused while the process is still binding, counts as "not yet".

use reqwest::Client;
use tokbridge_core::{READINESS_TOKEN, SupervisorError, first_line};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::HealthPolicy;

/// Make a single health check.
///
/// Returns `Ok(false)` for a reachable server that is not ready and `Err` for
/// transport failures.
pub async fn check_health(client: &Client, url: &str) -> Result<bool, reqwest::Error> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        debug!(status = %status, "Health check returned non-success status");
        return Ok(false);
    }
    let body = response.text().await?;
    Ok(first_line(&body) == READINESS_TOKEN)
}

/// Poll `url` with a fixed interval until it reports ready.
///
/// Sleeps before every check, so a server is never checked the instant it
/// was spawned. Fails with [`SupervisorError::ReadinessTimeout`] once
/// `policy.max_attempts` checks have failed. Never retries beyond that.
pub async fn wait_for_health(
    client: &Client,
    url: &str,
    policy: &HealthPolicy,
) -> Result<(), SupervisorError> {
    debug!(url = %url, attempts = policy.max_attempts, interval = ?policy.interval, "Waiting for tokenizer server");

    for attempt in 1..=policy.max_attempts {
        sleep(policy.interval).await;

        match check_health(client, url).await {
            Ok(true) => {
                info!(url = %url, attempt, "Tokenizer server is ready");
                return Ok(());
            }
            Ok(false) => debug!(attempt, "Tokenizer server not ready, retrying..."),
            Err(e) => debug!(attempt, error = %e, "Health check failed, retrying..."),
        }
    }

    Err(SupervisorError::ReadinessTimeout {
        path: url.to_string(),
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    /// Reserve a port nothing listens on.
    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn check_of_closed_port_is_transport_error() {
        let url = format!("http://127.0.0.1:{}/healthz", closed_port());
        assert!(check_health(&client(), &url).await.is_err());
    }

    #[tokio::test]
    async fn wait_gives_up_after_budget() {
        let url = format!("http://127.0.0.1:{}/healthz", closed_port());
        let policy = HealthPolicy::new(Duration::from_millis(10), 3);

        let started = std::time::Instant::now();
        let err = wait_for_health(&client(), &url, &policy).await.unwrap_err();

        assert!(started.elapsed() >= Duration::from_millis(30));
        match err {
            SupervisorError::ReadinessTimeout { attempts, path } => {
                assert_eq!(attempts, 3);
                assert!(path.ends_with("/healthz"));
            }
            other => panic!("expected ReadinessTimeout, got {other:?}"),
        }
    }
}
