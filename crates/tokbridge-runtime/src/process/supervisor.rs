//! Supervisor for one tokenizer server subprocess.
//!
//! The supervisor owns the child's stdin; a background exit observer owns the
//! child itself. Callers never block on the child: they read the phase from a
//! watch channel that the observer flips to [`ServerPhase::Stopped`] exactly
//! once, and they request a forced stop by cancelling the observer's token.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tokbridge_core::{HEALTHZ_PATH, STOP_KEYWORD, SupervisorError, TOKENIZE_PATH, TokenizeRequest};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::ServerPhase;
use super::shutdown::shutdown_child;
use crate::command::{CmdOptions, spawn_log_readers};
use crate::config::TokenizerConfig;
use crate::health::wait_for_health;

/// Launches a tokenizer server command and talks to it over loopback HTTP.
///
/// A supervisor is single use: once it leaves [`ServerPhase::NotStarted`] it
/// can never be started again. Build a new one to restart.
///
/// # Example
///
/// ```ignore
/// let server = CmdTokenizerServer::new(CmdOptions::new("./engine"), 9999, TokenizerConfig::default())?;
/// server.start().await?;
/// let tokens: TokenizeResponse<Vec<Token>> = server.tokenize("my example").await?;
/// server.stop_and_wait(Duration::from_secs(15)).await?;
/// ```
pub struct CmdTokenizerServer {
    options: CmdOptions,
    port: u16,
    config: TokenizerConfig,
    client: Client,
    phase: Arc<watch::Sender<ServerPhase>>,
    stdin: Mutex<Option<ChildStdin>>,
    kill: CancellationToken,
    stop_requested: AtomicBool,
}

impl CmdTokenizerServer {
    /// Create a supervisor in the `NotStarted` phase. Nothing is spawned yet.
    pub fn new(
        options: CmdOptions,
        port: u16,
        config: TokenizerConfig,
    ) -> Result<Self, SupervisorError> {
        let client = build_client(config.request_timeout)?;
        let (phase, _) = watch::channel(ServerPhase::NotStarted);

        Ok(Self {
            options,
            port,
            config,
            client,
            phase: Arc::new(phase),
            stdin: Mutex::new(None),
            kill: CancellationToken::new(),
            stop_requested: AtomicBool::new(false),
        })
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    pub const fn options(&self) -> &CmdOptions {
        &self.options
    }

    /// Spawn the process and wait until `/healthz` reports ready.
    ///
    /// On [`SupervisorError::ReadinessTimeout`] the process is left running;
    /// call [`force_stop`](Self::force_stop) to get rid of it.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let claimed = self.phase.send_if_modified(|phase| {
            if *phase == ServerPhase::NotStarted {
                *phase = ServerPhase::Starting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(SupervisorError::AlreadyStarted);
        }

        info!(command = %self.options, port = self.port, "Starting tokenizer server");

        let mut child = match self.options.command().spawn() {
            Ok(child) => child,
            Err(e) => {
                self.phase.send_replace(ServerPhase::Stopped);
                return Err(self.launch_error(e.to_string()));
            }
        };

        let Some(stdin) = child.stdin.take() else {
            if let Err(e) = shutdown_child(&mut child, self.config.kill_grace).await {
                warn!(port = self.port, error = %e, "Failed to reap tokenizer server without stdin");
            }
            self.phase.send_replace(ServerPhase::Stopped);
            return Err(self.launch_error("stdin is not piped".to_string()));
        };
        *self.stdin.lock().await = Some(stdin);

        debug!(port = self.port, pid = ?child.id(), "Tokenizer server spawned");
        spawn_log_readers(&mut child, self.port);
        self.spawn_exit_observer(child);

        let url = self.uri_for(HEALTHZ_PATH);
        let mut phase_rx = self.phase.subscribe();
        let exited = async move {
            let _ = phase_rx.wait_for(|phase| *phase == ServerPhase::Stopped).await;
        };

        tokio::select! {
            result = wait_for_health(&self.client, &url, &self.config.health) => {
                if let Err(e) = result {
                    warn!(port = self.port, error = %e, "Tokenizer server did not become ready");
                    return Err(e);
                }
            }
            () = exited => {
                warn!(port = self.port, "Tokenizer server exited before becoming ready");
                return Err(SupervisorError::ExitedDuringStartup);
            }
        }

        self.phase.send_if_modified(|phase| {
            if *phase == ServerPhase::Starting {
                *phase = ServerPhase::Ready;
                true
            } else {
                false
            }
        });
        info!(port = self.port, "Tokenizer server started");
        Ok(())
    }

    /// Ask the server to shut down by writing the stop keyword to its stdin.
    ///
    /// Does not wait for the process to exit.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        if self.phase() == ServerPhase::NotStarted {
            return Err(SupervisorError::NotStarted);
        }
        self.stop_requested.store(true, Ordering::SeqCst);

        let mut guard = self.stdin.lock().await;
        let Some(stdin) = guard.as_mut() else {
            return Err(SupervisorError::StdinClosed("pipe already closed".to_string()));
        };

        let line = format!("{STOP_KEYWORD}\n");
        let written = match stdin.write_all(line.as_bytes()).await {
            Ok(()) => stdin.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            // A broken pipe stays broken.
            *guard = None;
            return Err(SupervisorError::StdinClosed(e.to_string()));
        }

        debug!(port = self.port, "Sent stop keyword to tokenizer server");
        Ok(())
    }

    /// Whether the process is live as far as the exit observer knows.
    pub fn is_running(&self) -> bool {
        self.phase().is_running()
    }

    pub fn phase(&self) -> ServerPhase {
        *self.phase.borrow()
    }

    /// Wait until the exit observer reports the process gone.
    ///
    /// Returns `false` if it is still running after `timeout`. A supervisor
    /// that was never started counts as stopped.
    pub async fn wait_stopped(&self, timeout: Duration) -> bool {
        let mut rx = self.phase.subscribe();
        let stopped = async move {
            let _ = rx.wait_for(|phase| !phase.is_running()).await;
        };
        tokio::time::timeout(timeout, stopped).await.is_ok()
    }

    /// [`stop`](Self::stop), then wait up to `grace` for the process to exit.
    pub async fn stop_and_wait(&self, grace: Duration) -> Result<(), SupervisorError> {
        self.stop().await?;
        if self.wait_stopped(grace).await {
            Ok(())
        } else {
            Err(SupervisorError::StillRunning(grace))
        }
    }

    /// Terminate the process without going through the stop keyword.
    ///
    /// The observer sends SIGTERM, escalates to SIGKILL after the configured
    /// kill grace and reaps the child. Returns immediately.
    pub fn force_stop(&self) -> Result<(), SupervisorError> {
        if self.phase() == ServerPhase::NotStarted {
            return Err(SupervisorError::NotStarted);
        }
        self.kill.cancel();
        Ok(())
    }

    /// `POST /tokenize` and decode the body into `T`.
    pub async fn tokenize<T: DeserializeOwned>(&self, text: &str) -> Result<T, SupervisorError> {
        let url = self.uri_for(TOKENIZE_PATH);

        let response = self
            .client
            .post(&url)
            .json(&TokenizeRequest::new(text))
            .send()
            .await
            .map_err(|e| SupervisorError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SupervisorError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(SupervisorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| SupervisorError::Decode {
            message: e.to_string(),
            body,
        })
    }

    /// Absolute loopback URL of `path` on this server.
    pub fn uri_for(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.port)
    }

    fn launch_error(&self, reason: String) -> SupervisorError {
        error!(command = %self.options, reason = %reason, "Failed to launch tokenizer server");
        SupervisorError::Launch {
            program: self.options.program().to_string(),
            reason,
        }
    }

    fn spawn_exit_observer(&self, mut child: Child) {
        let phase = Arc::clone(&self.phase);
        let kill = self.kill.clone();
        let kill_grace = self.config.kill_grace;
        let port = self.port;

        tokio::spawn(async move {
            let exited = tokio::select! {
                status = child.wait() => Some(status),
                () = kill.cancelled() => None,
            };

            let status = match exited {
                Some(status) => status,
                None => {
                    warn!(port, "Force stopping tokenizer server");
                    shutdown_child(&mut child, kill_grace).await
                }
            };

            match status {
                Ok(status) if status.success() => info!(port, "Tokenizer server exited"),
                Ok(status) => warn!(port, %status, "Tokenizer server exited abnormally"),
                Err(e) => error!(port, error = %e, "Failed to wait for tokenizer server"),
            }

            phase.send_replace(ServerPhase::Stopped);
        });
    }
}

impl Drop for CmdTokenizerServer {
    fn drop(&mut self) {
        // Nobody can stop an unreachable process, so take it down with us.
        if self.is_running() && !self.stop_requested.load(Ordering::SeqCst) {
            debug!(port = self.port, "Supervisor dropped while server running, force stopping");
            self.kill.cancel();
        }
    }
}

fn build_client(timeout: Option<Duration>) -> Result<Client, SupervisorError> {
    // Loopback only; an HTTP_PROXY in the environment must not apply.
    let mut builder = Client::builder().no_proxy();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| SupervisorError::Client(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(program: &str) -> CmdTokenizerServer {
        CmdTokenizerServer::new(CmdOptions::new(program), 9, TokenizerConfig::default()).unwrap()
    }

    #[test]
    fn uri_for_uses_loopback_and_port() {
        let server = CmdTokenizerServer::new(
            CmdOptions::new("engine"),
            9001,
            TokenizerConfig::default(),
        )
        .unwrap();
        assert_eq!(server.uri_for("/healthz"), "http://127.0.0.1:9001/healthz");
        assert_eq!(server.uri_for(TOKENIZE_PATH), "http://127.0.0.1:9001/tokenize");
    }

    #[tokio::test]
    async fn new_supervisor_is_not_running() {
        let server = server("engine");
        assert_eq!(server.phase(), ServerPhase::NotStarted);
        assert!(!server.is_running());
        assert!(server.wait_stopped(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn stop_before_start_is_not_started() {
        let server = server("engine");
        assert!(matches!(server.stop().await, Err(SupervisorError::NotStarted)));
        assert!(matches!(server.force_stop(), Err(SupervisorError::NotStarted)));
    }

    #[tokio::test]
    async fn missing_program_is_launch_error_and_terminal() {
        let server = server("/nonexistent/tokbridge-engine");

        let err = server.start().await.unwrap_err();
        match err {
            SupervisorError::Launch { program, .. } => {
                assert_eq!(program, "/nonexistent/tokbridge-engine");
            }
            other => panic!("expected Launch, got {other:?}"),
        }
        assert_eq!(server.phase(), ServerPhase::Stopped);

        // No resurrection.
        assert!(matches!(server.start().await, Err(SupervisorError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn tokenize_against_closed_port_is_transport_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let server =
            CmdTokenizerServer::new(CmdOptions::new("engine"), port, TokenizerConfig::default())
                .unwrap();

        let err = server
            .tokenize::<serde_json::Value>("my example")
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::Transport(_)));
    }
}
