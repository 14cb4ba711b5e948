//! [`Tokenizer`] backed by a supervised tokenizer server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokbridge_core::{SupervisorError, Token, TokenizeResponse, Tokenizer, TokenizerError};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::command::CmdOptions;
use crate::config::TokenizerConfig;
use crate::process::CmdTokenizerServer;

/// Converts an engine specific `/tokenize` payload into [`Token`]s.
pub trait TokenAdapter: Send + Sync + 'static {
    /// Shape the server's JSON body is decoded into.
    type Response: DeserializeOwned + Send;

    /// `input` is the text that was tokenized, for offset validation.
    fn to_tokens(&self, response: Self::Response, input: &str)
    -> Result<Vec<Token>, TokenizerError>;
}

/// Adapter for servers that already answer `{"tokens": [Token, ...]}`.
///
/// Rejects tokens whose span does not fit the input.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenListAdapter;

impl TokenAdapter for TokenListAdapter {
    type Response = TokenizeResponse<Vec<Token>>;

    fn to_tokens(
        &self,
        response: Self::Response,
        input: &str,
    ) -> Result<Vec<Token>, TokenizerError> {
        for token in &response.tokens {
            token
                .check_span(input)
                .map_err(|e| TokenizerError::InvalidResponse(e.to_string()))?;
        }
        Ok(response.tokens)
    }
}

/// Tokenizer whose engine runs in a subprocess started on `setup`.
///
/// Every `setup` after a cleanup builds a fresh [`CmdTokenizerServer`];
/// stopped supervisors are never reused.
pub struct ServerTokenizer<A = TokenListAdapter> {
    name: String,
    options: CmdOptions,
    port: u16,
    config: TokenizerConfig,
    adapter: A,
    server: RwLock<Option<Arc<CmdTokenizerServer>>>,
    /// Serializes `setup` calls; `server` is only locked to install the result.
    setup_lock: Mutex<()>,
}

impl ServerTokenizer<TokenListAdapter> {
    pub fn new(
        name: impl Into<String>,
        options: CmdOptions,
        port: u16,
        config: TokenizerConfig,
    ) -> Self {
        Self::with_adapter(name, options, port, config, TokenListAdapter)
    }
}

impl<A: TokenAdapter> ServerTokenizer<A> {
    pub fn with_adapter(
        name: impl Into<String>,
        options: CmdOptions,
        port: u16,
        config: TokenizerConfig,
        adapter: A,
    ) -> Self {
        Self {
            name: name.into(),
            options,
            port,
            config,
            adapter,
            server: RwLock::new(None),
            setup_lock: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// The current supervisor, if `setup` succeeded and no cleanup followed.
    pub async fn server(&self) -> Option<Arc<CmdTokenizerServer>> {
        self.server.read().await.clone()
    }

    /// Call `/tokenize` and decode the raw engine payload into `T`.
    pub async fn server_tokenize<T: DeserializeOwned>(
        &self,
        text: &str,
    ) -> Result<T, TokenizerError> {
        let server = self.running_server().await.ok_or(TokenizerError::NotSetup)?;
        Ok(server.tokenize(text).await?)
    }

    async fn running_server(&self) -> Option<Arc<CmdTokenizerServer>> {
        self.server
            .read()
            .await
            .as_ref()
            .filter(|server| server.is_running())
            .cloned()
    }

    async fn take_server(&self) -> Option<Arc<CmdTokenizerServer>> {
        self.server.write().await.take()
    }

    /// Force stop and wait for the observer to reap the child.
    async fn force_stop(&self, server: &CmdTokenizerServer) {
        if server.force_stop().is_err() {
            return;
        }
        // SIGTERM grace plus time to reap after SIGKILL.
        let budget = self.config.kill_grace * 2;
        if !server.wait_stopped(budget).await {
            warn!(name = %self.name, port = self.port, "Tokenizer server survived force stop");
        }
    }

    fn spawn_stop_watcher(&self, server: Arc<CmdTokenizerServer>) {
        let name = self.name.clone();
        let warn_every = self.config.stop_warning_interval.max(Duration::from_millis(10));
        let force_after = self.config.force_stop_after;
        let kill_budget = self.config.kill_grace * 2;

        tokio::spawn(async move {
            let started = Instant::now();
            loop {
                if server.wait_stopped(warn_every).await {
                    debug!(name = %name, "Tokenizer server stopped after cleanup");
                    return;
                }

                let elapsed = started.elapsed();
                if elapsed >= force_after {
                    warn!(name = %name, elapsed = ?elapsed, "Tokenizer server ignored stop, force stopping");
                    let _ = server.force_stop();
                    if !server.wait_stopped(kill_budget).await {
                        warn!(name = %name, "Tokenizer server survived force stop");
                    }
                    return;
                }

                warn!(name = %name, elapsed = ?elapsed, "Tokenizer server still running after stop");
            }
        });
    }
}

#[async_trait]
impl<A: TokenAdapter> Tokenizer for ServerTokenizer<A> {
    async fn setup(&self) -> Result<(), TokenizerError> {
        let _setup = self.setup_lock.lock().await;
        if self.running_server().await.is_some() {
            debug!(name = %self.name, "Tokenizer already setup");
            return Ok(());
        }

        let server = Arc::new(CmdTokenizerServer::new(
            self.options.clone(),
            self.port,
            self.config.clone(),
        )?);

        if let Err(e) = server.start().await {
            if server.is_running() {
                warn!(name = %self.name, error = %e, "Setup failed, force stopping half-started server");
                self.force_stop(&server).await;
            }
            return Err(e.into());
        }

        info!(name = %self.name, port = self.port, "Tokenizer setup");
        *self.server.write().await = Some(server);
        Ok(())
    }

    async fn is_setup(&self) -> bool {
        self.running_server().await.is_some()
    }

    async fn tokenize(&self, text: &str) -> Result<Vec<Token>, TokenizerError> {
        let response: A::Response = self.server_tokenize(text).await?;
        self.adapter.to_tokens(response, text)
    }

    async fn cleanup(&self) -> Result<(), TokenizerError> {
        let Some(server) = self.take_server().await else {
            return Ok(());
        };
        if !server.is_running() {
            return Ok(());
        }

        if let Err(e) = server.stop().await {
            warn!(name = %self.name, error = %e, "Could not send stop, force stopping");
            let _ = server.force_stop();
            return Err(e.into());
        }

        self.spawn_stop_watcher(server);
        Ok(())
    }

    async fn cleanup_and_wait(&self) -> Result<(), TokenizerError> {
        let Some(server) = self.take_server().await else {
            return Ok(());
        };
        if !server.is_running() {
            return Ok(());
        }

        match server.stop_and_wait(self.config.stop_grace).await {
            Ok(()) => info!(name = %self.name, "Tokenizer cleaned up"),
            Err(SupervisorError::StillRunning(grace)) => {
                warn!(name = %self.name, grace = ?grace, "Tokenizer server still running after stop");
            }
            Err(e) => {
                warn!(name = %self.name, error = %e, "Could not send stop, force stopping");
                self.force_stop(&server).await;
            }
        }
        Ok(())
    }
}
