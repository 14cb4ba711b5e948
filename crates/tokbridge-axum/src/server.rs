//! Serving lifecycle: bind, serve, graceful shutdown, engine cleanup.
//!
//! Shutdown has two triggers that may race: a manual stop (the `stop` line on
//! the control input, or [`ServerHandle::stop`]) and the server exiting on its
//! own. [`ShutdownCoordinator`] makes sure only the side that did not already
//! observe the other signals, and that engine cleanup runs exactly once.
//!
//! ```ignore
//! let server = TokenizerServer::bind(Arc::new(engine), addr).await?;
//! let handle = server.spawn();
//! // ...
//! handle.stop();
//! handle.wait().await?;
//! ```

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokbridge_core::{STOP_KEYWORD, TokenizerEngine};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::routes::create_router;

/// Errors that end a tokenizer server abnormally.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] io::Error),

    #[error("failed to read control input: {0}")]
    Input(#[source] io::Error),

    #[error("server task failed: {0}")]
    Join(#[from] JoinError),
}

/// Shared shutdown state between the serve task and its triggers.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    shutdown: CancellationToken,
    done: CancellationToken,
    manual_stop: AtomicBool,
    exited: AtomicBool,
    cleaned: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request graceful shutdown.
    ///
    /// Returns `true` only for the call that initiated it. A server that has
    /// already exited is not signalled again.
    pub fn request_stop(&self) -> bool {
        if self.has_exited() {
            debug!("Server already exited, not signalling stop");
            return false;
        }
        if self.manual_stop.swap(true, Ordering::SeqCst) {
            return false;
        }
        info!("Stop requested, shutting down tokenizer server");
        self.shutdown.cancel();
        true
    }

    pub fn is_stop_requested(&self) -> bool {
        self.manual_stop.load(Ordering::SeqCst)
    }

    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    /// Resolves once the serve loop has returned, for any reason.
    pub async fn exited(&self) {
        self.done.cancelled().await;
    }

    fn mark_exited(&self) {
        self.exited.store(true, Ordering::SeqCst);
        self.done.cancel();
    }

    /// Run `engine.cleanup()` unless it already ran. Returns whether it ran now.
    pub fn cleanup_once<E: TokenizerEngine + ?Sized>(&self, engine: &E) -> bool {
        if self.cleaned.swap(true, Ordering::SeqCst) {
            return false;
        }
        engine.cleanup();
        true
    }
}

/// Entry point for binding a tokenizer server.
pub struct TokenizerServer;

impl TokenizerServer {
    /// Bind `addr` without serving yet. Port 0 picks a free port.
    pub async fn bind<E: TokenizerEngine>(
        engine: Arc<E>,
        addr: SocketAddr,
    ) -> Result<BoundServer<E>, ServeError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServeError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServeError::Bind { addr, source })?;

        debug!(addr = %local_addr, "Tokenizer server bound");
        Ok(BoundServer {
            listener,
            local_addr,
            engine,
        })
    }
}

/// A bound listener with its engine, ready to serve.
pub struct BoundServer<E> {
    listener: TcpListener,
    local_addr: SocketAddr,
    engine: Arc<E>,
}

impl<E: TokenizerEngine> BoundServer<E> {
    /// The address actually bound, with the real port when 0 was requested.
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve in a background task with no control input.
    pub fn spawn(self) -> ServerHandle {
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let task = tokio::spawn(serve(
            self.listener,
            self.engine,
            Arc::clone(&coordinator),
        ));
        ServerHandle {
            local_addr: self.local_addr,
            coordinator,
            task,
        }
    }
}

/// Handle to a running tokenizer server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    coordinator: Arc<ShutdownCoordinator>,
    task: JoinHandle<Result<(), ServeError>>,
}

impl ServerHandle {
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Shared shutdown state. Clone it to stop the server from elsewhere
    /// while [`ServerHandle::watch_input`] owns the handle.
    pub const fn coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.coordinator
    }

    /// Request graceful shutdown. Idempotent; returns whether this call
    /// initiated it.
    pub fn stop(&self) -> bool {
        self.coordinator.request_stop()
    }

    /// Wait for the serve task, cleanup included, to finish.
    pub async fn wait(self) -> Result<(), ServeError> {
        self.task.await?
    }

    /// Read control lines from `input` until shutdown, then wait for the
    /// server.
    ///
    /// A trimmed `stop` line or end of input requests graceful shutdown. Other
    /// lines are ignored. Reading also ends once the server has exited, for
    /// instance after a stop through the [`coordinator`](Self::coordinator).
    /// Returns after the engine has been cleaned up.
    pub async fn watch_input<R: AsyncBufRead + Unpin>(self, input: R) -> Result<(), ServeError> {
        let mut lines = input.lines();
        let scanned = loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) if line.trim() == STOP_KEYWORD => break Ok(()),
                    Ok(Some(line)) => debug!(line = %line.trim(), "Ignoring control input"),
                    Ok(None) => {
                        debug!("Control input closed");
                        break Ok(());
                    }
                    Err(e) => break Err(ServeError::Input(e)),
                },
                () = self.coordinator.exited() => break Ok(()),
            }
        };

        self.stop();
        let served = self.wait().await;
        served.and(scanned)
    }
}

async fn serve<E: TokenizerEngine>(
    listener: TcpListener,
    engine: Arc<E>,
    coordinator: Arc<ShutdownCoordinator>,
) -> Result<(), ServeError> {
    let router = create_router(Arc::clone(&engine));
    let shutdown = coordinator.shutdown.clone().cancelled_owned();

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await;
    coordinator.mark_exited();

    match &result {
        Ok(()) if coordinator.is_stop_requested() => info!("Tokenizer server drained"),
        Ok(()) => warn!("Tokenizer server exited without a stop request"),
        Err(e) => error!(error = %e, "Tokenizer server failed"),
    }

    // Cleanup may block on engine internals.
    let cleanup_coordinator = Arc::clone(&coordinator);
    let ran = tokio::task::spawn_blocking(move || cleanup_coordinator.cleanup_once(&*engine)).await?;
    if ran {
        info!("Tokenizer engine cleaned up");
    }

    result.map_err(ServeError::Serve)
}

/// Serve `engine` on `127.0.0.1:<port>` until `stop` arrives on stdin.
pub async fn run<E: TokenizerEngine>(engine: E, port: u16) -> Result<(), ServeError> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let stdin = BufReader::new(tokio::io::stdin());
    run_with_input(Arc::new(engine), addr, stdin).await
}

/// Serve `engine` on `addr`, reading control lines from `input`.
///
/// See [`ServerHandle::watch_input`] for how the input is interpreted.
pub async fn run_with_input<E, R>(engine: Arc<E>, addr: SocketAddr, input: R) -> Result<(), ServeError>
where
    E: TokenizerEngine,
    R: AsyncBufRead + Unpin,
{
    let handle = TokenizerServer::bind(engine, addr).await?.spawn();
    info!(addr = %handle.local_addr(), "Tokenizer server listening");
    handle.watch_input(input).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::SplitWordsEngine;
    use tokio::io::AsyncWriteExt;

    fn any_local() -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, 0))
    }

    #[test]
    fn cleanup_runs_once() {
        let engine = SplitWordsEngine::new();
        let coordinator = ShutdownCoordinator::new();

        assert!(coordinator.cleanup_once(&engine));
        assert!(!coordinator.cleanup_once(&engine));
        assert_eq!(engine.cleanup_count(), 1);
    }

    #[test]
    fn only_first_stop_initiates() {
        let coordinator = ShutdownCoordinator::new();
        assert!(coordinator.request_stop());
        assert!(!coordinator.request_stop());
        assert!(coordinator.is_stop_requested());
    }

    #[test]
    fn stop_after_exit_is_not_signalled() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.mark_exited();
        assert!(!coordinator.request_stop());
        assert!(!coordinator.shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn bind_reports_real_port() {
        let server = TokenizerServer::bind(Arc::new(SplitWordsEngine::new()), any_local())
            .await
            .unwrap();
        assert_ne!(server.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn bind_conflict_is_bind_error() {
        let first = TokenizerServer::bind(Arc::new(SplitWordsEngine::new()), any_local())
            .await
            .unwrap();
        let err = TokenizerServer::bind(Arc::new(SplitWordsEngine::new()), first.local_addr())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ServeError::Bind { .. }));
    }

    #[tokio::test]
    async fn double_stop_cleans_up_once() {
        let engine = SplitWordsEngine::new();
        let handle = TokenizerServer::bind(Arc::new(engine.clone()), any_local())
            .await
            .unwrap()
            .spawn();

        assert!(handle.stop());
        assert!(!handle.stop());
        handle.wait().await.unwrap();

        assert_eq!(engine.cleanup_count(), 1);
    }

    #[tokio::test]
    async fn stop_line_shuts_down_and_cleans_up() {
        let engine = SplitWordsEngine::new();
        let (mut writer, reader) = tokio::io::duplex(64);

        let task = tokio::spawn(run_with_input(
            Arc::new(engine.clone()),
            any_local(),
            BufReader::new(reader),
        ));

        writer.write_all(b"hello\n  stop  \n").await.unwrap();
        tokio_test::assert_ok!(task.await.unwrap());
        assert_eq!(engine.cleanup_count(), 1);
    }

    #[tokio::test]
    async fn stop_line_then_direct_stop_cleans_up_once() {
        let engine = SplitWordsEngine::new();
        let handle = TokenizerServer::bind(Arc::new(engine.clone()), any_local())
            .await
            .unwrap()
            .spawn();
        let coordinator = Arc::clone(handle.coordinator());
        let (mut writer, reader) = tokio::io::duplex(64);
        let task = tokio::spawn(handle.watch_input(BufReader::new(reader)));

        writer.write_all(b"stop\n").await.unwrap();
        coordinator.exited().await;
        assert!(!coordinator.request_stop());

        tokio_test::assert_ok!(task.await.unwrap());
        assert_eq!(engine.cleanup_count(), 1);
    }

    #[tokio::test]
    async fn direct_stop_then_stop_line_cleans_up_once() {
        let engine = SplitWordsEngine::new();
        let handle = TokenizerServer::bind(Arc::new(engine.clone()), any_local())
            .await
            .unwrap()
            .spawn();
        let coordinator = Arc::clone(handle.coordinator());
        let (mut writer, reader) = tokio::io::duplex(64);
        let task = tokio::spawn(handle.watch_input(BufReader::new(reader)));

        assert!(coordinator.request_stop());
        coordinator.exited().await;
        // The reader may already be gone.
        let _ = writer.write_all(b"stop\n").await;

        tokio_test::assert_ok!(task.await.unwrap());
        assert_eq!(engine.cleanup_count(), 1);
    }

    #[tokio::test]
    async fn end_of_input_counts_as_stop() {
        let engine = SplitWordsEngine::new();
        let (writer, reader) = tokio::io::duplex(64);
        drop(writer);

        run_with_input(Arc::new(engine.clone()), any_local(), BufReader::new(reader))
            .await
            .unwrap();
        assert_eq!(engine.cleanup_count(), 1);
    }
}
