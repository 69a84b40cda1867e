//! WebSocket Game Server
//!
//! Async WebSocket transport around a single [`SessionRuntime`].
//! Each connection gets a writer task fed by a [`ChannelConnection`]; the
//! runtime sits behind one mutex so message handling and ticks never overlap.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use crate::game::state::Phase;
use crate::network::connection::{ChannelConnection, Outgoing};
use crate::network::hooks::SessionHooks;
use crate::network::protocol::ProtocolError;
use crate::network::session::{SessionError, SessionRuntime};
use crate::network::tick_loop::spawn_tick_loop;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Tick rate for the simulation (Hz).
    pub tick_rate: u32,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            tick_rate: crate::TICK_RATE,
            version: crate::VERSION.to_string(),
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Session error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// The game server.
pub struct GameServer<H: SessionHooks> {
    /// Server configuration.
    config: ServerConfig,
    /// The single session this process hosts.
    runtime: Arc<Mutex<SessionRuntime<H>>>,
    /// Open WebSocket connections (admitted or not).
    connections: Arc<AtomicUsize>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl<H: SessionHooks> GameServer<H> {
    /// Create a server hosting `hooks`.
    pub fn new(config: ServerConfig, hooks: H) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            runtime: Arc::new(Mutex::new(SessionRuntime::new(hooks))),
            connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        }
    }

    /// Shared handle to the runtime.
    pub fn runtime(&self) -> Arc<Mutex<SessionRuntime<H>>> {
        self.runtime.clone()
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, GameServerError> {
        Ok(TcpListener::bind(&self.config.bind_addr).await?)
    }

    /// Serve connections from `listener` until shutdown.
    #[instrument(skip(self, listener))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!(
            "Cannon duel server v{} listening on {}",
            self.config.version,
            listener.local_addr()?
        );

        let phase_rx = self.runtime.lock().await.subscribe_phase();
        let tick_handle = spawn_tick_loop(
            self.runtime.clone(),
            phase_rx,
            self.config.tick_rate,
            self.shutdown_tx.subscribe(),
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        tick_handle.abort();
        Ok(())
    }

    /// Spawn the task serving one connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let runtime = self.runtime.clone();
        let connections = self.connections.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            connections.fetch_add(1, Ordering::SeqCst);
            match Self::serve_connection(stream, addr, runtime, shutdown_rx).await {
                Ok(()) => {}
                Err(GameServerError::Session(e)) => warn!("Client {} turned away: {}", addr, e),
                Err(e) => error!("Connection {} failed: {}", addr, e),
            }
            connections.fetch_sub(1, Ordering::SeqCst);
            info!("Client {} cleaned up", addr);
        });
    }

    async fn serve_connection(
        stream: TcpStream,
        addr: SocketAddr,
        runtime: Arc<Mutex<SessionRuntime<H>>>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), GameServerError> {
        let ws_stream = accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (connection, mut outgoing) = ChannelConnection::new();

        // Writer task: drains the connection until it closes
        let writer = tokio::spawn(async move {
            while let Some(frame) = outgoing.recv().await {
                let result = match frame {
                    Outgoing::Text(text) => ws_sender.send(Message::Text(text)).await,
                    Outgoing::Close => {
                        let _ = ws_sender.send(Message::Close(None)).await;
                        break;
                    }
                };
                if result.is_err() {
                    break;
                }
            }
        });

        let admitted = runtime.lock().await.admit(Arc::new(connection));
        let participant = match admitted {
            Ok(p) => p,
            Err(e) => {
                // The runtime already queued the error frame and the close.
                let _ = writer.await;
                return Err(e.into());
            }
        };
        let id = participant.id;
        debug!("Client {} is participant {} (slot {})", addr, id, participant.ordinal);

        loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Err(e) = runtime.lock().await.handle_message(&id, &text) {
                                debug!("Message from {} dropped: {}", addr, e);
                                break;
                            }
                        }
                        Some(Ok(Message::Binary(_))) => {
                            runtime.lock().await.send_error(&id, ProtocolError::BinaryFrame.to_string());
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("Client {} disconnected", addr);
                            break;
                        }
                        Some(Err(e)) => {
                            warn!("WebSocket error for {}: {}", addr, e);
                            break;
                        }
                        _ => {}
                    }
                }
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }

        // Dropping the runtime's handle ends the writer task
        runtime.lock().await.disconnect(&id);
        let _ = writer.await;

        Ok(())
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get open connection count.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Get admitted participant count.
    pub async fn participant_count(&self) -> usize {
        self.runtime.lock().await.participant_count()
    }

    /// Current session phase.
    pub async fn phase(&self) -> Phase {
        self.runtime.lock().await.phase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::app::{DuelGame, GameConfig};

    fn test_server() -> GameServer<DuelGame> {
        let config = ServerConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..Default::default()
        };
        GameServer::new(config, DuelGame::new(GameConfig::default(), 1))
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[tokio::test]
    async fn test_server_creation() {
        let server = test_server();

        assert_eq!(server.connection_count(), 0);
        assert_eq!(server.participant_count().await, 0);
        assert_eq!(server.phase().await, Phase::Waiting);
    }

    #[tokio::test]
    async fn test_server_shutdown() {
        let server = Arc::new(test_server());
        let listener = server.bind().await.unwrap();

        let serving = {
            let server = server.clone();
            tokio::spawn(async move { server.serve(listener).await })
        };
        tokio::task::yield_now().await;
        server.shutdown();

        // serve() subscribes before waiting, so a shutdown sent after it
        // started always lands; retry in case it had not started yet.
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                if serving.is_finished() {
                    break;
                }
                server.shutdown();
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(result.is_ok());
    }
}
