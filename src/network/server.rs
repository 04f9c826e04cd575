//! WebSocket Game Server
//!
//! Async WebSocket front-end for one match.
//! Seats connecting players, forwards their in-game tokens and drives the
//! match from a fixed-rate tick task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::game::model::ModelFactory;
use crate::network::protocol::{ClientMessage, ServerNotice};
use crate::network::session::{Match, MatchHandle, PlayerHandle};

/// Longest nickname kept, in characters.
pub const MAX_NICKNAME_CHARS: usize = 20;

/// Nickname used when the client sends an empty one.
pub const DEFAULT_NICKNAME: &str = "Player";

/// How long a closing connection waits for queued lines to flush.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `log_level` when set.
pub fn init_tracing(log_level: &str) -> Result<(), GameServerError> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))
        .map_err(|e| GameServerError::Internal(format!("Invalid log filter: {}", e)))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| GameServerError::Internal(e.to_string()))
}

/// Trim and bound a client-supplied nickname.
pub fn sanitize_nickname(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        DEFAULT_NICKNAME.to_string()
    } else {
        trimmed.chars().take(MAX_NICKNAME_CHARS).collect()
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// =============================================================================
// PLAYER HANDLE
// =============================================================================

/// A WebSocket connection seen from the match.
///
/// Lines go to a bounded channel drained by the connection's writer task, so
/// `send` never waits on the socket.
pub struct WsPlayerHandle {
    id: Uuid,
    nickname: String,
    addr: SocketAddr,
    outbound: mpsc::Sender<String>,
}

impl WsPlayerHandle {
    /// Create a handle feeding `outbound`.
    pub fn new(nickname: String, addr: SocketAddr, outbound: mpsc::Sender<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            nickname,
            addr,
            outbound,
        }
    }

    /// Connection identifier used in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    fn notify(&self, notice: &ServerNotice) {
        match notice.to_json() {
            Ok(json) => self.send(&json),
            Err(e) => error!("Failed to serialize notice: {}", e),
        }
    }
}

impl PlayerHandle for WsPlayerHandle {
    fn nickname(&self) -> &str {
        &self.nickname
    }

    fn send(&self, line: &str) {
        match self.outbound.try_send(line.to_string()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(conn = %self.id, nickname = %self.nickname, "Outbound buffer full, line dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(conn = %self.id, addr = %self.addr, "Outbound channel closed, line dropped");
            }
        }
    }
}

// =============================================================================
// SERVER
// =============================================================================

/// The game server.
pub struct GameServer<F: ModelFactory> {
    /// Server configuration.
    config: ServerConfig,
    /// Shared entry point into the match.
    match_handle: MatchHandle,
    /// Match waiting to be moved into the tick task by `run`.
    pending_match: Mutex<Option<Match<F>>>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl<F: ModelFactory> GameServer<F> {
    /// Create a new game server with a fresh match.
    pub fn new(config: ServerConfig, factory: F) -> Self {
        let game = Match::with_mode(config.beginning_level, config.mode, factory);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            match_handle: game.handle(),
            pending_match: Mutex::new(Some(game)),
            shutdown_tx,
        }
    }

    /// Handle to the served match.
    pub fn match_handle(&self) -> MatchHandle {
        self.match_handle.clone()
    }

    /// Run the server until `shutdown` is called.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let game = self
            .pending_match
            .lock()
            .take()
            .ok_or_else(|| GameServerError::Internal("Server already running".to_string()))?;

        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Game server listening on {}", self.config.bind_addr);

        let tick_rate = self.config.tick_rate;
        let tick_shutdown = self.shutdown_tx.subscribe();
        let tick_handle = tokio::spawn(async move {
            Self::run_tick_loop(game, tick_rate, tick_shutdown).await;
        });

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

        if let Err(e) = tick_handle.await {
            error!("Tick task failed: {}", e);
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let match_handle = self.match_handle.clone();
        let capacity = self.config.outbound_capacity;
        let version = self.config.version.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            if let Err(e) =
                Self::serve_connection(stream, addr, match_handle, capacity, version, shutdown_rx).await
            {
                error!("Connection {} failed: {}", addr, e);
            }
        });
    }

    async fn serve_connection(
        stream: TcpStream,
        addr: SocketAddr,
        match_handle: MatchHandle,
        capacity: usize,
        version: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), GameServerError> {
        let ws_stream = accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (line_tx, mut line_rx) = mpsc::channel::<String>(capacity);

        // Spawn writer task
        let writer_task = tokio::spawn(async move {
            while let Some(line) = line_rx.recv().await {
                if ws_sender.send(Message::Text(line)).await.is_err() {
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        let Some(nickname) = Self::await_hello(addr, &mut ws_receiver).await else {
            drop(line_tx);
            let _ = tokio::time::timeout(FLUSH_TIMEOUT, writer_task).await;
            return Ok(());
        };

        let player = Arc::new(WsPlayerHandle::new(nickname, addr, line_tx));
        let handle: Arc<dyn PlayerHandle> = player.clone();

        match match_handle.connect(&handle) {
            Ok(slot) => {
                info!(conn = %player.id(), addr = %addr, slot = ?slot, "Seated");
                player.notify(&ServerNotice::Welcome { slot, server_version: version });
            }
            Err(e) => {
                info!(conn = %player.id(), addr = %addr, "Rejected: {}", e);
                player.notify(&ServerNotice::Rejected { reason: e.to_string() });
                drop(handle);
                drop(player);
                let _ = tokio::time::timeout(FLUSH_TIMEOUT, writer_task).await;
                return Ok(());
            }
        }

        // Handle incoming messages
        loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match ClientMessage::from_json(&text) {
                                Ok(ClientMessage::InGame { message }) => {
                                    match_handle.got_message(&handle, &message);
                                }
                                Ok(ClientMessage::Ping { timestamp }) => {
                                    player.notify(&ServerNotice::Pong {
                                        timestamp,
                                        server_time: now_millis(),
                                    });
                                }
                                Ok(ClientMessage::Hello { .. }) => {
                                    debug!("Repeated hello from {}", addr);
                                }
                                Err(e) => {
                                    debug!("Invalid message from {}: {}", addr, e);
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("Client {} disconnected", addr);
                            break;
                        }
                        Some(Err(e)) => {
                            error!("WebSocket error for {}: {}", addr, e);
                            break;
                        }
                        _ => {}
                    }
                }
                _ = shutdown_rx.recv() => {
                    player.notify(&ServerNotice::Shutdown {
                        reason: "Server shutting down".to_string(),
                    });
                    break;
                }
            }
        }

        // Cleanup
        match_handle.disconnect(&handle);
        drop(handle);
        drop(player);
        let _ = tokio::time::timeout(FLUSH_TIMEOUT, writer_task).await;

        info!("Client {} cleaned up", addr);
        Ok(())
    }

    /// Wait for the opening `hello` and return the sanitized nickname.
    async fn await_hello<S>(addr: SocketAddr, ws_receiver: &mut S) -> Option<String>
    where
        S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    return match ClientMessage::from_json(&text) {
                        Ok(ClientMessage::Hello { nickname }) => Some(sanitize_nickname(&nickname)),
                        Ok(other) => {
                            debug!("Expected hello from {}, got {:?}", addr, other);
                            None
                        }
                        Err(e) => {
                            debug!("Invalid hello from {}: {}", addr, e);
                            None
                        }
                    };
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => {
                    error!("WebSocket error for {}: {}", addr, e);
                    return None;
                }
            }
        }
        None
    }

    /// Drive the match at `tick_rate` Hz until shutdown.
    async fn run_tick_loop(mut game: Match<F>, tick_rate: u32, mut shutdown_rx: broadcast::Receiver<()>) {
        let tick_duration = Duration::from_secs_f64(1.0 / f64::from(tick_rate.max(1)));
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        info!(tick_rate, "Tick loop started");

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let delta = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;
                    game.update(delta);
                }
                _ = shutdown_rx.recv() => {
                    info!("Tick loop stopped");
                    break;
                }
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Number of seated players.
    pub fn connection_count(&self) -> usize {
        self.match_handle.connected_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::model::{ModeType, Side};
    use crate::testing::MockFactory;

    fn test_config() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            mode: ModeType::Classic,
            ..Default::default()
        }
    }

    #[test]
    fn test_sanitize_nickname() {
        assert_eq!(sanitize_nickname("  ada  "), "ada");
        assert_eq!(sanitize_nickname("   "), DEFAULT_NICKNAME);
        assert_eq!(sanitize_nickname(&"x".repeat(40)).chars().count(), MAX_NICKNAME_CHARS);
        assert_eq!(sanitize_nickname("ünïcødé-ñame-that-is-long").chars().count(), 20);
    }

    #[tokio::test]
    async fn test_ws_handle_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = WsPlayerHandle::new("ada".into(), "127.0.0.1:1".parse().unwrap(), tx);

        handle.send("YPIN");
        handle.send("YGOV");

        assert_eq!(rx.recv().await.as_deref(), Some("YPIN"));
        assert!(rx.try_recv().is_err());
        assert_eq!(handle.nickname(), "ada");
    }

    #[test]
    fn test_ws_handles_get_distinct_ids() {
        let (tx, _rx) = mpsc::channel(1);
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let a = WsPlayerHandle::new("ada".into(), addr, tx.clone());
        let b = WsPlayerHandle::new("ada".into(), addr, tx);
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_ws_handle_closed_channel() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let handle = WsPlayerHandle::new("bob".into(), "127.0.0.1:1".parse().unwrap(), tx);
        // Should not panic
        handle.send("OPIN");
    }

    #[tokio::test]
    async fn test_server_creation() {
        let (factory, _tracker) = MockFactory::new();
        let server = GameServer::new(test_config(), factory);

        assert_eq!(server.connection_count(), 0);

        let (tx, _rx) = mpsc::channel(4);
        let player: Arc<dyn PlayerHandle> =
            Arc::new(WsPlayerHandle::new("ada".into(), "127.0.0.1:1".parse().unwrap(), tx));
        assert_eq!(server.match_handle().connect(&player), Ok(Side::First));
        assert_eq!(server.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_server_shutdown() {
        let (factory, _tracker) = MockFactory::new();
        let server = Arc::new(GameServer::new(test_config(), factory));

        let runner = server.clone();
        let task = tokio::spawn(async move { runner.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        server.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(2), task).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }

    #[tokio::test]
    async fn test_tick_loop_advances_match() {
        let (factory, tracker) = MockFactory::new();
        let server = Arc::new(GameServer::new(test_config(), factory));

        let (tx, _rx) = mpsc::channel(64);
        let player: Arc<dyn PlayerHandle> =
            Arc::new(WsPlayerHandle::new("ada".into(), "127.0.0.1:1".parse().unwrap(), tx));
        server.match_handle().connect(&player).unwrap();

        let runner = server.clone();
        let task = tokio::spawn(async move { runner.run().await });
        tokio::time::sleep(Duration::from_millis(200)).await;
        server.shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(2), task).await;

        assert_eq!(tracker.created(), 1);
        assert!(!tracker.updates().is_empty());
    }

    #[tokio::test]
    async fn test_run_twice_fails() {
        let (factory, _tracker) = MockFactory::new();
        let server = Arc::new(GameServer::new(test_config(), factory));

        let runner = server.clone();
        let task = tokio::spawn(async move { runner.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(matches!(server.run().await, Err(GameServerError::Internal(_))));
        server.shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(2), task).await;
    }
}
