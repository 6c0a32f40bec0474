use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::protocol::{GameStateUpdate, PlayerInput, ServerMessage};

/// Channel for sending serialized frames to one connected client.
type FrameTx = mpsc::UnboundedSender<Vec<u8>>;

/// The game network server.
///
/// Accepts any number of WebSocket clients in the background. Every client
/// gets the same state frames; inputs from all clients are merged into a
/// single queue that the game loop drains once per tick.
pub struct GameServer {
    local_addr: SocketAddr,

    /// One frame sender per live client. Closed senders are pruned on send.
    clients: Vec<FrameTx>,

    /// New clients registered by the accept task, picked up on the next send.
    client_rx: mpsc::UnboundedReceiver<FrameTx>,

    /// The game loop drains this to get decoded `PlayerInput`.
    pub input_rx: mpsc::UnboundedReceiver<PlayerInput>,
}

impl GameServer {
    /// Bind the TCP listener and start accepting clients in the background.
    ///
    /// For every connection two tasks are spawned:
    ///
    /// 1. **Write task** – forwards serialized binary frames to the
    ///    WebSocket sink.
    /// 2. **Read task** – decodes binary frames as `PlayerInput` and pushes
    ///    them into the shared input queue.
    ///
    /// # Errors
    ///
    /// Returns the bind error; the caller decides whether to run headless.
    pub async fn start(bind_addr: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Game server listening on ws://{}", local_addr);

        let (input_tx, input_rx) = mpsc::unbounded_channel::<PlayerInput>();
        let (register_tx, client_rx) = mpsc::unbounded_channel::<FrameTx>();

        // ── Accept task ─────────────────────────────────────────────
        tokio::spawn(async move {
            loop {
                let (stream, addr) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                };
                info!("Client connected from {}", addr);
                let input_tx = input_tx.clone();
                let register_tx = register_tx.clone();
                tokio::spawn(async move {
                    if let Some(frame_tx) = serve_client(stream, input_tx).await {
                        if register_tx.send(frame_tx).is_err() {
                            warn!("Server dropped before client {} registered", addr);
                        }
                    }
                });
            }
        });

        Ok(Self {
            local_addr,
            clients: Vec::new(),
            client_rx,
            input_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serialize `GameStateUpdate` via msgpack wrapped in
    /// `ServerMessage::GameState` and send to every connected client.
    pub fn send_state(&mut self, update: &GameStateUpdate) {
        let msg = ServerMessage::GameState(update.clone());
        self.send_message(&msg);
    }

    /// Send any ServerMessage to every client.
    pub fn send_message(&mut self, msg: &ServerMessage) {
        while let Ok(tx) = self.client_rx.try_recv() {
            self.clients.push(tx);
        }
        if self.clients.is_empty() {
            return;
        }

        let bytes = match rmp_serde::to_vec_named(msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to serialize ServerMessage: {}", e);
                return;
            }
        };
        let before = self.clients.len();
        self.clients.retain(|tx| tx.send(bytes.clone()).is_ok());
        if self.clients.len() < before {
            info!(
                "{} client(s) disconnected, {} remaining",
                before - self.clients.len(),
                self.clients.len()
            );
        }
    }
}

/// Completes the WebSocket handshake and spawns the per-client read and
/// write tasks. Returns the sender for this client's outbound frames.
async fn serve_client(
    stream: TcpStream,
    input_tx: mpsc::UnboundedSender<PlayerInput>,
) -> Option<FrameTx> {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed: {}", e);
            return None;
        }
    };
    let (mut ws_write, mut ws_read) = ws_stream.split();

    // Channel: game loop -> write task -> WebSocket
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    // ── Write task ──────────────────────────────────────────────────
    tokio::spawn(async move {
        while let Some(bytes) = frame_rx.recv().await {
            if let Err(e) = ws_write.send(Message::Binary(bytes.into())).await {
                error!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
        debug!("Write task shutting down");
    });

    // ── Read task ───────────────────────────────────────────────────
    tokio::spawn(async move {
        while let Some(result) = ws_read.next().await {
            match result {
                Ok(msg) => {
                    if msg.is_binary() {
                        let data = msg.into_data();
                        match rmp_serde::from_slice::<PlayerInput>(&data) {
                            Ok(input) => {
                                if let Err(e) = input_tx.send(input) {
                                    warn!("Input channel closed: {}", e);
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("Failed to decode PlayerInput: {}", e);
                            }
                        }
                    }
                }
                Err(e) => {
                    error!("WebSocket read error: {}", e);
                    break;
                }
            }
        }
        debug!("Read task shutting down");
    });

    Some(frame_tx)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;
    use tokio_tungstenite::connect_async;

    use super::*;
    use crate::config::GameConfig;
    use crate::protocol::{PlayerAction, UpgradeKind};
    use crate::sim::Simulation;

    #[tokio::test]
    async fn client_receives_state_and_sends_input() {
        let mut server = GameServer::start("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", server.local_addr());
        let (mut client, _) = connect_async(url).await.unwrap();

        let input = PlayerInput {
            tick: 0,
            action: Some(PlayerAction::PurchaseUpgrade {
                kind: UpgradeKind::Speed,
            }),
        };
        let bytes = rmp_serde::to_vec_named(&input).unwrap();
        client.send(Message::Binary(bytes.into())).await.unwrap();

        let received = timeout(Duration::from_secs(5), server.input_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            received.action,
            Some(PlayerAction::PurchaseUpgrade {
                kind: UpgradeKind::Speed
            })
        ));

        // The client registers asynchronously; keep sending until a frame lands.
        let mut sim = Simulation::new(GameConfig::default());
        let update = sim.state_update();
        let frame = timeout(Duration::from_secs(5), async {
            loop {
                server.send_state(&update);
                if let Ok(Some(Ok(msg))) =
                    timeout(Duration::from_millis(50), client.next()).await
                {
                    return msg;
                }
            }
        })
        .await
        .unwrap();

        let decoded: ServerMessage = rmp_serde::from_slice(&frame.into_data()).unwrap();
        match decoded {
            ServerMessage::GameState(state) => {
                assert_eq!(state.ledger.coins, 50);
                assert_eq!(state.nodes.len(), 3);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }
}
