//! Server network layer: WebSocket transport and the coordinator event loop

use crate::client_manager::{ClientManager, Outgoing};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::outbox::Outbox;
use crate::registry::SessionRegistry;
use crate::{lifecycle, matchmaker, moves};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{
    decode_binary, decode_text, encode, ClientMessage, ConnectionId, Encoding, Frame,
    ServerMessage,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsStream = SplitStream<WebSocketStream<TcpStream>>;

/// Messages sent from network tasks to the main loop
#[derive(Debug)]
pub enum ServerEvent {
    Connected {
        id: ConnectionId,
        addr: SocketAddr,
    },
    MessageReceived {
        id: ConnectionId,
        message: ClientMessage,
        encoding: Encoding,
    },
    /// Any frame that carries no request, including ones that failed to decode
    Heartbeat {
        id: ConnectionId,
    },
    Disconnected {
        id: ConnectionId,
    },
    ClientTimeout {
        id: ConnectionId,
    },
    Shutdown,
}

/// Stops a running [`Server`] from another task.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    event_tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ServerHandle {
    /// Asks the event loop to stop.
    ///
    /// The loop closes every open connection before [`Server::run`] returns.
    /// Calling this on a server that already stopped does nothing.
    pub fn shutdown(&self) {
        if self.event_tx.send(ServerEvent::Shutdown).is_err() {
            debug!("Server already stopped");
        }
    }
}

/// Main server coordinating the transport and the session registry
///
/// Network tasks only decode frames and forward them as [`ServerEvent`]s. The
/// loop in [`Server::run`] owns the [`SessionRegistry`] and handles one event
/// at a time, so registry updates never interleave.
pub struct Server {
    listener: Arc<TcpListener>,
    clients: Arc<RwLock<ClientManager>>,
    registry: SessionRegistry,
    config: ServerConfig,

    // Communication channel from network tasks
    event_tx: mpsc::UnboundedSender<ServerEvent>,
    event_rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Server {
    /// Binds the listening socket described by `config`.
    ///
    /// No connection is accepted until [`Server::run`] is called. Port 0
    /// binds an ephemeral port; see [`Server::local_addr`].
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.address()).await?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Arc::new(listener),
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            registry: SessionRegistry::new(),
            config,
            event_tx,
            event_rx,
        })
    }

    /// Address the server is actually listening on
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Returns a handle that can stop the server once it is running
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            event_tx: self.event_tx.clone(),
        }
    }

    /// Spawns task that accepts connections and upgrades them to WebSockets
    fn spawn_acceptor(&self) {
        let listener = Arc::clone(&self.listener);
        let clients = Arc::clone(&self.clients);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            loop {
                let accepted = tokio::select! {
                    _ = event_tx.closed() => break,
                    accepted = listener.accept() => accepted,
                };

                match accepted {
                    Ok((stream, addr)) => {
                        let clients = Arc::clone(&clients);
                        let event_tx = event_tx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, addr, clients, event_tx).await
                            {
                                warn!("Connection from {} failed: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that pings clients and reports idle ones
    fn spawn_heartbeat(&self) {
        let clients = Arc::clone(&self.clients);
        let event_tx = self.event_tx.clone();
        let ping_interval = self.config.ping_interval();
        let idle_timeout = self.config.idle_timeout();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(ping_interval);

            loop {
                tokio::select! {
                    _ = event_tx.closed() => break,
                    _ = interval.tick() => {}
                }

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    let timed_out = clients_guard.check_timeouts(idle_timeout);
                    clients_guard.ping_all();
                    timed_out
                };

                for id in timed_out {
                    if let Err(e) = event_tx.send(ServerEvent::ClientTimeout { id }) {
                        error!("Failed to send timeout event: {}", e);
                        return;
                    }
                }
            }
        });
    }

    /// Applies one event to the registry and returns what must be sent
    async fn handle_event(&mut self, event: ServerEvent) -> Outbox {
        let mut outbox = Outbox::new();

        match event {
            ServerEvent::Connected { id, addr } => {
                debug!("Greeting {} at {}", id, addr);
                outbox.send(id, ServerMessage::Connected { connection_id: id });
            }

            ServerEvent::MessageReceived {
                id,
                message,
                encoding,
            } => {
                let live = self.clients.write().await.touch(id, Some(encoding));
                if live {
                    self.handle_message(id, message, &mut outbox);
                } else {
                    debug!("Dropping {:?} from closed connection {}", message, id);
                }
            }

            ServerEvent::Heartbeat { id } => {
                self.clients.write().await.touch(id, None);
            }

            ServerEvent::Disconnected { id } => {
                self.clients.write().await.remove_client(id);
                lifecycle::disconnect(&mut self.registry, id, &mut outbox);
            }

            ServerEvent::ClientTimeout { id } => {
                warn!("Client {} timed out", id);
                lifecycle::disconnect(&mut self.registry, id, &mut outbox);
            }

            ServerEvent::Shutdown => {}
        }

        outbox
    }

    /// Routes a decoded request to its handler
    fn handle_message(&mut self, id: ConnectionId, message: ClientMessage, outbox: &mut Outbox) {
        match message {
            ClientMessage::FindMatch => {
                matchmaker::find_match(&mut self.registry, id, outbox);
            }
            ClientMessage::CancelSearch => {
                matchmaker::cancel_search(&mut self.registry, id);
            }
            ClientMessage::MakeMove { game_id, mv } => {
                moves::make_move(&mut self.registry, id, &game_id, &mv, outbox);
            }
        }
    }

    /// Hands queued messages to the writer tasks of their recipients
    async fn dispatch(&self, outbox: Outbox) {
        if outbox.is_empty() {
            return;
        }

        let clients = self.clients.read().await;
        for dispatch in outbox.into_dispatches() {
            let message = dispatch.message();
            for id in dispatch.recipients() {
                match clients.get(*id) {
                    Some(client) => {
                        if !client.send(message.clone()) {
                            debug!("Writer for {} already closed", id);
                        }
                    }
                    None => debug!("Dropping {:?} for departed connection {}", message, id),
                }
            }
        }
    }

    /// Main server loop. Returns after a shutdown request.
    pub async fn run(mut self) -> Result<(), ServerError> {
        self.spawn_acceptor();
        self.spawn_heartbeat();

        info!("Server listening on {}", self.local_addr()?);

        while let Some(event) = self.event_rx.recv().await {
            if let ServerEvent::Shutdown = event {
                info!("Server shutting down");
                self.clients.write().await.clear();
                break;
            }

            let outbox = self.handle_event(event).await;
            self.dispatch(outbox).await;
        }

        Ok(())
    }
}

/// Performs the WebSocket handshake, registers the connection and pumps
/// frames until it closes
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    clients: Arc<RwLock<ClientManager>>,
    event_tx: mpsc::UnboundedSender<ServerEvent>,
) -> Result<(), ServerError> {
    let ws = tokio::time::timeout(HANDSHAKE_TIMEOUT, tokio_tungstenite::accept_async(stream))
        .await
        .map_err(|_| ServerError::HandshakeTimeout(addr))??;
    let (mut sink, stream) = ws.split();
    let (out_tx, out_rx) = mpsc::unbounded_channel();

    let id = clients.write().await.add_client(addr, out_tx);
    let Some(id) = id else {
        warn!("Rejecting {}: server full", addr);
        sink.send(to_ws_message(encode(&ServerMessage::ServerFull, Encoding::Json)?))
            .await?;
        sink.close().await?;
        return Ok(());
    };

    if event_tx.send(ServerEvent::Connected { id, addr }).is_err() {
        return Ok(());
    }

    tokio::spawn(write_frames(id, sink, out_rx));
    read_frames(id, stream, &event_tx).await;

    if event_tx.send(ServerEvent::Disconnected { id }).is_err() {
        debug!("Event loop gone before disconnect of {}", id);
    }
    Ok(())
}

/// Decodes inbound frames into events. Returns when the connection closes.
async fn read_frames(
    id: ConnectionId,
    mut stream: WsStream,
    event_tx: &mpsc::UnboundedSender<ServerEvent>,
) {
    while let Some(frame) = stream.next().await {
        let event = match frame {
            Ok(Message::Text(text)) => match decode_text::<ClientMessage>(text.as_str()) {
                Ok(message) => ServerEvent::MessageReceived {
                    id,
                    message,
                    encoding: Encoding::Json,
                },
                Err(e) => {
                    warn!("Dropping malformed text frame from {}: {}", id, e);
                    ServerEvent::Heartbeat { id }
                }
            },
            Ok(Message::Binary(data)) => match decode_binary::<ClientMessage>(&data) {
                Ok(message) => ServerEvent::MessageReceived {
                    id,
                    message,
                    encoding: Encoding::Bincode,
                },
                Err(e) => {
                    warn!("Dropping malformed binary frame from {}: {}", id, e);
                    ServerEvent::Heartbeat { id }
                }
            },
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => ServerEvent::Heartbeat { id },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("Read error from {}: {}", id, e);
                break;
            }
        };

        if event_tx.send(event).is_err() {
            break;
        }
    }
}

/// Encodes outbound messages until the client is removed from the table
async fn write_frames(
    id: ConnectionId,
    mut sink: WsSink,
    mut out_rx: mpsc::UnboundedReceiver<Outgoing>,
) {
    while let Some(outgoing) = out_rx.recv().await {
        let frame = match outgoing {
            Outgoing::Message { message, encoding } => match encode(&message, encoding) {
                Ok(frame) => to_ws_message(frame),
                Err(e) => {
                    error!("Failed to encode {:?} for {}: {}", message, id, e);
                    continue;
                }
            },
            Outgoing::Ping => Message::Ping(Default::default()),
        };

        if let Err(e) = sink.send(frame).await {
            debug!("Failed to send to {}: {}", id, e);
            break;
        }
    }

    if let Err(e) = sink.close().await {
        debug!("Error closing connection {}: {}", id, e);
    }
}

fn to_ws_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::text(text),
        Frame::Binary(bytes) => Message::binary(bytes),
    }
}
