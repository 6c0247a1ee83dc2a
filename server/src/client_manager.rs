//! Connection table for the WebSocket transport
//!
//! This module tracks every live connection the server has accepted:
//! - Connection id assignment and capacity enforcement
//! - The outgoing channel feeding each connection's writer task
//! - The frame encoding each connection last used
//! - Liveness tracking for idle-timeout detection
//!
//! The client manager knows nothing about matchmaking or sessions; the
//! event loop consults it only to route outbound messages.

use log::info;
use shared::{ConnectionId, Encoding, ServerMessage};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Items consumed by a connection's writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Message {
        message: ServerMessage,
        encoding: Encoding,
    },
    Ping,
}

/// Represents a connected client
#[derive(Debug)]
pub struct Client {
    /// Unique connection identifier assigned by the server
    pub id: ConnectionId,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// Last time we received any frame from this client
    pub last_seen: Instant,
    /// Encoding of the most recent frame the client sent
    pub encoding: Encoding,
    sender: mpsc::UnboundedSender<Outgoing>,
}

impl Client {
    /// Creates a client record for a freshly accepted connection.
    ///
    /// The client starts out in JSON until it sends a binary frame.
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: mpsc::UnboundedSender<Outgoing>) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            encoding: Encoding::default(),
            sender,
        }
    }

    /// Queues a message in the client's preferred encoding.
    ///
    /// Returns false if the writer task has already gone away.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.sender
            .send(Outgoing::Message {
                message,
                encoding: self.encoding,
            })
            .is_ok()
    }

    /// Queues a keepalive ping. Returns false if the writer task is gone.
    pub fn ping(&self) -> bool {
        self.sender.send(Outgoing::Ping).is_ok()
    }

    /// Checks if the client has been silent for longer than `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all live connections
///
/// Connection ids start at 1 and are never handed out twice, so a late event
/// for a closed connection can never be mistaken for a newer one.
pub struct ClientManager {
    /// Connected clients indexed by their id
    clients: HashMap<ConnectionId, Client>,
    /// Next id to hand out
    next_client_id: u32,
    /// Maximum number of concurrent connections allowed
    max_clients: usize,
}

impl ClientManager {
    /// Creates an empty connection table.
    ///
    /// # Arguments
    /// * `max_clients` - Connections beyond this count are turned away
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a new connection and assigns it the next id.
    ///
    /// `sender` feeds the connection's writer task; everything the server
    /// sends to this client goes through it.
    ///
    /// Returns None if the server is at capacity.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Outgoing>,
    ) -> Option<ConnectionId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let id = ConnectionId(self.next_client_id);
        self.next_client_id += 1;

        info!("Client {} connected from {}", id, addr);
        self.clients.insert(id, Client::new(id, addr, sender));
        Some(id)
    }

    /// Removes a client. Dropping its sender ends the writer task.
    ///
    /// Returns false if the client was already gone.
    pub fn remove_client(&mut self, id: ConnectionId) -> bool {
        if let Some(client) = self.clients.remove(&id) {
            info!("Client {} ({}) removed", client.id, client.addr);
            true
        } else {
            false
        }
    }

    /// Looks up a live connection.
    ///
    /// Returns None once the connection has closed or timed out.
    pub fn get(&self, id: ConnectionId) -> Option<&Client> {
        self.clients.get(&id)
    }

    /// Records activity from `id`, and the encoding it used if given.
    ///
    /// Returns false if `id` is not a live connection.
    pub fn touch(&mut self, id: ConnectionId, encoding: Option<Encoding>) -> bool {
        match self.clients.get_mut(&id) {
            Some(client) => {
                client.last_seen = Instant::now();
                if let Some(encoding) = encoding {
                    client.encoding = encoding;
                }
                true
            }
            None => false,
        }
    }

    /// Sends a ping to every client
    pub fn ping_all(&self) {
        for client in self.clients.values() {
            client.ping();
        }
    }

    /// Removes and returns clients that have been silent past `timeout`
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<ConnectionId> {
        let timed_out: Vec<ConnectionId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for id in &timed_out {
            self.remove_client(*id);
        }

        timed_out
    }

    /// Removes every client, ending all writer tasks.
    ///
    /// Each writer closes its socket once its sender is dropped, so this is
    /// how the server hangs up on everyone at shutdown.
    pub fn clear(&mut self) -> usize {
        let count = self.clients.len();
        self.clients.clear();
        if count > 0 {
            info!("Closed {} remaining connections", count);
        }
        count
    }

    /// Number of live connections
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn channel() -> (
        mpsc::UnboundedSender<Outgoing>,
        mpsc::UnboundedReceiver<Outgoing>,
    ) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_add_client_assigns_increasing_ids() {
        let mut manager = ClientManager::new(3);
        let (tx, _rx) = channel();

        assert_eq!(manager.add_client(test_addr(), tx.clone()), Some(ConnectionId(1)));
        assert_eq!(manager.add_client(test_addr(), tx.clone()), Some(ConnectionId(2)));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_ids_not_reused_after_removal() {
        let mut manager = ClientManager::new(3);
        let (tx, _rx) = channel();

        let first = manager.add_client(test_addr(), tx.clone()).unwrap();
        assert!(manager.remove_client(first));
        let second = manager.add_client(test_addr(), tx).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);
        let (tx, _rx) = channel();

        assert!(manager.add_client(test_addr(), tx.clone()).is_some());
        assert!(manager.add_client(test_addr(), tx).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_nonexistent_client() {
        let mut manager = ClientManager::new(2);
        assert!(!manager.remove_client(ConnectionId(999)));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_send_uses_client_encoding() {
        let mut manager = ClientManager::new(2);
        let (tx, mut rx) = channel();
        let id = manager.add_client(test_addr(), tx).unwrap();

        assert!(manager.get(id).unwrap().send(ServerMessage::ServerFull));
        manager.touch(id, Some(Encoding::Bincode));
        assert!(manager.get(id).unwrap().send(ServerMessage::OpponentDisconnected));

        assert_eq!(
            rx.try_recv().unwrap(),
            Outgoing::Message {
                message: ServerMessage::ServerFull,
                encoding: Encoding::Json,
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            Outgoing::Message {
                message: ServerMessage::OpponentDisconnected,
                encoding: Encoding::Bincode,
            }
        );
    }

    #[test]
    fn test_send_fails_once_writer_gone() {
        let mut manager = ClientManager::new(2);
        let (tx, rx) = channel();
        let id = manager.add_client(test_addr(), tx).unwrap();
        drop(rx);

        assert!(!manager.get(id).unwrap().send(ServerMessage::ServerFull));
        assert!(!manager.get(id).unwrap().ping());
    }

    #[test]
    fn test_ping_all() {
        let mut manager = ClientManager::new(2);
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        manager.add_client(test_addr(), tx1);
        manager.add_client(test_addr(), tx2);

        manager.ping_all();
        assert_eq!(rx1.try_recv().unwrap(), Outgoing::Ping);
        assert_eq!(rx2.try_recv().unwrap(), Outgoing::Ping);
    }

    #[test]
    fn test_check_timeouts() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = channel();
        let stale = manager.add_client(test_addr(), tx.clone()).unwrap();
        let fresh = manager.add_client(test_addr(), tx).unwrap();

        manager.clients.get_mut(&stale).unwrap().last_seen =
            Instant::now() - Duration::from_secs(10);

        let timed_out = manager.check_timeouts(Duration::from_secs(5));
        assert_eq!(timed_out, vec![stale]);
        assert!(manager.get(stale).is_none());
        assert!(manager.get(fresh).is_some());
    }

    #[test]
    fn test_clear_drops_all_senders() {
        let mut manager = ClientManager::new(2);
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        manager.add_client(test_addr(), tx1);
        manager.add_client(test_addr(), tx2);

        assert_eq!(manager.clear(), 2);
        assert!(manager.is_empty());
        // With every sender gone the writer side sees the channel close.
        assert_eq!(rx1.try_recv(), Err(TryRecvError::Disconnected));
        assert_eq!(rx2.try_recv(), Err(TryRecvError::Disconnected));
        assert_eq!(manager.clear(), 0);
    }

    #[test]
    fn test_touch_refreshes_last_seen() {
        let mut manager = ClientManager::new(1);
        let (tx, _rx) = channel();
        let id = manager.add_client(test_addr(), tx).unwrap();
        manager.clients.get_mut(&id).unwrap().last_seen =
            Instant::now() - Duration::from_secs(10);

        assert!(manager.touch(id, None));
        assert!(!manager.touch(ConnectionId(42), None));
        assert!(!manager.get(id).unwrap().is_timed_out(Duration::from_secs(5)));
        assert_eq!(manager.get(id).unwrap().encoding, Encoding::Json);
    }
}
