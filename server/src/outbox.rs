//! Outbound messages produced while handling one event.
//!
//! Handlers never touch the transport. They append [`Dispatch`]es to an
//! [`Outbox`], and the event loop delivers them once the handler has returned.

use shared::{ConnectionId, ServerMessage};

/// Messages queued by a handler for the network sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Send {
        to: ConnectionId,
        message: ServerMessage,
    },
    Broadcast {
        to: Vec<ConnectionId>,
        message: ServerMessage,
    },
}

impl Dispatch {
    pub fn recipients(&self) -> &[ConnectionId] {
        match self {
            Dispatch::Send { to, .. } => std::slice::from_ref(to),
            Dispatch::Broadcast { to, .. } => to,
        }
    }

    pub fn message(&self) -> &ServerMessage {
        match self {
            Dispatch::Send { message, .. } | Dispatch::Broadcast { message, .. } => message,
        }
    }
}

#[derive(Debug, Default)]
pub struct Outbox {
    dispatches: Vec<Dispatch>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, to: ConnectionId, message: ServerMessage) {
        self.dispatches.push(Dispatch::Send { to, message });
    }

    /// Queues one message for several connections, delivered in slice order.
    pub fn broadcast(&mut self, to: &[ConnectionId], message: ServerMessage) {
        self.dispatches.push(Dispatch::Broadcast {
            to: to.to_vec(),
            message,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.dispatches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dispatches.len()
    }

    /// Every message addressed to `conn`, in queue order.
    pub fn messages_for(&self, conn: ConnectionId) -> Vec<&ServerMessage> {
        self.dispatches
            .iter()
            .filter(|d| d.recipients().contains(&conn))
            .map(Dispatch::message)
            .collect()
    }

    pub fn into_dispatches(self) -> Vec<Dispatch> {
        self.dispatches
    }
}
