//! Cleanup when a connection goes away.

use crate::outbox::Outbox;
use crate::registry::SessionRegistry;
use log::info;
use shared::{ConnectionId, ServerMessage, SessionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// The connection was neither searching nor playing.
    Idle,
    LeftQueue,
    /// The connection's session ended; the opponent was notified.
    Forfeited {
        session_id: SessionId,
        opponent: ConnectionId,
    },
}

/// Handles the disconnect of `conn`.
///
/// Removes it from the waiting queue, and if it was playing, tells the
/// opponent and removes the session. Safe to call more than once.
pub fn disconnect(
    registry: &mut SessionRegistry,
    conn: ConnectionId,
    outbox: &mut Outbox,
) -> DisconnectOutcome {
    let was_waiting = registry.remove_from_waiting(conn);

    let Some(session) = registry.session_by_connection(conn) else {
        if was_waiting {
            info!("{} left the queue", conn);
            return DisconnectOutcome::LeftQueue;
        }
        return DisconnectOutcome::Idle;
    };

    let session_id = session.id.clone();
    let Some(opponent) = session.opponent_of(conn) else {
        return DisconnectOutcome::Idle;
    };

    outbox.send(opponent, ServerMessage::OpponentDisconnected);
    registry.remove_session(&session_id);
    info!(
        "{} disconnected from {}; {} wins by forfeit",
        conn, session_id, opponent
    );

    DisconnectOutcome::Forfeited {
        session_id,
        opponent,
    }
}
