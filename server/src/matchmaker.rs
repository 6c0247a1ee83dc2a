//! Pairs searching connections into sessions.

use crate::outbox::Outbox;
use crate::registry::SessionRegistry;
use log::{debug, info};
use shared::{ConnectionId, ServerMessage, SessionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// No opponent was available; the connection now waits.
    Queued,
    Matched { session_id: SessionId },
    Ignored(MatchIgnored),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchIgnored {
    AlreadyWaiting,
    AlreadyPlaying,
}

/// Handles `findMatch`.
///
/// Pairs `conn` with the longest-waiting connection, or queues it when nobody
/// is waiting. Both players of a new session receive `matchFound` with their
/// own color.
pub fn find_match(
    registry: &mut SessionRegistry,
    conn: ConnectionId,
    outbox: &mut Outbox,
) -> MatchOutcome {
    if registry.is_waiting(conn) {
        debug!("{} already searching, ignoring findMatch", conn);
        return MatchOutcome::Ignored(MatchIgnored::AlreadyWaiting);
    }
    if let Some(id) = registry.session_id_for(conn) {
        debug!("{} already playing in {}, ignoring findMatch", conn, id);
        return MatchOutcome::Ignored(MatchIgnored::AlreadyPlaying);
    }

    let opponent = match registry.dequeue_waiting() {
        Some(opponent) => opponent,
        None => {
            registry.enqueue_waiting(conn);
            info!("{} searching for a match", conn);
            return MatchOutcome::Queued;
        }
    };

    let session = registry.create_session(conn, opponent);
    for player in [conn, opponent] {
        if let Some(color) = session.color_of(player) {
            outbox.send(
                player,
                ServerMessage::MatchFound {
                    game_id: session.id.clone(),
                    color,
                },
            );
        }
    }
    info!("Match created: {} - {} vs {}", session.id, conn, opponent);

    MatchOutcome::Matched {
        session_id: session.id.clone(),
    }
}

/// Handles `cancelSearch`. A connection that is not waiting is left alone.
pub fn cancel_search(registry: &mut SessionRegistry, conn: ConnectionId) -> bool {
    let removed = registry.remove_from_waiting(conn);
    if removed {
        info!("{} cancelled search", conn);
    }
    removed
}
