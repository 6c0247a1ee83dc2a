//! Move coordinator: the per-session authority over the board.
//!
//! A `makeMove` request passes four checks in order: the session exists, the
//! sender plays in it, it is the sender's turn, and the rules engine accepts
//! the move. A request failing any check is dropped without a reply; the
//! client resynchronises from the `moveMade` stream it receives. An accepted
//! move is broadcast to both players, and a terminal position additionally
//! produces `gameOver` and ends the session.

use crate::error::RulesError;
use crate::outbox::Outbox;
use crate::registry::SessionRegistry;
use crate::rules::Terminal;
use log::{debug, info};
use shared::{Color, ConnectionId, MoveSpec, ServerMessage, SessionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Accepted {
        san: String,
        fen: String,
        terminal: Option<Terminal>,
    },
    Ignored(IgnoreReason),
}

/// Why a move request was dropped. Only used for logging and tests; the
/// sender never learns about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    UnknownSession,
    NotAParticipant,
    OutOfTurn { player: Color, to_move: Color },
    Rejected(RulesError),
}

/// Handles `makeMove` from `conn` for `session_id`.
pub fn make_move(
    registry: &mut SessionRegistry,
    conn: ConnectionId,
    session_id: &SessionId,
    spec: &MoveSpec,
    outbox: &mut Outbox,
) -> MoveOutcome {
    let outcome = apply_move(registry, conn, session_id, spec, outbox);
    match &outcome {
        MoveOutcome::Accepted { san, .. } => {
            debug!("{}: {} played {}", session_id, conn, san);
        }
        MoveOutcome::Ignored(reason) => {
            debug!(
                "{}: ignoring move {} from {}: {:?}",
                session_id, spec, conn, reason
            );
        }
    }
    outcome
}

fn apply_move(
    registry: &mut SessionRegistry,
    conn: ConnectionId,
    session_id: &SessionId,
    spec: &MoveSpec,
    outbox: &mut Outbox,
) -> MoveOutcome {
    let Some(session) = registry.session_by_id_mut(session_id) else {
        return MoveOutcome::Ignored(IgnoreReason::UnknownSession);
    };
    let Some(player) = session.color_of(conn) else {
        return MoveOutcome::Ignored(IgnoreReason::NotAParticipant);
    };
    let to_move = session.board.turn();
    if player != to_move {
        return MoveOutcome::Ignored(IgnoreReason::OutOfTurn { player, to_move });
    }

    let applied = match session.board.apply(spec) {
        Ok(applied) => applied,
        Err(e) => return MoveOutcome::Ignored(IgnoreReason::Rejected(e)),
    };
    session.moves.push(applied.san.clone());

    let participants = session.participants();
    outbox.broadcast(
        &participants,
        ServerMessage::MoveMade {
            fen: applied.fen.clone(),
            san: applied.san.clone(),
        },
    );

    let terminal = session.board.terminal();
    if let Some(terminal) = terminal {
        let reason = terminal.reason();
        info!(
            "Game over in {} after {} moves: {}",
            session_id,
            session.moves.len(),
            reason
        );
        outbox.broadcast(&participants, ServerMessage::GameOver { reason });
        registry.remove_session(session_id);
    }

    MoveOutcome::Accepted {
        san: applied.san,
        fen: applied.fen,
        terminal,
    }
}
