//! Session registry: the waiting queue, the live sessions and the
//! connection→session index.
//!
//! The registry is a plain owned value. The network event loop holds the only
//! instance and passes it by `&mut` into each handler, so every operation here
//! runs to completion before another event is looked at.

use crate::rules::Board;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Color, ConnectionId, SessionId};
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

/// One game between two connections.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub white: ConnectionId,
    pub black: ConnectionId,
    /// Authoritative position. Only the move coordinator mutates it.
    pub board: Board,
    /// SAN of every accepted move, in order.
    pub moves: Vec<String>,
    pub started_at: Instant,
}

impl Session {
    fn new(id: SessionId, white: ConnectionId, black: ConnectionId) -> Self {
        Self {
            id,
            white,
            black,
            board: Board::new(),
            moves: Vec::new(),
            started_at: Instant::now(),
        }
    }

    /// Color assigned to `conn`, or `None` if it does not play in this session.
    pub fn color_of(&self, conn: ConnectionId) -> Option<Color> {
        if conn == self.white {
            Some(Color::White)
        } else if conn == self.black {
            Some(Color::Black)
        } else {
            None
        }
    }

    /// Connection playing `color`
    pub fn connection_for(&self, color: Color) -> ConnectionId {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    /// The other participant, or `None` if `conn` does not play here
    pub fn opponent_of(&self, conn: ConnectionId) -> Option<ConnectionId> {
        self.color_of(conn)
            .map(|color| self.connection_for(color.opponent()))
    }

    /// White first, then black.
    pub fn participants(&self) -> [ConnectionId; 2] {
        [self.white, self.black]
    }
}

/// Owner of all matchmaking and session state.
pub struct SessionRegistry {
    /// Connections searching for an opponent, longest-waiting first
    waiting: VecDeque<ConnectionId>,
    sessions: HashMap<SessionId, Session>,
    by_connection: HashMap<ConnectionId, SessionId>,
    next_session_id: u64,
    /// Source of the color coin flip
    rng: StdRng,
}

impl SessionRegistry {
    /// Creates an empty registry with an entropy-seeded coin flip.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Registry with a deterministic coin flip.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            waiting: VecDeque::new(),
            sessions: HashMap::new(),
            by_connection: HashMap::new(),
            next_session_id: 1,
            rng,
        }
    }

    /// Appends `conn` to the waiting queue.
    ///
    /// Returns false, leaving the queue unchanged, if `conn` is already waiting.
    pub fn enqueue_waiting(&mut self, conn: ConnectionId) -> bool {
        if self.is_waiting(conn) {
            return false;
        }
        self.waiting.push_back(conn);
        debug!("{} waiting ({} in queue)", conn, self.waiting.len());
        true
    }

    /// Takes the longest-waiting connection off the queue.
    ///
    /// Returns None when nobody is searching.
    pub fn dequeue_waiting(&mut self) -> Option<ConnectionId> {
        self.waiting.pop_front()
    }

    /// Removes `conn` from the waiting queue wherever it is.
    ///
    /// Returns true if `conn` was waiting.
    pub fn remove_from_waiting(&mut self, conn: ConnectionId) -> bool {
        match self.waiting.iter().position(|c| *c == conn) {
            Some(index) => {
                self.waiting.remove(index);
                true
            }
            None => false,
        }
    }

    /// Checks if `conn` is searching for an opponent
    pub fn is_waiting(&self, conn: ConnectionId) -> bool {
        self.waiting.contains(&conn)
    }

    /// Number of connections currently searching
    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    /// Creates a session for two connections, flipping a coin for colors.
    ///
    /// Both connections are indexed before this returns. Neither connection
    /// may already belong to a session.
    pub fn create_session(&mut self, a: ConnectionId, b: ConnectionId) -> &Session {
        debug_assert_ne!(a, b);
        debug_assert!(!self.by_connection.contains_key(&a));
        debug_assert!(!self.by_connection.contains_key(&b));

        let id = SessionId(format!("game-{}", self.next_session_id));
        self.next_session_id += 1;

        let (white, black) = if self.rng.gen_bool(0.5) { (a, b) } else { (b, a) };

        self.by_connection.insert(white, id.clone());
        self.by_connection.insert(black, id.clone());
        info!("Session {} created: {} (white) vs {} (black)", id, white, black);

        self.sessions
            .entry(id.clone())
            .or_insert_with(|| Session::new(id, white, black))
    }

    /// Looks up a live session by id.
    ///
    /// Finished and abandoned sessions are removed, so this returns None for
    /// them.
    pub fn session_by_id(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Mutable lookup, for the move coordinator to update the board
    pub fn session_by_id_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// Id of the session `conn` is playing in, if any
    pub fn session_id_for(&self, conn: ConnectionId) -> Option<&SessionId> {
        self.by_connection.get(&conn)
    }

    /// Session `conn` is playing in, if any
    pub fn session_by_connection(&self, conn: ConnectionId) -> Option<&Session> {
        self.by_connection
            .get(&conn)
            .and_then(|id| self.sessions.get(id))
    }

    /// Removes a session together with both of its index entries.
    pub fn remove_session(&mut self, id: &SessionId) -> Option<Session> {
        let session = self.sessions.remove(id)?;
        for conn in session.participants() {
            if self.by_connection.get(&conn) == Some(id) {
                self.by_connection.remove(&conn);
            }
        }
        debug!(
            "Session {} removed after {} moves ({:.1}s)",
            id,
            session.moves.len(),
            session.started_at.elapsed().as_secs_f32()
        );
        Some(session)
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(id: u32) -> ConnectionId {
        ConnectionId(id)
    }

    #[test]
    fn test_waiting_queue_is_fifo() {
        let mut registry = SessionRegistry::with_seed(1);
        assert!(registry.enqueue_waiting(conn(1)));
        assert!(registry.enqueue_waiting(conn(2)));
        assert!(registry.enqueue_waiting(conn(3)));

        assert_eq!(registry.dequeue_waiting(), Some(conn(1)));
        assert_eq!(registry.dequeue_waiting(), Some(conn(2)));
        assert_eq!(registry.dequeue_waiting(), Some(conn(3)));
        assert_eq!(registry.dequeue_waiting(), None);
    }

    #[test]
    fn test_enqueue_rejects_duplicates() {
        let mut registry = SessionRegistry::with_seed(1);
        assert!(registry.enqueue_waiting(conn(1)));
        assert!(!registry.enqueue_waiting(conn(1)));
        assert_eq!(registry.waiting_len(), 1);
    }

    #[test]
    fn test_remove_from_waiting() {
        let mut registry = SessionRegistry::with_seed(1);
        registry.enqueue_waiting(conn(1));
        registry.enqueue_waiting(conn(2));
        registry.enqueue_waiting(conn(3));

        assert!(registry.remove_from_waiting(conn(2)));
        assert!(!registry.remove_from_waiting(conn(2)));
        assert!(!registry.is_waiting(conn(2)));

        assert_eq!(registry.dequeue_waiting(), Some(conn(1)));
        assert_eq!(registry.dequeue_waiting(), Some(conn(3)));
    }

    #[test]
    fn test_create_session_partitions_colors() {
        let mut registry = SessionRegistry::with_seed(7);
        for i in 0..50 {
            let a = conn(i * 2 + 1);
            let b = conn(i * 2 + 2);
            let session = registry.create_session(a, b);

            assert_ne!(session.white, session.black);
            let colors = [session.color_of(a).unwrap(), session.color_of(b).unwrap()];
            assert!(colors.contains(&Color::White));
            assert!(colors.contains(&Color::Black));
        }
        assert_eq!(registry.session_count(), 50);
    }

    #[test]
    fn test_coin_flip_assigns_both_colors() {
        let mut registry = SessionRegistry::with_seed(42);
        let mut first_was_white = 0;
        for i in 0..200 {
            let a = conn(i * 2 + 1);
            let session = registry.create_session(a, conn(i * 2 + 2));
            if session.white == a {
                first_was_white += 1;
            }
        }
        assert!(first_was_white > 50 && first_was_white < 150);
    }

    #[test]
    fn test_session_ids_are_unique() {
        let mut registry = SessionRegistry::with_seed(3);
        let first = registry.create_session(conn(1), conn(2)).id.clone();
        registry.remove_session(&first);
        let second = registry.create_session(conn(1), conn(2)).id.clone();
        assert_ne!(first, second);
    }

    #[test]
    fn test_index_maps_both_participants() {
        let mut registry = SessionRegistry::with_seed(3);
        let id = registry.create_session(conn(1), conn(2)).id.clone();

        assert_eq!(registry.session_id_for(conn(1)), Some(&id));
        assert_eq!(registry.session_id_for(conn(2)), Some(&id));
        assert_eq!(registry.session_by_connection(conn(1)).unwrap().id, id);
        assert!(registry.session_by_connection(conn(3)).is_none());
        assert!(registry.session_by_id(&id).is_some());
    }

    #[test]
    fn test_remove_session_clears_index() {
        let mut registry = SessionRegistry::with_seed(3);
        let id = registry.create_session(conn(1), conn(2)).id.clone();
        let other = registry.create_session(conn(3), conn(4)).id.clone();

        let removed = registry.remove_session(&id).unwrap();
        assert_eq!(removed.id, id);
        assert!(registry.session_by_id(&id).is_none());
        assert!(registry.session_by_connection(conn(1)).is_none());
        assert!(registry.session_by_connection(conn(2)).is_none());

        assert_eq!(registry.session_id_for(conn(3)), Some(&other));
        assert!(registry.remove_session(&id).is_none());
        assert_eq!(registry.session_count(), 1);
    }

    #[test]
    fn test_session_helpers() {
        let mut registry = SessionRegistry::with_seed(5);
        let session = registry.create_session(conn(1), conn(2)).clone();

        assert_eq!(session.opponent_of(session.white), Some(session.black));
        assert_eq!(session.opponent_of(session.black), Some(session.white));
        assert_eq!(session.opponent_of(conn(9)), None);
        assert_eq!(session.connection_for(Color::White), session.white);
        assert_eq!(session.participants(), [session.white, session.black]);
        assert_eq!(session.board.turn(), Color::White);
        assert!(session.moves.is_empty());
    }
}
