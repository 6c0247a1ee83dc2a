//! Adapter over the `shakmaty` rules engine.
//!
//! The coordinator never inspects the board itself. It asks a [`Board`] whose
//! turn it is, hands it a [`MoveSpec`] to apply, and queries the resulting
//! position for a [`Terminal`] condition. Everything chess-specific stays
//! behind this module.

use crate::error::RulesError;
use shakmaty::fen::Fen;
use shakmaty::san::{San, SanPlus, Suffix};
use shakmaty::{CastlingMode, Chess, EnPassantMode, File, Move, Position, Role, Square};
use shared::{Color, MoveSpec};
use std::collections::HashMap;

/// Half-move clock value at which the fifty-move rule ends the game.
const FIFTY_MOVE_HALFMOVES: u32 = 100;

/// Occurrences of one position that end the game by repetition.
const REPETITION_LIMIT: u32 = 3;

/// Terminal conditions of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Checkmate { winner: Color },
    Stalemate,
    InsufficientMaterial,
    FiftyMoveRule,
    ThreefoldRepetition,
}

impl Terminal {
    /// Human readable reason sent to both players in `gameOver`.
    pub fn reason(&self) -> String {
        match self {
            Terminal::Checkmate { winner } => format!("Checkmate! {} wins!", winner.name()),
            Terminal::Stalemate => "Stalemate!".to_string(),
            Terminal::InsufficientMaterial => "Draw by insufficient material!".to_string(),
            Terminal::FiftyMoveRule => "Draw by fifty-move rule!".to_string(),
            Terminal::ThreefoldRepetition => "Draw by threefold repetition!".to_string(),
        }
    }

    pub fn winner(&self) -> Option<Color> {
        match self {
            Terminal::Checkmate { winner } => Some(*winner),
            _ => None,
        }
    }
}

/// Result of a move accepted by the rules engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    /// Standard algebraic notation, including check/mate suffix.
    pub san: String,
    /// Position after the move.
    pub fen: String,
}

/// Authoritative position of one game plus the history needed for draw claims.
#[derive(Debug, Clone)]
pub struct Board {
    position: Chess,
    repetitions: HashMap<String, u32>,
}

impl Board {
    /// Standard starting position.
    pub fn new() -> Self {
        Self::from_position(Chess::default())
    }

    pub fn from_fen(text: &str) -> Result<Self, RulesError> {
        let fen = text
            .trim()
            .parse::<Fen>()
            .map_err(|e| RulesError::InvalidFen(e.to_string()))?;
        let position: Chess = fen
            .into_position(CastlingMode::Standard)
            .map_err(|e| RulesError::InvalidFen(e.to_string()))?;
        Ok(Self::from_position(position))
    }

    fn from_position(position: Chess) -> Self {
        let mut board = Self {
            position,
            repetitions: HashMap::new(),
        };
        board.record_repetition();
        board
    }

    pub fn turn(&self) -> Color {
        from_engine_color(self.position.turn())
    }

    pub fn is_check(&self) -> bool {
        self.position.is_check()
    }

    pub fn fen(&self) -> String {
        Fen::from_position(self.position.clone(), EnPassantMode::Legal).to_string()
    }

    /// Validates `spec` against the current position and plays it.
    ///
    /// On error the position is left untouched.
    pub fn apply(&mut self, spec: &MoveSpec) -> Result<AppliedMove, RulesError> {
        let requested = parse_move(spec)?;
        let legal = self
            .position
            .legal_moves()
            .into_iter()
            .find(|m| requested.matches(m))
            .ok_or_else(|| RulesError::IllegalMove(spec.to_string()))?;

        let san = San::from_move(&self.position, &legal);
        self.position.play_unchecked(&legal);

        let suffix = if self.position.is_checkmate() {
            Some(Suffix::Checkmate)
        } else if self.position.is_check() {
            Some(Suffix::Check)
        } else {
            None
        };
        self.record_repetition();

        Ok(AppliedMove {
            san: SanPlus { san, suffix }.to_string(),
            fen: self.fen(),
        })
    }

    /// Checkmate is checked first, then stalemate and the automatic draws.
    pub fn terminal(&self) -> Option<Terminal> {
        if self.position.is_checkmate() {
            // The side to move is the side that got mated.
            return Some(Terminal::Checkmate {
                winner: self.turn().opponent(),
            });
        }
        if self.position.is_stalemate() {
            return Some(Terminal::Stalemate);
        }
        if self.position.is_insufficient_material() {
            return Some(Terminal::InsufficientMaterial);
        }
        if self.position.halfmoves() >= FIFTY_MOVE_HALFMOVES {
            return Some(Terminal::FiftyMoveRule);
        }
        if self.current_repetitions() >= REPETITION_LIMIT {
            return Some(Terminal::ThreefoldRepetition);
        }
        None
    }

    fn current_repetitions(&self) -> u32 {
        self.repetitions
            .get(&self.repetition_key())
            .copied()
            .unwrap_or(0)
    }

    fn record_repetition(&mut self) {
        *self.repetitions.entry(self.repetition_key()).or_insert(0) += 1;
    }

    /// Placement, side to move, castling rights and en passant square.
    fn repetition_key(&self) -> String {
        self.fen()
            .split(' ')
            .take(4)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

/// A move spec with validated square and promotion syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Role>,
}

impl RequestedMove {
    /// A promotion code is only compared on promoting moves. Clients may
    /// attach one to every move.
    fn matches(&self, legal: &Move) -> bool {
        legal.from() == Some(self.from)
            && king_destination(legal) == self.to
            && (legal.promotion().is_none() || legal.promotion() == self.promotion)
    }
}

/// Validates the syntax of a wire move spec.
pub fn parse_move(spec: &MoveSpec) -> Result<RequestedMove, RulesError> {
    let promotion = match spec.promotion {
        None => None,
        Some(code) => Some(match code.to_ascii_lowercase() {
            'q' => Role::Queen,
            'r' => Role::Rook,
            'b' => Role::Bishop,
            'n' => Role::Knight,
            _ => return Err(RulesError::InvalidPromotion(code)),
        }),
    };
    Ok(RequestedMove {
        from: parse_square(&spec.from)?,
        to: parse_square(&spec.to)?,
        promotion,
    })
}

fn parse_square(text: &str) -> Result<Square, RulesError> {
    text.trim()
        .to_ascii_lowercase()
        .parse::<Square>()
        .map_err(|_| RulesError::InvalidSquare(text.to_string()))
}

/// Castling is encoded as king-takes-rook by the engine; clients send the
/// king's destination square instead.
fn king_destination(m: &Move) -> Square {
    match *m {
        Move::Castle { king, rook } => {
            let file = if rook.file() > king.file() {
                File::G
            } else {
                File::C
            };
            Square::from_coords(file, king.rank())
        }
        _ => m.to(),
    }
}

fn from_engine_color(color: shakmaty::Color) -> Color {
    match color {
        shakmaty::Color::White => Color::White,
        shakmaty::Color::Black => Color::Black,
    }
}
