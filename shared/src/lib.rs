//! Wire protocol shared by the chess coordinator server and its clients.
//!
//! Messages travel as WebSocket frames. Text frames carry JSON, binary frames
//! carry bincode; both encode the same [`ClientMessage`] / [`ServerMessage`]
//! enums, so serde's default (external) tagging is used throughout.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Transport-assigned identifier of one live connection. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Identifier of a game session, unique for the lifetime of the server process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        SessionId(value.to_string())
    }
}

/// Side of the board. Serialized as `"w"` / `"b"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    #[serde(rename = "w")]
    White,
    #[serde(rename = "b")]
    Black,
}

impl Color {
    pub fn opponent(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Color::White => "White",
            Color::Black => "Black",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A requested move: from-square, to-square and an optional promotion piece
/// code (`q`, `r`, `b`, `n`). Square syntax is validated by the server before
/// the move reaches the rules engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveSpec {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub promotion: Option<char>,
}

impl MoveSpec {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            promotion: None,
        }
    }

    pub fn with_promotion(mut self, piece: char) -> Self {
        self.promotion = Some(piece);
        self
    }

    /// Parses the compact `e2e4` / `e7e8q` form used by command-line clients.
    pub fn parse_compact(text: &str) -> Option<Self> {
        let text = text.trim();
        if !text.is_ascii() || !(4..=5).contains(&text.len()) {
            return None;
        }
        Some(Self {
            from: text[0..2].to_string(),
            to: text[2..4].to_string(),
            promotion: text[4..].chars().next(),
        })
    }
}

impl fmt::Display for MoveSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(piece) = self.promotion {
            write!(f, "{}", piece)?;
        }
        Ok(())
    }
}

/// Messages sent by clients to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    FindMatch,
    CancelSearch,
    #[serde(rename_all = "camelCase")]
    MakeMove {
        game_id: SessionId,
        #[serde(rename = "move")]
        mv: MoveSpec,
    },
}

/// Messages sent by the server to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Connected { connection_id: ConnectionId },
    ServerFull,
    #[serde(rename_all = "camelCase")]
    MatchFound { game_id: SessionId, color: Color },
    MoveMade {
        fen: String,
        #[serde(rename = "move")]
        san: String,
    },
    GameOver { reason: String },
    OpponentDisconnected,
}

/// Frame encoding negotiated per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Json,
    Bincode,
}

/// An encoded frame payload, ready to be wrapped in a WebSocket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bincode codec error: {0}")]
    Bincode(#[from] bincode::Error),
}

pub fn encode<T: Serialize>(message: &T, encoding: Encoding) -> Result<Frame, CodecError> {
    match encoding {
        Encoding::Json => Ok(Frame::Text(serde_json::to_string(message)?)),
        Encoding::Bincode => Ok(Frame::Binary(bincode::serialize(message)?)),
    }
}

pub fn decode_text<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, CodecError> {
    Ok(serde_json::from_str(text)?)
}

pub fn decode_binary<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, CodecError> {
    Ok(bincode::deserialize(bytes)?)
}
