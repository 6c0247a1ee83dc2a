use shared::CodecError;
use thiserror::Error;

/// Reasons the rules engine refuses a move or a position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    #[error("invalid square {0:?}")]
    InvalidSquare(String),
    #[error("invalid promotion piece {0:?}")]
    InvalidPromotion(char),
    #[error("illegal move {0}")]
    IllegalMove(String),
    #[error("invalid position: {0}")]
    InvalidFen(String),
}

/// Failures of the transport layer. None of these stop the event loop once it
/// is running; per-connection failures become disconnects.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("websocket handshake with {0} timed out")]
    HandshakeTimeout(std::net::SocketAddr),
}
