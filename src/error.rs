use thiserror::Error;

/// Errors that can occur while building positions or choosing a move
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// No column can be played. The only error surfaced by [`crate::api::respond`]
    #[error("No legal moves available")]
    NoLegalMoves,

    /// The wall-clock budget ran out in the middle of a search
    #[error("Search aborted, time budget exhausted")]
    SearchAborted,

    #[error("Engine returned illegal move: column {column}")]
    EngineReturnedIllegalMove { column: usize },

    #[error("Invalid move, column {column} {reason}")]
    InvalidMove { column: usize, reason: &'static str },

    #[error("Invalid board: {0}")]
    InvalidBoard(String),

    #[error("Invalid player number: {0}")]
    InvalidPlayer(i64),

    #[error("Internal engine failure: {0}")]
    Internal(String),
}

/// Convenience Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
