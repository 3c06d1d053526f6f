use thiserror::Error;

use crate::Coord2;

/// Board, layout and generator errors.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Invalid coordinates")]
    InvalidCoords,
    #[error("Too many mines")]
    TooManyMines,
    #[error("Board shape does not match declared size")]
    InvalidBoardShape,
    #[error("Game already ended, no new moves are accepted")]
    AlreadyEnded,
    #[error("No solvable layout found after {attempts} attempts")]
    GenerationExhausted { attempts: u32 },
}

pub type Result<T> = core::result::Result<T, GameError>;

/// Fatal errors raised while decoding a replay file.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Replay file is empty")]
    Empty,
    #[error("Replay file ends in the middle of a field")]
    Truncated,
    #[error("Replay file does not start with the expected magic bytes")]
    BadMagic,
    #[error("Unknown difficulty level {0}")]
    InvalidLevel(u8),
    #[error("Board size is out of range")]
    InvalidBoardSize,
    #[error("Mine position lies outside the board")]
    InvalidMinePosition,
    #[error("Unknown event code {code}")]
    InvalidEvent { code: u8 },
    #[error("Malformed field: {0}")]
    InvalidField(&'static str),
    #[error("Unsupported format version {0}")]
    UnsupportedVersion(u8),
    #[error("Unrecognized replay format")]
    UnknownFormat,
}

/// Errors from using a replay session out of order.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("Replay has not been parsed")]
    NotParsed,
    #[error("Replay has not been analysed")]
    NotAnalysed,
    #[error("Replay contains no events")]
    NoEvents,
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// A click or call that does not apply to the current board state.
///
/// These are recorded against the event that caused them and never abort a replay.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum InvalidOperation {
    #[error("Cell {0:?} lies outside the board")]
    OutOfBounds(Coord2),
    #[error("Cell {0:?} is already revealed")]
    AlreadyRevealed(Coord2),
    #[error("Cell {0:?} cannot be chorded")]
    NotChordable(Coord2),
    #[error("Game already ended")]
    GameFinished,
    #[error("Action does not fit the current mouse state")]
    UnexpectedAction,
}
