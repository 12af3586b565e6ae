use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a rejected action, sent along with every `error` envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authorization,
    Phase,
    Capacity,
    NotFound,
    GameRule,
}

/// Everything a player action can be rejected with.
///
/// None of these are fatal: the dispatcher turns each one into a single
/// unicast `error` envelope for the sender.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("{0}")]
    Validation(String),

    #[error("only the room creator can {0}")]
    NotCreator(&'static str),

    #[error("game already started")]
    AlreadyStarted,

    #[error("game already in progress")]
    GameInProgress,

    #[error("game is not active")]
    GameNotActive,

    #[error("round already ended")]
    RoundOver,

    #[error("settings can only be changed in the lobby")]
    SettingsLocked,

    #[error("room is already in the lobby")]
    AlreadyInLobby,

    #[error("need at least 2 players to start")]
    NotEnoughPlayers,

    #[error("room is full")]
    RoomFull,

    #[error("player already in room")]
    AlreadyInRoom,

    #[error("already connected to a room")]
    AlreadyConnected,

    #[error("player not in room")]
    NotInRoom,

    #[error("room not found")]
    RoomNotFound,

    #[error("not connected to a room")]
    NotConnected,

    #[error("not your turn")]
    NotYourTurn,

    #[error("invalid word: {0}")]
    InvalidWord(&'static str),
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::Validation(_) => ErrorKind::Validation,
            GameError::NotCreator(_) => ErrorKind::Authorization,
            GameError::AlreadyStarted
            | GameError::GameInProgress
            | GameError::GameNotActive
            | GameError::RoundOver
            | GameError::SettingsLocked
            | GameError::AlreadyInLobby
            | GameError::NotEnoughPlayers
            | GameError::AlreadyConnected => ErrorKind::Phase,
            GameError::RoomFull | GameError::AlreadyInRoom => ErrorKind::Capacity,
            GameError::NotInRoom | GameError::RoomNotFound | GameError::NotConnected => {
                ErrorKind::NotFound
            }
            GameError::NotYourTurn | GameError::InvalidWord(_) => ErrorKind::GameRule,
        }
    }
}

/// Failure to load the word source. Only ever raised at startup.
#[derive(Error, Debug)]
pub enum WordSourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("word source contains no prompts")]
    Empty,
}
