use thiserror::Error;

use emoguess_gateway::FeedError;
use emoguess_types::events::CodecError;

pub type Result<T> = std::result::Result<T, GameError>;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("already joined")]
    AlreadyJoined,

    #[error("room is full")]
    RoomFull,

    #[error("user not in the game")]
    NotInGame,

    #[error("game {0} not found")]
    GameNotFound(String),

    #[error("user {0} not found")]
    UserNotFound(String),

    #[error("game {0} has no turn")]
    TurnNotFound(String),

    #[error("word {0} not found")]
    WordNotFound(String),

    #[error("word corpus is empty")]
    NoWords,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("persistence error: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

impl GameError {
    /// Rule violations the player caused, as opposed to infrastructure
    /// failures.
    pub fn is_business(&self) -> bool {
        matches!(self, Self::AlreadyJoined | Self::RoomFull | Self::NotInGame)
    }
}
