use serde::{Deserialize, Serialize};

// -- Per-viewer game view --

/// Snapshot of a game as seen by one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub game_id: String,
    pub current_user_id: String,
    pub turn_id: String,
    pub turn_ended: bool,
    /// Secret word, masked unless the viewer already found it
    pub word: String,
    pub hint: String,
    /// Newest first
    pub messages: Vec<GameStateMessage>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub nickname: String,
    pub me: bool,
    pub guessed_word: bool,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStateMessage {
    pub me: bool,
    pub nickname: String,
    pub content: String,
}

// -- Session --

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub nickname: String,
}

// -- Games --

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateGameResponse {
    pub game_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitContentRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GameWordResponse {
    pub word: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
