use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub nickname: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Membership state of a player inside one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    Active,
    Inactive,
}

impl PlayerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

/// A user's membership in a game. `id` is the user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub nickname: String,
    pub state: PlayerState,
    pub joined_at: DateTime<Utc>,
}

impl Player {
    pub fn is_active(&self) -> bool {
        self.state == PlayerState::Active
    }
}

/// Secret word with its emoji hint. Reference data, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub id: String,
    pub word: String,
    pub hint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub game_id: String,
    pub word_id: String,
    pub created_at: DateTime<Utc>,
}

/// Chat line or guess. Every submission is stored, right or wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub game_id: String,
    pub turn_id: String,
    pub player_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub game_id: String,
    pub turn_id: String,
    pub player_id: String,
    pub message_id: String,
    pub points: i64,
    pub created_at: DateTime<Utc>,
}

/// Insert parameters for a score row.
#[derive(Debug, Clone)]
pub struct NewScore<'a> {
    pub game_id: &'a str,
    pub turn_id: &'a str,
    pub player_id: &'a str,
    pub message_id: &'a str,
    pub points: i64,
}
