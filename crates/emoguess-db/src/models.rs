//! Row types as read from SQLite. Timestamps stay raw text until converted
//! into the shared models.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};

use emoguess_types::models::{Game, Message, Player, PlayerState, Score, Turn, User};

/// Current time in the stored format. Fixed-width, so text order is time order.
pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("corrupt timestamp '{}'", raw))
}

pub struct UserRow {
    pub id: String,
    pub nickname: String,
    pub created_at: String,
    pub updated_at: String,
}

impl UserRow {
    pub fn into_model(self) -> Result<User> {
        Ok(User {
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            id: self.id,
            nickname: self.nickname,
        })
    }
}

pub struct GameRow {
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
}

impl GameRow {
    pub fn into_model(self) -> Result<Game> {
        Ok(Game {
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            id: self.id,
        })
    }
}

pub struct PlayerRow {
    pub user_id: String,
    pub nickname: String,
    pub state: String,
    pub joined_at: String,
}

impl PlayerRow {
    pub fn into_model(self) -> Result<Player> {
        let state = PlayerState::parse(&self.state)
            .ok_or_else(|| anyhow!("corrupt player state '{}' for {}", self.state, self.user_id))?;
        Ok(Player {
            joined_at: parse_timestamp(&self.joined_at)?,
            id: self.user_id,
            nickname: self.nickname,
            state,
        })
    }
}

pub struct TurnRow {
    pub id: String,
    pub game_id: String,
    pub word_id: String,
    pub created_at: String,
}

impl TurnRow {
    pub fn into_model(self) -> Result<Turn> {
        Ok(Turn {
            created_at: parse_timestamp(&self.created_at)?,
            id: self.id,
            game_id: self.game_id,
            word_id: self.word_id,
        })
    }
}

pub struct MessageRow {
    pub id: String,
    pub game_id: String,
    pub turn_id: String,
    pub player_id: String,
    pub content: String,
    pub created_at: String,
}

impl MessageRow {
    pub fn into_model(self) -> Result<Message> {
        Ok(Message {
            created_at: parse_timestamp(&self.created_at)?,
            id: self.id,
            game_id: self.game_id,
            turn_id: self.turn_id,
            player_id: self.player_id,
            content: self.content,
        })
    }
}

pub struct ScoreRow {
    pub game_id: String,
    pub turn_id: String,
    pub player_id: String,
    pub message_id: String,
    pub points: i64,
    pub created_at: String,
}

impl ScoreRow {
    pub fn into_model(self) -> Result<Score> {
        Ok(Score {
            created_at: parse_timestamp(&self.created_at)?,
            game_id: self.game_id,
            turn_id: self.turn_id,
            player_id: self.player_id,
            message_id: self.message_id,
            points: self.points,
        })
    }
}
