use std::collections::HashMap;

use emoguess_types::api::{GameState, GameStateMessage, LeaderboardEntry};
use emoguess_types::models::{Message, Player, Score, Turn, Word};

use crate::config::{MASK, REDACTED};
use crate::error::{GameError, Result};

/// Raw rows for one game, as loaded from storage.
#[derive(Debug, Clone, Copy)]
pub struct GameSnapshot<'a> {
    pub game_id: &'a str,
    /// All players, any state, in join order
    pub players: &'a [Player],
    pub turn: &'a Turn,
    pub word: &'a Word,
    /// Oldest first
    pub messages: &'a [Message],
    pub scores: &'a [Score],
}

/// Build the view of the game that `viewer_id` is allowed to see.
///
/// Fails with `NotInGame` unless the viewer is an active player.
pub fn derive_state(snapshot: &GameSnapshot<'_>, viewer_id: &str) -> Result<GameState> {
    let active = active_players(snapshot.players);
    if !active.iter().any(|p| p.id == viewer_id) {
        return Err(GameError::NotInGame);
    }

    let turn_id = snapshot.turn.id.as_str();
    let secret = snapshot.word.word.as_str();

    let nicknames: HashMap<&str, &str> = snapshot
        .players
        .iter()
        .map(|p| (p.id.as_str(), p.nickname.as_str()))
        .collect();

    let messages = snapshot
        .messages
        .iter()
        .rev()
        .map(|m| GameStateMessage {
            me: m.player_id == viewer_id,
            nickname: nicknames.get(m.player_id.as_str()).copied().unwrap_or_default().to_string(),
            content: visible_content(&m.content, secret, viewer_id, &m.player_id).to_string(),
        })
        .collect();

    let word = if has_guessed(snapshot.scores, viewer_id, turn_id) {
        secret.to_string()
    } else {
        mask_word(secret)
    };

    Ok(GameState {
        game_id: snapshot.game_id.to_string(),
        current_user_id: viewer_id.to_string(),
        turn_id: turn_id.to_string(),
        turn_ended: is_turn_ended(&active, snapshot.scores, turn_id),
        word,
        hint: snapshot.word.hint.clone(),
        messages,
        leaderboard: leaderboard(&active, snapshot.scores, turn_id, viewer_id),
    })
}

pub fn active_players(players: &[Player]) -> Vec<&Player> {
    players.iter().filter(|p| p.is_active()).collect()
}

/// One entry per active player, in join order.
pub fn leaderboard(active: &[&Player], scores: &[Score], turn_id: &str, viewer_id: &str) -> Vec<LeaderboardEntry> {
    active
        .iter()
        .map(|p| LeaderboardEntry {
            nickname: p.nickname.clone(),
            me: p.id == viewer_id,
            guessed_word: has_guessed(scores, &p.id, turn_id),
            score: total_score(scores, &p.id),
        })
        .collect()
}

/// Whether the player holds a score for the turn.
pub fn has_guessed(scores: &[Score], player_id: &str, turn_id: &str) -> bool {
    scores
        .iter()
        .any(|s| s.player_id == player_id && s.turn_id == turn_id)
}

/// Sum of every score the player earned in the game, all turns.
pub fn total_score(scores: &[Score], player_id: &str) -> i64 {
    scores
        .iter()
        .filter(|s| s.player_id == player_id)
        .map(|s| s.points)
        .sum()
}

/// A turn is over once every active player found the word. Vacuously true
/// for an empty room.
pub fn is_turn_ended(active: &[&Player], scores: &[Score], turn_id: &str) -> bool {
    active.iter().all(|p| has_guessed(scores, &p.id, turn_id))
}

/// Replace word characters with the mask, keep spaces and punctuation.
pub fn mask_word(word: &str) -> String {
    word.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { MASK } else { c })
        .collect()
}

/// Case-insensitive exact comparison with the secret word.
pub fn same_word(content: &str, secret: &str) -> bool {
    content == secret || content.to_lowercase() == secret.to_lowercase()
}

/// A message spelling out the secret is hidden from everyone but its author,
/// whether or not the viewer has found the word themselves.
pub fn visible_content<'a>(content: &'a str, secret: &str, viewer_id: &str, author_id: &str) -> &'a str {
    if viewer_id != author_id && same_word(content, secret) {
        REDACTED
    } else {
        content
    }
}
