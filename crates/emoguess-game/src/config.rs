use std::time::Duration;

/// Placeholder shown instead of a message that spells out the secret word.
pub const REDACTED: &str = "***";

/// Replaces every word character of a masked secret.
pub const MASK: char = '*';

#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Maximum number of simultaneously active players per game
    pub room_capacity: usize,

    /// Points for a correct guess before the early-guess coefficient
    pub base_points: i64,

    /// Pause between the turn-ended broadcast and the next word
    pub turn_advance_delay: Duration,

    /// Grace period after a live stream drops before the player is kicked
    pub kick_delay: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            room_capacity: 10,
            base_points: 10,
            turn_advance_delay: Duration::from_secs(5),
            kick_delay: Duration::from_secs(5),
        }
    }
}
