use std::sync::Arc;

use anyhow::Result;

use emoguess_types::models::{Game, Message, NewScore, Player, PlayerState, Score, Turn, User, Word};

pub trait UserRepository {
    fn find_user(&self, id: &str) -> Result<Option<User>>;
    fn upsert_user(&self, id: &str, nickname: &str) -> Result<()>;
}

/// Game-scoped rows: games, memberships, turns, messages and scores.
pub trait GameRepository {
    fn find_game(&self, id: &str) -> Result<Option<Game>>;
    fn create_game(&self) -> Result<Game>;

    fn add_player(&self, game_id: &str, user_id: &str) -> Result<()>;
    fn set_player_state(&self, game_id: &str, user_id: &str, state: PlayerState) -> Result<()>;
    /// Every player that ever joined, in join order.
    fn players(&self, game_id: &str) -> Result<Vec<Player>>;

    fn active_players(&self, game_id: &str) -> Result<Vec<Player>> {
        Ok(self
            .players(game_id)?
            .into_iter()
            .filter(Player::is_active)
            .collect())
    }

    /// Most recently created turn.
    fn latest_turn(&self, game_id: &str) -> Result<Option<Turn>>;
    fn add_turn(&self, game_id: &str, word_id: &str) -> Result<Turn>;

    /// Oldest first.
    fn messages(&self, game_id: &str) -> Result<Vec<Message>>;
    fn send_message(&self, game_id: &str, turn_id: &str, player_id: &str, content: &str) -> Result<Message>;

    fn scores(&self, game_id: &str) -> Result<Vec<Score>>;
    fn add_score(&self, score: NewScore<'_>) -> Result<()>;
}

pub trait WordRepository {
    fn all_words(&self) -> Result<Vec<Word>>;
    fn find_word(&self, id: &str) -> Result<Option<Word>>;
}

/// Transaction scope. Dropping it without `commit` rolls back.
///
/// While a unit of work is open, its own `games()` is the only repository
/// that may be used: backends are free to hold their connection for the
/// whole scope.
pub trait UnitOfWork {
    fn games(&self) -> &dyn GameRepository;
    fn commit(self: Box<Self>) -> Result<()>;
    fn rollback(self: Box<Self>) -> Result<()>;
}

pub trait UnitOfWorkFactory {
    fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>>;
}

pub type SharedUsers = Arc<dyn UserRepository + Send + Sync>;
pub type SharedGames = Arc<dyn GameRepository + Send + Sync>;
pub type SharedWords = Arc<dyn WordRepository + Send + Sync>;
pub type SharedUnitOfWork = Arc<dyn UnitOfWorkFactory + Send + Sync>;

/// Every port the game service needs, usually backed by one store.
#[derive(Clone)]
pub struct Repositories {
    pub users: SharedUsers,
    pub games: SharedGames,
    pub words: SharedWords,
    pub units: SharedUnitOfWork,
}

impl Repositories {
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: UserRepository + GameRepository + WordRepository + UnitOfWorkFactory + Send + Sync + 'static,
    {
        Self {
            users: store.clone(),
            games: store.clone(),
            words: store.clone(),
            units: store,
        }
    }
}
