//! In-process implementation of every repository trait.
//!
//! A unit of work locks the live tables, stages its writes on a copy and
//! swaps the copy in on commit, so it behaves like the SQLite adapter: one
//! writer at a time, nothing visible until commit.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow, bail};
use chrono::Utc;

use emoguess_types::ids::new_id;
use emoguess_types::models::{Game, Message, NewScore, Player, PlayerState, Score, Turn, User, Word};

use crate::repo::{GameRepository, UnitOfWork, UnitOfWorkFactory, UserRepository, WordRepository};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: Vec<User>,
    games: Vec<Game>,
    /// (game id, player)
    players: Vec<(String, Player)>,
    turns: Vec<Turn>,
    messages: Vec<Message>,
    scores: Vec<Score>,
}

fn lock(tables: &Mutex<Tables>) -> Result<MutexGuard<'_, Tables>> {
    tables.lock().map_err(|e| anyhow!("memory store lock poisoned: {}", e))
}

/// Game tables behind a lock, shared by the live store and staged units.
struct TableRepo {
    tables: Mutex<Tables>,
    fail_score_inserts: Arc<AtomicBool>,
}

impl GameRepository for TableRepo {
    fn find_game(&self, id: &str) -> Result<Option<Game>> {
        Ok(lock(&self.tables)?.games.iter().find(|g| g.id == id).cloned())
    }

    fn create_game(&self) -> Result<Game> {
        let now = Utc::now();
        let game = Game {
            id: new_id(),
            created_at: now,
            updated_at: now,
        };
        lock(&self.tables)?.games.push(game.clone());
        Ok(game)
    }

    fn add_player(&self, game_id: &str, user_id: &str) -> Result<()> {
        let mut t = lock(&self.tables)?;
        if t.players.iter().any(|(g, p)| g == game_id && p.id == user_id) {
            bail!("player {} already in game {}", user_id, game_id);
        }
        let nickname = t
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.nickname.clone())
            .ok_or_else(|| anyhow!("user {} does not exist", user_id))?;
        if !t.games.iter().any(|g| g.id == game_id) {
            bail!("game {} does not exist", game_id);
        }

        t.players.push((
            game_id.to_string(),
            Player {
                id: user_id.to_string(),
                nickname,
                state: PlayerState::Active,
                joined_at: Utc::now(),
            },
        ));
        Ok(())
    }

    fn set_player_state(&self, game_id: &str, user_id: &str, state: PlayerState) -> Result<()> {
        let mut t = lock(&self.tables)?;
        let (_, player) = t
            .players
            .iter_mut()
            .find(|(g, p)| g == game_id && p.id == user_id)
            .ok_or_else(|| anyhow!("player {} not in game {}", user_id, game_id))?;
        player.state = state;
        Ok(())
    }

    fn players(&self, game_id: &str) -> Result<Vec<Player>> {
        Ok(lock(&self.tables)?
            .players
            .iter()
            .filter(|(g, _)| g == game_id)
            .map(|(_, p)| p.clone())
            .collect())
    }

    fn latest_turn(&self, game_id: &str) -> Result<Option<Turn>> {
        // Insertion order breaks timestamp ties
        Ok(lock(&self.tables)?
            .turns
            .iter()
            .filter(|t| t.game_id == game_id)
            .next_back()
            .cloned())
    }

    fn add_turn(&self, game_id: &str, word_id: &str) -> Result<Turn> {
        let turn = Turn {
            id: new_id(),
            game_id: game_id.to_string(),
            word_id: word_id.to_string(),
            created_at: Utc::now(),
        };
        lock(&self.tables)?.turns.push(turn.clone());
        Ok(turn)
    }

    fn messages(&self, game_id: &str) -> Result<Vec<Message>> {
        Ok(lock(&self.tables)?
            .messages
            .iter()
            .filter(|m| m.game_id == game_id)
            .cloned()
            .collect())
    }

    fn send_message(&self, game_id: &str, turn_id: &str, player_id: &str, content: &str) -> Result<Message> {
        let message = Message {
            id: new_id(),
            game_id: game_id.to_string(),
            turn_id: turn_id.to_string(),
            player_id: player_id.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        lock(&self.tables)?.messages.push(message.clone());
        Ok(message)
    }

    fn scores(&self, game_id: &str) -> Result<Vec<Score>> {
        Ok(lock(&self.tables)?
            .scores
            .iter()
            .filter(|s| s.game_id == game_id)
            .cloned()
            .collect())
    }

    fn add_score(&self, score: NewScore<'_>) -> Result<()> {
        if self.fail_score_inserts.load(Ordering::SeqCst) {
            bail!("score insert failed");
        }
        lock(&self.tables)?.scores.push(Score {
            game_id: score.game_id.to_string(),
            turn_id: score.turn_id.to_string(),
            player_id: score.player_id.to_string(),
            message_id: score.message_id.to_string(),
            points: score.points,
            created_at: Utc::now(),
        });
        Ok(())
    }
}

/// Repository backed by plain vectors. Used by tests and local tooling.
pub struct MemoryStore {
    live: TableRepo,
    words: Vec<Word>,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_words(Vec::new())
    }

    pub fn with_words(words: Vec<Word>) -> Self {
        Self {
            live: TableRepo {
                tables: Mutex::new(Tables::default()),
                fail_score_inserts: Arc::new(AtomicBool::new(false)),
            },
            words,
            commits: AtomicUsize::new(0),
            rollbacks: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent `add_score` fail, to exercise rollback paths.
    pub fn fail_score_inserts(&self, fail: bool) {
        self.live.fail_score_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserRepository for MemoryStore {
    fn find_user(&self, id: &str) -> Result<Option<User>> {
        Ok(lock(&self.live.tables)?.users.iter().find(|u| u.id == id).cloned())
    }

    fn upsert_user(&self, id: &str, nickname: &str) -> Result<()> {
        let mut t = lock(&self.live.tables)?;
        let now = Utc::now();
        match t.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.nickname = nickname.to_string();
                user.updated_at = now;
            }
            None => t.users.push(User {
                id: id.to_string(),
                nickname: nickname.to_string(),
                created_at: now,
                updated_at: now,
            }),
        }
        Ok(())
    }
}

impl GameRepository for MemoryStore {
    fn find_game(&self, id: &str) -> Result<Option<Game>> {
        self.live.find_game(id)
    }

    fn create_game(&self) -> Result<Game> {
        self.live.create_game()
    }

    fn add_player(&self, game_id: &str, user_id: &str) -> Result<()> {
        self.live.add_player(game_id, user_id)
    }

    fn set_player_state(&self, game_id: &str, user_id: &str, state: PlayerState) -> Result<()> {
        self.live.set_player_state(game_id, user_id, state)
    }

    fn players(&self, game_id: &str) -> Result<Vec<Player>> {
        self.live.players(game_id)
    }

    fn latest_turn(&self, game_id: &str) -> Result<Option<Turn>> {
        self.live.latest_turn(game_id)
    }

    fn add_turn(&self, game_id: &str, word_id: &str) -> Result<Turn> {
        self.live.add_turn(game_id, word_id)
    }

    fn messages(&self, game_id: &str) -> Result<Vec<Message>> {
        self.live.messages(game_id)
    }

    fn send_message(&self, game_id: &str, turn_id: &str, player_id: &str, content: &str) -> Result<Message> {
        self.live.send_message(game_id, turn_id, player_id, content)
    }

    fn scores(&self, game_id: &str) -> Result<Vec<Score>> {
        self.live.scores(game_id)
    }

    fn add_score(&self, score: NewScore<'_>) -> Result<()> {
        self.live.add_score(score)
    }
}

impl WordRepository for MemoryStore {
    fn all_words(&self) -> Result<Vec<Word>> {
        Ok(self.words.clone())
    }

    fn find_word(&self, id: &str) -> Result<Option<Word>> {
        Ok(self.words.iter().find(|w| w.id == id).cloned())
    }
}

impl UnitOfWorkFactory for MemoryStore {
    fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>> {
        let live = lock(&self.live.tables)?;
        let staged = TableRepo {
            tables: Mutex::new(live.clone()),
            fail_score_inserts: self.live.fail_score_inserts.clone(),
        };
        Ok(Box::new(MemoryUnitOfWork {
            store: self,
            live,
            staged,
            finished: false,
        }))
    }
}

struct MemoryUnitOfWork<'a> {
    store: &'a MemoryStore,
    live: MutexGuard<'a, Tables>,
    staged: TableRepo,
    finished: bool,
}

impl UnitOfWork for MemoryUnitOfWork<'_> {
    fn games(&self) -> &dyn GameRepository {
        &self.staged
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        let staged = std::mem::take(&mut *lock(&self.staged.tables)?);
        *self.live = staged;
        self.finished = true;
        self.store.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        // Drop records it
        Ok(())
    }
}

impl Drop for MemoryUnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.store.rollbacks.fetch_add(1, Ordering::SeqCst);
        }
    }
}
