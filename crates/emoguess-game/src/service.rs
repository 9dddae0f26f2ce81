use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::anyhow;
use rand::seq::IndexedRandom;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use emoguess_gateway::{Dispatcher, run_feed};
use emoguess_types::api::{GameState, LeaderboardEntry};
use emoguess_types::events::{Notification, NotificationKind};
use emoguess_types::ids::new_id;
use emoguess_types::models::{Game, Message, Player, Score, Turn, User, Word};

use crate::config::GameConfig;
use crate::error::{GameError, Result};
use crate::nickname;
use crate::repo::Repositories;
use crate::state::{GameSnapshot, derive_state};

/// Entry point for every game operation.
///
/// Repository work runs on the blocking pool. Notifications go out after the
/// owning transaction committed, from tracked background tasks, so a slow
/// subscriber never holds up the caller.
#[derive(Clone)]
pub struct GameService {
    pub(crate) inner: Arc<ServiceInner>,
}

pub(crate) struct ServiceInner {
    pub(crate) repos: Repositories,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) config: GameConfig,
    tasks: TaskTracker,
    shutdown: CancellationToken,
    publish_queue: Mutex<PublishQueue>,
}

/// Tail of each game's publish chain: the batch number and completion signal
/// of the most recently queued batch. Entries go away once their batch ran.
#[derive(Default)]
struct PublishQueue {
    next_batch: u64,
    tails: HashMap<String, (u64, oneshot::Receiver<()>)>,
}

/// Notification waiting for its transaction to commit.
pub(crate) enum Outgoing {
    /// Everyone in the game except this player
    FromPlayer(String, Notification),
    Broadcast(Notification),
}

/// Everything the view derivation needs, loaded in one go.
pub(crate) struct GameRows {
    pub(crate) players: Vec<Player>,
    pub(crate) turn: Turn,
    pub(crate) word: Word,
    pub(crate) messages: Vec<Message>,
    pub(crate) scores: Vec<Score>,
}

impl GameRows {
    pub(crate) fn snapshot<'a>(&'a self, game_id: &'a str) -> GameSnapshot<'a> {
        GameSnapshot {
            game_id,
            players: &self.players,
            turn: &self.turn,
            word: &self.word,
            messages: &self.messages,
            scores: &self.scores,
        }
    }
}

impl GameService {
    pub fn new(repos: Repositories, dispatcher: Dispatcher, config: GameConfig) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                repos,
                dispatcher,
                config,
                tasks: TaskTracker::new(),
                shutdown: CancellationToken::new(),
                publish_queue: Mutex::default(),
            }),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn config(&self) -> &GameConfig {
        &self.inner.config
    }

    /// Create a user with a generated nickname.
    pub async fn init_user(&self) -> Result<User> {
        self.blocking(|inner| {
            let id = new_id();
            let nickname = nickname::generate();
            inner.repos.users.upsert_user(&id, &nickname)?;

            let user = inner
                .repos
                .users
                .find_user(&id)?
                .ok_or_else(|| GameError::UserNotFound(id.clone()))?;
            info!("User {} created as {}", user.id, user.nickname);
            Ok(user)
        })
        .await
    }

    /// Open a new room with `user_id` as its first player and the first
    /// word already drawn.
    pub async fn init_game(&self, user_id: &str) -> Result<Game> {
        let user_id = user_id.to_string();
        self.blocking(move |inner| {
            let user = inner
                .repos
                .users
                .find_user(&user_id)?
                .ok_or_else(|| GameError::UserNotFound(user_id.clone()))?;
            let word = inner.random_word()?;

            let uow = inner.repos.units.begin()?;
            let game = uow.games().create_game()?;
            uow.games().add_player(&game.id, &user.id)?;
            let turn = uow.games().add_turn(&game.id, &word.id)?;
            uow.commit()?;

            info!("Game {} created by {} (first turn {})", game.id, user.id, turn.id);
            Ok(game)
        })
        .await
    }

    /// Full view of the game for one active player.
    pub async fn game_state(&self, game_id: &str, viewer_id: &str) -> Result<GameState> {
        let (game_id, viewer_id) = (game_id.to_string(), viewer_id.to_string());
        self.blocking(move |inner| {
            let rows = inner.load_rows(&game_id, &viewer_id)?;
            derive_state(&rows.snapshot(&game_id), &viewer_id)
        })
        .await
    }

    pub async fn leaderboard(&self, game_id: &str, viewer_id: &str) -> Result<Vec<LeaderboardEntry>> {
        Ok(self.game_state(game_id, viewer_id).await?.leaderboard)
    }

    /// Current word, masked unless the viewer already found it.
    pub async fn game_word(&self, game_id: &str, viewer_id: &str) -> Result<String> {
        Ok(self.game_state(game_id, viewer_id).await?.word)
    }

    /// Stream the game's notifications to `handler` until `cancel` fires or
    /// the service shuts down. The player is unsubscribed on return.
    pub async fn game_updates<F>(
        &self,
        game_id: &str,
        user_id: &str,
        cancel: CancellationToken,
        handler: F,
    ) -> Result<()>
    where
        F: FnMut(NotificationKind, &str) -> anyhow::Result<()>,
    {
        let feed_cancel = self.inner.shutdown.child_token();
        let _stop_forwarding = feed_cancel.clone().drop_guard();

        let forward = feed_cancel.clone();
        self.inner.tasks.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => forward.cancel(),
                _ = forward.cancelled() => {}
            }
        });

        run_feed(&self.inner.dispatcher, game_id, user_id, feed_cancel, handler).await?;
        Ok(())
    }

    /// Cancel pending delayed work and wait for every background task.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        info!("Game service stopped");
    }

    /// Run repository work off the async runtime.
    pub(crate) async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&ServiceInner) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| GameError::Persistence(anyhow!("blocking task failed: {}", e)))?
    }

    /// Queue notifications for delivery. Batches of one game go out one
    /// after another in the order they were queued; games never wait on
    /// each other.
    pub(crate) fn publish_later(&self, game_id: String, batch: Vec<Outgoing>) {
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let (batch_no, previous) = {
            let mut queue = self.inner.publish_queue.lock().unwrap_or_else(PoisonError::into_inner);
            let batch_no = queue.next_batch;
            queue.next_batch += 1;
            let previous = queue.tails.insert(game_id.clone(), (batch_no, done_rx));
            (batch_no, previous.map(|(_, rx)| rx))
        };

        let inner = self.inner.clone();
        self.inner.tasks.spawn(async move {
            if let Some(previous) = previous {
                // Resolves once the earlier batch finished or was dropped
                let _ = previous.await;
            }

            for item in batch {
                match item {
                    Outgoing::FromPlayer(sender_id, notification) => {
                        inner.dispatcher.publish(&game_id, &sender_id, notification).await
                    }
                    Outgoing::Broadcast(notification) => inner.dispatcher.publish_all(&game_id, notification).await,
                };
            }
            drop(done_tx);

            let mut queue = inner.publish_queue.lock().unwrap_or_else(PoisonError::into_inner);
            if queue.tails.get(&game_id).is_some_and(|(tail, _)| *tail == batch_no) {
                queue.tails.remove(&game_id);
            }
        });
    }

    /// Start the next turn once the configured pause elapsed.
    pub(crate) fn schedule_turn_advance(&self, game_id: String) {
        let service = self.clone();
        let delay = self.inner.config.turn_advance_delay;
        let shutdown = self.inner.shutdown.clone();

        self.inner.tasks.spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Turn advance for game {} cancelled", game_id);
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            let id = game_id.clone();
            match service.blocking(move |inner| inner.advance_turn(&id)).await {
                Ok(turn) => info!("Game {} advanced to turn {}", game_id, turn.id),
                Err(e) => warn!("Failed to start a new turn in game {}: {}", game_id, e),
            }
        });
    }

    /// Run `f` after `delay` unless the service shuts down first.
    pub(crate) fn spawn_delayed<Fut>(&self, delay: std::time::Duration, f: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let shutdown = self.inner.shutdown.clone();
        self.inner.tasks.spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => f.await,
            }
        });
    }
}

impl ServiceInner {
    pub(crate) fn random_word(&self) -> Result<Word> {
        let words = self.repos.words.all_words()?;
        words.choose(&mut rand::rng()).cloned().ok_or(GameError::NoWords)
    }

    pub(crate) fn advance_turn(&self, game_id: &str) -> Result<Turn> {
        let word = self.random_word()?;
        Ok(self.repos.games.add_turn(game_id, &word.id)?)
    }

    pub(crate) fn current_turn(&self, game_id: &str) -> Result<(Turn, Word)> {
        let turn = self
            .repos
            .games
            .latest_turn(game_id)?
            .ok_or_else(|| GameError::TurnNotFound(game_id.to_string()))?;
        let word = self
            .repos
            .words
            .find_word(&turn.word_id)?
            .ok_or_else(|| GameError::WordNotFound(turn.word_id.clone()))?;
        Ok((turn, word))
    }

    pub(crate) fn require_game(&self, game_id: &str) -> Result<Game> {
        self.repos
            .games
            .find_game(game_id)?
            .ok_or_else(|| GameError::GameNotFound(game_id.to_string()))
    }

    pub(crate) fn require_user(&self, user_id: &str) -> Result<User> {
        self.repos
            .users
            .find_user(user_id)?
            .ok_or_else(|| GameError::UserNotFound(user_id.to_string()))
    }

    /// Load a game's rows; fails early when the viewer is not an active
    /// player so outsiders never cause the heavier reads.
    fn load_rows(&self, game_id: &str, viewer_id: &str) -> Result<GameRows> {
        self.require_game(game_id)?;

        let players = self.repos.games.players(game_id)?;
        if !players.iter().any(|p| p.id == viewer_id && p.is_active()) {
            return Err(GameError::NotInGame);
        }

        let (turn, word) = self.current_turn(game_id)?;
        Ok(GameRows {
            players,
            turn,
            word,
            messages: self.repos.games.messages(game_id)?,
            scores: self.repos.games.scores(game_id)?,
        })
    }
}
