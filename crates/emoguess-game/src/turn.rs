use tracing::{debug, info};

use emoguess_types::api::GameStateMessage;
use emoguess_types::events::{ChatPayload, CorrectGuessPayload, Notification};
use emoguess_types::models::{Message, NewScore};

use crate::config::REDACTED;
use crate::error::{GameError, Result};
use crate::service::{GameService, Outgoing, ServiceInner};
use crate::state::{has_guessed, same_word};

/// Points for a correct guess. Earlier guessers get a larger share:
/// `base * (active_players / guessed_count)`, floored. `guessed_count`
/// includes the guesser.
pub fn guess_points(base_points: i64, active_players: usize, guessed_count: usize) -> i64 {
    let coefficient = active_players.checked_div(guessed_count).unwrap_or(0);
    base_points * coefficient as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Miss,
    /// Right word from a player who already scored this turn
    Repeat,
    Scored { points: i64, turn_over: bool },
}

struct GuessOutcome {
    message: Message,
    nickname: String,
    verdict: Verdict,
}

impl GameService {
    /// Evaluate a guess against the current turn's word.
    ///
    /// The guess is always stored. A first correct guess scores and may end
    /// the turn, in which case the next turn starts after
    /// `turn_advance_delay`. Returns the sender's own view of the message.
    pub async fn submit_guess(&self, game_id: &str, user_id: &str, content: &str) -> Result<GameStateMessage> {
        let (game, user, text) = (game_id.to_string(), user_id.to_string(), content.to_string());
        let outcome = self.blocking(move |inner| evaluate_guess(inner, &game, &user, &text)).await?;

        let GuessOutcome { message, nickname, verdict } = outcome;
        let game_id = message.game_id.clone();

        let batch = match verdict {
            Verdict::Miss => vec![chat(&message, &nickname, &message.content)],
            Verdict::Repeat => vec![chat(&message, &nickname, REDACTED)],
            Verdict::Scored { points, turn_over } => {
                info!("{} guessed the word in game {} for {} points", message.player_id, game_id, points);

                let mut batch = vec![
                    chat(&message, &nickname, REDACTED),
                    Outgoing::FromPlayer(
                        message.player_id.clone(),
                        Notification::CorrectGuess(CorrectGuessPayload {
                            player_id: message.player_id.clone(),
                            nickname: nickname.clone(),
                        }),
                    ),
                ];
                if turn_over {
                    info!("Turn {} of game {} ended", message.turn_id, game_id);
                    batch.push(Outgoing::Broadcast(Notification::TurnEnded));
                }
                batch
            }
        };
        self.publish_later(game_id.clone(), batch);

        if matches!(verdict, Verdict::Scored { turn_over: true, .. }) {
            self.schedule_turn_advance(game_id);
        }

        Ok(GameStateMessage {
            me: true,
            nickname,
            content: message.content,
        })
    }

    /// Post a chat line. Never scores; a line spelling out the secret is
    /// sent to the other players redacted.
    pub async fn send_message(&self, game_id: &str, user_id: &str, content: &str) -> Result<GameStateMessage> {
        let (game, user, text) = (game_id.to_string(), user_id.to_string(), content.to_string());
        let (message, nickname, leaks) = self
            .blocking(move |inner| {
                let user = inner.require_user(&user)?;
                inner.require_game(&game)?;
                let (turn, word) = inner.current_turn(&game)?;

                let active = inner.repos.games.active_players(&game)?;
                if !active.iter().any(|p| p.id == user.id) {
                    return Err(GameError::NotInGame);
                }

                let message = inner.repos.games.send_message(&game, &turn.id, &user.id, &text)?;
                let leaks = same_word(&text, &word.word);
                Ok((message, user.nickname, leaks))
            })
            .await?;

        debug!("{} sent a message in game {}", message.player_id, message.game_id);
        let shown = if leaks { REDACTED } else { message.content.as_str() };
        self.publish_later(message.game_id.clone(), vec![chat(&message, &nickname, shown)]);

        Ok(GameStateMessage {
            me: true,
            nickname,
            content: message.content,
        })
    }
}

fn chat(message: &Message, nickname: &str, content: &str) -> Outgoing {
    Outgoing::FromPlayer(
        message.player_id.clone(),
        Notification::Chat(ChatPayload {
            player_id: message.player_id.clone(),
            nickname: nickname.to_string(),
            content: content.to_string(),
        }),
    )
}

/// Store the guess and score it, all in one unit of work.
fn evaluate_guess(inner: &ServiceInner, game_id: &str, user_id: &str, content: &str) -> Result<GuessOutcome> {
    // Read outside the unit of work: it may hold the only connection
    let user = inner.require_user(user_id)?;
    inner.require_game(game_id)?;
    let (turn, word) = inner.current_turn(game_id)?;

    let uow = inner.repos.units.begin()?;
    let games = uow.games();

    let active = games.active_players(game_id)?;
    if !active.iter().any(|p| p.id == user.id) {
        return Err(GameError::NotInGame);
    }

    let message = games.send_message(game_id, &turn.id, &user.id, content)?;

    if !same_word(content, &word.word) {
        uow.commit()?;
        return Ok(GuessOutcome {
            message,
            nickname: user.nickname,
            verdict: Verdict::Miss,
        });
    }

    let scores = games.scores(game_id)?;
    if has_guessed(&scores, &user.id, &turn.id) {
        uow.commit()?;
        return Ok(GuessOutcome {
            message,
            nickname: user.nickname,
            verdict: Verdict::Repeat,
        });
    }

    let guessed_count = 1 + active
        .iter()
        .filter(|p| p.id != user.id && has_guessed(&scores, &p.id, &turn.id))
        .count();
    let points = guess_points(inner.config.base_points, active.len(), guessed_count);

    games.add_score(NewScore {
        game_id,
        turn_id: &turn.id,
        player_id: &user.id,
        message_id: &message.id,
        points,
    })?;
    uow.commit()?;

    Ok(GuessOutcome {
        message,
        nickname: user.nickname,
        verdict: Verdict::Scored {
            points,
            turn_over: guessed_count == active.len(),
        },
    })
}
