use std::ops::Deref;

use anyhow::{Result, bail};
use rusqlite::Connection;

use emoguess_game::repo::{GameRepository, UserRepository, WordRepository};
use emoguess_types::ids::new_id;
use emoguess_types::models::{Game, Message, NewScore, Player, PlayerState, Score, Turn, User, Word};

use crate::Database;
use crate::models::{GameRow, MessageRow, PlayerRow, ScoreRow, TurnRow, UserRow, now, parse_timestamp};

/// Game queries over any connection handle: a plain borrow for one-off
/// statements, or the guard a unit of work holds for its transaction.
pub struct ConnRepo<C>(pub C);

impl<C: Deref<Target = Connection>> GameRepository for ConnRepo<C> {
    fn find_game(&self, id: &str) -> Result<Option<Game>> {
        self.0
            .query_row("SELECT id, created_at, updated_at FROM games WHERE id = ?1", [id], |row| {
                Ok(GameRow {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    updated_at: row.get(2)?,
                })
            })
            .optional()?
            .map(GameRow::into_model)
            .transpose()
    }

    fn create_game(&self) -> Result<Game> {
        let id = new_id();
        let ts = now();
        self.0.execute(
            "INSERT INTO games (id, created_at, updated_at) VALUES (?1, ?2, ?2)",
            (&id, &ts),
        )?;
        Ok(Game {
            id,
            created_at: parse_timestamp(&ts)?,
            updated_at: parse_timestamp(&ts)?,
        })
    }

    fn add_player(&self, game_id: &str, user_id: &str) -> Result<()> {
        self.0.execute(
            "INSERT INTO players (game_id, user_id, state, joined_at) VALUES (?1, ?2, 'active', ?3)",
            (game_id, user_id, now()),
        )?;
        Ok(())
    }

    fn set_player_state(&self, game_id: &str, user_id: &str, state: PlayerState) -> Result<()> {
        let changed = self.0.execute(
            "UPDATE players SET state = ?3 WHERE game_id = ?1 AND user_id = ?2",
            (game_id, user_id, state.as_str()),
        )?;
        if changed == 0 {
            bail!("player {} not in game {}", user_id, game_id);
        }
        Ok(())
    }

    fn players(&self, game_id: &str) -> Result<Vec<Player>> {
        let mut stmt = self.0.prepare(
            "SELECT p.user_id, u.nickname, p.state, p.joined_at
             FROM players p
             JOIN users u ON u.id = p.user_id
             WHERE p.game_id = ?1
             ORDER BY p.joined_at, p.rowid",
        )?;

        let rows = stmt
            .query_map([game_id], |row| {
                Ok(PlayerRow {
                    user_id: row.get(0)?,
                    nickname: row.get(1)?,
                    state: row.get(2)?,
                    joined_at: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(PlayerRow::into_model).collect()
    }

    fn latest_turn(&self, game_id: &str) -> Result<Option<Turn>> {
        self.0
            .query_row(
                "SELECT id, game_id, word_id, created_at FROM turns
                 WHERE game_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1",
                [game_id],
                |row| {
                    Ok(TurnRow {
                        id: row.get(0)?,
                        game_id: row.get(1)?,
                        word_id: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?
            .map(TurnRow::into_model)
            .transpose()
    }

    fn add_turn(&self, game_id: &str, word_id: &str) -> Result<Turn> {
        let row = TurnRow {
            id: new_id(),
            game_id: game_id.to_string(),
            word_id: word_id.to_string(),
            created_at: now(),
        };
        self.0.execute(
            "INSERT INTO turns (id, game_id, word_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            (&row.id, &row.game_id, &row.word_id, &row.created_at),
        )?;
        row.into_model()
    }

    fn messages(&self, game_id: &str) -> Result<Vec<Message>> {
        let mut stmt = self.0.prepare(
            "SELECT id, game_id, turn_id, player_id, content, created_at
             FROM messages
             WHERE game_id = ?1
             ORDER BY created_at, rowid",
        )?;

        let rows = stmt
            .query_map([game_id], |row| {
                Ok(MessageRow {
                    id: row.get(0)?,
                    game_id: row.get(1)?,
                    turn_id: row.get(2)?,
                    player_id: row.get(3)?,
                    content: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(MessageRow::into_model).collect()
    }

    fn send_message(&self, game_id: &str, turn_id: &str, player_id: &str, content: &str) -> Result<Message> {
        let row = MessageRow {
            id: new_id(),
            game_id: game_id.to_string(),
            turn_id: turn_id.to_string(),
            player_id: player_id.to_string(),
            content: content.to_string(),
            created_at: now(),
        };
        self.0.execute(
            "INSERT INTO messages (id, game_id, turn_id, player_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            (&row.id, &row.game_id, &row.turn_id, &row.player_id, &row.content, &row.created_at),
        )?;
        row.into_model()
    }

    fn scores(&self, game_id: &str) -> Result<Vec<Score>> {
        let mut stmt = self.0.prepare(
            "SELECT game_id, turn_id, player_id, message_id, points, created_at
             FROM scores
             WHERE game_id = ?1
             ORDER BY created_at, rowid",
        )?;

        let rows = stmt
            .query_map([game_id], |row| {
                Ok(ScoreRow {
                    game_id: row.get(0)?,
                    turn_id: row.get(1)?,
                    player_id: row.get(2)?,
                    message_id: row.get(3)?,
                    points: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(ScoreRow::into_model).collect()
    }

    fn add_score(&self, score: NewScore<'_>) -> Result<()> {
        self.0.execute(
            "INSERT INTO scores (game_id, turn_id, player_id, message_id, points, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                score.game_id,
                score.turn_id,
                score.player_id,
                score.message_id,
                score.points,
                now()
            ],
        )?;
        Ok(())
    }
}

impl UserRepository for Database {
    fn find_user(&self, id: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, nickname, created_at, updated_at FROM users WHERE id = ?1",
                [id],
                |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        nickname: row.get(1)?,
                        created_at: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                },
            )
            .optional()?
            .map(UserRow::into_model)
            .transpose()
        })
    }

    fn upsert_user(&self, id: &str, nickname: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, nickname, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(id) DO UPDATE SET nickname = excluded.nickname, updated_at = excluded.updated_at",
                (id, nickname, now()),
            )?;
            Ok(())
        })
    }
}

impl WordRepository for Database {
    fn all_words(&self) -> Result<Vec<Word>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, word, hint FROM words ORDER BY id")?;
            let words = stmt
                .query_map([], |row| {
                    Ok(Word {
                        id: row.get(0)?,
                        word: row.get(1)?,
                        hint: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(words)
        })
    }

    fn find_word(&self, id: &str) -> Result<Option<Word>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT id, word, hint FROM words WHERE id = ?1", [id], |row| {
                Ok(Word {
                    id: row.get(0)?,
                    word: row.get(1)?,
                    hint: row.get(2)?,
                })
            })
            .optional()
        })
    }
}

impl GameRepository for Database {
    fn find_game(&self, id: &str) -> Result<Option<Game>> {
        self.with_conn(|conn| ConnRepo(conn).find_game(id))
    }

    fn create_game(&self) -> Result<Game> {
        self.with_conn(|conn| ConnRepo(conn).create_game())
    }

    fn add_player(&self, game_id: &str, user_id: &str) -> Result<()> {
        self.with_conn(|conn| ConnRepo(conn).add_player(game_id, user_id))
    }

    fn set_player_state(&self, game_id: &str, user_id: &str, state: PlayerState) -> Result<()> {
        self.with_conn(|conn| ConnRepo(conn).set_player_state(game_id, user_id, state))
    }

    fn players(&self, game_id: &str) -> Result<Vec<Player>> {
        self.with_conn(|conn| ConnRepo(conn).players(game_id))
    }

    fn latest_turn(&self, game_id: &str) -> Result<Option<Turn>> {
        self.with_conn(|conn| ConnRepo(conn).latest_turn(game_id))
    }

    fn add_turn(&self, game_id: &str, word_id: &str) -> Result<Turn> {
        self.with_conn(|conn| ConnRepo(conn).add_turn(game_id, word_id))
    }

    fn messages(&self, game_id: &str) -> Result<Vec<Message>> {
        self.with_conn(|conn| ConnRepo(conn).messages(game_id))
    }

    fn send_message(&self, game_id: &str, turn_id: &str, player_id: &str, content: &str) -> Result<Message> {
        self.with_conn(|conn| ConnRepo(conn).send_message(game_id, turn_id, player_id, content))
    }

    fn scores(&self, game_id: &str) -> Result<Vec<Score>> {
        self.with_conn(|conn| ConnRepo(conn).scores(game_id))
    }

    fn add_score(&self, score: NewScore<'_>) -> Result<()> {
        self.with_conn(|conn| ConnRepo(conn).add_score(score))
    }
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
