use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                nickname    TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE TABLE games (
                id          TEXT PRIMARY KEY,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE TABLE players (
                game_id     TEXT NOT NULL REFERENCES games(id),
                user_id     TEXT NOT NULL REFERENCES users(id),
                state       TEXT NOT NULL DEFAULT 'active'
                            CHECK (state IN ('active', 'inactive')),
                joined_at   TEXT NOT NULL,
                PRIMARY KEY (game_id, user_id)
            );

            CREATE TABLE words (
                id          TEXT PRIMARY KEY,
                word        TEXT NOT NULL,
                hint        TEXT NOT NULL
            );

            CREATE TABLE turns (
                id          TEXT PRIMARY KEY,
                game_id     TEXT NOT NULL REFERENCES games(id),
                word_id     TEXT NOT NULL REFERENCES words(id),
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_turns_game ON turns(game_id, created_at);

            CREATE TABLE messages (
                id          TEXT PRIMARY KEY,
                game_id     TEXT NOT NULL REFERENCES games(id),
                turn_id     TEXT NOT NULL REFERENCES turns(id),
                player_id   TEXT NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_messages_game ON messages(game_id, created_at);

            -- At most one score per (turn, player) is enforced by the game
            -- layer, not here
            CREATE TABLE scores (
                game_id     TEXT NOT NULL REFERENCES games(id),
                turn_id     TEXT NOT NULL REFERENCES turns(id),
                player_id   TEXT NOT NULL REFERENCES users(id),
                message_id  TEXT NOT NULL REFERENCES messages(id),
                points      INTEGER NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_scores_game ON scores(game_id, turn_id);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            "
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (word corpus)");
        conn.execute_batch(
            "
            BEGIN;

            INSERT INTO words (id, word, hint) VALUES
                ('w01', 'apple', '🍎'),
                ('w02', 'sunflower', '☀️🌸'),
                ('w03', 'rainbow', '🌧️☀️'),
                ('w04', 'snowman', '❄️👨'),
                ('w05', 'firefighter', '🔥🧑‍🚒'),
                ('w06', 'honeybee', '🍯🐝'),
                ('w07', 'starfish', '⭐🐟'),
                ('w08', 'popcorn', '💥🌽'),
                ('w09', 'moonlight', '🌙💡'),
                ('w10', 'keyboard', '🔑🛹'),
                ('w11', 'butterfly', '🧈🪰'),
                ('w12', 'hotdog', '🔥🐶'),
                ('w13', 'football', '🦶⚽'),
                ('w14', 'cupcake', '☕🎂'),
                ('w15', 'earthquake', '🌍🫨'),
                ('w16', 'lighthouse', '💡🏠'),
                ('w17', 'toothbrush', '🦷🪥'),
                ('w18', 'pineapple', '🌲🍎'),
                ('w19', 'sandcastle', '🏖️🏰'),
                ('w20', 'snowball', '❄️⚽'),
                ('w21', 'ice cream', '🧊🍦'),
                ('w22', 'rocket ship', '🚀🚢'),
                ('w23', 'bookworm', '📚🪱'),
                ('w24', 'jellyfish', '🍮🐟'),
                ('w25', 'cowboy', '🐄👦'),
                ('w26', 'sunglasses', '☀️👓'),
                ('w27', 'doghouse', '🐶🏠'),
                ('w28', 'waterfall', '💧🍂'),
                ('w29', 'spider-man', '🕷️👨'),
                ('w30', 'time machine', '⏰⚙️');

            INSERT INTO schema_version (version) VALUES (2);

            COMMIT;
            "
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
