use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use emoguess_game::GameConfig;

/// Process settings, read from `EMOGUESS_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub cookie_secure: bool,
    pub game: GameConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("EMOGUESS_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse(&lookup, "EMOGUESS_PORT", 9000)?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let defaults = GameConfig::default();
        let game = GameConfig {
            room_capacity: parse(&lookup, "EMOGUESS_ROOM_CAPACITY", defaults.room_capacity)?,
            turn_advance_delay: Duration::from_secs(parse(
                &lookup,
                "EMOGUESS_TURN_DELAY_SECS",
                defaults.turn_advance_delay.as_secs(),
            )?),
            kick_delay: Duration::from_secs(parse(
                &lookup,
                "EMOGUESS_KICK_DELAY_SECS",
                defaults.kick_delay.as_secs(),
            )?),
            ..defaults
        };

        Ok(Self {
            addr,
            db_path: PathBuf::from(lookup("EMOGUESS_DB_PATH").unwrap_or_else(|| "emoguess.db".into())),
            cookie_secure: parse(&lookup, "EMOGUESS_COOKIE_SECURE", true)?,
            game,
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(cfg.db_path, PathBuf::from("emoguess.db"));
        assert!(cfg.cookie_secure);
        assert_eq!(cfg.game.room_capacity, 10);
        assert_eq!(cfg.game.turn_advance_delay, Duration::from_secs(5));
        assert_eq!(cfg.game.kick_delay, Duration::from_secs(5));
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            ("EMOGUESS_HOST", "127.0.0.1"),
            ("EMOGUESS_PORT", "8080"),
            ("EMOGUESS_ROOM_CAPACITY", "4"),
            ("EMOGUESS_TURN_DELAY_SECS", "2"),
            ("EMOGUESS_COOKIE_SECURE", "false"),
        ])
        .unwrap();
        assert_eq!(cfg.addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(cfg.game.room_capacity, 4);
        assert_eq!(cfg.game.turn_advance_delay, Duration::from_secs(2));
        assert!(!cfg.cookie_secure);
    }

    #[test]
    fn invalid_numbers_are_errors() {
        assert!(config(&[("EMOGUESS_PORT", "ninety")]).is_err());
        assert!(config(&[("EMOGUESS_ROOM_CAPACITY", "-1")]).is_err());
    }
}
