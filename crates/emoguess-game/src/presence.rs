use std::time::Duration;

use tracing::{debug, info, warn};

use emoguess_types::events::{JoinPayload, LeftPayload, Notification};
use emoguess_types::models::PlayerState;

use crate::error::{GameError, Result};
use crate::service::{GameService, Outgoing};

impl GameService {
    /// Seat a user in the game, or bring back a player who was kicked.
    ///
    /// Fails with `AlreadyJoined` for a player who is still active and with
    /// `RoomFull` once `room_capacity` players are active.
    pub async fn join_game(&self, game_id: &str, user_id: &str) -> Result<()> {
        let (game, user) = (game_id.to_string(), user_id.to_string());
        let (nickname, rejoined) = self
            .blocking(move |inner| {
                let user = inner.require_user(&user)?;
                inner.require_game(&game)?;

                let uow = inner.repos.units.begin()?;
                let players = uow.games().players(&game)?;
                let existing = players.iter().find(|p| p.id == user.id);

                if existing.is_some_and(|p| p.is_active()) {
                    return Err(GameError::AlreadyJoined);
                }

                let active = players.iter().filter(|p| p.is_active()).count();
                if active >= inner.config.room_capacity {
                    return Err(GameError::RoomFull);
                }

                match existing {
                    Some(_) => uow.games().set_player_state(&game, &user.id, PlayerState::Active)?,
                    None => uow.games().add_player(&game, &user.id)?,
                }
                uow.commit()?;

                Ok((user.nickname, existing.is_some()))
            })
            .await?;

        info!(
            "{} {} game {}",
            user_id,
            if rejoined { "rejoined" } else { "joined" },
            game_id
        );
        self.publish_later(
            game_id.to_string(),
            vec![Outgoing::FromPlayer(
                user_id.to_string(),
                Notification::Join(JoinPayload {
                    player_id: user_id.to_string(),
                    nickname,
                }),
            )],
        );
        Ok(())
    }

    /// Mark the player inactive unless they hold a live feed for the game.
    /// Returns whether the player was kicked.
    pub async fn kick_inactive_user(&self, game_id: &str, user_id: &str) -> Result<bool> {
        let connected = self.inner.dispatcher.active_subscribers(game_id).await;
        if connected.iter().any(|id| id == user_id) {
            debug!("{} still connected to game {}, not kicking", user_id, game_id);
            return Ok(false);
        }

        let (game, user) = (game_id.to_string(), user_id.to_string());
        let kicked = self
            .blocking(move |inner| {
                let players = inner.repos.games.players(&game)?;
                let Some(player) = players.iter().find(|p| p.id == user) else {
                    return Err(GameError::NotInGame);
                };
                if !player.is_active() {
                    return Ok(false);
                }
                inner.repos.games.set_player_state(&game, &user, PlayerState::Inactive)?;
                Ok(true)
            })
            .await?;
        if !kicked {
            debug!("{} already inactive in game {}", user_id, game_id);
            return Ok(false);
        }

        info!("{} kicked from game {} after disconnect", user_id, game_id);
        self.publish_later(
            game_id.to_string(),
            vec![Outgoing::FromPlayer(
                user_id.to_string(),
                Notification::Left(LeftPayload {
                    player_id: user_id.to_string(),
                }),
            )],
        );
        Ok(true)
    }

    /// Check the player again after `delay`; used when a live stream ends so
    /// a quick reconnect keeps the seat.
    pub fn kick_after(&self, game_id: &str, user_id: &str, delay: Duration) {
        let service = self.clone();
        let (game_id, user_id) = (game_id.to_string(), user_id.to_string());

        self.spawn_delayed(delay, async move {
            match service.kick_inactive_user(&game_id, &user_id).await {
                Ok(_) => {}
                Err(e) if e.is_business() => debug!("Kick of {} in game {} skipped: {}", user_id, game_id, e),
                Err(e) => warn!("Kick of {} in game {} failed: {}", user_id, game_id, e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::GameConfig;
    use crate::memory::MemoryStore;
    use crate::repo::{GameRepository, UserRepository};
    use crate::service::tests::{service_with, words};

    fn seeded(capacity: usize) -> (GameService, Arc<MemoryStore>, String) {
        let store = Arc::new(MemoryStore::with_words(words()));
        let service = service_with(
            store.clone(),
            GameConfig {
                room_capacity: capacity,
                ..GameConfig::default()
            },
        );
        for (id, nickname) in [("alice", "SillyCat"), ("bob", "AngryDog"), ("carol", "HandsomeMouse")] {
            store.upsert_user(id, nickname).unwrap();
        }
        let game = store.create_game().unwrap();
        store.add_turn(&game.id, "w-apple").unwrap();
        (service, store, game.id)
    }

    #[tokio::test]
    async fn joining_twice_fails() {
        let (service, store, game_id) = seeded(10);
        service.join_game(&game_id, "alice").await.unwrap();

        let err = service.join_game(&game_id, "alice").await.unwrap_err();
        assert!(matches!(err, GameError::AlreadyJoined));
        assert!(err.is_business());
        assert_eq!(store.players(&game_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn full_room_rejects_newcomers() {
        let (service, store, game_id) = seeded(2);
        service.join_game(&game_id, "alice").await.unwrap();
        service.join_game(&game_id, "bob").await.unwrap();

        let err = service.join_game(&game_id, "carol").await.unwrap_err();
        assert!(matches!(err, GameError::RoomFull));
        assert_eq!(store.players(&game_id).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn inactive_players_free_their_seat() {
        let (service, _, game_id) = seeded(2);
        service.join_game(&game_id, "alice").await.unwrap();
        service.join_game(&game_id, "bob").await.unwrap();
        assert!(service.kick_inactive_user(&game_id, "bob").await.unwrap());

        service.join_game(&game_id, "carol").await.unwrap();
    }

    #[tokio::test]
    async fn rejoin_reactivates_existing_row() {
        let (service, store, game_id) = seeded(10);
        service.join_game(&game_id, "alice").await.unwrap();
        store.set_player_state(&game_id, "alice", PlayerState::Inactive).unwrap();

        service.join_game(&game_id, "alice").await.unwrap();

        let players = store.players(&game_id).unwrap();
        assert_eq!(players.len(), 1);
        assert!(players[0].is_active());
    }

    #[tokio::test]
    async fn join_notifies_others_but_not_self() {
        let (service, _, game_id) = seeded(10);
        service.join_game(&game_id, "alice").await.unwrap();
        let alice_feed = service.dispatcher().subscribe(&game_id, "alice").await;

        service.join_game(&game_id, "bob").await.unwrap();

        assert_eq!(
            alice_feed.recv().await,
            Some(Notification::Join(JoinPayload {
                player_id: "bob".into(),
                nickname: "AngryDog".into(),
            }))
        );

        // Batches go out in order, so alice's own join is already flushed
        let bob_feed = service.dispatcher().subscribe(&game_id, "bob").await;
        let nothing = tokio::time::timeout(Duration::from_millis(20), bob_feed.recv()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn join_unknown_game_fails() {
        let (service, _, _) = seeded(10);
        let err = service.join_game("missing", "alice").await.unwrap_err();
        assert!(matches!(err, GameError::GameNotFound(_)));
    }

    #[tokio::test]
    async fn connected_player_is_not_kicked() {
        let (service, store, game_id) = seeded(10);
        service.join_game(&game_id, "alice").await.unwrap();
        let _feed = service.dispatcher().subscribe(&game_id, "alice").await;

        assert!(!service.kick_inactive_user(&game_id, "alice").await.unwrap());
        assert!(store.players(&game_id).unwrap()[0].is_active());
    }

    #[tokio::test]
    async fn disconnected_player_is_kicked_and_peers_told() {
        let (service, store, game_id) = seeded(10);
        service.join_game(&game_id, "alice").await.unwrap();
        service.join_game(&game_id, "bob").await.unwrap();
        let bob_feed = service.dispatcher().subscribe(&game_id, "bob").await;

        assert!(service.kick_inactive_user(&game_id, "alice").await.unwrap());

        assert_eq!(store.players(&game_id).unwrap()[0].state, PlayerState::Inactive);
        // alice's join may still be in flight ahead of the left notice
        let left = loop {
            match bob_feed.recv().await {
                Some(Notification::Left(left)) => break left,
                Some(_) => continue,
                None => panic!("feed closed"),
            }
        };
        assert_eq!(left, LeftPayload { player_id: "alice".into() });
    }

    #[tokio::test]
    async fn second_kick_is_a_no_op() {
        let (service, _, game_id) = seeded(10);
        service.join_game(&game_id, "alice").await.unwrap();
        service.join_game(&game_id, "bob").await.unwrap();
        let bob_feed = service.dispatcher().subscribe(&game_id, "bob").await;

        assert!(service.kick_inactive_user(&game_id, "alice").await.unwrap());
        assert!(!service.kick_inactive_user(&game_id, "alice").await.unwrap());

        let mut lefts = 0;
        while let Ok(Some(notification)) = tokio::time::timeout(Duration::from_millis(50), bob_feed.recv()).await {
            if matches!(notification, Notification::Left(_)) {
                lefts += 1;
            }
        }
        assert_eq!(lefts, 1);
    }

    #[tokio::test]
    async fn kicking_a_stranger_fails() {
        let (service, _, game_id) = seeded(10);
        let err = service.kick_inactive_user(&game_id, "carol").await.unwrap_err();
        assert!(matches!(err, GameError::NotInGame));
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_kick_spares_a_reconnect() {
        let (service, store, game_id) = seeded(10);
        service.join_game(&game_id, "alice").await.unwrap();

        service.kick_after(&game_id, "alice", Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(1)).await;
        let _feed = service.dispatcher().subscribe(&game_id, "alice").await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(store.players(&game_id).unwrap()[0].is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_kick_fires_without_reconnect() {
        let (service, store, game_id) = seeded(10);
        service.join_game(&game_id, "alice").await.unwrap();

        service.kick_after(&game_id, "alice", Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(6)).await;

        for _ in 0..100 {
            if !store.players(&game_id).unwrap()[0].is_active() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("alice was never kicked");
    }
}
