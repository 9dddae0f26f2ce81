use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use emoguess_game::memory::MemoryStore;
use emoguess_game::repo::{GameRepository, Repositories};
use emoguess_game::{GameConfig, GameError, GameService};
use emoguess_gateway::Dispatcher;
use emoguess_types::events::{ChatPayload, CorrectGuessPayload, JoinPayload, Notification};
use emoguess_types::models::Word;

struct LiveFeed {
    rx: mpsc::UnboundedReceiver<Notification>,
    task: JoinHandle<Result<(), GameError>>,
}

impl LiveFeed {
    async fn open(service: &GameService, game_id: &str, user_id: &str, cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let feed_service = service.clone();
        let (game, user) = (game_id.to_string(), user_id.to_string());

        let task = tokio::spawn(async move {
            feed_service
                .game_updates(&game, &user, cancel, move |kind, payload| {
                    tx.send(Notification::decode(kind.as_str(), payload)?)?;
                    Ok(())
                })
                .await
        });

        while !service.dispatcher().is_subscribed(game_id, user_id).await {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        Self { rx, task }
    }

    async fn next(&mut self) -> Notification {
        self.rx.recv().await.expect("feed closed")
    }

    async fn assert_quiet(&mut self) {
        let next = tokio::time::timeout(Duration::from_millis(50), self.rx.recv()).await;
        assert!(next.is_err(), "unexpected notification {:?}", next);
    }
}

fn apple() -> Word {
    Word {
        id: "w-apple".into(),
        word: "APPLE".into(),
        hint: "🍎".into(),
    }
}

#[tokio::test(start_paused = true)]
async fn two_players_finish_a_turn() {
    let store = Arc::new(MemoryStore::with_words(vec![apple()]));
    let service = GameService::new(
        Repositories::from_store(store.clone()),
        Dispatcher::new(),
        GameConfig::default(),
    );
    let cancel = CancellationToken::new();

    let a = service.init_user().await.unwrap();
    let b = service.init_user().await.unwrap();
    let game = service.init_game(&a.id).await.unwrap();
    let first_turn = store.latest_turn(&game.id).unwrap().unwrap();

    let mut a_feed = LiveFeed::open(&service, &game.id, &a.id, cancel.clone()).await;
    service.join_game(&game.id, &b.id).await.unwrap();
    assert_eq!(
        a_feed.next().await,
        Notification::Join(JoinPayload {
            player_id: b.id.clone(),
            nickname: b.nickname.clone(),
        })
    );
    let mut b_feed = LiveFeed::open(&service, &game.id, &b.id, cancel.clone()).await;

    // Plain chat reaches the other player verbatim
    service.send_message(&game.id, &a.id, "hi").await.unwrap();
    assert_eq!(
        b_feed.next().await,
        Notification::Chat(ChatPayload {
            player_id: a.id.clone(),
            nickname: a.nickname.clone(),
            content: "hi".into(),
        })
    );
    a_feed.assert_quiet().await;

    // First correct guess: 10 * (2 / 1)
    let own = service.submit_guess(&game.id, &a.id, "apple").await.unwrap();
    assert_eq!(own.content, "apple");
    assert_eq!(
        b_feed.next().await,
        Notification::Chat(ChatPayload {
            player_id: a.id.clone(),
            nickname: a.nickname.clone(),
            content: "***".into(),
        })
    );
    assert_eq!(
        b_feed.next().await,
        Notification::CorrectGuess(CorrectGuessPayload {
            player_id: a.id.clone(),
            nickname: a.nickname.clone(),
        })
    );
    b_feed.assert_quiet().await;

    let for_a = service.game_state(&game.id, &a.id).await.unwrap();
    let for_b = service.game_state(&game.id, &b.id).await.unwrap();
    assert_eq!(for_a.word, "APPLE");
    assert_eq!(for_b.word, "*****");
    assert!(!for_b.turn_ended);
    assert_eq!(for_b.messages[0].content, "***");
    assert_eq!(for_a.messages[0].content, "apple");

    // Last correct guess: 10 * (2 / 2), and the turn is over
    service.submit_guess(&game.id, &b.id, "APPLE").await.unwrap();
    assert_eq!(a_feed.next().await, Notification::Chat(ChatPayload {
        player_id: b.id.clone(),
        nickname: b.nickname.clone(),
        content: "***".into(),
    }));
    assert!(matches!(a_feed.next().await, Notification::CorrectGuess(p) if p.player_id == b.id));
    assert_eq!(a_feed.next().await, Notification::TurnEnded);
    assert_eq!(b_feed.next().await, Notification::TurnEnded);

    let scores = store.scores(&game.id).unwrap();
    let points: Vec<(String, i64)> = scores.iter().map(|s| (s.player_id.clone(), s.points)).collect();
    assert_eq!(points, vec![(a.id.clone(), 20), (b.id.clone(), 10)]);

    let board = service.leaderboard(&game.id, &b.id).await.unwrap();
    assert!(board.iter().all(|entry| entry.guessed_word));
    assert!(service.game_state(&game.id, &a.id).await.unwrap().turn_ended);

    // The next word is drawn after the pause
    tokio::time::sleep(Duration::from_secs(6)).await;
    let mut next_turn = store.latest_turn(&game.id).unwrap().unwrap();
    for _ in 0..100 {
        if next_turn.id != first_turn.id {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        next_turn = store.latest_turn(&game.id).unwrap().unwrap();
    }
    assert_ne!(next_turn.id, first_turn.id);

    let fresh = service.game_state(&game.id, &a.id).await.unwrap();
    assert!(!fresh.turn_ended);
    assert_eq!(fresh.word, "*****");
    assert_eq!(fresh.leaderboard.iter().map(|e| e.score).sum::<i64>(), 30);

    cancel.cancel();
    assert!(a_feed.task.await.unwrap().is_ok());
    assert!(b_feed.task.await.unwrap().is_ok());
    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_pending_turn_advance() {
    let store = Arc::new(MemoryStore::with_words(vec![apple()]));
    let service = GameService::new(
        Repositories::from_store(store.clone()),
        Dispatcher::new(),
        GameConfig::default(),
    );

    let a = service.init_user().await.unwrap();
    let game = service.init_game(&a.id).await.unwrap();
    let first_turn = store.latest_turn(&game.id).unwrap().unwrap();

    // Alone in the room, the first correct guess ends the turn
    service.submit_guess(&game.id, &a.id, "Apple").await.unwrap();
    assert!(service.game_state(&game.id, &a.id).await.unwrap().turn_ended);

    service.shutdown().await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(store.latest_turn(&game.id).unwrap().unwrap().id, first_turn.id);
}
