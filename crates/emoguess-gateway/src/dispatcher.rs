use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use emoguess_types::events::Notification;

/// Capacity of each subscriber channel. One in-flight notification, after
/// which the publisher waits for the reader.
const FEED_CAPACITY: usize = 1;

/// Receiving side of one subscription. Cloning yields a handle to the same
/// channel; only one task should read from it at a time.
#[derive(Clone)]
pub struct Feed {
    rx: Arc<Mutex<mpsc::Receiver<Notification>>>,
}

impl Feed {
    /// Wait for the next notification. `None` once the subscription is gone
    /// and every queued notification was read.
    pub async fn recv(&self) -> Option<Notification> {
        self.rx.lock().await.recv().await
    }

    pub fn same_channel(&self, other: &Feed) -> bool {
        Arc::ptr_eq(&self.rx, &other.rx)
    }
}

struct Subscription {
    game_id: String,
    player_id: String,
    tx: mpsc::Sender<Notification>,
    feed: Feed,
    last_activity: Instant,
}

/// Routes game notifications to the players connected to that game.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// Registration order is delivery order
    subscriptions: Mutex<Vec<Subscription>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a player to a game's notifications. Subscribing twice
    /// returns the existing feed.
    pub async fn subscribe(&self, game_id: &str, player_id: &str) -> Feed {
        let mut subs = self.inner.subscriptions.lock().await;

        if let Some(existing) = subs
            .iter()
            .find(|s| s.game_id == game_id && s.player_id == player_id)
        {
            return existing.feed.clone();
        }

        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        let feed = Feed {
            rx: Arc::new(Mutex::new(rx)),
        };
        subs.push(Subscription {
            game_id: game_id.to_string(),
            player_id: player_id.to_string(),
            tx,
            feed: feed.clone(),
            last_activity: Instant::now(),
        });

        debug!("{} subscribed to game {} ({} subscriptions)", player_id, game_id, subs.len());
        feed
    }

    /// Drop every subscription the player holds, across all games.
    pub async fn unsubscribe(&self, player_id: &str) {
        let mut subs = self.inner.subscriptions.lock().await;
        let before = subs.len();
        subs.retain(|s| s.player_id != player_id);

        if subs.len() != before {
            debug!("{} unsubscribed ({} removed)", player_id, before - subs.len());
        }
    }

    /// Deliver to every subscriber of the game except `sender_id`.
    /// Returns the number of subscribers that received it.
    pub async fn publish(&self, game_id: &str, sender_id: &str, notification: Notification) -> usize {
        self.deliver(game_id, Some(sender_id), notification).await
    }

    /// Deliver to every subscriber of the game.
    pub async fn publish_all(&self, game_id: &str, notification: Notification) -> usize {
        self.deliver(game_id, None, notification).await
    }

    /// Players currently holding a live subscription to the game, in
    /// registration order.
    pub async fn active_subscribers(&self, game_id: &str) -> Vec<String> {
        let subs = self.inner.subscriptions.lock().await;
        let mut seen = BTreeSet::new();
        subs.iter()
            .filter(|s| s.game_id == game_id)
            .filter(|s| seen.insert(s.player_id.clone()))
            .map(|s| s.player_id.clone())
            .collect()
    }

    pub async fn is_subscribed(&self, game_id: &str, player_id: &str) -> bool {
        self.inner
            .subscriptions
            .lock()
            .await
            .iter()
            .any(|s| s.game_id == game_id && s.player_id == player_id)
    }

    pub async fn subscriber_count(&self, game_id: &str) -> usize {
        self.inner
            .subscriptions
            .lock()
            .await
            .iter()
            .filter(|s| s.game_id == game_id)
            .count()
    }

    /// When the subscription was created or last received a notification.
    pub async fn last_activity(&self, game_id: &str, player_id: &str) -> Option<Instant> {
        self.inner
            .subscriptions
            .lock()
            .await
            .iter()
            .find(|s| s.game_id == game_id && s.player_id == player_id)
            .map(|s| s.last_activity)
    }

    async fn deliver(&self, game_id: &str, excluded: Option<&str>, notification: Notification) -> usize {
        // Snapshot targets so a slow reader never holds the registry lock.
        let targets: Vec<(String, mpsc::Sender<Notification>)> = {
            let subs = self.inner.subscriptions.lock().await;
            subs.iter()
                .filter(|s| s.game_id == game_id)
                .filter(|s| excluded != Some(s.player_id.as_str()))
                .map(|s| (s.player_id.clone(), s.tx.clone()))
                .collect()
        };

        let kind = notification.kind();
        let mut delivered = 0;

        for (player_id, tx) in targets {
            if tx.send(notification.clone()).await.is_err() {
                warn!("Dropped {} notification for {} in game {}: feed closed", kind, player_id, game_id);
                continue;
            }
            delivered += 1;
            self.touch(game_id, &player_id).await;
        }

        debug!("{} notification delivered to {} subscribers of game {}", kind, delivered, game_id);
        delivered
    }

    async fn touch(&self, game_id: &str, player_id: &str) {
        let mut subs = self.inner.subscriptions.lock().await;
        if let Some(sub) = subs
            .iter_mut()
            .find(|s| s.game_id == game_id && s.player_id == player_id)
        {
            sub.last_activity = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emoguess_types::events::{ChatPayload, LeftPayload};

    fn chat(player_id: &str, content: &str) -> Notification {
        Notification::Chat(ChatPayload {
            player_id: player_id.into(),
            nickname: "SillyCat".into(),
            content: content.into(),
        })
    }

    #[tokio::test]
    async fn publish_skips_sender() {
        let dispatcher = Dispatcher::new();
        let alice = dispatcher.subscribe("g1", "alice").await;
        let bob = dispatcher.subscribe("g1", "bob").await;

        let publisher = dispatcher.clone();
        let handle = tokio::spawn(async move { publisher.publish("g1", "alice", chat("alice", "hi")).await });

        assert_eq!(bob.recv().await, Some(chat("alice", "hi")));
        assert_eq!(handle.await.unwrap(), 1);

        // alice never sees her own message
        let nothing = tokio::time::timeout(std::time::Duration::from_millis(20), alice.recv()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn notifications_arrive_in_publish_order() {
        let dispatcher = Dispatcher::new();
        let feed = dispatcher.subscribe("g1", "reader").await;

        let publisher = dispatcher.clone();
        tokio::spawn(async move {
            for i in 1..=3 {
                publisher.publish("g1", "writer", chat("writer", &format!("msg-{i}"))).await;
            }
        });

        for i in 1..=3 {
            assert_eq!(feed.recv().await, Some(chat("writer", &format!("msg-{i}"))));
        }
    }

    #[tokio::test]
    async fn publish_all_reaches_everyone() {
        let dispatcher = Dispatcher::new();
        let a = dispatcher.subscribe("g1", "a").await;
        let b = dispatcher.subscribe("g1", "b").await;

        let publisher = dispatcher.clone();
        let handle = tokio::spawn(async move { publisher.publish_all("g1", Notification::TurnEnded).await });

        assert_eq!(a.recv().await, Some(Notification::TurnEnded));
        assert_eq!(b.recv().await, Some(Notification::TurnEnded));
        assert_eq!(handle.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn later_subscribers_wait_behind_a_stalled_one() {
        let dispatcher = Dispatcher::new();
        let first = dispatcher.subscribe("g1", "first").await;
        let second = dispatcher.subscribe("g1", "second").await;

        // Fill both channels, then drain only the second
        assert_eq!(dispatcher.publish_all("g1", Notification::TurnEnded).await, 2);
        assert_eq!(second.recv().await, Some(Notification::TurnEnded));

        let left = Notification::Left(LeftPayload { player_id: "x".into() });
        let publisher = dispatcher.clone();
        let sent = left.clone();
        let handle = tokio::spawn(async move { publisher.publish_all("g1", sent).await });

        let waiting = tokio::time::timeout(std::time::Duration::from_millis(50), second.recv()).await;
        assert!(waiting.is_err(), "second served before the stalled first reader");

        assert_eq!(first.recv().await, Some(Notification::TurnEnded));
        assert_eq!(second.recv().await, Some(left.clone()));
        assert_eq!(first.recv().await, Some(left));
        assert_eq!(handle.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn publish_is_scoped_to_game() {
        let dispatcher = Dispatcher::new();
        let _other = dispatcher.subscribe("g2", "carol").await;

        let delivered = dispatcher
            .publish("g1", "alice", Notification::Left(LeftPayload { player_id: "alice".into() }))
            .await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn subscribe_is_idempotent() {
        let dispatcher = Dispatcher::new();
        let first = dispatcher.subscribe("g1", "alice").await;
        let second = dispatcher.subscribe("g1", "alice").await;
        let other_game = dispatcher.subscribe("g2", "alice").await;

        assert!(first.same_channel(&second));
        assert!(!first.same_channel(&other_game));
        assert_eq!(dispatcher.subscriber_count("g1").await, 1);
    }

    #[tokio::test]
    async fn unsubscribe_removes_player_from_every_game() {
        let dispatcher = Dispatcher::new();
        dispatcher.subscribe("g1", "alice").await;
        dispatcher.subscribe("g2", "alice").await;
        dispatcher.subscribe("g1", "bob").await;

        dispatcher.unsubscribe("alice").await;
        dispatcher.unsubscribe("alice").await;

        assert_eq!(dispatcher.active_subscribers("g1").await, vec!["bob".to_string()]);
        assert!(dispatcher.active_subscribers("g2").await.is_empty());
    }

    #[tokio::test]
    async fn active_subscribers_in_registration_order() {
        let dispatcher = Dispatcher::new();
        dispatcher.subscribe("g1", "user-1").await;
        dispatcher.subscribe("g1", "user-2").await;
        dispatcher.subscribe("g1", "user-3").await;
        dispatcher.subscribe("g2", "user-4").await;

        assert_eq!(
            dispatcher.active_subscribers("g1").await,
            vec!["user-1".to_string(), "user-2".to_string(), "user-3".to_string()]
        );
        assert!(dispatcher.is_subscribed("g2", "user-4").await);
        assert!(!dispatcher.is_subscribed("g1", "user-4").await);
    }

    #[tokio::test]
    async fn delivery_refreshes_last_activity() {
        let dispatcher = Dispatcher::new();
        let feed = dispatcher.subscribe("g1", "bob").await;
        let subscribed_at = dispatcher.last_activity("g1", "bob").await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let publisher = dispatcher.clone();
        let handle = tokio::spawn(async move { publisher.publish_all("g1", Notification::TurnEnded).await });
        feed.recv().await;
        handle.await.unwrap();

        let touched = dispatcher.last_activity("g1", "bob").await.unwrap();
        assert!(touched > subscribed_at);
        assert!(dispatcher.last_activity("g1", "nobody").await.is_none());
    }
}
