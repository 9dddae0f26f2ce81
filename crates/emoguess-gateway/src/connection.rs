use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use emoguess_types::events::{CodecError, NotificationKind};

use crate::dispatcher::Dispatcher;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to encode notification: {0}")]
    Codec(#[from] CodecError),

    #[error("notification handler failed: {0}")]
    Handler(anyhow::Error),
}

/// Drain one player's live feed for a game until `cancel` fires.
///
/// Every notification is encoded and passed to `handler` as
/// `(kind, payload)`. A handler error ends the feed with that error. The
/// player is unsubscribed whichever way the loop exits; peers are not told.
pub async fn run_feed<F>(
    dispatcher: &Dispatcher,
    game_id: &str,
    player_id: &str,
    cancel: CancellationToken,
    mut handler: F,
) -> Result<(), FeedError>
where
    F: FnMut(NotificationKind, &str) -> anyhow::Result<()>,
{
    let feed = dispatcher.subscribe(game_id, player_id).await;
    info!("{} opened live feed for game {}", player_id, game_id);

    let result = loop {
        tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            next = feed.recv() => {
                let Some(notification) = next else {
                    debug!("{} feed for game {} closed", player_id, game_id);
                    break Ok(());
                };

                let (kind, payload) = match notification.encode() {
                    Ok(encoded) => encoded,
                    Err(e) => break Err(FeedError::Codec(e)),
                };

                if let Err(e) = handler(kind, &payload) {
                    warn!("{} feed for game {} failed on {}: {}", player_id, game_id, kind, e);
                    break Err(FeedError::Handler(e));
                }
            }
        }
    };

    dispatcher.unsubscribe(player_id).await;
    info!("{} closed live feed for game {}", player_id, game_id);
    result
}
