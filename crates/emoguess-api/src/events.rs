use axum::{
    Extension,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use emoguess_types::api::GameStateMessage;
use emoguess_types::events::{Notification, NotificationKind};

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::Session;

/// Live updates for one player: an `init` event with the full state, then
/// one event per notification. When the client goes away the feed is
/// closed and a delayed idle check may mark the player inactive.
pub async fn game_events(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Extension(session): Extension<Session>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    // Also rejects anyone who is not an active player
    let initial = state.game.game_state(&game_id, &session.user_id).await?;

    let (tx, mut rx) = mpsc::unbounded_channel::<(NotificationKind, String)>();
    let cancel = CancellationToken::new();

    let service = state.game.clone();
    let feed_cancel = cancel.clone();
    let (feed_game, feed_user) = (game_id.clone(), session.user_id.clone());
    tokio::spawn(async move {
        let result = service
            .game_updates(&feed_game, &feed_user, feed_cancel, move |kind, payload| {
                tx.send((kind, payload.to_string()))
                    .map_err(|_| anyhow::anyhow!("event stream dropped"))
            })
            .await;
        if let Err(e) = result {
            debug!("Feed for {} in game {} ended: {}", feed_user, feed_game, e);
        }

        let delay = service.config().kick_delay;
        service.kick_after(&feed_game, &feed_user, delay);
    });

    let viewer = session.user_id;
    // Client disconnect drops the stream, which ends the feed. Armed before
    // the first poll so a client gone early still releases it.
    let disconnect = cancel.drop_guard();
    let stream = async_stream::stream! {
        let _disconnect = disconnect;

        yield Event::default().event("init").json_data(&initial);

        while let Some((kind, payload)) = rx.recv().await {
            match render(kind, &payload, &viewer) {
                Ok(event) => yield Ok(event),
                Err(e) => {
                    warn!("Closing event stream for {} in game {}: {}", viewer, game_id, e);
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Chat payloads are re-shaped for the receiver; every other kind is passed
/// through as encoded.
fn render(kind: NotificationKind, payload: &str, viewer_id: &str) -> anyhow::Result<Event> {
    let event = Event::default().event(kind.as_str());

    match Notification::decode(kind.as_str(), payload)? {
        Notification::Chat(chat) => Ok(event.json_data(GameStateMessage {
            me: chat.player_id == viewer_id,
            nickname: chat.nickname,
            content: chat.content,
        })?),
        _ => Ok(event.data(payload)),
    }
}
