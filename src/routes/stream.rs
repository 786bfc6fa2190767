use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};

use super::feed_fragment;
use crate::broadcast;
use crate::state::AppState;

const POLL_BATCH: i64 = 100;

/// One long-lived feed per browser tab: sleep, poll the log, push whatever
/// arrived. When the client goes away axum drops the stream and the loop
/// dies with it; undelivered rows stay claimed-free for the other tabs.
pub async fn feed_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let interval = state.config.stream_poll_interval;
    tracing::debug!("feed stream opened");

    let events = stream::unfold(state, move |state| async move {
        loop {
            tokio::time::sleep(interval).await;

            match broadcast::poll_undelivered(&state.db, POLL_BATCH).await {
                Ok(rows) if rows.is_empty() => continue,
                Ok(rows) => {
                    let data: Vec<String> = rows.iter().map(feed_fragment).collect();
                    let event = Event::default().event("message").data(data.join("\n"));
                    return Some((Ok(event), state));
                }
                Err(e) => {
                    // Ends this stream only; the process and the other
                    // connections keep going.
                    tracing::error!("feed poll failed, closing stream: {e}");
                    return None;
                }
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
