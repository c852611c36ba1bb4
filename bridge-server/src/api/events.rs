//! Server-Sent Events for live history updates

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use crate::history::HistoryLog;

use super::AppState;

const RECONNECT_HINT: Duration = Duration::from_millis(3000);
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(20);

fn history_stream(history: &Arc<HistoryLog>) -> impl Stream<Item = Result<Event, Infallible>> {
    let kind = history.kind().as_str();
    tracing::debug!(kind, "SSE client subscribed");

    let hint = stream::once(async { Ok(Event::default().retry(RECONNECT_HINT)) });
    let updates = BroadcastStream::new(history.subscribe()).filter_map(move |message| async move {
        match message {
            Ok(event) => match Event::default().json_data(&event) {
                Ok(frame) => Some(Ok(frame)),
                Err(e) => {
                    tracing::warn!(kind, error = %e, "Failed to encode history event");
                    None
                }
            },
            // A slow client misses entries; it can re-read the list endpoint
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(kind, skipped, "SSE client lagging, events dropped");
                None
            }
        }
    });

    hint.chain(updates)
}

fn sse(history: &Arc<HistoryLog>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(history_stream(history)).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

pub async fn trade_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    sse(&state.trade_history)
}

pub async fn copy_trade_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    sse(&state.copy_history)
}
