// SPDX-License-Identifier: MIT

//! SSE Hub (spec §4.F): fans mutation and watcher events out to every
//! connected browser/agent client.
//!
//! Built on a `tokio::sync::broadcast` channel, subscribed lazily by each
//! new connection, with a synthetic `connected` frame sent before the loop
//! starts forwarding real events.

use axum::response::sse::{Event, KeepAlive, Sse};
use clamban_supervisor::EventDelivery;
use futures_util::stream::Stream;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BoardEvent {
    Connected,
    BoardChanged,
    TeamChanged,
}

pub struct SseHub {
    tx: broadcast::Sender<BoardEvent>,
    delivery: EventDelivery,
}

impl SseHub {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self { tx, delivery: EventDelivery::new(2, Duration::from_millis(20)) }
    }

    /// Broadcast an event, retrying with backoff if no receiver is
    /// currently subscribed (spec §7: "Transient delivery failure (SSE
    /// write, action throw): Event Delivery retries with backoff; on
    /// exhaust, logged"). Lack of any subscriber isn't itself an error —
    /// only retry exhaustion is worth a log line.
    pub async fn broadcast(&self, event: BoardEvent) {
        let delivered = self
            .delivery
            .deliver(|| async { self.tx.send(event.clone()).is_ok() }, None::<fn() -> std::future::Ready<bool>>)
            .await;
        if !delivered {
            tracing::debug!(?event, "sse broadcast had no subscriber after retries");
        }
    }

    pub fn stream(&self) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
        let rx = self.tx.subscribe();
        let connected = tokio_stream::once(BoardEvent::Connected);
        let events = BroadcastStream::new(rx).filter_map(|item| item.ok());
        let frames = connected.chain(events).map(|event| {
            Ok(Event::default().data(serde_json::to_string(&event).unwrap_or_default()))
        });
        Sse::new(frames).keep_alive(KeepAlive::default())
    }
}

impl Default for SseHub {
    fn default() -> Self {
        Self::new()
    }
}
