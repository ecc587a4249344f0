#![forbid(unsafe_code)]

//! In-process fan-out of outbox rows to connected SSE clients.

use crate::render::notification_json;
use crate::time::now_ms;
use axum::response::sse::Event;
use futures::stream::{self, Stream, StreamExt};
use serde_json::{Value, json};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use vt_core::rooms::intersects;
use vt_storage::NotificationRow;

const CLIENT_RETRY: Duration = Duration::from_millis(3_000);

#[derive(Clone, Debug)]
pub struct RealtimeEvent {
    pub seq: i64,
    pub rooms: Vec<String>,
    pub payload: Value,
}

impl RealtimeEvent {
    pub fn from_row(row: &NotificationRow) -> Result<Self, serde_json::Error> {
        Ok(Self {
            seq: row.seq,
            rooms: row.rooms.clone(),
            payload: notification_json(row, None)?,
        })
    }
}

#[derive(Clone)]
pub struct Hub {
    sender: broadcast::Sender<Arc<RealtimeEvent>>,
}

impl Hub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns how many subscribers received the event. Zero is not an error: nobody was
    /// listening, and the row stays readable on the persisted channel.
    pub fn publish(&self, event: RealtimeEvent) -> usize {
        self.sender.send(Arc::new(event)).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RealtimeEvent>> {
        self.sender.subscribe()
    }

    pub fn subscribers(&self) -> usize {
        self.sender.receiver_count()
    }
}

struct Subscription {
    receiver: broadcast::Receiver<Arc<RealtimeEvent>>,
    rooms: Vec<String>,
}

/// SSE frames for one client: a `ready` frame, then every event whose rooms intersect
/// `rooms`. A client that falls behind gets a `lagged` frame and should re-read the
/// persisted channel from its last seq.
pub fn event_stream(
    receiver: broadcast::Receiver<Arc<RealtimeEvent>>,
    rooms: Vec<String>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let ready = Event::default()
        .event("ready")
        .retry(CLIENT_RETRY)
        .data(json!({ "generated_at_ms": now_ms(), "rooms": rooms }).to_string());

    let events = stream::unfold(Subscription { receiver, rooms }, |mut sub| async move {
        loop {
            match sub.receiver.recv().await {
                Ok(event) => {
                    if !intersects(&sub.rooms, &event.rooms) {
                        continue;
                    }
                    let frame = Event::default()
                        .id(event.seq.to_string())
                        .event("notification")
                        .data(event.payload.to_string());
                    return Some((Ok(frame), sub));
                }
                Err(RecvError::Lagged(skipped)) => {
                    let frame = Event::default()
                        .event("lagged")
                        .data(json!({ "skipped": skipped }).to_string());
                    return Some((Ok(frame), sub));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    stream::once(async move { Ok(ready) }).chain(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(seq: i64, rooms: &[&str]) -> RealtimeEvent {
        RealtimeEvent {
            seq,
            rooms: rooms.iter().map(|room| room.to_string()).collect(),
            payload: json!({ "seq": seq }),
        }
    }

    #[test]
    fn publishing_without_listeners_is_fine() {
        let hub = Hub::new(8);
        assert_eq!(hub.publish(event(1, &["national"])), 0);
        let _receiver = hub.subscribe();
        assert_eq!(hub.subscribers(), 1);
        assert_eq!(hub.publish(event(2, &["national"])), 1);
    }

    #[tokio::test]
    async fn clients_only_get_their_rooms() {
        let hub = Hub::new(8);
        let receiver = hub.subscribe();
        hub.publish(event(1, &["center:hc-east"]));
        hub.publish(event(2, &["center:hc-north", "national"]));
        drop(hub);

        let frames: Vec<_> = event_stream(receiver, vec!["center:hc-north".to_string()])
            .collect()
            .await;
        // ready + the one matching event; the stream ends when the hub is gone.
        assert_eq!(frames.len(), 2);
    }
}
