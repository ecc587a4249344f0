#![forbid(unsafe_code)]

//! Drains the notification outbox into the realtime hub.
//!
//! Rows are written in the same transaction as the change that caused them; this task only
//! moves them to live subscribers and stamps them dispatched. A row nobody was listening for
//! is still dispatched: readers pick it up from `/notifications`.

use crate::error::ApiError;
use crate::realtime::RealtimeEvent;
use crate::state::AppState;
use crate::time::now_ms;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

const RELAY_BATCH: usize = 200;

/// One pass over the pending rows. Returns how many were dispatched.
pub async fn relay_once(state: &AppState) -> Result<usize, ApiError> {
    let pending = state
        .run(|store| store.notifications_pending(RELAY_BATCH))
        .await?;
    let mut dispatched = 0;
    for row in pending {
        let seq = row.seq;
        let event = match RealtimeEvent::from_row(&row) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(seq, error = %err, "notification payload unreadable");
                let message = err.to_string();
                state
                    .run(move |store| store.notification_mark_failed(seq, &message))
                    .await?;
                continue;
            }
        };
        let receivers = state.hub.publish(event);
        state
            .run(move |store| store.notification_mark_dispatched(seq, now_ms()))
            .await?;
        tracing::debug!(seq, receivers, "notification dispatched");
        dispatched += 1;
    }
    Ok(dispatched)
}

pub async fn run_relay(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let period = Duration::from_millis(state.config.relay_interval_ms.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(interval_ms = state.config.relay_interval_ms, "notification relay started");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = relay_once(&state).await {
                    tracing::warn!(error = %err, "notification relay pass failed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::info!("notification relay stopped");
}
