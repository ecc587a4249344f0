#![forbid(unsafe_code)]

//! Periodic maintenance: overdue vaccinations and appointments become missed, child statuses
//! are re-derived, expired sessions are purged.

use crate::error::ApiError;
use crate::state::AppState;
use crate::time::now_ms;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use vt_storage::SweepReport;

pub async fn sweep_once(state: &AppState) -> Result<SweepReport, ApiError> {
    let report = state.run(|store| store.sweep(now_ms())).await?;
    for failure in &report.failures {
        tracing::warn!(failure = %failure, "sweep item failed");
    }
    if !report.missed_vaccinations.is_empty()
        || !report.missed_appointments.is_empty()
        || report.status_changes > 0
    {
        tracing::info!(
            missed_vaccinations = report.missed_vaccinations.len(),
            missed_appointments = report.missed_appointments.len(),
            status_changes = report.status_changes,
            notifications = report.notifications,
            "sweep applied changes"
        );
    } else {
        tracing::debug!(children = report.children_scanned, "sweep found nothing to change");
    }
    Ok(report)
}

pub async fn run_sweeper(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let period = Duration::from_secs(state.config.sweep_interval_secs.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::info!(interval_secs = state.config.sweep_interval_secs, "sweeper started");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = sweep_once(&state).await {
                    tracing::error!(error = %err, "sweep failed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::info!("sweeper stopped");
}
