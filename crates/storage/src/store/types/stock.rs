#![forbid(unsafe_code)]

use super::NotificationRow;
use vt_core::scope::{Location, Scope};
use vt_core::stock::StockAlertKind;

#[derive(Clone, Debug)]
pub struct StockRow {
    pub id: String,
    pub revision: i64,
    pub vaccine_id: String,
    pub vaccine_name: String,
    pub batch_number: String,
    pub location: Location,
    pub quantity: i64,
    pub alert_threshold: i64,
    pub expires_at_ms: Option<i64>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// Adds doses of a batch at a health center, creating the stock row on first receipt.
#[derive(Clone, Debug)]
pub struct StockReceiveRequest {
    pub vaccine_id: String,
    pub batch_number: String,
    pub location: Location,
    pub quantity: i64,
    pub alert_threshold: Option<i64>,
    pub expires_at_ms: Option<i64>,
    pub actor_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct StockAdjustRequest {
    pub id: String,
    pub expected_revision: Option<i64>,
    pub delta: i64,
    pub reason: String,
    pub actor_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct StocksListRequest {
    pub scope: Scope,
    pub vaccine_id: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Clone, Debug)]
pub struct StockMovementRow {
    pub seq: i64,
    pub stock_id: String,
    pub delta: i64,
    pub quantity_after: i64,
    pub reason: String,
    pub vaccination_id: Option<String>,
    pub actor_id: Option<String>,
    pub ts_ms: i64,
}

#[derive(Clone, Debug)]
pub struct StockChange {
    pub stock: StockRow,
    pub movement: StockMovementRow,
    pub notifications: Vec<NotificationRow>,
}

#[derive(Clone, Debug)]
pub struct StockAlert {
    pub stock: StockRow,
    pub kind: StockAlertKind,
}
