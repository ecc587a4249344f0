#![forbid(unsafe_code)]

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StockAlertKind {
    Empty,
    Expired,
    Low,
    Expiring,
}

impl StockAlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Expired => "expired",
            Self::Low => "low",
            Self::Expiring => "expiring",
        }
    }
}

/// The most urgent alert for a stock row, if any. Empty beats expired beats low beats expiring.
pub fn classify_stock(
    quantity: i64,
    alert_threshold: i64,
    expires_at_ms: Option<i64>,
    now_ms: i64,
    expiry_warning_ms: i64,
) -> Option<StockAlertKind> {
    if quantity <= 0 {
        return Some(StockAlertKind::Empty);
    }
    if let Some(expires) = expires_at_ms
        && expires <= now_ms
    {
        return Some(StockAlertKind::Expired);
    }
    if quantity <= alert_threshold {
        return Some(StockAlertKind::Low);
    }
    if let Some(expires) = expires_at_ms
        && expires <= now_ms.saturating_add(expiry_warning_ms.max(0))
    {
        return Some(StockAlertKind::Expiring);
    }
    None
}

/// True when a decrement from `before` to `after` crosses the alert threshold.
pub fn crossed_threshold(before: i64, after: i64, alert_threshold: i64) -> bool {
    before > alert_threshold && after <= alert_threshold
}
