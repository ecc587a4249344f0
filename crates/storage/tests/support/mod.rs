#![forbid(unsafe_code)]
#![allow(dead_code)]

use vt_core::model::Gender;
use vt_core::schedule::DAY_MS;
use vt_core::scope::Location;
use vt_storage::{
    ChildCreateRequest, ChildRow, SqliteStore, StockReceiveRequest, VaccineCreateRequest,
    VaccineRow,
};

pub const HOUR_MS: i64 = 3_600_000;
pub const GUARDIAN_PHONE: &str = "+221771234567";

pub fn now_ms() -> i64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}

pub fn store() -> SqliteStore {
    SqliteStore::open_in_memory().expect("open store")
}

pub fn north() -> Location {
    Location::new("hc-north", "d-1", "r-1")
}

pub fn east() -> Location {
    Location::new("hc-east", "d-2", "r-1")
}

pub struct Catalog {
    pub bcg: VaccineRow,
    pub polio: VaccineRow,
}

/// BCG at birth, then three polio doses from six weeks, four weeks apart.
pub fn seed_catalog(store: &mut SqliteStore) -> Catalog {
    let bcg = store
        .vaccine_create(VaccineCreateRequest {
            name: "BCG".to_string(),
            description: None,
            min_age_days: 0,
            doses_required: 1,
            dose_interval_days: 0,
        })
        .expect("create bcg");
    let polio = store
        .vaccine_create(VaccineCreateRequest {
            name: "Polio".to_string(),
            description: Some("oral".to_string()),
            min_age_days: 42,
            doses_required: 3,
            dose_interval_days: 28,
        })
        .expect("create polio");
    Catalog { bcg, polio }
}

pub fn register_child(
    store: &mut SqliteStore,
    first_name: &str,
    age_days: i64,
    location: Location,
    guardian_phone: &str,
) -> ChildRow {
    store
        .child_create(ChildCreateRequest {
            first_name: first_name.to_string(),
            last_name: "Diop".to_string(),
            gender: Gender::Female,
            birth_date_ms: now_ms() - age_days * DAY_MS,
            guardian_name: "Awa Diop".to_string(),
            guardian_phone: guardian_phone.to_string(),
            address: None,
            location,
            created_by: None,
        })
        .expect("create child")
}

pub fn receive_stock(
    store: &mut SqliteStore,
    vaccine_id: &str,
    batch: &str,
    quantity: i64,
    expires_at_ms: Option<i64>,
) -> String {
    store
        .stock_receive(StockReceiveRequest {
            vaccine_id: vaccine_id.to_string(),
            batch_number: batch.to_string(),
            location: north(),
            quantity,
            alert_threshold: Some(10),
            expires_at_ms,
            actor_id: None,
        })
        .expect("receive stock")
        .stock
        .id
}
