#![forbid(unsafe_code)]

#[derive(Clone, Debug)]
pub struct VaccineRow {
    pub id: String,
    pub revision: i64,
    pub name: String,
    pub description: Option<String>,
    pub min_age_days: i64,
    pub doses_required: i64,
    pub dose_interval_days: i64,
    pub active: bool,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Clone, Debug)]
pub struct VaccineCreateRequest {
    pub name: String,
    pub description: Option<String>,
    pub min_age_days: i64,
    pub doses_required: i64,
    pub dose_interval_days: i64,
}

#[derive(Clone, Debug, Default)]
pub struct VaccineUpdateRequest {
    pub id: String,
    pub expected_revision: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub min_age_days: Option<i64>,
    pub doses_required: Option<i64>,
    pub dose_interval_days: Option<i64>,
    pub active: Option<bool>,
}
