#![forbid(unsafe_code)]

use super::NotificationRow;

#[derive(Clone, Debug)]
pub struct CampaignRow {
    pub id: String,
    pub revision: i64,
    pub title: String,
    pub description: String,
    pub vaccine_id: Option<String>,
    pub region: Option<String>,
    pub district: Option<String>,
    pub starts_at_ms: i64,
    pub ends_at_ms: i64,
    pub created_by: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// No region and no district means a national campaign.
#[derive(Clone, Debug)]
pub struct CampaignCreateRequest {
    pub title: String,
    pub description: String,
    pub vaccine_id: Option<String>,
    pub region: Option<String>,
    pub district: Option<String>,
    pub starts_at_ms: i64,
    pub ends_at_ms: i64,
    pub actor_id: Option<String>,
}

/// Which campaigns a reader is targeted by. National campaigns always match.
#[derive(Clone, Debug, Default)]
pub struct CampaignAudience {
    pub all: bool,
    /// Every campaign inside these regions, district-level ones included.
    pub regions_full: Vec<String>,
    /// Region-wide campaigns only.
    pub regions: Vec<String>,
    pub districts: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct CampaignsListRequest {
    pub audience: CampaignAudience,
    pub active_at_ms: Option<i64>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Clone, Debug)]
pub struct CampaignChange {
    pub campaign: CampaignRow,
    pub notifications: Vec<NotificationRow>,
}
