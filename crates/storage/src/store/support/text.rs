#![forbid(unsafe_code)]

use super::super::StoreError;
use vt_core::ids::RecordKind;
use vt_core::phone::normalize_phone;
use vt_core::scope::Location;

pub(in crate::store) const DEFAULT_LIST_LIMIT: usize = 50;
pub(in crate::store) const MAX_LIST_LIMIT: usize = 500;
const MAX_LOCATION_LEN: usize = 64;

pub(in crate::store) fn normalize_required_text(
    value: &str,
    max_len: usize,
    message: &'static str,
) -> Result<String, StoreError> {
    let value = value.trim();
    if value.is_empty() || value.chars().count() > max_len {
        return Err(StoreError::InvalidInput(message));
    }
    Ok(value.to_string())
}

/// Blank strings collapse to `None`.
pub(in crate::store) fn normalize_optional_text(
    value: Option<&str>,
    max_len: usize,
    message: &'static str,
) -> Result<Option<String>, StoreError> {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > max_len {
        return Err(StoreError::InvalidInput(message));
    }
    Ok(Some(value.to_string()))
}

pub(in crate::store) fn normalize_id(kind: RecordKind, raw: &str) -> Result<String, StoreError> {
    kind.parse(raw)
        .map_err(|err| StoreError::InvalidInput(err.message()))
}

pub(in crate::store) fn normalize_optional_id(
    kind: RecordKind,
    raw: Option<&str>,
) -> Result<Option<String>, StoreError> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| normalize_id(kind, value))
        .transpose()
}

pub(in crate::store) fn normalize_phone_input(raw: &str) -> Result<String, StoreError> {
    normalize_phone(raw).map_err(|err| StoreError::InvalidInput(err.message()))
}

fn normalize_location_code(
    value: Option<&str>,
    message: &'static str,
) -> Result<Option<String>, StoreError> {
    normalize_optional_text(value, MAX_LOCATION_LEN, message)
}

pub(in crate::store) fn normalize_location(location: &Location) -> Result<Location, StoreError> {
    Ok(Location {
        health_center: normalize_location_code(
            location.health_center.as_deref(),
            "health_center is too long",
        )?,
        district: normalize_location_code(location.district.as_deref(), "district is too long")?,
        region: normalize_location_code(location.region.as_deref(), "region is too long")?,
    })
}

/// Records that live at a health center need the full hierarchy.
pub(in crate::store) fn normalize_full_location(
    location: &Location,
) -> Result<(String, String, String), StoreError> {
    let location = normalize_location(location)?;
    match (location.health_center, location.district, location.region) {
        (Some(center), Some(district), Some(region)) => Ok((center, district, region)),
        (None, _, _) => Err(StoreError::InvalidInput("health_center is required")),
        (_, None, _) => Err(StoreError::InvalidInput("district is required")),
        (_, _, None) => Err(StoreError::InvalidInput("region is required")),
    }
}

pub(in crate::store) fn normalize_limit(limit: usize) -> usize {
    match limit {
        0 => DEFAULT_LIST_LIMIT,
        value => value.min(MAX_LIST_LIMIT),
    }
}
