#![forbid(unsafe_code)]

use super::super::StoreError;

pub(in crate::store) fn encode_string_list(values: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(values).map_err(|_| StoreError::InvalidInput("unencodable list"))
}

pub(in crate::store) fn decode_string_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

pub(in crate::store) fn encode_meta(
    meta: Option<&serde_json::Value>,
) -> Result<Option<String>, StoreError> {
    meta.map(serde_json::to_string)
        .transpose()
        .map_err(|_| StoreError::InvalidInput("unencodable meta"))
}
