#![forbid(unsafe_code)]

use rusqlite::types::Type;

#[derive(Debug)]
struct UnknownEnumValue {
    column: &'static str,
    value: String,
}

impl std::fmt::Display for UnknownEnumValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown {} value: {}", self.column, self.value)
    }
}

impl std::error::Error for UnknownEnumValue {}

/// Parses a text column into a domain enum inside a row mapper.
pub(in crate::store) fn enum_column<T>(
    idx: usize,
    column: &'static str,
    raw: String,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    match parse(&raw) {
        Some(value) => Ok(value),
        None => Err(rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            Box::new(UnknownEnumValue { column, value: raw }),
        )),
    }
}
