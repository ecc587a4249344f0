#![forbid(unsafe_code)]

use super::super::StoreError;
use rusqlite::ErrorCode;

pub(in crate::store) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == ErrorCode::ConstraintViolation
                || message.as_deref().is_some_and(|value| {
                    value.contains("UNIQUE constraint failed")
                        || value.contains("PRIMARY KEY constraint failed")
                })
        }
        _ => false,
    }
}

/// Maps a uniqueness failure to `Conflict(message)` and leaves every other error as is.
pub(in crate::store) fn map_insert_conflict(
    err: rusqlite::Error,
    message: &'static str,
) -> StoreError {
    if is_constraint_violation(&err) {
        return StoreError::Conflict(message);
    }
    StoreError::Sql(err)
}

pub(in crate::store) fn to_sqlite_i64(value: usize) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::InvalidInput("numeric overflow"))
}

pub(in crate::store) fn check_revision(
    expected: Option<i64>,
    actual: i64,
) -> Result<(), StoreError> {
    if let Some(expected) = expected
        && expected != actual
    {
        return Err(StoreError::RevisionMismatch { expected, actual });
    }
    Ok(())
}

pub(in crate::store) fn bool_to_i64(value: bool) -> i64 {
    if value { 1 } else { 0 }
}
