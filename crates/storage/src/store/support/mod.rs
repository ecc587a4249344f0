#![forbid(unsafe_code)]

mod columns;
mod counters;
mod credentials;
mod json;
mod schema;
mod scope_sql;
mod sqlite;
mod text;
mod time;

pub(super) use columns::*;
pub(super) use counters::*;
pub(super) use credentials::*;
pub(super) use json::*;
pub(super) use schema::migrate_sqlite_schema;
pub(super) use scope_sql::*;
pub(super) use sqlite::*;
pub(super) use text::*;
pub(super) use time::now_ms;
