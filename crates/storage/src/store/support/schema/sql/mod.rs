#![forbid(unsafe_code)]

mod accounts;
mod care;
mod core;
mod indexes;
mod outbox;
mod registry;
mod stock;

pub(super) fn full_schema_sql() -> String {
    let mut sql = String::new();
    sql.push_str(core::SQL);
    sql.push_str(accounts::SQL);
    sql.push_str(registry::SQL);
    sql.push_str(care::SQL);
    sql.push_str(stock::SQL);
    sql.push_str(outbox::SQL);
    sql.push_str(indexes::SQL);
    sql
}
