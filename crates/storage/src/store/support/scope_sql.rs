#![forbid(unsafe_code)]

use rusqlite::types::Value;
use vt_core::scope::Scope;

/// A WHERE fragment restricting rows to a scope, with its positional parameters.
#[derive(Clone, Debug)]
pub(in crate::store) struct ScopeFilter {
    pub clause: String,
    pub params: Vec<Value>,
}

/// `alias` names the table carrying `health_center`/`district`/`region` columns. Guardians
/// match on `guardian_column`; tables without one are invisible to guardians.
pub(in crate::store) fn scope_filter(
    scope: &Scope,
    alias: &str,
    guardian_column: Option<&str>,
) -> ScopeFilter {
    let (clause, param) = match scope {
        Scope::National => ("1=1".to_string(), None),
        Scope::Region(region) => (format!("{alias}.region = ?"), Some(region.clone())),
        Scope::District(district) => (format!("{alias}.district = ?"), Some(district.clone())),
        Scope::HealthCenter(center) => {
            (format!("{alias}.health_center = ?"), Some(center.clone()))
        }
        Scope::Guardian(phone) => match guardian_column {
            Some(column) => (format!("{column} = ?"), Some(phone.clone())),
            None => ("0=1".to_string(), None),
        },
    };
    ScopeFilter {
        clause,
        params: param.map(Value::Text).into_iter().collect(),
    }
}
