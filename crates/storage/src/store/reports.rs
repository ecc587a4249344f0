#![forbid(unsafe_code)]

use super::support::{normalize_optional_id, scope_filter};
use super::*;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use std::collections::BTreeMap;
use vt_core::ids::RecordKind;
use vt_core::model::ChildStatus;
use vt_core::scope::{GroupLevel, Scope};

const UNASSIGNED_GROUP: &str = "(unassigned)";

fn coverage_rate(vaccinated: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((vaccinated as f64) * 10_000.0 / (total as f64)).round() / 100.0
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn group_column(level: GroupLevel) -> &'static str {
    match level {
        GroupLevel::Region => "c.region",
        GroupLevel::District => "c.district",
        GroupLevel::HealthCenter => "c.health_center",
    }
}

#[derive(Default)]
struct GroupTotals {
    total_children: u64,
    vaccinated_children: u64,
    done_vaccinations: u64,
    missed_vaccinations: u64,
}

impl SqliteStore {
    /// Headline numbers for a scope. A child counts as vaccinated once it has at least one
    /// completed vaccination (of `vaccine_id`, when given).
    pub fn coverage_report(&self, request: CoverageRequest) -> Result<CoverageReport, StoreError> {
        let vaccine_id = normalize_optional_id(RecordKind::Vaccine, request.vaccine_id.as_deref())?;
        let filter = scope_filter(&request.scope, "c", Some("c.guardian_phone"));

        let mut by_status = StatusCounts::default();
        let mut total_children = 0;
        {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT c.status, COUNT(1) FROM children c WHERE {} GROUP BY c.status",
                filter.clause
            ))?;
            let rows = stmt.query_map(params_from_iter(filter.params.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (status, count) = row?;
                let count = to_u64(count);
                total_children += count;
                match ChildStatus::parse(&status) {
                    Some(ChildStatus::UpToDate) => by_status.up_to_date += count,
                    Some(ChildStatus::Late) => by_status.late += count,
                    Some(ChildStatus::Unscheduled) => by_status.unscheduled += count,
                    Some(ChildStatus::DueNow) => by_status.due_now += count,
                    None => {}
                }
            }
        }

        let mut values = filter.params.clone();
        let mut vaccine_clause = String::new();
        if let Some(vaccine_id) = vaccine_id {
            vaccine_clause.push_str(" AND v.vaccine_id = ?");
            values.push(Value::Text(vaccine_id));
        }
        let (vaccinated, done, missed) = self.conn.query_row(
            &format!(
                "SELECT COUNT(DISTINCT CASE WHEN v.status='done' THEN v.child_id END), \
                        COALESCE(SUM(v.status='done'), 0), \
                        COALESCE(SUM(v.status='missed'), 0) \
                 FROM vaccinations v JOIN children c ON c.id = v.child_id \
                 WHERE {}{vaccine_clause}",
                filter.clause
            ),
            params_from_iter(values),
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )?;
        let vaccinated_children = to_u64(vaccinated);

        Ok(CoverageReport {
            total_children,
            vaccinated_children,
            coverage_rate: coverage_rate(vaccinated_children, total_children),
            by_status,
            done_vaccinations: to_u64(done),
            missed_vaccinations: to_u64(missed),
        })
    }

    /// Coverage per area one level below the scope (regions for national, districts for a
    /// region, health centers below that).
    pub fn breakdown_report(&self, scope: &Scope) -> Result<BreakdownReport, StoreError> {
        let level = scope.breakdown_level();
        let column = group_column(level);
        let filter = scope_filter(scope, "c", Some("c.guardian_phone"));
        let mut groups: BTreeMap<String, GroupTotals> = BTreeMap::new();

        {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT COALESCE({column}, ?), COUNT(1) FROM children c WHERE {} \
                 GROUP BY 1",
                filter.clause
            ))?;
            let mut values = vec![Value::Text(UNASSIGNED_GROUP.to_string())];
            values.extend(filter.params.iter().cloned());
            let rows = stmt.query_map(params_from_iter(values), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (group, count) = row?;
                groups.entry(group).or_default().total_children = to_u64(count);
            }
        }

        {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT COALESCE({column}, ?), \
                        COUNT(DISTINCT CASE WHEN v.status='done' THEN v.child_id END), \
                        COALESCE(SUM(v.status='done'), 0), \
                        COALESCE(SUM(v.status='missed'), 0) \
                 FROM vaccinations v JOIN children c ON c.id = v.child_id WHERE {} \
                 GROUP BY 1",
                filter.clause
            ))?;
            let mut values = vec![Value::Text(UNASSIGNED_GROUP.to_string())];
            values.extend(filter.params.iter().cloned());
            let rows = stmt.query_map(params_from_iter(values), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?;
            for row in rows {
                let (group, vaccinated, done, missed) = row?;
                let totals = groups.entry(group).or_default();
                totals.vaccinated_children = to_u64(vaccinated);
                totals.done_vaccinations = to_u64(done);
                totals.missed_vaccinations = to_u64(missed);
            }
        }

        let rows = groups
            .into_iter()
            .map(|(group, totals)| BreakdownRow {
                coverage_rate: coverage_rate(totals.vaccinated_children, totals.total_children),
                group,
                total_children: totals.total_children,
                vaccinated_children: totals.vaccinated_children,
                done_vaccinations: totals.done_vaccinations,
                missed_vaccinations: totals.missed_vaccinations,
            })
            .collect();

        Ok(BreakdownReport { level, rows })
    }
}
