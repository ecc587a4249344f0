#![forbid(unsafe_code)]

//! Wire shapes. Rows are rendered by hand so the JSON stays stable while storage types evolve.

use crate::time::ts_ms_to_rfc3339;
use serde_json::{Value, json};
use vt_core::scope::Location;
use vt_storage::{
    AppointmentRequestRow, AppointmentRow, BreakdownReport, CampaignRow, ChildDetail, ChildRow,
    CoverageReport, GuardianLookup, NotificationRow, NotificationView, StockAlert,
    StockMovementRow, StockRow, UserRow, VaccinationChange, VaccinationRow, VaccineRow,
};

fn ts(ts_ms: Option<i64>) -> Value {
    match ts_ms {
        Some(ts_ms) => Value::String(ts_ms_to_rfc3339(ts_ms)),
        None => Value::Null,
    }
}

pub fn location_json(location: &Location) -> Value {
    json!({
        "health_center": location.health_center,
        "district": location.district,
        "region": location.region,
    })
}

pub fn user_json(user: &UserRow) -> Value {
    json!({
        "id": user.id,
        "revision": user.revision,
        "name": user.name,
        "email": user.email,
        "phone": user.phone,
        "role": user.role.as_str(),
        "location": location_json(&user.location),
        "active": user.active,
        "created_at_ms": user.created_at_ms,
        "updated_at_ms": user.updated_at_ms,
    })
}

pub fn vaccine_json(vaccine: &VaccineRow) -> Value {
    json!({
        "id": vaccine.id,
        "revision": vaccine.revision,
        "name": vaccine.name,
        "description": vaccine.description,
        "min_age_days": vaccine.min_age_days,
        "doses_required": vaccine.doses_required,
        "dose_interval_days": vaccine.dose_interval_days,
        "active": vaccine.active,
    })
}

pub fn child_json(child: &ChildRow) -> Value {
    json!({
        "id": child.id,
        "revision": child.revision,
        "first_name": child.first_name,
        "last_name": child.last_name,
        "gender": child.gender.as_str(),
        "birth_date_ms": child.birth_date_ms,
        "birth_date": ts_ms_to_rfc3339(child.birth_date_ms),
        "guardian_name": child.guardian_name,
        "guardian_phone": child.guardian_phone,
        "address": child.address,
        "location": location_json(&child.location),
        "status": child.status.as_str(),
        "next_appointment_ms": child.next_appointment_ms,
        "next_appointment": ts(child.next_appointment_ms),
        "status_updated_at_ms": child.status_updated_at_ms,
        "created_by": child.created_by,
        "created_at_ms": child.created_at_ms,
        "updated_at_ms": child.updated_at_ms,
    })
}

pub fn child_detail_json(detail: &ChildDetail) -> Value {
    let doses: Vec<Value> = detail
        .doses
        .iter()
        .map(|dose| {
            json!({
                "vaccine_id": dose.vaccine_id,
                "vaccine_name": dose.vaccine_name,
                "dose": dose.dose,
                "due_at_ms": dose.due_at_ms,
                "progress": dose.progress.as_str(),
            })
        })
        .collect();
    json!({
        "child": child_json(&detail.child),
        "vaccinations": detail.vaccinations.iter().map(vaccination_json).collect::<Vec<_>>(),
        "doses": doses,
        "outstanding": detail.outstanding,
    })
}

pub fn vaccination_json(vaccination: &VaccinationRow) -> Value {
    json!({
        "id": vaccination.id,
        "revision": vaccination.revision,
        "child_id": vaccination.child_id,
        "vaccine_id": vaccination.vaccine_id,
        "vaccine_name": vaccination.vaccine_name,
        "dose": vaccination.dose,
        "status": vaccination.status.as_str(),
        "scheduled_at_ms": vaccination.scheduled_at_ms,
        "scheduled_at": ts(vaccination.scheduled_at_ms),
        "done_at_ms": vaccination.done_at_ms,
        "done_at": ts(vaccination.done_at_ms),
        "batch_number": vaccination.batch_number,
        "health_center": vaccination.health_center,
        "administered_by": vaccination.administered_by,
        "notes": vaccination.notes,
        "created_by": vaccination.created_by,
        "created_at_ms": vaccination.created_at_ms,
        "updated_at_ms": vaccination.updated_at_ms,
    })
}

pub fn vaccination_change_json(change: &VaccinationChange) -> Value {
    json!({
        "vaccination": vaccination_json(&change.vaccination),
        "child_status": change.child_status.as_str(),
        "next_appointment_ms": change.next_appointment_ms,
        "stock": {
            "decremented": change.stock_movement.is_some(),
            "stock_id": change.stock_movement.as_ref().map(|movement| movement.stock_id.clone()),
            "remaining": change.stock_movement.as_ref().map(|movement| movement.quantity_after),
        },
        "stock_movement": change.stock_movement.as_ref().map(movement_json),
        "notifications": change.notifications.len(),
    })
}

pub fn appointment_json(appointment: &AppointmentRow) -> Value {
    json!({
        "id": appointment.id,
        "revision": appointment.revision,
        "child_id": appointment.child_id,
        "vaccine_id": appointment.vaccine_id,
        "scheduled_at_ms": appointment.scheduled_at_ms,
        "scheduled_at": ts_ms_to_rfc3339(appointment.scheduled_at_ms),
        "status": appointment.status.as_str(),
        "notes": appointment.notes,
        "request_id": appointment.request_id,
        "created_by": appointment.created_by,
        "created_at_ms": appointment.created_at_ms,
        "updated_at_ms": appointment.updated_at_ms,
    })
}

pub fn appointment_request_json(request: &AppointmentRequestRow) -> Value {
    json!({
        "id": request.id,
        "revision": request.revision,
        "child_id": request.child_id,
        "guardian_phone": request.guardian_phone,
        "vaccine_id": request.vaccine_id,
        "preferred_at_ms": request.preferred_at_ms,
        "message": request.message,
        "status": request.status.as_str(),
        "response_note": request.response_note,
        "appointment_id": request.appointment_id,
        "answered_by": request.answered_by,
        "created_at_ms": request.created_at_ms,
        "updated_at_ms": request.updated_at_ms,
    })
}

pub fn stock_json(stock: &StockRow) -> Value {
    json!({
        "id": stock.id,
        "revision": stock.revision,
        "vaccine_id": stock.vaccine_id,
        "vaccine_name": stock.vaccine_name,
        "batch_number": stock.batch_number,
        "location": location_json(&stock.location),
        "quantity": stock.quantity,
        "alert_threshold": stock.alert_threshold,
        "expires_at_ms": stock.expires_at_ms,
        "expires_at": ts(stock.expires_at_ms),
        "updated_at_ms": stock.updated_at_ms,
    })
}

pub fn movement_json(movement: &StockMovementRow) -> Value {
    json!({
        "seq": movement.seq,
        "stock_id": movement.stock_id,
        "delta": movement.delta,
        "quantity_after": movement.quantity_after,
        "reason": movement.reason,
        "vaccination_id": movement.vaccination_id,
        "actor_id": movement.actor_id,
        "ts_ms": movement.ts_ms,
    })
}

pub fn stock_alert_json(alert: &StockAlert) -> Value {
    json!({
        "kind": alert.kind.as_str(),
        "stock": stock_json(&alert.stock),
    })
}

pub fn campaign_json(campaign: &CampaignRow) -> Value {
    json!({
        "id": campaign.id,
        "revision": campaign.revision,
        "title": campaign.title,
        "description": campaign.description,
        "vaccine_id": campaign.vaccine_id,
        "region": campaign.region,
        "district": campaign.district,
        "starts_at_ms": campaign.starts_at_ms,
        "ends_at_ms": campaign.ends_at_ms,
        "starts_at": ts_ms_to_rfc3339(campaign.starts_at_ms),
        "ends_at": ts_ms_to_rfc3339(campaign.ends_at_ms),
        "created_by": campaign.created_by,
        "created_at_ms": campaign.created_at_ms,
    })
}

/// `read` is the reader's receipt state; real-time frames carry none.
pub fn notification_json(
    row: &NotificationRow,
    read: Option<bool>,
) -> Result<Value, serde_json::Error> {
    let meta = match row.meta_json.as_deref() {
        Some(raw) => serde_json::from_str(raw)?,
        None => Value::Null,
    };
    let mut out = json!({
        "seq": row.seq,
        "kind": row.kind,
        "title": row.title,
        "message": row.message,
        "child_id": row.child_id,
        "vaccination_id": row.vaccination_id,
        "meta": meta,
        "created_at_ms": row.created_at_ms,
        "created_at": ts_ms_to_rfc3339(row.created_at_ms),
    });
    if let (Some(read), Some(obj)) = (read, out.as_object_mut()) {
        obj.insert("read".to_string(), Value::Bool(read));
    }
    Ok(out)
}

pub fn notification_view_json(view: &NotificationView) -> Result<Value, serde_json::Error> {
    notification_json(&view.notification, Some(view.read))
}

pub fn coverage_json(report: &CoverageReport) -> Value {
    json!({
        "total_children": report.total_children,
        "vaccinated_children": report.vaccinated_children,
        "coverage_rate": report.coverage_rate,
        "by_status": {
            "up_to_date": report.by_status.up_to_date,
            "late": report.by_status.late,
            "unscheduled": report.by_status.unscheduled,
            "due_now": report.by_status.due_now,
        },
        "done_vaccinations": report.done_vaccinations,
        "missed_vaccinations": report.missed_vaccinations,
    })
}

pub fn breakdown_json(report: &BreakdownReport) -> Value {
    let rows: Vec<Value> = report
        .rows
        .iter()
        .map(|row| {
            json!({
                "group": row.group,
                "total_children": row.total_children,
                "vaccinated_children": row.vaccinated_children,
                "coverage_rate": row.coverage_rate,
                "done_vaccinations": row.done_vaccinations,
                "missed_vaccinations": row.missed_vaccinations,
            })
        })
        .collect();
    json!({ "level": report.level.as_str(), "rows": rows })
}

pub fn guardian_lookup_json(lookup: &GuardianLookup) -> Value {
    json!({
        "phone": lookup.phone,
        "registered": lookup.children > 0,
        "children": lookup.children,
        "pin_set": lookup.pin_set,
    })
}
