#![forbid(unsafe_code)]

mod support;

use support::*;
use vt_core::model::{ChildStatus, VaccinationStatus};
use vt_core::schedule::DAY_MS;
use vt_storage::{
    DoseProgress, StoreError, VaccinationCloseRequest, VaccinationCompleteRequest,
    VaccinationRescheduleRequest, VaccinationScheduleRequest,
};

fn schedule(
    store: &mut vt_storage::SqliteStore,
    child_id: &str,
    vaccine_id: &str,
    dose: i64,
    at_ms: i64,
) -> Result<vt_storage::VaccinationChange, StoreError> {
    store.vaccination_schedule(VaccinationScheduleRequest {
        child_id: child_id.to_string(),
        vaccine_id: vaccine_id.to_string(),
        dose,
        scheduled_at_ms: at_ms,
        planned: false,
        notes: None,
        actor_id: Some("USR-0001".to_string()),
    })
}

fn complete(id: &str, expected_revision: Option<i64>) -> VaccinationCompleteRequest {
    VaccinationCompleteRequest {
        id: id.to_string(),
        expected_revision,
        actor_id: Some("USR-0001".to_string()),
        ..VaccinationCompleteRequest::default()
    }
}

#[test]
fn new_child_with_outstanding_doses_is_unscheduled() {
    let mut store = store();
    seed_catalog(&mut store);
    let child = register_child(&mut store, "Fatou", 100, north(), GUARDIAN_PHONE);
    assert_eq!(child.status, ChildStatus::Unscheduled);
    assert_eq!(child.next_appointment_ms, None);

    let newborn_store = &mut support::store();
    let newborn = register_child(newborn_store, "Ndeye", 3, north(), GUARDIAN_PHONE);
    assert_eq!(newborn.status, ChildStatus::UpToDate);
}

#[test]
fn schedule_complete_and_decrement_stock() {
    let mut store = store();
    let catalog = seed_catalog(&mut store);
    let child = register_child(&mut store, "Fatou", 100, north(), GUARDIAN_PHONE);
    let stock_id = receive_stock(&mut store, &catalog.bcg.id, "B-1", 11, None);

    let scheduled = schedule(&mut store, &child.id, &catalog.bcg.id, 1, now_ms() + HOUR_MS)
        .expect("schedule");
    assert_eq!(scheduled.vaccination.status, VaccinationStatus::Scheduled);
    assert_eq!(scheduled.child_status, ChildStatus::DueNow);
    assert_eq!(scheduled.notifications.len(), 1);
    assert_eq!(scheduled.notifications[0].kind, "vaccination_scheduled");
    assert!(
        scheduled.notifications[0]
            .rooms
            .contains(&"guardian:+221771234567".to_string())
    );

    let done = store
        .vaccination_complete(complete(&scheduled.vaccination.id, Some(0)))
        .expect("complete");
    assert_eq!(done.vaccination.status, VaccinationStatus::Done);
    assert_eq!(done.vaccination.revision, 1);
    assert_eq!(done.vaccination.batch_number.as_deref(), Some("B-1"));
    assert_eq!(done.vaccination.health_center.as_deref(), Some("hc-north"));
    assert_eq!(done.child_status, ChildStatus::Unscheduled);

    let movement = done.stock_movement.expect("stock movement");
    assert_eq!(movement.delta, -1);
    assert_eq!(movement.quantity_after, 10);
    assert_eq!(store.stock_get(&stock_id).expect("stock").quantity, 10);

    let kinds = done
        .notifications
        .iter()
        .map(|row| row.kind.as_str())
        .collect::<Vec<_>>();
    assert_eq!(kinds, vec!["vaccination_done", "stock_low"]);
}

#[test]
fn completion_without_matching_stock_still_succeeds() {
    let mut store = store();
    let catalog = seed_catalog(&mut store);
    let child = register_child(&mut store, "Fatou", 100, north(), GUARDIAN_PHONE);
    receive_stock(&mut store, &catalog.polio.id, "P-1", 50, None);

    let scheduled = schedule(&mut store, &child.id, &catalog.bcg.id, 1, now_ms()).expect("schedule");
    let done = store
        .vaccination_complete(complete(&scheduled.vaccination.id, None))
        .expect("complete");
    assert_eq!(done.vaccination.status, VaccinationStatus::Done);
    assert!(done.stock_movement.is_none());
    assert_eq!(done.notifications.len(), 1);
}

#[test]
fn decrement_skips_expired_batches_and_prefers_earliest_expiry() {
    let mut store = store();
    let catalog = seed_catalog(&mut store);
    let child = register_child(&mut store, "Fatou", 100, north(), GUARDIAN_PHONE);
    let now = now_ms();
    let expired = receive_stock(&mut store, &catalog.bcg.id, "OLD", 50, Some(now - DAY_MS));
    let soon = receive_stock(&mut store, &catalog.bcg.id, "SOON", 50, Some(now + 10 * DAY_MS));
    let later = receive_stock(&mut store, &catalog.bcg.id, "LATER", 50, Some(now + 100 * DAY_MS));

    let scheduled = schedule(&mut store, &child.id, &catalog.bcg.id, 1, now).expect("schedule");
    let done = store
        .vaccination_complete(complete(&scheduled.vaccination.id, None))
        .expect("complete");
    assert_eq!(done.stock_movement.expect("movement").stock_id, soon);
    assert_eq!(store.stock_get(&expired).expect("stock").quantity, 50);
    assert_eq!(store.stock_get(&later).expect("stock").quantity, 50);
}

#[test]
fn named_batch_is_used_when_given() {
    let mut store = store();
    let catalog = seed_catalog(&mut store);
    let child = register_child(&mut store, "Fatou", 100, north(), GUARDIAN_PHONE);
    let now = now_ms();
    receive_stock(&mut store, &catalog.bcg.id, "SOON", 50, Some(now + 10 * DAY_MS));
    let later = receive_stock(&mut store, &catalog.bcg.id, "LATER", 50, Some(now + 100 * DAY_MS));

    let scheduled = schedule(&mut store, &child.id, &catalog.bcg.id, 1, now).expect("schedule");
    let mut request = complete(&scheduled.vaccination.id, None);
    request.batch_number = Some("LATER".to_string());
    let done = store.vaccination_complete(request).expect("complete");
    assert_eq!(done.stock_movement.expect("movement").stock_id, later);
}

#[test]
fn terminal_states_reject_transitions() {
    let mut store = store();
    let catalog = seed_catalog(&mut store);
    let child = register_child(&mut store, "Fatou", 100, north(), GUARDIAN_PHONE);
    let scheduled = schedule(&mut store, &child.id, &catalog.bcg.id, 1, now_ms()).expect("schedule");
    let id = scheduled.vaccination.id;

    store
        .vaccination_complete(complete(&id, None))
        .expect("complete");
    let err = store
        .vaccination_complete(complete(&id, None))
        .expect_err("double completion");
    assert!(matches!(
        err,
        StoreError::InvalidTransition {
            from: "done",
            to: "done"
        }
    ));

    let err = store
        .vaccination_cancel(VaccinationCloseRequest {
            id: id.clone(),
            ..VaccinationCloseRequest::default()
        })
        .expect_err("cancel after done");
    assert!(matches!(err, StoreError::InvalidTransition { .. }));
}

#[test]
fn stale_revision_is_rejected_without_side_effects() {
    let mut store = store();
    let catalog = seed_catalog(&mut store);
    let child = register_child(&mut store, "Fatou", 100, north(), GUARDIAN_PHONE);
    let stock_id = receive_stock(&mut store, &catalog.bcg.id, "B-1", 20, None);
    let scheduled = schedule(&mut store, &child.id, &catalog.bcg.id, 1, now_ms()).expect("schedule");

    let err = store
        .vaccination_complete(complete(&scheduled.vaccination.id, Some(7)))
        .expect_err("stale revision");
    assert!(matches!(
        err,
        StoreError::RevisionMismatch {
            expected: 7,
            actual: 0
        }
    ));
    assert_eq!(store.stock_get(&stock_id).expect("stock").quantity, 20);
    let row = store
        .vaccination_get(&scheduled.vaccination.id)
        .expect("vaccination");
    assert_eq!(row.status, VaccinationStatus::Scheduled);
}

#[test]
fn one_open_and_one_done_record_per_dose() {
    let mut store = store();
    let catalog = seed_catalog(&mut store);
    let child = register_child(&mut store, "Fatou", 100, north(), GUARDIAN_PHONE);
    let first = schedule(&mut store, &child.id, &catalog.polio.id, 1, now_ms()).expect("schedule");

    let err = schedule(&mut store, &child.id, &catalog.polio.id, 1, now_ms())
        .expect_err("second open record");
    assert!(matches!(err, StoreError::Conflict(_)));

    store
        .vaccination_complete(complete(&first.vaccination.id, None))
        .expect("complete");
    let err = schedule(&mut store, &child.id, &catalog.polio.id, 1, now_ms())
        .expect_err("dose already done");
    assert!(matches!(err, StoreError::Conflict(_)));

    let err = schedule(&mut store, &child.id, &catalog.polio.id, 4, now_ms())
        .expect_err("dose beyond calendar");
    assert!(matches!(err, StoreError::InvalidInput(_)));
}

#[test]
fn missed_vaccination_can_be_rescheduled_then_completed() {
    let mut store = store();
    let catalog = seed_catalog(&mut store);
    let child = register_child(&mut store, "Fatou", 100, north(), GUARDIAN_PHONE);
    let scheduled = schedule(&mut store, &child.id, &catalog.bcg.id, 1, now_ms() - HOUR_MS)
        .expect("schedule");
    let id = scheduled.vaccination.id;

    let missed = store
        .vaccination_mark_missed(VaccinationCloseRequest {
            id: id.clone(),
            expected_revision: Some(0),
            ..VaccinationCloseRequest::default()
        })
        .expect("mark missed");
    assert_eq!(missed.vaccination.status, VaccinationStatus::Missed);
    assert_eq!(missed.child_status, ChildStatus::Unscheduled);

    let at = now_ms() + 5 * DAY_MS;
    let rescheduled = store
        .vaccination_reschedule(VaccinationRescheduleRequest {
            id: id.clone(),
            expected_revision: Some(1),
            scheduled_at_ms: at,
            notes: Some("guardian travelling".to_string()),
            actor_id: None,
        })
        .expect("reschedule");
    assert_eq!(rescheduled.vaccination.status, VaccinationStatus::Scheduled);
    assert_eq!(rescheduled.vaccination.scheduled_at_ms, Some(at));
    assert_eq!(rescheduled.next_appointment_ms, Some(at));
    assert_eq!(rescheduled.child_status, ChildStatus::Late);
    assert_eq!(rescheduled.notifications[0].kind, "vaccination_rescheduled");

    let done = store
        .vaccination_complete(complete(&id, Some(2)))
        .expect("complete");
    assert_eq!(done.vaccination.status, VaccinationStatus::Done);
}

#[test]
fn child_detail_reports_dose_progress() {
    let mut store = store();
    let catalog = seed_catalog(&mut store);
    let child = register_child(&mut store, "Fatou", 60, north(), GUARDIAN_PHONE);
    let scheduled = schedule(&mut store, &child.id, &catalog.bcg.id, 1, now_ms()).expect("schedule");
    store
        .vaccination_complete(complete(&scheduled.vaccination.id, None))
        .expect("complete");
    schedule(&mut store, &child.id, &catalog.polio.id, 1, now_ms() + DAY_MS).expect("schedule");

    let detail = store.child_detail(&child.id, now_ms()).expect("detail");
    let progress = detail
        .doses
        .iter()
        .map(|dose| (dose.vaccine_name.as_str(), dose.dose, dose.progress))
        .collect::<Vec<_>>();
    assert_eq!(
        progress,
        vec![
            ("BCG", 1, DoseProgress::Done),
            ("Polio", 1, DoseProgress::Scheduled),
            ("Polio", 2, DoseProgress::Upcoming),
            ("Polio", 3, DoseProgress::Upcoming),
        ]
    );
    assert_eq!(detail.outstanding, 1);
    assert_eq!(detail.vaccinations.len(), 2);
}

#[test]
fn store_survives_reopen_from_disk() {
    let dir = tempfile::tempdir().expect("temp dir");
    let child_id = {
        let mut store = vt_storage::SqliteStore::open(dir.path()).expect("open store");
        seed_catalog(&mut store);
        register_child(&mut store, "Fatou", 100, north(), GUARDIAN_PHONE).id
    };
    let store = vt_storage::SqliteStore::open(dir.path()).expect("reopen store");
    let child = store.child_get(&child_id).expect("child");
    assert_eq!(child.first_name, "Fatou");
    assert_eq!(store.vaccines_list(false).expect("vaccines").len(), 2);
}
