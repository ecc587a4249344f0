use super::ids::{RecordIdError, RecordKind};
use super::model::{ChildStatus, Role, VaccinationStatus, VaccinationTransition};
use super::phone::{PhoneError, normalize_phone};
use super::rooms::{actor_rooms, broadcast_rooms, child_rooms, intersects};
use super::schedule::{DAY_MS, DoseKey, VaccineCalendar, dose_plan, due_doses};
use super::scope::{Actor, Location, Scope};
use super::status::{StatusInputs, StatusPolicy, derive_child_status, outstanding};
use super::stock::{StockAlertKind, classify_stock, crossed_threshold};
use std::collections::BTreeSet;

fn calendar() -> Vec<VaccineCalendar> {
    vec![
        VaccineCalendar {
            vaccine_id: "VAX-0001".to_string(),
            min_age_days: 0,
            doses_required: 1,
            dose_interval_days: 0,
        },
        VaccineCalendar {
            vaccine_id: "VAX-0002".to_string(),
            min_age_days: 42,
            doses_required: 3,
            dose_interval_days: 28,
        },
    ]
}

fn agent() -> Actor {
    Actor {
        subject: "USR-0002".to_string(),
        role: Role::Agent,
        location: Location::new("hc-north", "d-1", "r-1"),
    }
}

#[test]
fn record_ids_round_trip_and_reject_garbage() {
    assert_eq!(RecordKind::Child.format(7), "CHD-0007");
    assert_eq!(RecordKind::Child.parse(" chd-0007 ").as_deref(), Ok("CHD-0007"));
    assert_eq!(RecordKind::Child.parse(""), Err(RecordIdError::Empty));
    assert_eq!(
        RecordKind::Child.parse("VCN-0007"),
        Err(RecordIdError::WrongPrefix)
    );
    assert_eq!(
        RecordKind::Child.parse("CHD-07"),
        Err(RecordIdError::TooFewDigits)
    );
    assert_eq!(
        RecordKind::Child.parse("CHD-00x7"),
        Err(RecordIdError::InvalidDigit)
    );
    assert_eq!(RecordKind::Vaccination.format(12345), "VCN-12345");
}

#[test]
fn vaccination_state_machine() {
    use VaccinationStatus::*;
    assert!(Scheduled.can_transition(Done));
    assert!(Scheduled.can_transition(Missed));
    assert!(Scheduled.can_transition(Cancelled));
    assert!(Scheduled.can_transition(Scheduled));
    assert!(Missed.can_transition(Done));
    assert!(Missed.can_transition(Scheduled));
    assert!(Planned.can_transition(Scheduled));
    assert!(!Planned.can_transition(Missed));
    assert!(!Missed.can_transition(Missed));
    assert!(!Done.can_transition(Cancelled));
    assert!(!Done.can_transition(Scheduled));
    assert!(!Cancelled.can_transition(Done));
    assert!(!Scheduled.can_transition(Planned));
    assert_eq!(VaccinationTransition::Reschedule.target(), Scheduled);
    assert_eq!(
        VaccinationStatus::parse("Completed"),
        Some(VaccinationStatus::Done)
    );
}

#[test]
fn dose_plan_spaces_doses_by_interval() {
    let birth = 1_000 * DAY_MS;
    let plan = dose_plan(birth, &calendar());
    let due_days = plan
        .iter()
        .map(|dose| (dose.key.vaccine_id.as_str(), dose.key.dose, (dose.due_at_ms - birth) / DAY_MS))
        .collect::<Vec<_>>();
    assert_eq!(
        due_days,
        vec![
            ("VAX-0001", 1, 0),
            ("VAX-0002", 1, 42),
            ("VAX-0002", 2, 70),
            ("VAX-0002", 3, 98),
        ]
    );
    assert_eq!(due_doses(birth, birth + 70 * DAY_MS, &calendar()).len(), 3);
}

#[test]
fn up_to_date_exactly_when_every_due_dose_is_done() {
    let birth = 0;
    let now = 80 * DAY_MS;
    let policy = StatusPolicy::default();
    let due = due_doses(birth, now, &calendar());
    let mut done = BTreeSet::new();
    done.insert(DoseKey::new("VAX-0001", 1));
    done.insert(DoseKey::new("VAX-0002", 1));

    let inputs = StatusInputs {
        due: &due,
        done: &done,
        next_appointment_ms: None,
        now_ms: now,
    };
    assert_eq!(derive_child_status(&inputs, &policy), ChildStatus::Unscheduled);
    assert_eq!(outstanding(&due, &done).len(), 1);

    done.insert(DoseKey::new("VAX-0002", 2));
    let inputs = StatusInputs {
        due: &due,
        done: &done,
        next_appointment_ms: None,
        now_ms: now,
    };
    assert_eq!(derive_child_status(&inputs, &policy), ChildStatus::UpToDate);
}

#[test]
fn nothing_due_is_up_to_date() {
    let done = BTreeSet::new();
    let inputs = StatusInputs {
        due: &[],
        done: &done,
        next_appointment_ms: Some(5),
        now_ms: 0,
    };
    assert_eq!(
        derive_child_status(&inputs, &StatusPolicy::default()),
        ChildStatus::UpToDate
    );
}

#[test]
fn next_appointment_drives_due_now_and_late() {
    let now = 200 * DAY_MS;
    let policy = StatusPolicy {
        due_now_window_ms: DAY_MS,
        missed_grace_ms: 0,
    };
    let due = due_doses(0, now, &calendar());
    let done = BTreeSet::new();
    let status_at = |next: i64| {
        derive_child_status(
            &StatusInputs {
                due: &due,
                done: &done,
                next_appointment_ms: Some(next),
                now_ms: now,
            },
            &policy,
        )
    };
    assert_eq!(status_at(now + DAY_MS / 2), ChildStatus::DueNow);
    assert_eq!(status_at(now - DAY_MS), ChildStatus::DueNow);
    assert_eq!(status_at(now + 3 * DAY_MS), ChildStatus::Late);
    assert_eq!(status_at(now - 3 * DAY_MS), ChildStatus::Late);
}

#[test]
fn missed_cutoff_respects_grace() {
    let policy = StatusPolicy {
        due_now_window_ms: DAY_MS,
        missed_grace_ms: 60_000,
    };
    assert_eq!(policy.missed_cutoff(1_000), -59_000);
    assert_eq!(policy.missed_cutoff(61_000), 1_000);
    assert_eq!(policy.missed_cutoff(61_001), 1_001);

    let negative = StatusPolicy {
        due_now_window_ms: DAY_MS,
        missed_grace_ms: -5,
    };
    assert_eq!(negative.missed_cutoff(1_000), 1_000);
    assert_eq!(policy.missed_cutoff(i64::MIN), i64::MIN);
}

#[test]
fn phone_normalization() {
    assert_eq!(normalize_phone(" +221 77-123.45(67) ").as_deref(), Ok("+221771234567"));
    assert_eq!(normalize_phone("771234567").as_deref(), Ok("771234567"));
    assert_eq!(normalize_phone("  "), Err(PhoneError::Empty));
    assert_eq!(normalize_phone("12345"), Err(PhoneError::TooShort));
    assert_eq!(
        normalize_phone("77+1234567"),
        Err(PhoneError::InvalidChar { ch: '+', index: 2 })
    );
}

#[test]
fn agents_see_only_their_center() {
    let agent = agent();
    assert_eq!(
        agent.scope(),
        Some(Scope::HealthCenter("hc-north".to_string()))
    );
    assert!(agent.can_see(&Location::new("hc-north", "d-1", "r-1"), None));
    assert!(!agent.can_see(&Location::new("hc-south", "d-1", "r-1"), None));

    let district = Actor {
        subject: "USR-0003".to_string(),
        role: Role::District,
        location: Location {
            health_center: None,
            district: Some("d-1".to_string()),
            region: Some("r-1".to_string()),
        },
    };
    assert!(district.can_see(&Location::new("hc-south", "d-1", "r-1"), None));
    assert!(district.can_manage(Role::Agent, &Location::new("hc-south", "d-1", "r-1")));
    assert!(!district.can_manage(Role::District, &Location::new("hc-south", "d-1", "r-1")));
    assert!(!district.can_manage(Role::Agent, &Location::new("hc-x", "d-2", "r-1")));
}

#[test]
fn guardians_see_only_their_phone() {
    let guardian = Actor {
        subject: "+221771234567".to_string(),
        role: Role::User,
        location: Location::default(),
    };
    let location = Location::new("hc-north", "d-1", "r-1");
    assert!(guardian.can_see(&location, Some("+221771234567")));
    assert!(!guardian.can_see(&location, Some("+221770000000")));
    assert!(!guardian.can_see(&location, None));
    assert!(!guardian.at_least(Role::Agent));
}

#[test]
fn staff_without_location_sees_nothing() {
    let orphan = Actor {
        subject: "USR-0009".to_string(),
        role: Role::Regional,
        location: Location::default(),
    };
    assert_eq!(orphan.scope(), None);
    assert!(!orphan.can_see(&Location::new("hc", "d", "r"), None));
}

#[test]
fn rooms_route_child_events_to_owner_levels() {
    let location = Location::new("hc-north", "d-1", "r-1");
    let targets = child_rooms(&location, "+221771234567");
    assert!(intersects(&actor_rooms(&agent()), &targets));

    let other_agent = Actor {
        location: Location::new("hc-south", "d-1", "r-1"),
        ..agent()
    };
    assert!(!intersects(&actor_rooms(&other_agent), &targets));

    let guardian = Actor {
        subject: "+221771234567".to_string(),
        role: Role::User,
        location: Location::default(),
    };
    assert!(intersects(&actor_rooms(&guardian), &targets));
}

#[test]
fn campaign_broadcast_reaches_agents_below() {
    let targets = broadcast_rooms(None, Some("r-1"));
    assert!(intersects(&actor_rooms(&agent()), &targets));
    let elsewhere = Actor {
        location: Location::new("hc-east", "d-9", "r-2"),
        ..agent()
    };
    assert!(!intersects(&actor_rooms(&elsewhere), &targets));
    assert!(intersects(&actor_rooms(&elsewhere), &broadcast_rooms(None, None)));
}

#[test]
fn stock_alert_priority() {
    let now = 100 * DAY_MS;
    let warn = 30 * DAY_MS;
    assert_eq!(classify_stock(0, 10, None, now, warn), Some(StockAlertKind::Empty));
    assert_eq!(
        classify_stock(50, 10, Some(now - 1), now, warn),
        Some(StockAlertKind::Expired)
    );
    assert_eq!(classify_stock(10, 10, None, now, warn), Some(StockAlertKind::Low));
    assert_eq!(
        classify_stock(50, 10, Some(now + DAY_MS), now, warn),
        Some(StockAlertKind::Expiring)
    );
    assert_eq!(classify_stock(50, 10, Some(now + 60 * DAY_MS), now, warn), None);
    assert!(crossed_threshold(11, 10, 10));
    assert!(!crossed_threshold(10, 9, 10));
}
