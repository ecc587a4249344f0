#![forbid(unsafe_code)]

mod support;

use support::*;
use vt_core::model::{ChildStatus, RequestStatus};
use vt_core::scope::{GroupLevel, Scope};
use vt_core::stock::StockAlertKind;
use vt_storage::{
    AppointmentRequestAnswerRequest, AppointmentRequestCreateRequest,
    AppointmentRequestsListRequest, CampaignAudience, CampaignCreateRequest, CampaignsListRequest,
    ChildrenListRequest, CoverageRequest, SqliteStore, StockAdjustRequest, StoreError,
    VaccinationCompleteRequest, VaccinationScheduleRequest,
};

const EAST_PHONE: &str = "+221770000000";

fn vaccinate(store: &mut SqliteStore, child_id: &str, vaccine_id: &str) {
    let scheduled = store
        .vaccination_schedule(VaccinationScheduleRequest {
            child_id: child_id.to_string(),
            vaccine_id: vaccine_id.to_string(),
            dose: 1,
            scheduled_at_ms: now_ms() + HOUR_MS,
            planned: false,
            notes: None,
            actor_id: None,
        })
        .expect("schedule");
    store
        .vaccination_complete(VaccinationCompleteRequest {
            id: scheduled.vaccination.id,
            expected_revision: Some(scheduled.vaccination.revision),
            ..Default::default()
        })
        .expect("complete");
}

fn children_in(store: &SqliteStore, scope: Scope) -> Vec<String> {
    store
        .children_list(ChildrenListRequest {
            scope,
            status: None,
            search: None,
            limit: 50,
            offset: 0,
        })
        .expect("list children")
        .children
        .into_iter()
        .map(|child| child.first_name)
        .collect()
}

#[test]
fn coverage_and_breakdown() {
    let mut store = store();
    let catalog = seed_catalog(&mut store);
    let fatou = register_child(&mut store, "Fatou", 100, north(), GUARDIAN_PHONE);
    register_child(&mut store, "Moussa", 100, north(), GUARDIAN_PHONE);
    register_child(&mut store, "Aida", 100, east(), EAST_PHONE);
    vaccinate(&mut store, &fatou.id, &catalog.bcg.id);

    let national = store
        .coverage_report(CoverageRequest {
            scope: Scope::National,
            vaccine_id: None,
        })
        .expect("coverage");
    assert_eq!(national.total_children, 3);
    assert_eq!(national.vaccinated_children, 1);
    assert_eq!(national.coverage_rate, 33.33);
    assert_eq!(national.done_vaccinations, 1);
    assert_eq!(
        national.by_status.unscheduled
            + national.by_status.late
            + national.by_status.due_now
            + national.by_status.up_to_date,
        3
    );

    let polio_only = store
        .coverage_report(CoverageRequest {
            scope: Scope::National,
            vaccine_id: Some(catalog.polio.id.clone()),
        })
        .expect("coverage");
    assert_eq!(polio_only.vaccinated_children, 0);
    assert_eq!(polio_only.coverage_rate, 0.0);

    let east_only = store
        .coverage_report(CoverageRequest {
            scope: Scope::HealthCenter("hc-east".to_string()),
            vaccine_id: None,
        })
        .expect("coverage");
    assert_eq!(east_only.total_children, 1);
    assert_eq!(east_only.vaccinated_children, 0);

    let by_region = store.breakdown_report(&Scope::National).expect("breakdown");
    assert_eq!(by_region.level, GroupLevel::Region);
    assert_eq!(by_region.rows.len(), 1);
    assert_eq!(by_region.rows[0].group, "r-1");
    assert_eq!(by_region.rows[0].total_children, 3);

    let by_district = store
        .breakdown_report(&Scope::Region("r-1".to_string()))
        .expect("breakdown");
    assert_eq!(by_district.level, GroupLevel::District);
    let groups: Vec<_> = by_district
        .rows
        .iter()
        .map(|row| (row.group.as_str(), row.total_children, row.coverage_rate))
        .collect();
    assert_eq!(groups, vec![("d-1", 2, 50.0), ("d-2", 1, 0.0)]);
}

#[test]
fn lists_respect_scope() {
    let mut store = store();
    seed_catalog(&mut store);
    register_child(&mut store, "Fatou", 100, north(), GUARDIAN_PHONE);
    register_child(&mut store, "Aida", 100, east(), EAST_PHONE);

    assert_eq!(children_in(&store, Scope::National).len(), 2);
    assert_eq!(children_in(&store, Scope::Region("r-1".to_string())).len(), 2);
    assert_eq!(
        children_in(&store, Scope::District("d-2".to_string())),
        vec!["Aida".to_string()]
    );
    assert_eq!(
        children_in(&store, Scope::HealthCenter("hc-north".to_string())),
        vec!["Fatou".to_string()]
    );
    assert_eq!(
        children_in(&store, Scope::Guardian(EAST_PHONE.to_string())),
        vec!["Aida".to_string()]
    );
    assert!(children_in(&store, Scope::Region("r-9".to_string())).is_empty());

    let searched = store
        .children_list(ChildrenListRequest {
            scope: Scope::National,
            status: Some(ChildStatus::Unscheduled),
            search: Some("fat".to_string()),
            limit: 1,
            offset: 0,
        })
        .expect("search");
    assert_eq!(searched.total, 1);
    assert!(!searched.has_more);
}

#[test]
fn stock_alerts_follow_quantity() {
    let mut store = store();
    let catalog = seed_catalog(&mut store);
    let stock_id = receive_stock(&mut store, &catalog.bcg.id, "B-1", 5, None);

    let alerts = store
        .stock_alerts(&Scope::HealthCenter("hc-north".to_string()), now_ms())
        .expect("alerts");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, StockAlertKind::Low);

    let adjusted = store
        .stock_adjust(StockAdjustRequest {
            id: stock_id.clone(),
            expected_revision: None,
            delta: -5,
            reason: "broken vials".to_string(),
            actor_id: None,
        })
        .expect("adjust");
    assert_eq!(adjusted.stock.quantity, 0);
    assert_eq!(adjusted.movement.delta, -5);

    let err = store
        .stock_adjust(StockAdjustRequest {
            id: stock_id,
            expected_revision: None,
            delta: -1,
            reason: "count".to_string(),
            actor_id: None,
        })
        .expect_err("below zero");
    assert!(matches!(err, StoreError::InvalidInput(_)));

    let alerts = store
        .stock_alerts(&Scope::Region("r-1".to_string()), now_ms())
        .expect("alerts");
    assert_eq!(alerts[0].kind, StockAlertKind::Empty);
    assert!(store
        .stock_alerts(&Scope::HealthCenter("hc-east".to_string()), now_ms())
        .expect("alerts")
        .is_empty());
}

#[test]
fn guardian_requests_an_appointment() {
    let mut store = store();
    let catalog = seed_catalog(&mut store);
    let fatou = register_child(&mut store, "Fatou", 100, north(), GUARDIAN_PHONE);
    let aida = register_child(&mut store, "Aida", 100, east(), EAST_PHONE);
    let preferred = now_ms() + 2 * HOUR_MS;

    let ask = |child_id: &str| AppointmentRequestCreateRequest {
        guardian_phone: GUARDIAN_PHONE.to_string(),
        child_id: child_id.to_string(),
        vaccine_id: Some(catalog.polio.id.clone()),
        preferred_at_ms: Some(preferred),
        message: Some("mornings please".to_string()),
    };

    assert!(matches!(
        store.appointment_request_create(ask(&aida.id)),
        Err(StoreError::UnknownId)
    ));
    let created = store
        .appointment_request_create(ask(&fatou.id))
        .expect("request");
    assert_eq!(created.request.status, RequestStatus::Pending);
    assert_eq!(created.notifications.len(), 1);
    assert!(matches!(
        store.appointment_request_create(ask(&fatou.id)),
        Err(StoreError::Conflict(_))
    ));

    let answered = store
        .appointment_request_answer(AppointmentRequestAnswerRequest {
            id: created.request.id.clone(),
            expected_revision: Some(0),
            accept: true,
            scheduled_at_ms: None,
            note: None,
            actor_id: Some("USR-0001".to_string()),
        })
        .expect("accept");
    assert_eq!(answered.request.status, RequestStatus::Accepted);
    let appointment = answered.appointment.expect("appointment booked");
    assert_eq!(appointment.scheduled_at_ms, preferred);
    assert_eq!(answered.request.appointment_id.as_deref(), Some(appointment.id.as_str()));
    assert_eq!(answered.notifications.len(), 2);
    assert_eq!(
        store.child_get(&fatou.id).expect("child").status,
        ChildStatus::DueNow
    );

    assert!(matches!(
        store.appointment_request_answer(AppointmentRequestAnswerRequest {
            id: created.request.id.clone(),
            expected_revision: None,
            accept: false,
            scheduled_at_ms: None,
            note: None,
            actor_id: None,
        }),
        Err(StoreError::InvalidTransition { .. })
    ));

    let mine = store
        .appointment_requests_list(AppointmentRequestsListRequest {
            scope: Scope::Guardian(GUARDIAN_PHONE.to_string()),
            status: None,
            limit: 10,
            offset: 0,
        })
        .expect("list");
    assert_eq!(mine.len(), 1);
    let east_staff = store
        .appointment_requests_list(AppointmentRequestsListRequest {
            scope: Scope::HealthCenter("hc-east".to_string()),
            status: Some(RequestStatus::Pending),
            limit: 10,
            offset: 0,
        })
        .expect("list");
    assert!(east_staff.is_empty());
}

#[test]
fn campaigns_reach_their_audience() {
    let mut store = store();
    register_child(&mut store, "Fatou", 100, north(), GUARDIAN_PHONE);
    let now = now_ms();
    let mut create = |title: &str, region: Option<&str>, district: Option<&str>| {
        store
            .campaign_create(CampaignCreateRequest {
                title: title.to_string(),
                description: "door to door".to_string(),
                vaccine_id: None,
                region: region.map(str::to_string),
                district: district.map(str::to_string),
                starts_at_ms: now - HOUR_MS,
                ends_at_ms: now + 24 * HOUR_MS,
                actor_id: None,
            })
            .map(|change| change.campaign.title)
    };
    create("national", None, None).expect("national");
    create("region", Some("r-1"), None).expect("region");
    create("district", Some("r-1"), Some("d-2")).expect("district");
    create("elsewhere", Some("r-9"), None).expect("elsewhere");
    assert!(matches!(
        create("orphan", None, Some("d-2")),
        Err(StoreError::InvalidInput(_))
    ));

    let titles = |store: &SqliteStore, audience: CampaignAudience| {
        let mut titles: Vec<String> = store
            .campaigns_list(CampaignsListRequest {
                audience,
                active_at_ms: Some(now),
                limit: 50,
                offset: 0,
            })
            .expect("list")
            .into_iter()
            .map(|campaign| campaign.title)
            .collect();
        titles.sort();
        titles
    };

    let guardian = store
        .guardian_campaign_audience(GUARDIAN_PHONE)
        .expect("audience");
    assert_eq!(titles(&store, guardian), vec!["national", "region"]);

    let regional = CampaignAudience {
        regions_full: vec!["r-1".to_string()],
        ..CampaignAudience::default()
    };
    assert_eq!(titles(&store, regional), vec!["district", "national", "region"]);

    let everyone = CampaignAudience {
        all: true,
        ..CampaignAudience::default()
    };
    assert_eq!(titles(&store, everyone).len(), 4);
}
