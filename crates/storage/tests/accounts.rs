#![forbid(unsafe_code)]

mod support;

use support::*;
use vt_core::model::Role;
use vt_core::scope::Location;
use vt_storage::{
    SessionCreateRequest, SessionSubject, SqliteStore, StoreError, UserCreateRequest,
    UserSetActiveRequest,
};

fn create_agent(store: &mut SqliteStore, email: &str) -> vt_storage::UserRow {
    store
        .user_create(UserCreateRequest {
            name: "Agent Sall".to_string(),
            email: email.to_string(),
            phone: None,
            role: Role::Agent,
            location: north(),
            password: "correct horse".to_string(),
        })
        .expect("create agent")
}

#[test]
fn password_login_and_sessions() {
    let mut store = store();
    let agent = create_agent(&mut store, "Agent@Example.org");
    assert_eq!(agent.email, "agent@example.org");
    assert_eq!(agent.id, "USR-0001");

    let user = store
        .user_authenticate("agent@example.org", "correct horse")
        .expect("login");
    assert_eq!(user.id, agent.id);
    assert!(matches!(
        store.user_authenticate("agent@example.org", "wrong password"),
        Err(StoreError::InvalidCredentials)
    ));
    assert!(matches!(
        store.user_authenticate("nobody@example.org", "correct horse"),
        Err(StoreError::InvalidCredentials)
    ));

    let session = store
        .session_create(SessionCreateRequest {
            subject: SessionSubject::User(agent.id.clone()),
            ttl_ms: HOUR_MS,
        })
        .expect("session");
    let actor = store
        .session_resolve(&session.token, now_ms())
        .expect("resolve");
    assert_eq!(actor.subject, agent.id);
    assert_eq!(actor.role, Role::Agent);
    assert!(matches!(
        store.session_resolve(&session.token, session.expires_at_ms + 1),
        Err(StoreError::InvalidCredentials)
    ));

    store
        .user_set_active(UserSetActiveRequest {
            id: agent.id.clone(),
            expected_revision: Some(0),
            active: false,
        })
        .expect("deactivate");
    assert!(matches!(
        store.session_resolve(&session.token, now_ms()),
        Err(StoreError::InvalidCredentials)
    ));
    assert!(matches!(
        store.user_authenticate("agent@example.org", "correct horse"),
        Err(StoreError::InvalidCredentials)
    ));
}

#[test]
fn passwords_longer_than_the_hash_input_are_rejected() {
    let mut store = store();
    let err = store
        .user_create(UserCreateRequest {
            name: "Agent Sall".to_string(),
            email: "long@example.org".to_string(),
            phone: None,
            role: Role::Agent,
            location: north(),
            password: "x".repeat(73),
        })
        .expect_err("overlong password");
    assert!(matches!(err, StoreError::InvalidInput("password is too long")));

    store
        .user_create(UserCreateRequest {
            name: "Agent Sall".to_string(),
            email: "long@example.org".to_string(),
            phone: None,
            role: Role::Agent,
            location: north(),
            password: "x".repeat(72),
        })
        .expect("password at the limit");
    assert!(store.user_authenticate("long@example.org", &"x".repeat(72)).is_ok());
    assert!(matches!(
        store.user_authenticate("long@example.org", &"x".repeat(71)),
        Err(StoreError::InvalidCredentials)
    ));
}

#[test]
fn duplicate_email_and_incomplete_location_are_rejected() {
    let mut store = store();
    create_agent(&mut store, "agent@example.org");
    let err = store
        .user_create(UserCreateRequest {
            name: "Other".to_string(),
            email: "AGENT@example.org".to_string(),
            phone: None,
            role: Role::District,
            location: north(),
            password: "another secret".to_string(),
        })
        .expect_err("duplicate email");
    assert!(matches!(err, StoreError::Conflict(_)));

    let err = store
        .user_create(UserCreateRequest {
            name: "Orphan".to_string(),
            email: "orphan@example.org".to_string(),
            phone: None,
            role: Role::Agent,
            location: Location {
                health_center: None,
                district: Some("d-1".to_string()),
                region: Some("r-1".to_string()),
            },
            password: "another secret".to_string(),
        })
        .expect_err("agent without health center");
    assert!(matches!(err, StoreError::InvalidInput(_)));

    let district = store
        .user_create(UserCreateRequest {
            name: "Supervisor".to_string(),
            email: "district@example.org".to_string(),
            phone: None,
            role: Role::District,
            location: north(),
            password: "another secret".to_string(),
        })
        .expect("district user");
    assert_eq!(district.location.health_center, None);
    assert_eq!(district.location.district.as_deref(), Some("d-1"));
}

#[test]
fn guardian_pin_locks_after_five_failures() {
    let mut store = store();
    seed_catalog(&mut store);
    register_child(&mut store, "Fatou", 100, north(), GUARDIAN_PHONE);

    let lookup = store.guardian_lookup("+221 77 123 45 67").expect("lookup");
    assert_eq!(lookup.children, 1);
    assert!(!lookup.pin_set);

    store
        .guardian_pin_set(GUARDIAN_PHONE, "4321")
        .expect("set pin");
    assert!(store.guardian_lookup(GUARDIAN_PHONE).expect("lookup").pin_set);
    let now = now_ms();
    assert_eq!(
        store
            .guardian_authenticate(GUARDIAN_PHONE, "4321", now)
            .expect("login"),
        GUARDIAN_PHONE
    );

    for _ in 0..4 {
        assert!(matches!(
            store.guardian_authenticate(GUARDIAN_PHONE, "0000", now),
            Err(StoreError::InvalidCredentials)
        ));
    }
    let until_ms = match store.guardian_authenticate(GUARDIAN_PHONE, "0000", now) {
        Err(StoreError::Locked { until_ms }) => until_ms,
        other => panic!("expected lock, got {other:?}"),
    };
    assert_eq!(until_ms, now + 15 * 60_000);
    assert!(matches!(
        store.guardian_authenticate(GUARDIAN_PHONE, "4321", now + 60_000),
        Err(StoreError::Locked { .. })
    ));
    assert_eq!(
        store
            .guardian_authenticate(GUARDIAN_PHONE, "4321", until_ms + 1)
            .expect("login after lock"),
        GUARDIAN_PHONE
    );
}

#[test]
fn pins_need_a_registered_child_and_digits() {
    let mut store = store();
    assert!(matches!(
        store.guardian_pin_set(GUARDIAN_PHONE, "1234"),
        Err(StoreError::UnknownId)
    ));
    register_child(&mut store, "Fatou", 100, north(), GUARDIAN_PHONE);
    assert!(matches!(
        store.guardian_pin_set(GUARDIAN_PHONE, "12a4"),
        Err(StoreError::InvalidInput(_))
    ));
    assert!(matches!(
        store.guardian_pin_set(GUARDIAN_PHONE, "123"),
        Err(StoreError::InvalidInput(_))
    ));

    store.guardian_pin_set(GUARDIAN_PHONE, "123456").expect("set pin");
    let session = store
        .session_create(SessionCreateRequest {
            subject: SessionSubject::Guardian(GUARDIAN_PHONE.to_string()),
            ttl_ms: HOUR_MS,
        })
        .expect("session");
    let actor = store
        .session_resolve(&session.token, now_ms())
        .expect("resolve");
    assert_eq!(actor.role, Role::User);
    assert_eq!(actor.subject, GUARDIAN_PHONE);
}
