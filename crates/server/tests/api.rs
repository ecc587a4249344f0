#![forbid(unsafe_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use vt_server::config::{BootstrapAdmin, Config};
use vt_server::state::AppState;
use vt_server::time::now_ms;
use vt_server::{bootstrap_admin, build_router, relay};
use vt_storage::SqliteStore;

const DAY_MS: i64 = 86_400_000;
const ADMIN_EMAIL: &str = "admin@vaxtrack.test";
const ADMIN_PASSWORD: &str = "correct horse battery";

struct TestApp {
    state: AppState,
    router: Router,
}

impl TestApp {
    async fn new() -> Self {
        let config = Config {
            bootstrap_admin: Some(BootstrapAdmin {
                email: ADMIN_EMAIL.to_string(),
                password: ADMIN_PASSWORD.to_string(),
            }),
            ..Config::default()
        };
        let store = SqliteStore::open_in_memory().expect("store");
        let state = AppState::new(store, config);
        assert!(bootstrap_admin(&state).await.expect("bootstrap"));
        assert!(!bootstrap_admin(&state).await.expect("second bootstrap"));
        let router = build_router(state.clone());
        Self { state, router }
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["result"]["token"].as_str().expect("token").to_string()
    }

    async fn admin(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    async fn agent(&self, admin: &str, email: &str, center: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/users",
                Some(admin),
                Some(json!({
                    "name": "Field Agent",
                    "email": email,
                    "role": "agent",
                    "password": "agent-password",
                    "health_center": center,
                    "district": "d-1",
                    "region": "r-1",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        self.login(email, "agent-password").await
    }

    async fn vaccine(&self, admin: &str, name: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/vaccines",
                Some(admin),
                Some(json!({ "name": name, "doses_required": 1 })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["result"]["id"].as_str().expect("vaccine id").to_string()
    }

    async fn child(&self, agent: &str, phone: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/children",
                Some(agent),
                Some(json!({
                    "first_name": "Awa",
                    "last_name": "Diop",
                    "gender": "female",
                    "birth_date_ms": now_ms() - 60 * DAY_MS,
                    "guardian_name": "Fatou Diop",
                    "guardian_phone": phone,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["result"]["id"].as_str().expect("child id").to_string()
    }
}

#[tokio::test]
async fn health_is_public_and_everything_else_needs_a_session() {
    let app = TestApp::new().await;

    let (status, body) = app.call("GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["result"]["status"], json!("ok"));

    let (status, body) = app.call("GET", "/api/children", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"]["code"], json!("UNAUTHENTICATED"));

    let (status, _) = app
        .call("GET", "/api/children", Some("not-a-real-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": ADMIN_EMAIL, "password": "wrong password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = TestApp::new().await;
    let admin = app.admin().await;

    let (status, body) = app.call("GET", "/api/auth/me", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["role"], json!("national"));

    let (status, _) = app.call("POST", "/api/auth/logout", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call("GET", "/api/auth/me", Some(&admin), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn children_outside_the_agent_center_look_missing() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let north = app.agent(&admin, "north@vaxtrack.test", "hc-north").await;
    let south = app.agent(&admin, "south@vaxtrack.test", "hc-south").await;
    app.vaccine(&admin, "BCG").await;

    let child = app.child(&north, "+221 77 000 00 01").await;

    let (status, body) = app
        .call("GET", &format!("/api/children/{child}"), Some(&north), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["result"]["child"]["status"], json!("unscheduled"));
    assert_eq!(
        body["result"]["child"]["location"]["health_center"],
        json!("hc-north")
    );

    let (status, body) = app
        .call("GET", &format!("/api/children/{child}"), Some(&south), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("UNKNOWN_ID"));

    let (status, body) = app.call("GET", "/api/children", Some(&south), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["children"], json!([]));

    // Agents cannot create staff accounts.
    let (status, _) = app
        .call(
            "POST",
            "/api/users",
            Some(&north),
            Some(json!({
                "name": "Another",
                "email": "another@vaxtrack.test",
                "role": "agent",
                "password": "agent-password",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn completing_a_vaccination_consumes_stock_and_closes_the_record() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let agent = app.agent(&admin, "agent@vaxtrack.test", "hc-1").await;
    let vaccine = app.vaccine(&admin, "BCG").await;
    let child = app.child(&agent, "+221770000002").await;

    let (status, body) = app
        .call(
            "POST",
            "/api/stocks",
            Some(&agent),
            Some(json!({ "vaccine_id": vaccine, "batch_number": "B-1", "quantity": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let stock = body["result"]["stock"]["id"].as_str().expect("stock id").to_string();

    let (status, body) = app
        .call(
            "POST",
            "/api/vaccinations",
            Some(&agent),
            Some(json!({
                "child_id": child,
                "vaccine_id": vaccine,
                "scheduled_at_ms": now_ms() + 2 * DAY_MS,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["result"]["vaccination"]["status"], json!("scheduled"));
    let vaccination = body["result"]["vaccination"]["id"]
        .as_str()
        .expect("vaccination id")
        .to_string();

    let (status, body) = app
        .call(
            "POST",
            &format!("/api/vaccinations/{vaccination}/complete"),
            Some(&agent),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["result"]["vaccination"]["status"], json!("done"));
    assert_eq!(body["result"]["vaccination"]["batch_number"], json!("B-1"));
    assert_eq!(body["result"]["stock_movement"]["delta"], json!(-1));
    assert_eq!(body["result"]["stock"]["decremented"], json!(true));
    assert_eq!(body["result"]["stock"]["stock_id"], json!(stock));
    assert_eq!(body["result"]["stock"]["remaining"], json!(4));
    assert_eq!(body["result"]["child_status"], json!("up_to_date"));

    let (status, body) = app
        .call("GET", &format!("/api/stocks/{stock}"), Some(&agent), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["stock"]["quantity"], json!(4));

    let (status, body) = app
        .call(
            "POST",
            &format!("/api/vaccinations/{vaccination}/cancel"),
            Some(&agent),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], json!("INVALID_TRANSITION"));

    let (status, body) = app
        .call(
            "POST",
            &format!("/api/vaccinations/{vaccination}/missed"),
            Some(&agent),
            Some(json!({ "expected_revision": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], json!("REVISION_MISMATCH"));

    let (status, body) = app
        .call("GET", "/api/reports/coverage", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["total_children"], json!(1));
    assert_eq!(body["result"]["vaccinated_children"], json!(1));
}

#[tokio::test]
async fn completion_cannot_draw_stock_from_another_center() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let north = app.agent(&admin, "north@vaxtrack.test", "hc-north").await;
    let south = app.agent(&admin, "south@vaxtrack.test", "hc-south").await;
    let vaccine = app.vaccine(&admin, "BCG").await;
    let child = app.child(&north, "+221770000003").await;

    let (status, body) = app
        .call(
            "POST",
            "/api/stocks",
            Some(&south),
            Some(json!({ "vaccine_id": vaccine, "batch_number": "S-1", "quantity": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let stock = body["result"]["stock"]["id"].as_str().expect("stock id").to_string();

    let (status, body) = app
        .call(
            "POST",
            "/api/vaccinations",
            Some(&north),
            Some(json!({
                "child_id": child,
                "vaccine_id": vaccine,
                "scheduled_at_ms": now_ms() + DAY_MS,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let vaccination = body["result"]["vaccination"]["id"]
        .as_str()
        .expect("vaccination id")
        .to_string();

    let (status, body) = app
        .call(
            "POST",
            &format!("/api/vaccinations/{vaccination}/complete"),
            Some(&north),
            Some(json!({ "health_center": "hc-south" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");
    assert_eq!(body["error"]["code"], json!("FORBIDDEN"));

    let (status, body) = app
        .call("GET", &format!("/api/stocks/{stock}"), Some(&south), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["stock"]["quantity"], json!(3));

    let (status, body) = app
        .call(
            "POST",
            &format!("/api/vaccinations/{vaccination}/complete"),
            Some(&north),
            Some(json!({ "health_center": "hc-north" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["result"]["stock"]["decremented"], json!(false));
}

#[tokio::test]
async fn agents_cannot_place_records_outside_their_area() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let agent = app.agent(&admin, "north@vaxtrack.test", "hc-north").await;
    let vaccine = app.vaccine(&admin, "BCG").await;

    let (status, body) = app
        .call(
            "POST",
            "/api/children",
            Some(&agent),
            Some(json!({
                "first_name": "Awa",
                "last_name": "Diop",
                "gender": "female",
                "birth_date_ms": now_ms() - 60 * DAY_MS,
                "guardian_name": "Fatou Diop",
                "guardian_phone": "+221770000004",
                "location": { "district": "d-9", "region": "r-9" },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    let (status, body) = app
        .call(
            "POST",
            "/api/stocks",
            Some(&agent),
            Some(json!({
                "vaccine_id": vaccine,
                "batch_number": "B-9",
                "quantity": 5,
                "region": "r-9",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    app.child(&agent, "+221770000005").await;
    let (status, body) = app
        .call("GET", "/api/reports/breakdown", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let groups: Vec<&str> = body["result"]["rows"]
        .as_array()
        .expect("rows")
        .iter()
        .filter_map(|row| row["group"].as_str())
        .collect();
    assert_eq!(groups, vec!["r-1"]);
}

#[tokio::test]
async fn malformed_bodies_use_the_error_envelope() {
    let app = TestApp::new().await;
    let admin = app.admin().await;

    let (status, body) = app
        .call("POST", "/api/vaccines", Some(&admin), Some(json!({ "doses_required": 1 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("INVALID_INPUT"));

    let (status, body) = app
        .call("GET", "/api/children?status=sleepy", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn guardians_sign_in_with_a_pin_and_see_only_their_children() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let agent = app.agent(&admin, "agent@vaxtrack.test", "hc-1").await;
    let mine = app.child(&agent, "+221770000003").await;
    let other = app.child(&agent, "+221770000004").await;

    let (status, body) = app
        .call("POST", "/api/mobile/lookup", None, Some(json!({ "phone": "+221770000003" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["registered"], json!(true));
    assert_eq!(body["result"]["pin_set"], json!(false));

    let (status, _) = app
        .call(
            "POST",
            &format!("/api/children/{mine}/guardian-pin"),
            Some(&agent),
            Some(json!({ "pin": "4321" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(
            "POST",
            "/api/mobile/login",
            None,
            Some(json!({ "phone": "+221770000003", "pin": "0000" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .call(
            "POST",
            "/api/mobile/login",
            None,
            Some(json!({ "phone": "+221 77 000 00 03", "pin": "4321" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let guardian = body["result"]["token"].as_str().expect("token").to_string();

    let (status, body) = app
        .call("GET", "/api/mobile/children", Some(&guardian), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let children = body["result"]["children"].as_array().expect("children");
    assert_eq!(children.len(), 1);
    assert_eq!(children[0]["id"], json!(mine));

    let (status, _) = app
        .call("GET", &format!("/api/mobile/children/{other}"), Some(&guardian), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.call("GET", "/api/children", Some(&guardian), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(
            "POST",
            "/api/mobile/appointment-requests",
            Some(&guardian),
            Some(json!({ "child_id": mine, "preferred_at_ms": now_ms() + 3 * DAY_MS })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["result"]["status"], json!("pending"));

    let (status, body) = app
        .call("GET", "/api/appointment-requests", Some(&agent), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["requests"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn notifications_reach_the_persisted_feed_and_the_hub() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let agent = app.agent(&admin, "agent@vaxtrack.test", "hc-1").await;
    let vaccine = app.vaccine(&admin, "Polio").await;
    let child = app.child(&agent, "+221770000005").await;

    let mut live = app.state.hub.subscribe();

    let (status, _) = app
        .call(
            "POST",
            "/api/vaccinations",
            Some(&agent),
            Some(json!({
                "child_id": child,
                "vaccine_id": vaccine,
                "scheduled_at_ms": now_ms() + DAY_MS,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let dispatched = relay::relay_once(&app.state).await.expect("relay");
    assert!(dispatched >= 1);
    let event = live.try_recv().expect("live event");
    assert_eq!(event.payload["kind"], json!("vaccination_scheduled"));
    assert!(event.rooms.iter().any(|room| room.contains("hc-1")));
    assert_eq!(relay::relay_once(&app.state).await.expect("relay"), 0);

    let (status, body) = app
        .call("GET", "/api/notifications?unread_only=true", Some(&agent), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let items = body["result"]["notifications"].as_array().expect("items").clone();
    let scheduled = items
        .iter()
        .find(|item| item["kind"] == json!("vaccination_scheduled"))
        .expect("scheduled notification");
    assert_eq!(scheduled["read"], json!(false));
    let seq = scheduled["seq"].as_i64().expect("seq");

    let (status, _) = app
        .call("POST", &format!("/api/notifications/{seq}/read"), Some(&agent), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app
        .call("GET", "/api/notifications?unread_only=true", Some(&agent), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        body["result"]["notifications"]
            .as_array()
            .expect("items")
            .iter()
            .all(|item| item["seq"] != json!(seq))
    );

    let (status, body) = app
        .call("POST", "/api/notifications/abc/read", Some(&agent), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn the_sweeper_marks_overdue_vaccinations_missed() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let agent = app.agent(&admin, "agent@vaxtrack.test", "hc-1").await;
    let vaccine = app.vaccine(&admin, "Measles").await;
    let child = app.child(&agent, "+221770000006").await;

    let (status, body) = app
        .call(
            "POST",
            "/api/vaccinations",
            Some(&agent),
            Some(json!({
                "child_id": child,
                "vaccine_id": vaccine,
                "scheduled_at_ms": now_ms() - DAY_MS,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let vaccination = body["result"]["vaccination"]["id"]
        .as_str()
        .expect("vaccination id")
        .to_string();

    let report = vt_server::sweeper::sweep_once(&app.state).await.expect("sweep");
    assert_eq!(report.missed_vaccinations, vec![vaccination.clone()]);
    assert!(report.failures.is_empty());

    let (status, body) = app
        .call("GET", &format!("/api/vaccinations/{vaccination}"), Some(&agent), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["status"], json!("missed"));

    let again = vt_server::sweeper::sweep_once(&app.state).await.expect("sweep");
    assert!(again.missed_vaccinations.is_empty());
}
