//! End-to-end tests that drive the router against an in-memory SQLite database.

use std::collections::HashMap;
use std::sync::Arc;

use api_lib::{
    adapters::DbAdapter,
    config::Config,
    web::{protocol::LiveEvent, router, state::AppState},
};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use santri_core::Clock;
use serde_json::{json, Value};
use tower::ServiceExt;

const ADMIN_EMAIL: &str = "mudir@pondok.id";

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

fn now() -> DateTime<Utc> {
    // A Wednesday.
    Utc.with_ymd_and_hms(2026, 3, 18, 4, 30, 0).unwrap()
}

async fn setup(extra: &[(&str, &str)]) -> (Router, Arc<AppState>) {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("DATABASE_URL".to_string(), "sqlite::memory:".to_string()),
        ("ADMIN_EMAILS".to_string(), ADMIN_EMAIL.to_string()),
    ]);
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();

    let db = DbAdapter::connect_in_memory().await.unwrap();
    db.run_migrations().await.unwrap();

    let state = Arc::new(AppState::new(
        Arc::new(db),
        Arc::new(config),
        Arc::new(FixedClock(now())),
    ));
    (router(state.clone()), state)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    into_parts(app.clone().oneshot(request).await.unwrap()).await
}

async fn send_form(app: &Router, uri: &str, cookie: &str, form: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap();
    into_parts(app.clone().oneshot(request).await.unwrap()).await
}

async fn into_parts(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Signs up and returns the `session=...` cookie pair plus the new user's id.
async fn signup(app: &Router, name: &str, email: &str) -> (String, String) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/signup")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "name": name, "email": email, "password": "bismillah123" }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let cookie = set_cookie.split(';').next().unwrap().to_string();
    let (_, body) = into_parts(response).await;
    (cookie, body["data"]["id"].as_str().unwrap().to_string())
}

async fn open_window(app: &Router, admin: &str, code: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/attendance/windows",
        Some(admin),
        Some(json!({
            "location": "Masjid",
            "code": code,
            "activeFrom": (now() - Duration::minutes(30)).to_rfc3339(),
            "activeUntil": (now() + Duration::hours(1)).to_rfc3339(),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"].clone()
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let (app, _) = setup(&[]).await;

    let (status, body) = send(&app, Method::GET, "/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication required");

    let (status, _) = send(&app, Method::GET, "/me", Some("session=forged"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signup_assigns_roles_and_login_logout_cycle_sessions() {
    let (app, _) = setup(&[]).await;
    let (santri, _) = signup(&app, "Ahmad", "ahmad@pondok.id").await;
    let (admin, _) = signup(&app, "Mudir", "Mudir@Pondok.id").await;

    let (_, me) = send(&app, Method::GET, "/me", Some(&santri), None).await;
    assert_eq!(me["data"]["role"], "santri");
    let (_, me) = send(&app, Method::GET, "/me", Some(&admin), None).await;
    assert_eq!(me["data"]["role"], "admin");
    assert_eq!(me["data"]["email"], ADMIN_EMAIL);

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({ "name": "Dup", "email": "ahmad@pondok.id", "password": "bismillah123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "email already registered");

    let (status, _) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "ahmad@pondok.id", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::POST, "/auth/logout", Some(&santri), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, "/me", Some(&santri), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn scans_are_classified_and_broadcast() {
    let (app, state) = setup(&[]).await;
    let (admin, _) = signup(&app, "Mudir", ADMIN_EMAIL).await;
    let (santri, santri_id) = signup(&app, "Ahmad", "ahmad@pondok.id").await;
    let window = open_window(&app, &admin, "SUBUH-18").await;
    let mut feed = state.broadcaster.subscribe().await;

    // Thirty minutes after opening is past the default fifteen-minute threshold.
    let (status, body) =
        send_form(&app, "/attendance/scan", &santri, "code=SUBUH-18&device=gate-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "late");
    assert_eq!(body["data"]["event"]["userId"], santri_id.as_str());
    assert_eq!(body["data"]["event"]["device"], "gate-1");

    match feed.receiver.recv().await {
        Some(LiveEvent::AttendanceRecorded { status, .. }) => assert_eq!(status, "late"),
        other => panic!("unexpected live event: {other:?}"),
    }

    let (status, body) = send(
        &app,
        Method::POST,
        "/attendance/scan",
        Some(&santri),
        Some(json!({ "code": "NO-SUCH-CODE" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "invalid");
    assert!(body["data"]["event"].is_null());

    let uri = format!("/attendance/windows/{}/events", window["id"].as_str().unwrap());
    let (status, _) = send(&app, Method::GET, &uri, Some(&santri), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = send(&app, Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_scans_can_be_refused() {
    let (app, _) = setup(&[("ALLOW_DUPLICATE_SCANS", "false")]).await;
    let (admin, _) = signup(&app, "Mudir", ADMIN_EMAIL).await;
    let (santri, _) = signup(&app, "Ahmad", "ahmad@pondok.id").await;
    let window = open_window(&app, &admin, "ISYA").await;

    let (_, first) = send_form(&app, "/attendance/scan", &santri, "code=ISYA").await;
    let (status, second) = send_form(&app, "/attendance/scan", &santri, "code=ISYA").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["message"], "already recorded");
    assert_eq!(second["data"]["event"]["id"], first["data"]["event"]["id"]);

    let uri = format!("/attendance/windows/{}/events", window["id"].as_str().unwrap());
    let (_, events) = send(&app, Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(events["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn simultaneous_duplicate_scans_store_one_event() {
    let (app, _) = setup(&[("ALLOW_DUPLICATE_SCANS", "false")]).await;
    let (admin, _) = signup(&app, "Mudir", ADMIN_EMAIL).await;
    let (santri, _) = signup(&app, "Ahmad", "ahmad@pondok.id").await;
    let window = open_window(&app, &admin, "MAGRIB").await;

    let (a, b) = tokio::join!(
        send_form(&app, "/attendance/scan", &santri, "code=MAGRIB"),
        send_form(&app, "/attendance/scan", &santri, "code=MAGRIB"),
    );
    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::OK);
    let mut messages = vec![
        a.1["data"]["message"].as_str().unwrap().to_string(),
        b.1["data"]["message"].as_str().unwrap().to_string(),
    ];
    messages.sort();
    assert_eq!(messages, ["already recorded", "recorded"]);
    assert_eq!(a.1["data"]["event"]["id"], b.1["data"]["event"]["id"]);

    let uri = format!("/attendance/windows/{}/events", window["id"].as_str().unwrap());
    let (_, events) = send(&app, Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(events["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_query_and_path_values_get_json_errors() {
    let (app, _) = setup(&[]).await;
    let (admin, _) = signup(&app, "Mudir", ADMIN_EMAIL).await;

    for uri in [
        "/hafalan?limit=abc",
        "/hafalan/progress?weeks=-3",
        "/attendance/windows/not-a-uuid/events",
        "/halaqoh/42/members",
    ] {
        let (status, body) = send(&app, Method::GET, uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(!body["error"].as_str().unwrap().is_empty(), "{uri}");
    }

    let (status, body) = send(
        &app,
        Method::POST,
        "/hafalan/not-a-uuid/review",
        Some(&admin),
        Some(json!({ "decision": "approved" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn santri_cannot_manage_attendance_or_roles() {
    let (app, _) = setup(&[]).await;
    let (santri, santri_id) = signup(&app, "Ahmad", "ahmad@pondok.id").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/attendance/windows",
        Some(&santri),
        Some(json!({
            "location": "Masjid",
            "activeFrom": now().to_rfc3339(),
            "activeUntil": (now() + Duration::hours(1)).to_rfc3339(),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("santri"));

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/users/{santri_id}/role"),
        Some(&santri),
        Some(json!({ "role": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn hafalan_flows_from_submission_to_weekly_progress() {
    let (app, _) = setup(&[]).await;
    let (admin, _) = signup(&app, "Mudir", ADMIN_EMAIL).await;
    let (ustadz, ustadz_id) = signup(&app, "Ustadz Hasan", "hasan@pondok.id").await;
    let (santri, santri_id) = signup(&app, "Ahmad", "ahmad@pondok.id").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/users/{ustadz_id}/role"),
        Some(&admin),
        Some(json!({ "role": "asatidz" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "asatidz");

    let (status, submitted) = send_form(
        &app,
        "/hafalan",
        &santri,
        "surahId=67&startAyah=1&endAyah=10",
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{submitted}");
    assert_eq!(submitted["data"]["status"], "pending");
    assert_eq!(submitted["data"]["date"], "2026-03-18");
    let review_uri = format!("/hafalan/{}/review", submitted["data"]["id"].as_str().unwrap());

    let (status, _) = send(
        &app,
        Method::POST,
        &review_uri,
        Some(&santri),
        Some(json!({ "decision": "approved" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, reviewed) = send(
        &app,
        Method::POST,
        &review_uri,
        Some(&ustadz),
        Some(json!({ "decision": "approved", "note": "lancar" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviewed["data"]["status"], "approved");
    assert_eq!(reviewed["data"]["ustadzId"], ustadz_id.as_str());

    let (status, _) = send(
        &app,
        Method::POST,
        &review_uri,
        Some(&ustadz),
        Some(json!({ "decision": "rejected" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, list) = send(&app, Method::GET, "/hafalan", Some(&santri), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["data"].as_array().unwrap().len(), 1);

    let (other, _) = signup(&app, "Yusuf", "yusuf@pondok.id").await;
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/hafalan?santriId={santri_id}"),
        Some(&other),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, pending) = send(
        &app,
        Method::GET,
        "/hafalan?status=pending",
        Some(&ustadz),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(pending["data"].as_array().unwrap().is_empty());

    let (status, progress) = send(
        &app,
        Method::GET,
        &format!("/hafalan/progress?santriId={santri_id}&weeks=2"),
        Some(&ustadz),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let weeks = progress["data"].as_array().unwrap();
    assert_eq!(weeks.len(), 2);
    assert_eq!(weeks[0]["ayahCount"], 0);
    assert_eq!(weeks[1]["ayahCount"], 10);
    assert_eq!(weeks[1]["weekLabel"], "2026-W12");

    let (status, body) = send(
        &app,
        Method::GET,
        "/hafalan/progress?weeks=100",
        Some(&santri),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "weeks must be between 1 and 52");

    let (status, body) = send(
        &app,
        Method::GET,
        "/hafalan/progress?weeks=4294967295",
        Some(&santri),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn invalid_submissions_are_rejected() {
    let (app, _) = setup(&[]).await;
    let (santri, _) = signup(&app, "Ahmad", "ahmad@pondok.id").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/hafalan",
        Some(&santri),
        Some(json!({ "surahId": 115, "startAyah": 1, "endAyah": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/hafalan",
        Some(&santri),
        Some(json!({ "surahId": 2, "startAyah": 9, "endAyah": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/hafalan",
        Some(&santri),
        Some(json!({ "surahId": "two" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn halaqoh_membership_is_managed_by_staff() {
    let (app, _) = setup(&[]).await;
    let (admin, _) = signup(&app, "Mudir", ADMIN_EMAIL).await;
    let (santri, santri_id) = signup(&app, "Ahmad", "ahmad@pondok.id").await;
    let (_, ustadz_id) = signup(&app, "Ustadz Hasan", "hasan@pondok.id").await;

    let (status, created) = send(
        &app,
        Method::POST,
        "/halaqoh",
        Some(&admin),
        Some(json!({ "name": "Halaqoh Al-Fatih", "ustadzId": ustadz_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    let members_uri = format!("/halaqoh/{}/members", created["data"]["id"].as_str().unwrap());

    let (status, _) = send(
        &app,
        Method::POST,
        &members_uri,
        Some(&santri),
        Some(json!({ "santriId": santri_id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    for _ in 0..2 {
        let (status, _) = send(
            &app,
            Method::POST,
            &members_uri,
            Some(&admin),
            Some(json!({ "santriId": santri_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (_, members) = send(&app, Method::GET, &members_uri, Some(&santri), None).await;
    assert_eq!(members["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("{members_uri}/{santri_id}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, members) = send(&app, Method::GET, &members_uri, Some(&admin), None).await;
    assert!(members["data"].as_array().unwrap().is_empty());

    let (_, all) = send(&app, Method::GET, "/halaqoh", Some(&santri), None).await;
    assert_eq!(all["data"][0]["name"], "Halaqoh Al-Fatih");
}
