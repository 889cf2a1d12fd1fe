//! Integration tests: build the router over the in-memory store and drive it
//! with `oneshot` requests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use atrium_api::config::{ApiConfig, AuthConfig, SmsConfig};
use atrium_api::{AppState, router};
use atrium_core::auth::otp::DemoLogin;
use atrium_core::auth::password::hash_password;
use atrium_core::models::principal::{NewStaff, Principal, PrincipalKind};
use atrium_core::sms::{SmsDispatch, SmsGateway};
use atrium_core::store::{MemoryPrincipalStore, PrincipalStore};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

const PHONE: &str = "9876543210";
const PASSWORD: &str = "correct horse battery";

/// Captures every code the server tries to send.
#[derive(Default)]
struct RecordingGateway {
    codes: Mutex<Vec<String>>,
}

impl RecordingGateway {
    fn last_code(&self) -> String {
        self.codes.lock().unwrap().last().cloned().expect("no code sent")
    }
}

#[async_trait]
impl SmsGateway for RecordingGateway {
    async fn send(&self, _phone: &str, code: &str, _template_id: &str) -> SmsDispatch {
        self.codes.lock().unwrap().push(code.to_string());
        SmsDispatch::sent("test-msg")
    }
}

struct TestApp {
    store: Arc<MemoryPrincipalStore>,
    sms: Arc<RecordingGateway>,
    app: Router,
}

fn config(auth: AuthConfig) -> ApiConfig {
    ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        pg_connection_url: String::new(),
        jwt_secret: "integration-secret".into(),
        allowed_origins: Vec::new(),
        auth,
        sms: SmsConfig::default(),
        seed_admin: None,
    }
}

fn test_app_with(auth: AuthConfig) -> TestApp {
    let store = Arc::new(MemoryPrincipalStore::new());
    let sms = Arc::new(RecordingGateway::default());
    let state = AppState::new(store.clone(), sms.clone(), config(auth));
    TestApp {
        store,
        sms,
        app: router(state),
    }
}

fn test_app() -> TestApp {
    test_app_with(AuthConfig::default())
}

async fn seed_staff(store: &MemoryPrincipalStore, kind: PrincipalKind, email: &str) -> Principal {
    store
        .create_staff(NewStaff {
            kind,
            name: format!("{kind} person"),
            email: email.into(),
            phone: None,
            password_hash: hash_password(PASSWORD).unwrap(),
        })
        .await
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_bearer(mut req: Request<Body>, token: &str) -> Request<Body> {
    req.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {token}").parse().unwrap(),
    );
    req
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.expect("request")
}

async fn json_body(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse JSON")
}

fn set_cookies(resp: &Response<Body>) -> Vec<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

async fn staff_login(app: &Router, channel: &str, email: &str) -> String {
    let resp = send(
        app,
        post_json(
            &format!("/api/v1/auth/{channel}/login"),
            json!({"email": email, "password": PASSWORD}),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    json_body(resp).await["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn client_otp_login_binds_client_role() {
    let t = test_app();

    let resp = send(
        &t.app,
        post_json("/api/v1/auth/client/otp/request", json!({"phoneNumber": PHONE})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["smsSent"], true);

    let resp = send(
        &t.app,
        post_json(
            "/api/v1/auth/client/otp/verify",
            json!({"phoneNumber": PHONE, "otp": t.sms.last_code()}),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookies = set_cookies(&resp);
    assert!(cookies.iter().any(|c| c.starts_with("token=") && c.contains("HttpOnly")));
    assert!(!cookies.iter().any(|c| c.starts_with("sales_token=")));
    let body = json_body(resp).await;
    let token = body["token"].as_str().unwrap().to_string();
    let client_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["name"], "Client 3210");
    assert!(body["data"].get("otp").is_none());

    let resp = send(&t.app, with_bearer(get("/api/v1/auth/me"), &token)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let me = json_body(resp).await;
    assert_eq!(me["role"], "client");
    assert_eq!(me["data"]["id"], client_id.as_str());
}

#[tokio::test]
async fn malformed_phone_is_400() {
    let t = test_app();
    let resp = send(
        &t.app,
        post_json("/api/v1/auth/client/otp/request", json!({"phoneNumber": "12"})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["success"], false);
}

#[tokio::test]
async fn unreadable_bodies_are_400_json() {
    let t = test_app();
    let raw = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/client/otp/request")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("not json"))
        .unwrap();
    let numeric_phone = post_json(
        "/api/v1/auth/client/otp/request",
        json!({"phoneNumber": 9876543210u64}),
    );
    let empty = post_json("/api/v1/auth/client/otp/request", json!({}));

    for req in [empty, raw, numeric_phone] {
        let resp = send(&t.app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = json_body(resp).await;
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().starts_with("Invalid request body"));
    }
    assert!(t.sms.codes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unparsable_path_id_is_400_json() {
    let t = test_app();
    seed_staff(&t.store, PrincipalKind::Admin, "admin@example.com").await;
    let token = staff_login(&t.app, "admin", "admin@example.com").await;

    let resp = send(
        &t.app,
        with_bearer(get("/api/v1/principals/employee/not-a-uuid"), &token),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().starts_with("Invalid path"));
}

#[tokio::test]
async fn fifth_wrong_otp_is_403() {
    let t = test_app();
    send(
        &t.app,
        post_json("/api/v1/auth/client/otp/request", json!({"phoneNumber": PHONE})),
    )
    .await;
    let right = t.sms.last_code();
    let wrong = if right == "000000" { "111111" } else { "000000" };

    let mut statuses = Vec::new();
    for _ in 0..5 {
        let resp = send(
            &t.app,
            post_json(
                "/api/v1/auth/client/otp/verify",
                json!({"phoneNumber": PHONE, "otp": wrong}),
            ),
        )
        .await;
        statuses.push(resp.status());
    }
    assert_eq!(statuses[..4], [StatusCode::UNAUTHORIZED; 4]);
    assert_eq!(statuses[4], StatusCode::FORBIDDEN);

    let resp = send(
        &t.app,
        post_json(
            "/api/v1/auth/client/otp/verify",
            json!({"phoneNumber": PHONE, "otp": right}),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn resend_for_unknown_phone_is_404() {
    let t = test_app();
    let resp = send(
        &t.app,
        post_json("/api/v1/auth/client/otp/resend", json!({"phoneNumber": PHONE})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn demo_login_over_http() {
    let t = test_app_with(AuthConfig {
        demo: Some(DemoLogin {
            phone: "9999999999".into(),
            code: "424242".into(),
        }),
        ..AuthConfig::default()
    });
    let resp = send(
        &t.app,
        post_json("/api/v1/auth/client/otp/request", json!({"phoneNumber": "9999999999"})),
    )
    .await;
    assert_eq!(json_body(resp).await["smsSent"], false);

    let resp = send(
        &t.app,
        post_json(
            "/api/v1/auth/client/otp/verify",
            json!({"phoneNumber": "9999999999", "otp": "424242"}),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_or_garbage_token_is_401() {
    let t = test_app();
    let resp = send(&t.app, get("/api/v1/auth/me")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["success"], false);

    let resp = send(&t.app, with_bearer(get("/api/v1/auth/me"), "not.a.jwt")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sales_login_sets_both_cookies_and_cookie_authenticates() {
    let t = test_app();
    seed_staff(&t.store, PrincipalKind::Sales, "seller@example.com").await;

    let resp = send(
        &t.app,
        post_json(
            "/api/v1/auth/sales/login",
            json!({"email": "seller@example.com", "password": PASSWORD}),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookies = set_cookies(&resp);
    assert!(cookies.iter().any(|c| c.starts_with("token=")));
    let sales = cookies
        .iter()
        .find(|c| c.starts_with("sales_token="))
        .expect("sales cookie");
    let token = sales
        .trim_start_matches("sales_token=")
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let req = Request::builder()
        .uri("/api/v1/auth/me")
        .header(header::COOKIE, format!("sales_token={token}"))
        .body(Body::empty())
        .unwrap();
    let resp = send(&t.app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["role"], "sales");
}

#[tokio::test]
async fn locked_staff_gets_423() {
    let t = test_app();
    seed_staff(&t.store, PrincipalKind::Employee, "emp@example.com").await;

    for _ in 0..5 {
        let resp = send(
            &t.app,
            post_json(
                "/api/v1/auth/employee/login",
                json!({"email": "emp@example.com", "password": "wrong"}),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
    let resp = send(
        &t.app,
        post_json(
            "/api/v1/auth/employee/login",
            json!({"email": "emp@example.com", "password": PASSWORD}),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::LOCKED);
}

#[tokio::test]
async fn unknown_or_client_channel_is_404() {
    let t = test_app();
    for channel in ["wizard", "client"] {
        let resp = send(
            &t.app,
            post_json(
                &format!("/api/v1/auth/{channel}/login"),
                json!({"email": "a@example.com", "password": "pw"}),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{channel}");
    }
}

#[tokio::test]
async fn deactivated_token_looks_like_missing_principal() {
    let t = test_app();
    let pm = seed_staff(&t.store, PrincipalKind::ProjectManager, "pm@example.com").await;
    let token = staff_login(&t.app, "project-manager", "pm@example.com").await;

    t.store.set_active(pm.reference(), false).await.unwrap();
    let resp = send(&t.app, with_bearer(get("/api/v1/auth/me"), &token)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["message"], "No user found for token");
}

#[tokio::test]
async fn admin_routes_reject_other_roles_by_name() {
    let t = test_app();
    seed_staff(&t.store, PrincipalKind::Employee, "emp@example.com").await;
    let token = staff_login(&t.app, "employee", "emp@example.com").await;

    let req = with_bearer(
        post_json(
            "/api/v1/admin/staff",
            json!({"kind": "sales", "name": "S", "email": "s@example.com", "password": "long-enough"}),
        ),
        &token,
    );
    let resp = send(&t.app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        json_body(resp).await["message"],
        "Role 'employee' is not permitted to access this resource"
    );
}

#[tokio::test]
async fn admin_creates_and_deactivates_staff() {
    let t = test_app();
    seed_staff(&t.store, PrincipalKind::Admin, "admin@example.com").await;
    let admin = staff_login(&t.app, "admin", "admin@example.com").await;

    let req = with_bearer(
        post_json(
            "/api/v1/admin/staff",
            json!({"kind": "sales", "name": "Sam", "email": "Sam@Example.com", "password": PASSWORD}),
        ),
        &admin,
    );
    let resp = send(&t.app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = json_body(resp).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["data"]["email"], "sam@example.com");

    let sam = staff_login(&t.app, "sales", "sam@example.com").await;

    let req = Request::builder()
        .method("PATCH")
        .uri(format!("/api/v1/admin/principals/sales/{id}/active"))
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {admin}"))
        .body(Body::from(json!({"isActive": false}).to_string()))
        .unwrap();
    let resp = send(&t.app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["data"]["isActive"], false);

    let resp = send(&t.app, with_bearer(get("/api/v1/auth/me"), &sam)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = with_bearer(
        post_json(
            "/api/v1/admin/staff",
            json!({"kind": "admin", "name": "A", "email": "a2@example.com", "password": PASSWORD}),
        ),
        &admin,
    );
    assert_eq!(send(&t.app, req).await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unlock_clears_staff_lock() {
    let t = test_app();
    seed_staff(&t.store, PrincipalKind::MasterAdmin, "root@example.com").await;
    let emp = seed_staff(&t.store, PrincipalKind::Employee, "emp@example.com").await;
    let root = staff_login(&t.app, "master-admin", "root@example.com").await;

    for _ in 0..5 {
        send(
            &t.app,
            post_json(
                "/api/v1/auth/employee/login",
                json!({"email": "emp@example.com", "password": "wrong"}),
            ),
        )
        .await;
    }
    let req = with_bearer(
        post_json(
            &format!("/api/v1/admin/principals/employee/{}/unlock", emp.id),
            json!({}),
        ),
        &root,
    );
    assert_eq!(send(&t.app, req).await.status(), StatusCode::OK);

    staff_login(&t.app, "employee", "emp@example.com").await;
}

#[tokio::test]
async fn principal_lookup_is_self_or_admin() {
    let t = test_app();
    let emp = seed_staff(&t.store, PrincipalKind::Employee, "emp@example.com").await;
    let other = seed_staff(&t.store, PrincipalKind::Employee, "other@example.com").await;
    seed_staff(&t.store, PrincipalKind::Admin, "admin@example.com").await;
    let emp_token = staff_login(&t.app, "employee", "emp@example.com").await;
    let admin_token = staff_login(&t.app, "admin", "admin@example.com").await;

    let own = format!("/api/v1/principals/employee/{}", emp.id);
    let foreign = format!("/api/v1/principals/employee/{}", other.id);

    assert_eq!(
        send(&t.app, with_bearer(get(&own), &emp_token)).await.status(),
        StatusCode::OK
    );
    assert_eq!(
        send(&t.app, with_bearer(get(&foreign), &emp_token)).await.status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        send(&t.app, with_bearer(get(&foreign), &admin_token)).await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn welcome_is_personal_only_when_bound() {
    let t = test_app();
    let resp = send(&t.app, get("/api/v1/welcome")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let anon = json_body(resp).await;
    assert!(anon.get("role").is_none());

    let resp = send(&t.app, with_bearer(get("/api/v1/welcome"), "garbage")).await;
    assert_eq!(resp.status(), StatusCode::OK);

    seed_staff(&t.store, PrincipalKind::Admin, "admin@example.com").await;
    let token = staff_login(&t.app, "admin", "admin@example.com").await;
    let resp = send(&t.app, with_bearer(get("/api/v1/welcome"), &token)).await;
    let bound = json_body(resp).await;
    assert_eq!(bound["role"], "admin");
}

#[tokio::test]
async fn logout_expires_cookies() {
    let t = test_app();
    let resp = send(&t.app, post_json("/api/v1/auth/logout", json!({}))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookies = set_cookies(&resp);
    for name in ["token=", "sales_token="] {
        let cookie = cookies
            .iter()
            .find(|c| c.starts_with(name))
            .unwrap_or_else(|| panic!("{name} not cleared"));
        assert!(cookie.contains("Max-Age=0"), "{cookie}");
    }
    assert_eq!(json_body(resp).await["success"], true);
}

#[tokio::test]
async fn health_reports_store() {
    let t = test_app();
    let resp = send(&t.app, get("/health")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storeReachable"], true);
}
