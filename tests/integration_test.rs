// Integration tests for the VPS Panel client
//
// These tests drive the full client stack (interceptor, refresh coordination,
// logout, panel API) against an in-process mock of the panel backend.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

use vps_panel::{
    api::{is_totp_required, PanelApi},
    auth::{AuthManager, LogoutHandler, Renewal, SessionStore, TokenRefreshClient},
    error::{ApiError, RefreshError},
    http_client::{parse_base_url, PanelHttpClient},
    models::{User, VpsCreate, VpsQuery, NetworkType},
};

// ==================================================================================================
// Mock Backend
// ==================================================================================================

#[derive(Default)]
struct Backend {
    refresh_calls: AtomicUsize,
    vps_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    refresh_fails: AtomicBool,
    always_unauthorized: AtomicBool,
    refresh_delay_ms: AtomicU64,
    valid_tokens: Mutex<HashSet<String>>,
    seen_auth: Mutex<Vec<Option<String>>>,
    seen_request_ids: Mutex<Vec<String>>,
    refresh_bodies: Mutex<Vec<Value>>,
}

type SharedBackend = Arc<Backend>;

impl Backend {
    fn with_valid(tokens: &[&str]) -> SharedBackend {
        let backend = Backend::default();
        backend
            .valid_tokens
            .lock()
            .unwrap()
            .extend(tokens.iter().map(|t| t.to_string()));
        Arc::new(backend)
    }

    /// Record the call and check its bearer token
    fn authorized(&self, headers: &HeaderMap) -> bool {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let request_id = headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        self.seen_auth.lock().unwrap().push(auth.clone());
        self.seen_request_ids.lock().unwrap().push(request_id);

        if self.always_unauthorized.load(Ordering::SeqCst) {
            return false;
        }

        match auth.as_deref().and_then(|a| a.strip_prefix("Bearer ")) {
            Some(token) => self.valid_tokens.lock().unwrap().contains(token),
            None => false,
        }
    }

    fn seen_auth(&self) -> Vec<Option<String>> {
        self.seen_auth.lock().unwrap().clone()
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Could not validate credentials"})),
    )
        .into_response()
}

fn user_json() -> Value {
    json!({
        "id": 1,
        "email": "admin@example.com",
        "username": "admin",
        "full_name": "Panel Admin",
        "role": "admin",
        "is_active": true,
        "is_2fa_enabled": false,
        "created_at": "2024-05-01T10:00:00"
    })
}

fn vps_json() -> Value {
    json!({
        "id": 7,
        "uuid": "0b7c9c1e-3f7a-4e0f-9d39-54a1b8f0c001",
        "name": "web-1",
        "status": "running",
        "cpu_cores": 2,
        "ram_gb": 4.0,
        "storage_gb": 40,
        "public_ipv4": "203.0.113.10",
        "network_type": "public_ipv4",
        "owner_id": 1,
        "host_id": 3,
        "created_at": "2024-05-01T10:00:00Z"
    })
}

async fn refresh(State(backend): State<SharedBackend>, Json(body): Json<Value>) -> Response {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    backend.refresh_bodies.lock().unwrap().push(body.clone());

    let delay = backend.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if backend.refresh_fails.load(Ordering::SeqCst) || body["refresh_token"] != "R1" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": {"detail": "Invalid refresh token"}})),
        )
            .into_response();
    }

    backend.valid_tokens.lock().unwrap().insert("A2".to_string());
    Json(json!({"access_token": "A2", "refresh_token": "R2", "token_type": "bearer"})).into_response()
}

async fn list_vps(State(backend): State<SharedBackend>, headers: HeaderMap) -> Response {
    backend.vps_calls.fetch_add(1, Ordering::SeqCst);
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    Json(json!([vps_json()])).into_response()
}

async fn create_vps(State(backend): State<SharedBackend>, headers: HeaderMap) -> Response {
    backend.vps_calls.fetch_add(1, Ordering::SeqCst);
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::FORBIDDEN,
        Json(json!({"error": {"detail": "Quota exceeded"}})),
    )
        .into_response()
}

async fn login(State(backend): State<SharedBackend>, Json(body): Json<Value>) -> Response {
    if body["password"] != "secret" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Incorrect email or password"})),
        )
            .into_response();
    }
    if body["email"] == "2fa@example.com" && body.get("totp_code").is_none() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "2FA code required"})),
        )
            .into_response();
    }

    backend.valid_tokens.lock().unwrap().insert("A1".to_string());
    Json(json!({"access_token": "A1", "refresh_token": "R1", "token_type": "bearer"})).into_response()
}

async fn me(State(backend): State<SharedBackend>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    Json(user_json()).into_response()
}

async fn logout(State(backend): State<SharedBackend>) -> Response {
    backend.logout_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({"message": "Successfully logged out"})).into_response()
}

/// Serve the mock backend on an ephemeral port and return its API root
async fn spawn_backend(backend: SharedBackend) -> String {
    let app = Router::new()
        .route("/api/v1/auth/refresh", post(refresh))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/me", get(me))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/vps", get(list_vps).post(create_vps))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/api/v1", addr)
}

// ==================================================================================================
// Test Helpers
// ==================================================================================================

struct Harness {
    api: PanelApi,
    store: SessionStore,
    expired: Arc<AtomicUsize>,
    surfaced: Arc<Mutex<Vec<String>>>,
}

fn identity() -> User {
    serde_json::from_value(user_json()).unwrap()
}

async fn harness(base: &str, tokens: Option<(&str, &str)>) -> Harness {
    let store = SessionStore::new();
    if let Some((access, refresh)) = tokens {
        store
            .set(access.to_string(), refresh.to_string(), Some(identity()))
            .await;
    }

    let expired = Arc::new(AtomicUsize::new(0));
    let counter = expired.clone();
    let logout = LogoutHandler::new(store.clone(), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let base_url = parse_base_url(base).unwrap();
    let refresher = TokenRefreshClient::new(&base_url, 10).unwrap();
    let auth_manager = Arc::new(AuthManager::new(store.clone(), refresher, logout));

    let surfaced = Arc::new(Mutex::new(Vec::new()));
    let sink = surfaced.clone();
    let http_client = PanelHttpClient::new(auth_manager, &base_url, 10, 5, 10)
        .unwrap()
        .with_error_reporter(move |message| sink.lock().unwrap().push(message.to_string()));

    Harness {
        api: PanelApi::new(Arc::new(http_client)),
        store,
        expired,
        surfaced,
    }
}

// ==================================================================================================
// Refresh And Replay
// ==================================================================================================

#[tokio::test]
async fn test_expired_token_is_refreshed_and_replayed() {
    let backend = Backend::with_valid(&[]);
    let base = spawn_backend(backend.clone()).await;
    let h = harness(&base, Some(("A1", "R1"))).await;

    let vps = assert_ok!(h.api.list_vps(&VpsQuery::default()).await);
    assert_eq!(vps.len(), 1);
    assert_eq!(vps[0].name, "web-1");

    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.vps_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        backend.seen_auth(),
        vec![Some("Bearer A1".to_string()), Some("Bearer A2".to_string())]
    );
    assert_eq!(backend.refresh_bodies.lock().unwrap()[0], json!({"refresh_token": "R1"}));

    // Both attempts carry the same request id
    let ids = backend.seen_request_ids.lock().unwrap().clone();
    assert_eq!(ids.len(), 2);
    assert!(!ids[0].is_empty());
    assert_eq!(ids[0], ids[1]);

    // Tokens rotated, identity kept
    let session = h.store.get().await;
    assert_eq!(session.access_token(), Some("A2"));
    assert_eq!(session.refresh_token(), Some("R2"));
    assert_eq!(session.identity(), Some(&identity()));
    assert_eq!(h.expired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_refresh_logs_out() {
    let backend = Backend::with_valid(&[]);
    backend.refresh_fails.store(true, Ordering::SeqCst);
    let base = spawn_backend(backend.clone()).await;
    let h = harness(&base, Some(("A1", "R1"))).await;

    let error = assert_err!(h.api.list_vps(&VpsQuery::default()).await);
    match error {
        ApiError::RefreshFailed(RefreshError::Rejected { status, ref detail, .. }) => {
            assert_eq!(status, 400);
            assert_eq!(detail.as_deref(), Some("Invalid refresh token"));
        }
        other => panic!("expected refresh failure, got {:?}", other),
    }

    assert!(h.store.get().await.is_empty());
    assert_eq!(h.expired.load(Ordering::SeqCst), 1);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    // Original request is not replayed
    assert_eq!(backend.vps_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_refresh_token_logs_out_without_refresh() {
    let backend = Backend::with_valid(&["A1"]);
    let base = spawn_backend(backend.clone()).await;
    let h = harness(&base, None).await;

    let error = assert_err!(h.api.list_vps(&VpsQuery::default()).await);
    assert!(error.is_unauthorized());

    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
    assert_eq!(backend.vps_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.seen_auth(), vec![None]);
    assert_eq!(h.expired.load(Ordering::SeqCst), 1);
    assert!(h.store.get().await.is_empty());
}

#[tokio::test]
async fn test_replayed_request_is_not_retried_again() {
    let backend = Backend::with_valid(&[]);
    backend.always_unauthorized.store(true, Ordering::SeqCst);
    let base = spawn_backend(backend.clone()).await;
    let h = harness(&base, Some(("A1", "R1"))).await;

    let error = assert_err!(h.api.list_vps(&VpsQuery::default()).await);
    assert!(error.is_unauthorized());

    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.vps_calls.load(Ordering::SeqCst), 2);

    // The refresh itself succeeded, so the session stays
    assert_eq!(h.store.access_token().await.as_deref(), Some("A2"));
    assert_eq!(h.expired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let backend = Backend::with_valid(&[]);
    backend.refresh_delay_ms.store(200, Ordering::SeqCst);
    let base = spawn_backend(backend.clone()).await;
    let h = harness(&base, Some(("A1", "R1"))).await;

    let query = VpsQuery::default();
    let results =
        futures::future::join_all((0..5).map(|_| h.api.list_vps(&query))).await;

    for result in results {
        assert_ok!(result);
    }

    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.vps_calls.load(Ordering::SeqCst), 10);

    let replays = backend
        .seen_auth()
        .into_iter()
        .filter(|auth| auth.as_deref() == Some("Bearer A2"))
        .count();
    assert_eq!(replays, 5);
    assert_eq!(h.store.access_token().await.as_deref(), Some("A2"));
}

#[tokio::test]
async fn test_refresh_completes_after_caller_timeout() {
    let backend = Backend::with_valid(&[]);
    backend.refresh_delay_ms.store(400, Ordering::SeqCst);
    let base = spawn_backend(backend.clone()).await;
    let h = harness(&base, Some(("A1", "R1"))).await;

    // The caller gives up while the refresh is still on the wire
    let timed_out = tokio::time::timeout(
        Duration::from_millis(150),
        h.api.list_vps(&VpsQuery::default()),
    )
    .await;
    assert!(timed_out.is_err());

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);

    // The refresh finished without anyone waiting on it
    let session = h.store.get().await;
    assert_eq!(session.access_token(), Some("A2"));
    assert_eq!(session.refresh_token(), Some("R2"));
    assert_eq!(h.expired.load(Ordering::SeqCst), 0);

    // A late 401 for the old token replays with the rotated one
    let manager = h.api.http().auth_manager().clone();
    assert_eq!(
        manager.renew_session(Some("A1")).await,
        Renewal::Renewed("A2".to_string())
    );

    assert_ok!(h.api.list_vps(&VpsQuery::default()).await);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.expired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrent_failed_refresh_logs_out_once() {
    let backend = Backend::with_valid(&[]);
    backend.refresh_fails.store(true, Ordering::SeqCst);
    backend.refresh_delay_ms.store(200, Ordering::SeqCst);
    let base = spawn_backend(backend.clone()).await;
    let h = harness(&base, Some(("A1", "R1"))).await;

    let query = VpsQuery::default();
    let results =
        futures::future::join_all((0..4).map(|_| h.api.list_vps(&query))).await;

    for result in results {
        assert!(matches!(result, Err(ApiError::RefreshFailed(_))));
    }

    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.expired.load(Ordering::SeqCst), 1);
    assert!(h.store.get().await.is_empty());
}

// ==================================================================================================
// Error Surfacing
// ==================================================================================================

#[tokio::test]
async fn test_non_auth_error_is_surfaced() {
    let backend = Backend::with_valid(&["A1"]);
    let base = spawn_backend(backend.clone()).await;
    let h = harness(&base, Some(("A1", "R1"))).await;

    let request = VpsCreate {
        name: "web-2".to_string(),
        cpu_cores: 1,
        ram_gb: 1.0,
        storage_gb: 20,
        os_image_id: 2,
        network_type: NetworkType::PrivateOnly,
        owner_id: 1,
        start_on_create: None,
        auto_backups: None,
        cloud_init_data: None,
    };

    let error = assert_err!(h.api.create_vps(&request).await);
    assert_eq!(error.status(), Some(403));
    assert_eq!(error.display_message(), "Quota exceeded");

    assert_eq!(*h.surfaced.lock().unwrap(), vec!["Quota exceeded".to_string()]);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.store.access_token().await.as_deref(), Some("A1"));
    assert_eq!(h.expired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_replay_failure_is_surfaced() {
    let backend = Backend::with_valid(&[]);
    let base = spawn_backend(backend.clone()).await;
    let h = harness(&base, Some(("A1", "R1"))).await;

    let request = VpsCreate {
        name: "web-3".to_string(),
        cpu_cores: 2,
        ram_gb: 2.0,
        storage_gb: 40,
        os_image_id: 2,
        network_type: NetworkType::PublicIpv4,
        owner_id: 1,
        start_on_create: Some(true),
        auto_backups: None,
        cloud_init_data: None,
    };

    // 401 with A1, refresh, then the replay with A2 is refused with 403
    let error = assert_err!(h.api.create_vps(&request).await);
    assert_eq!(error.status(), Some(403));
    assert_eq!(error.detail(), Some("Quota exceeded"));

    assert_eq!(*h.surfaced.lock().unwrap(), vec!["Quota exceeded".to_string()]);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.vps_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        backend.seen_auth(),
        vec![Some("Bearer A1".to_string()), Some("Bearer A2".to_string())]
    );
    assert_eq!(h.store.access_token().await.as_deref(), Some("A2"));
    assert_eq!(h.expired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_transport_error_keeps_session() {
    // Bind and drop to get a port with no listener
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let h = harness(&format!("http://127.0.0.1:{}/api/v1", port), Some(("A1", "R1"))).await;

    let error = assert_err!(h.api.list_vps(&VpsQuery::default()).await);
    assert!(matches!(error, ApiError::Transport(_)));

    assert_eq!(h.store.access_token().await.as_deref(), Some("A1"));
    assert_eq!(h.expired.load(Ordering::SeqCst), 0);
    assert!(h.surfaced.lock().unwrap().is_empty());
}

// ==================================================================================================
// Login And Logout
// ==================================================================================================

#[tokio::test]
async fn test_login_stores_session() {
    let backend = Backend::with_valid(&[]);
    let base = spawn_backend(backend.clone()).await;
    let h = harness(&base, None).await;

    let user = assert_ok!(h.api.login("admin@example.com", "secret", None).await);
    assert_eq!(user.username, "admin");
    assert!(user.is_admin());

    let session = h.store.get().await;
    assert_eq!(session.access_token(), Some("A1"));
    assert_eq!(session.refresh_token(), Some("R1"));
    assert_eq!(session.identity().map(|u| u.email.as_str()), Some("admin@example.com"));

    // The new session works for authenticated calls
    assert_ok!(h.api.list_vps(&VpsQuery::default()).await);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_bad_password_does_not_refresh() {
    let backend = Backend::with_valid(&[]);
    let base = spawn_backend(backend.clone()).await;
    let h = harness(&base, Some(("A1", "R1"))).await;

    let error = assert_err!(h.api.login("admin@example.com", "wrong", None).await);
    assert!(error.is_unauthorized());
    assert_eq!(error.display_message(), "Incorrect email or password");

    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.expired.load(Ordering::SeqCst), 0);
    // The previous session is left alone
    assert_eq!(h.store.access_token().await.as_deref(), Some("A1"));
}

#[tokio::test]
async fn test_login_reports_missing_totp() {
    let backend = Backend::with_valid(&[]);
    let base = spawn_backend(backend.clone()).await;
    let h = harness(&base, None).await;

    let error = assert_err!(h.api.login("2fa@example.com", "secret", None).await);
    assert!(is_totp_required(&error));
    assert!(h.store.get().await.is_empty());

    assert_ok!(h.api.login("2fa@example.com", "secret", Some("123456")).await);
    assert!(h.store.get().await.is_authenticated());
}

#[tokio::test]
async fn test_logout_clears_without_expiry_notice() {
    let backend = Backend::with_valid(&["A1"]);
    let base = spawn_backend(backend.clone()).await;
    let h = harness(&base, Some(("A1", "R1"))).await;

    h.api.logout().await;

    assert_eq!(backend.logout_calls.load(Ordering::SeqCst), 1);
    assert!(h.store.get().await.is_empty());
    assert_eq!(h.expired.load(Ordering::SeqCst), 0);
}
