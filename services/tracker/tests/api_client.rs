//! Exercises the remote API client against a local axum server.

use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use reqwest::header::HeaderValue;
use scrap_tracker_core::domain::{Role, Session, SessionUser};
use scrap_tracker_core::ports::{Navigator, TokenStore};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracker_lib::adapters::{ApiClient, ClientError, MemoryStorage, RequestOptions};
use tracker_lib::services::IdentityService;
use tracker_lib::web::state::TOKEN_KEY;
use tracker_lib::web::SessionContext;

/// Records each navigation together with whether a token was still stored at that moment.
struct RecordingNavigator {
    storage: Arc<MemoryStorage>,
    visits: Mutex<Vec<(String, bool)>>,
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        let token_present = self.storage.peek(TOKEN_KEY).is_some();
        self.visits
            .lock()
            .unwrap()
            .push((path.to_string(), token_present));
    }
}

struct Harness {
    storage: Arc<MemoryStorage>,
    session: Arc<SessionContext>,
    navigator: Arc<RecordingNavigator>,
    client: ApiClient,
}

async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api", addr)
}

/// A peer that answers 401 announcing a longer body than it sends, then hangs up.
async fn spawn_truncated_unauthorized() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        let _ = socket
            .write_all(
                b"HTTP/1.1 401 Unauthorized\r\n\
                  Content-Type: application/json\r\n\
                  Content-Length: 100\r\n\r\n\
                  {\"message\":",
            )
            .await;
        let _ = socket.shutdown().await;
    });
    format!("http://{}/api", addr)
}

async fn harness(app: Router, logged_in: bool) -> Harness {
    harness_at(spawn(app).await, logged_in).await
}

async fn harness_at(base_url: String, logged_in: bool) -> Harness {
    let storage = Arc::new(MemoryStorage::new());
    let identity = Arc::new(IdentityService::new(storage.clone(), Duration::ZERO));
    let session = Arc::new(SessionContext::new(storage.clone(), identity));
    session.init().await.unwrap();
    if logged_in {
        session
            .login(Session {
                user: SessionUser {
                    username: "foreman".to_string(),
                    role: Role::Admin,
                },
                token: "auth_token_1_abc".to_string(),
            })
            .await
            .unwrap();
    }
    let navigator = Arc::new(RecordingNavigator {
        storage: storage.clone(),
        visits: Mutex::new(Vec::new()),
    });
    let client = ApiClient::new(base_url, session.clone(), navigator.clone());
    Harness {
        storage,
        session,
        navigator,
        client,
    }
}

async fn echo(
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> Json<Value> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "authorization": header("authorization"),
        "contentType": header("content-type"),
        "custom": header("x-custom"),
        "query": query,
        "body": if body.is_empty() { Value::Null } else { serde_json::from_str::<Value>(&body).unwrap() },
    }))
}

#[tokio::test]
async fn unauthorized_clears_the_token_before_redirecting() {
    let app = Router::new().route(
        "/api/records",
        get(|| async { (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Token expired" }))) }),
    );
    let h = harness(app, true).await;

    let err = h.client.get_records::<Value>(&[]).await.unwrap_err();
    assert!(matches!(&err, ClientError::Unauthorized { message } if message == "Token expired"));

    let visits = h.navigator.visits.lock().unwrap().clone();
    assert_eq!(visits, vec![("/login".to_string(), false)]);
    assert_eq!(h.storage.peek(TOKEN_KEY), None);
    assert_eq!(h.session.current_user(), None);
    assert_eq!(h.session.token().await.unwrap(), None);
}

#[tokio::test]
async fn unauthorized_without_a_json_body_still_logs_out() {
    let app = Router::new().route(
        "/api/auth/me",
        get(|| async { (StatusCode::UNAUTHORIZED, "<html>nope</html>") }),
    );
    let h = harness(app, true).await;

    let err = h.client.me::<Value>().await.unwrap_err();
    assert!(matches!(&err, ClientError::Unauthorized { message } if message == "API request failed"));
    assert_eq!(h.storage.peek(TOKEN_KEY), None);
    assert_eq!(h.navigator.visits.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn unauthorized_with_a_truncated_body_still_logs_out() {
    let h = harness_at(spawn_truncated_unauthorized().await, true).await;

    let err = h.client.get_records::<Value>(&[]).await.unwrap_err();
    assert!(matches!(&err, ClientError::Unauthorized { message } if message == "API request failed"));

    let visits = h.navigator.visits.lock().unwrap().clone();
    assert_eq!(visits, vec![("/login".to_string(), false)]);
    assert_eq!(h.storage.peek(TOKEN_KEY), None);
    assert_eq!(h.session.current_user(), None);
}

#[tokio::test]
async fn bearer_token_and_json_body_are_sent() {
    let app = Router::new().route("/api/records", post(echo));
    let h = harness(app, true).await;

    let sent = json!({ "material": "copper", "weight": 12 });
    let echoed: Value = h.client.create_record(&sent).await.unwrap();
    assert_eq!(echoed["authorization"], "Bearer auth_token_1_abc");
    assert_eq!(echoed["contentType"], "application/json");
    assert_eq!(echoed["body"], sent);
}

#[tokio::test]
async fn anonymous_requests_carry_no_authorization() {
    let app = Router::new().route("/api/records/recent", get(echo));
    let h = harness(app, false).await;

    let echoed: Value = h.client.recent(5).await.unwrap();
    assert_eq!(echoed["authorization"], Value::Null);
    assert_eq!(echoed["query"]["limit"], "5");
    assert!(h.navigator.visits.lock().unwrap().is_empty());
}

#[tokio::test]
async fn caller_headers_override_defaults_and_filters_become_the_query() {
    let app = Router::new().route("/api/records/dashboard/stats", get(echo));
    let h = harness(app, false).await;

    let mut options = RequestOptions::default().with_query(&[
        ("from".to_string(), "2024-01-01".to_string()),
        ("material".to_string(), "scrap metal".to_string()),
    ]);
    options
        .headers
        .insert("content-type", HeaderValue::from_static("text/plain"));
    options
        .headers
        .insert("x-custom", HeaderValue::from_static("yes"));

    let echoed: Value = h
        .client
        .request("/records/dashboard/stats", options)
        .await
        .unwrap();
    assert_eq!(echoed["contentType"], "text/plain");
    assert_eq!(echoed["custom"], "yes");
    assert_eq!(echoed["query"]["material"], "scrap metal");
}

#[tokio::test]
async fn server_errors_surface_their_message() {
    let app = Router::new()
        .route(
            "/api/records/date/{date}",
            get(|Path(date): Path<String>| async move {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "message": format!("No records for {}", date) })),
                )
            }),
        )
        .route(
            "/api/records/{id}",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR.into_response() }),
        );
    let h = harness(app, true).await;

    let date = chrono::NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    let err = h.client.records_by_date::<Value>(date).await.unwrap_err();
    assert!(matches!(
        &err,
        ClientError::Api { status, message }
            if *status == reqwest::StatusCode::BAD_REQUEST && message == "No records for 2024-02-29"
    ));

    let err = h.client.get_record::<Value>("42").await.unwrap_err();
    assert!(matches!(&err, ClientError::Api { message, .. } if message == "API request failed"));

    // Non-401 failures leave the session alone.
    assert!(h.storage.peek(TOKEN_KEY).is_some());
    assert!(h.navigator.visits.lock().unwrap().is_empty());
}

#[tokio::test]
async fn login_response_becomes_a_session() {
    let app = Router::new().route(
        "/api/auth/login",
        post(|Json(body): Json<Value>| async move {
            Json(json!({
                "user": { "username": body["username"], "role": "admin" },
                "token": "server-issued"
            }))
        }),
    );
    let h = harness(app, false).await;

    let response = h.client.login("foreman", "secret1").await.unwrap();
    h.session.login(response.into_session().unwrap()).await.unwrap();
    assert_eq!(h.session.current_user().unwrap().username, "foreman");
    assert_eq!(h.storage.peek(TOKEN_KEY).as_deref(), Some("server-issued"));
}
