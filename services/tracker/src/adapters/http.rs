//! services/tracker/src/adapters/http.rs
//!
//! The remote API client: a thin JSON wrapper over `reqwest` that attaches the
//! session token and handles expired sessions. No retries, no timeouts.

use crate::web::protocol::{AuthResponse, CheckAdminResponse, Credentials, ErrorBody};
use crate::web::router::LOGIN_PATH;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use scrap_tracker_core::domain::UnknownRole;
use scrap_tracker_core::ports::{Navigator, PortError, TokenStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub const DEFAULT_RECENT_LIMIT: usize = 10;
const FALLBACK_MESSAGE: &str = "API request failed";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server rejected the session. The token has been cleared.
    #[error("{message}")]
    Unauthorized { message: String },
    #[error("{message}")]
    Api { status: StatusCode, message: String },
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
    #[error("Session storage error: {0}")]
    Port(#[from] PortError),
    /// The server vouched for a user with a role this application does not know.
    #[error("{0}")]
    Role(#[from] UnknownRole),
}

/// Per-request settings. Headers given here override the defaults.
#[derive(Debug, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn with_body<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn with_query(mut self, query: &[(String, String)]) -> Self {
        self.query.extend_from_slice(query);
        self
    }
}

/// The `message` field of a failure body, if there is one.
fn error_message(body: Option<&[u8]>) -> String {
    body.and_then(|bytes| serde_json::from_slice::<ErrorBody>(bytes).ok())
        .and_then(|b| b.message)
        .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
}

//=========================================================================================
// The Client
//=========================================================================================

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<dyn TokenStore>,
    navigator: Arc<dyn Navigator>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        session: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
            navigator,
        }
    }

    /// Sends a JSON request to `endpoint` (relative to the base URL).
    ///
    /// The status is checked before the body is read, so an unauthorized
    /// response clears the session even when its body is unreadable.
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.extend(options.headers);
        if let Some(token) = self.session.token().await? {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
        }

        debug!(method = %options.method, %url, "API request");
        let mut builder = self.http.request(options.method, &url).headers(headers);
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(body) = &options.body {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        let response = builder.send().await.map_err(|e| {
            error!("API request error: {:?}", e);
            ClientError::Transport(e)
        })?;
        let status = response.status();
        debug!(%status, %url, "API response");

        // Log out before reading the body.
        if status == StatusCode::UNAUTHORIZED {
            warn!("API rejected the session; logging out");
            if let Err(e) = self.session.clear().await {
                error!("Failed to clear session token: {:?}", e);
            }
            self.navigator.navigate(LOGIN_PATH);
            let message = error_message(response.bytes().await.ok().as_deref());
            return Err(ClientError::Unauthorized { message });
        }

        if !status.is_success() {
            let message = error_message(response.bytes().await.ok().as_deref());
            error!(%status, "API request failed: {}", message);
            return Err(ClientError::Api { status, message });
        }

        let bytes = response.bytes().await?;
        let data = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok(serde_json::from_value(data)?)
    }

    // --- Auth ---

    pub async fn register(&self, username: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let body = Credentials { username, password };
        self.request("/auth/register", RequestOptions::new(Method::POST).with_body(&body)?)
            .await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let body = Credentials { username, password };
        self.request("/auth/login", RequestOptions::new(Method::POST).with_body(&body)?)
            .await
    }

    pub async fn me<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        self.request("/auth/me", RequestOptions::default()).await
    }

    pub async fn check_admin(&self) -> Result<CheckAdminResponse, ClientError> {
        self.request("/auth/check-admin", RequestOptions::default()).await
    }

    // --- Records ---

    pub async fn get_records<T: DeserializeOwned>(
        &self,
        filters: &[(String, String)],
    ) -> Result<T, ClientError> {
        self.request("/records", RequestOptions::default().with_query(filters))
            .await
    }

    pub async fn create_record<T, B>(&self, record: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request("/records", RequestOptions::new(Method::POST).with_body(record)?)
            .await
    }

    pub async fn get_record<T: DeserializeOwned>(&self, id: &str) -> Result<T, ClientError> {
        self.request(&format!("/records/{}", id), RequestOptions::default())
            .await
    }

    pub async fn update_record<T, B>(&self, id: &str, record: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(
            &format!("/records/{}", id),
            RequestOptions::new(Method::PUT).with_body(record)?,
        )
        .await
    }

    pub async fn delete_record<T: DeserializeOwned>(&self, id: &str) -> Result<T, ClientError> {
        self.request(&format!("/records/{}", id), RequestOptions::new(Method::DELETE))
            .await
    }

    pub async fn dashboard_stats<T: DeserializeOwned>(
        &self,
        filters: &[(String, String)],
    ) -> Result<T, ClientError> {
        self.request(
            "/records/dashboard/stats",
            RequestOptions::default().with_query(filters),
        )
        .await
    }

    pub async fn recent<T: DeserializeOwned>(&self, limit: usize) -> Result<T, ClientError> {
        let query = [("limit".to_string(), limit.to_string())];
        self.request("/records/recent", RequestOptions::default().with_query(&query))
            .await
    }

    pub async fn records_by_date<T: DeserializeOwned>(
        &self,
        date: NaiveDate,
    ) -> Result<T, ClientError> {
        self.request(
            &format!("/records/date/{}", date.format("%Y-%m-%d")),
            RequestOptions::default(),
        )
        .await
    }
}
