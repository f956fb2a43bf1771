//! services/tracker/src/services/auth.rs
//!
//! Session/identity service: owns the single admin account, checks credentials
//! against it and issues session tokens.
//!
//! Session tokens are opaque random strings, not signed credentials. Token
//! validation only looks at the prefix, so a token proves nothing on its own;
//! it marks "someone logged in on this device" for the front end.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use scrap_tracker_core::domain::{AdminProfile, AdminUser, Role, Session, SessionUser};
use scrap_tracker_core::ports::{KeyValueStore, PortError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub const ADMIN_KEY: &str = "adminUser";
pub const TOKEN_PREFIX: &str = "auth_token_";

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 6;
const TOKEN_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("Admin user '{0}' already exists. Please login instead.")]
    AlreadyExists(String),
    #[error("No admin account found. Please create one first.")]
    NotFound,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Password hashing failed: {0}")]
    Hash(String),
    #[error("Storage error: {0}")]
    Port(#[from] PortError),
}

//=========================================================================================
// Stored Representation
//=========================================================================================

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredAdmin {
    username: String,
    /// Argon2 PHC string.
    password: String,
    created_at: String,
}

impl StoredAdmin {
    fn from_domain(admin: &AdminUser) -> Self {
        Self {
            username: admin.username.clone(),
            password: admin.password_hash.clone(),
            created_at: admin.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    fn to_domain(self) -> Result<AdminUser, PortError> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| PortError::Unexpected(format!("Invalid admin createdAt: {}", e)))?
            .with_timezone(&Utc);
        Ok(AdminUser {
            username: self.username,
            password_hash: self.password,
            created_at,
        })
    }
}

//=========================================================================================
// The Service
//=========================================================================================

pub struct IdentityService {
    storage: Arc<dyn KeyValueStore>,
    delay: Duration,
}

impl IdentityService {
    /// `delay` is slept before every login and registration attempt.
    pub fn new(storage: Arc<dyn KeyValueStore>, delay: Duration) -> Self {
        Self { storage, delay }
    }

    /// Creates the admin account and logs it in.
    pub async fn register(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        self.simulate_latency().await;

        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Username and password are required".to_string(),
            ));
        }
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(AuthError::Validation(format!(
                "Username must be at least {} characters long",
                MIN_USERNAME_LEN
            )));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LEN
            )));
        }

        if let Some(existing) = self.load_admin().await? {
            warn!("Refusing to register '{}': admin '{}' exists", username, existing.username);
            return Err(AuthError::AlreadyExists(existing.username));
        }

        let admin = AdminUser {
            username: username.to_string(),
            password_hash: hash_password(password)?,
            created_at: Utc::now(),
        };
        let stored = serde_json::to_string(&StoredAdmin::from_domain(&admin))
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.storage.set_item(ADMIN_KEY, &stored).await?;

        info!("Admin account created successfully: {}", admin.username);
        Ok(issue_session(admin.username))
    }

    /// Checks the credentials against the stored admin.
    ///
    /// A wrong username and a wrong password produce the same error.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        self.simulate_latency().await;

        if username.trim().is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Please enter both username and password".to_string(),
            ));
        }

        let admin = self.load_admin().await?.ok_or(AuthError::NotFound)?;

        // Both checks always run.
        let password_ok = verify_password(password, &admin.password_hash);
        if username.trim() != admin.username || !password_ok {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(issue_session(admin.username))
    }

    pub async fn has_admin_user(&self) -> Result<bool, PortError> {
        Ok(self.storage.get_item(ADMIN_KEY).await?.is_some())
    }

    /// The admin account without its password hash.
    pub async fn admin_info(&self) -> Result<Option<AdminProfile>, PortError> {
        Ok(self.load_admin().await?.map(AdminProfile::from))
    }

    /// `auth_token_<epoch millis>_<9 base36 chars>`. Not cryptographic.
    pub fn generate_token() -> String {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..TOKEN_SUFFIX_LEN)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect();
        format!("{}{}_{}", TOKEN_PREFIX, Utc::now().timestamp_millis(), suffix)
    }

    /// Prefix check only.
    pub fn validate_token(token: &str) -> bool {
        token.starts_with(TOKEN_PREFIX)
    }

    async fn load_admin(&self) -> Result<Option<AdminUser>, PortError> {
        let Some(raw) = self.storage.get_item(ADMIN_KEY).await? else {
            return Ok(None);
        };
        let stored: StoredAdmin = serde_json::from_str(&raw).map_err(|e| {
            error!("Stored admin user is unreadable: {:?}", e);
            PortError::Unexpected(format!("Stored admin user is unreadable: {}", e))
        })?;
        stored.to_domain().map(Some)
    }

    async fn simulate_latency(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

fn issue_session(username: String) -> Session {
    Session {
        user: SessionUser {
            username,
            role: Role::Admin,
        },
        token: IdentityService::generate_token(),
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            AuthError::Hash(e.to_string())
        })
}

/// A stored hash that is not a PHC string (e.g. the old demo encoding) never matches.
fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(password_hash) {
        Ok(hash) => hash,
        Err(e) => {
            warn!("Stored password hash is not usable: {:?}", e);
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}
