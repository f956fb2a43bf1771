//! services/tracker/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged with the remote records API.

use scrap_tracker_core::domain::{Role, Session, SessionUser, UnknownRole};
use serde::{Deserialize, Serialize};

//=========================================================================================
// Payloads Sent TO the Server
//=========================================================================================

#[derive(Serialize, Debug)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

//=========================================================================================
// Payloads Received FROM the Server
//=========================================================================================

/// Returned by `/auth/login` and `/auth/register`.
#[derive(Deserialize, Debug, Clone)]
pub struct AuthResponse {
    pub user: RemoteUser,
    pub token: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RemoteUser {
    pub username: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    Role::Admin.as_str().to_string()
}

impl AuthResponse {
    /// Fails for a role this application does not know.
    pub fn into_session(self) -> Result<Session, UnknownRole> {
        Ok(Session {
            user: SessionUser {
                username: self.user.username,
                role: self.user.role.parse()?,
            },
            token: self.token,
        })
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub struct CheckAdminResponse {
    #[serde(alias = "exists", alias = "adminExists")]
    pub has_admin: bool,
}

/// Failure bodies carry a human-readable `message`.
#[derive(Deserialize, Debug, Default)]
pub struct ErrorBody {
    pub message: Option<String>,
}
