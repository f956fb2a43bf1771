//! crates/scrap_tracker_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any storage or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// The user-supplied part of a record, as entered on the daily record form.
/// Values are kept as given, so numbers and nulls survive a save.
pub type RecordFields = BTreeMap<String, Value>;

/// A single tracked scrap entry.
///
/// Records are immutable once created; the only mutation is removal from
/// the collection that owns them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub fields: RecordFields,
}

/// The single administrative identity. Contains sensitive data and never
/// leaves the identity service.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

// Admin info without the password hash - safe to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminProfile {
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<AdminUser> for AdminProfile {
    fn from(admin: AdminUser) -> Self {
        Self {
            username: admin.username,
            created_at: admin.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Who is currently using the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub username: String,
    pub role: Role,
}

/// Issued on successful login or registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: SessionUser,
    pub token: String,
}

/// Summary figures shown on the dashboard page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_records: usize,
    pub records_today: usize,
    pub records_per_day: BTreeMap<NaiveDate, usize>,
    pub latest: Option<Record>,
}
