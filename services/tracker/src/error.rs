//! services/tracker/src/error.rs
//!
//! Defines the primary error type for the entire tracker service.

use crate::adapters::http::ClientError;
use crate::config::ConfigError;
use crate::services::auth::AuthError;
use scrap_tracker_core::ports::PortError;

const TRY_AGAIN: &str = "Something went wrong. Please try again.";

/// The primary error type for the `tracker` service.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Registration and login failures.
    #[error("Authentication Error: {0}")]
    Auth(#[from] AuthError),

    /// Failures talking to the remote records API.
    #[error("API Error: {0}")]
    Client(#[from] ClientError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Input rejected by the front end before any service was called.
    #[error("{0}")]
    Validation(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl AppError {
    /// The inline message shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(message) => message.clone(),
            AppError::Config(e) => e.to_string(),
            AppError::Auth(
                e @ (AuthError::Validation(_)
                | AuthError::AlreadyExists(_)
                | AuthError::NotFound
                | AuthError::InvalidCredentials),
            ) => e.to_string(),
            AppError::Client(ClientError::Unauthorized { message })
            | AppError::Client(ClientError::Api { message, .. }) => message.clone(),
            AppError::Client(e @ ClientError::Role(_)) => e.to_string(),
            AppError::Client(ClientError::Transport(_)) => {
                "Unable to reach the server. Please try again.".to_string()
            }
            _ => TRY_AGAIN.to_string(),
        }
    }
}
