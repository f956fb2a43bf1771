//! services/tracker/src/web/state.rs
//!
//! Defines the application's shared state: the session context handed to every page.

use crate::services::auth::IdentityService;
use async_trait::async_trait;
use scrap_tracker_core::domain::{Role, Session, SessionUser};
use scrap_tracker_core::ports::{KeyValueStore, PortError, PortResult, TokenStore};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

pub const TOKEN_KEY: &str = "authToken";
pub const USER_KEY: &str = "authUser";

#[derive(Serialize, Deserialize)]
struct StoredUser {
    username: String,
    role: String,
}

impl StoredUser {
    fn into_user(self) -> Option<SessionUser> {
        match self.role.parse::<Role>() {
            Ok(role) => Some(SessionUser {
                username: self.username,
                role,
            }),
            Err(e) => {
                warn!("Ignoring stored user '{}': {}", self.username, e);
                None
            }
        }
    }
}

/// Where the user stands with respect to authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    UnauthenticatedNoAdmin,
    UnauthenticatedAdminExists,
    Authenticated,
}

#[derive(Debug, Clone, Default)]
struct SessionSnapshot {
    user: Option<SessionUser>,
    token: Option<String>,
    loading: bool,
}

//=========================================================================================
// SessionContext (Shared Across All Pages)
//=========================================================================================

/// In-memory holder of the current user, backed by the persisted token.
///
/// Starts in the loading state; `init` restores the session from storage.
pub struct SessionContext {
    storage: Arc<dyn KeyValueStore>,
    identity: Arc<IdentityService>,
    inner: RwLock<SessionSnapshot>,
}

impl SessionContext {
    pub fn new(storage: Arc<dyn KeyValueStore>, identity: Arc<IdentityService>) -> Self {
        Self {
            storage,
            identity,
            inner: RwLock::new(SessionSnapshot {
                loading: true,
                ..SessionSnapshot::default()
            }),
        }
    }

    /// Restores the session from the persisted token.
    ///
    /// The user comes from the stored session, or, for a locally issued token,
    /// from the admin account. A token with neither is removed. Loading ends even when storage fails.
    pub async fn init(&self) -> PortResult<()> {
        let restored = self.restore().await;
        let mut inner = self.write();
        inner.loading = false;
        match restored {
            Ok(Some((user, token))) => {
                debug!("Restored session for {}", user.username);
                inner.user = Some(user);
                inner.token = Some(token);
                Ok(())
            }
            Ok(None) => {
                inner.user = None;
                inner.token = None;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn restore(&self) -> PortResult<Option<(SessionUser, String)>> {
        let Some(token) = self.storage.get_item(TOKEN_KEY).await? else {
            return Ok(None);
        };

        // A session written by `login` carries its own user, whatever issued the token.
        let stored_user = match self.storage.get_item(USER_KEY).await? {
            Some(raw) => serde_json::from_str::<StoredUser>(&raw)
                .ok()
                .and_then(StoredUser::into_user),
            None => None,
        };
        let user = match stored_user {
            Some(user) => Some(user),
            None if IdentityService::validate_token(&token) => {
                self.identity.admin_info().await?.map(|admin| SessionUser {
                    username: admin.username,
                    role: Role::Admin,
                })
            }
            None => None,
        };

        match user {
            Some(user) => Ok(Some((user, token))),
            None => {
                warn!("Discarding persisted token: no user to restore");
                self.discard().await?;
                Ok(None)
            }
        }
    }

    async fn discard(&self) -> PortResult<()> {
        self.storage.remove_item(TOKEN_KEY).await?;
        self.storage.remove_item(USER_KEY).await
    }

    /// Persists the token of a freshly issued session and makes it current.
    pub async fn login(&self, session: Session) -> PortResult<()> {
        let user = serde_json::to_string(&StoredUser {
            username: session.user.username.clone(),
            role: session.user.role.as_str().to_string(),
        })
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.storage.set_item(TOKEN_KEY, &session.token).await?;
        self.storage.set_item(USER_KEY, &user).await?;
        info!("Logged in as {}", session.user.username);
        let mut inner = self.write();
        inner.user = Some(session.user);
        inner.token = Some(session.token);
        inner.loading = false;
        Ok(())
    }

    pub async fn logout(&self) -> PortResult<()> {
        self.discard().await?;
        let mut inner = self.write();
        if let Some(user) = inner.user.take() {
            info!("Logged out {}", user.username);
        }
        inner.token = None;
        Ok(())
    }

    pub fn current_user(&self) -> Option<SessionUser> {
        self.read().user.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.read().loading
    }

    pub async fn auth_state(&self) -> PortResult<AuthState> {
        if self.current_user().is_some() {
            return Ok(AuthState::Authenticated);
        }
        Ok(if self.identity.has_admin_user().await? {
            AuthState::UnauthenticatedAdminExists
        } else {
            AuthState::UnauthenticatedNoAdmin
        })
    }

    pub fn identity(&self) -> &IdentityService {
        &self.identity
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionSnapshot> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionSnapshot> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TokenStore for SessionContext {
    async fn token(&self) -> PortResult<Option<String>> {
        let cached = self.read().token.clone();
        match cached {
            Some(token) => Ok(Some(token)),
            None => self.storage.get_item(TOKEN_KEY).await,
        }
    }

    async fn clear(&self) -> PortResult<()> {
        self.logout().await
    }
}
