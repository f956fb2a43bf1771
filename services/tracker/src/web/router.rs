//! services/tracker/src/web/router.rs
//!
//! Maps locations to pages, gated on the session. Redirects replace the current
//! location, so following them never grows the history.

use crate::web::state::{AuthState, SessionContext};
use scrap_tracker_core::ports::{Navigator, PortError, PortResult};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const HOME_PATH: &str = "/";
pub const HISTORY_PATH: &str = "/history";
pub const DASHBOARD_PATH: &str = "/dashboard";

const MAX_REDIRECTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    DailyRecord,
    History,
    Dashboard,
    Unknown,
}

impl Route {
    /// Ignores query string, fragment and a trailing slash.
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = match path.trim_end_matches('/') {
            "" => HOME_PATH,
            trimmed => trimmed,
        };
        match path {
            LOGIN_PATH => Route::Login,
            REGISTER_PATH => Route::Register,
            HOME_PATH => Route::DailyRecord,
            HISTORY_PATH => Route::History,
            DASHBOARD_PATH => Route::Dashboard,
            _ => Route::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Loading,
    Login,
    Register,
    DailyRecord,
    History,
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Render(Page),
    Redirect(&'static str),
}

/// The routing table.
pub fn resolve(route: Route, loading: bool, state: AuthState) -> Resolution {
    use Resolution::{Redirect, Render};

    if loading {
        return Render(Page::Loading);
    }
    let authenticated = state == AuthState::Authenticated;
    let protected = |page| if authenticated { Render(page) } else { Redirect(LOGIN_PATH) };

    match route {
        Route::Login => match state {
            AuthState::Authenticated => Redirect(HOME_PATH),
            AuthState::UnauthenticatedNoAdmin => Redirect(REGISTER_PATH),
            AuthState::UnauthenticatedAdminExists => Render(Page::Login),
        },
        Route::Register => match state {
            AuthState::Authenticated => Redirect(HOME_PATH),
            AuthState::UnauthenticatedNoAdmin => Render(Page::Register),
            AuthState::UnauthenticatedAdminExists => Redirect(LOGIN_PATH),
        },
        Route::DailyRecord => protected(Page::DailyRecord),
        Route::History => protected(Page::History),
        Route::Dashboard => protected(Page::Dashboard),
        Route::Unknown => Redirect(if authenticated { HOME_PATH } else { LOGIN_PATH }),
    }
}

//=========================================================================================
// Location History
//=========================================================================================

/// The current location of the front end.
#[derive(Debug)]
pub struct History {
    location: Mutex<String>,
}

impl History {
    pub fn new(initial: &str) -> Self {
        Self {
            location: Mutex::new(initial.to_string()),
        }
    }

    pub fn location(&self) -> String {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, String> {
        self.location.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(HOME_PATH)
    }
}

impl Navigator for History {
    fn navigate(&self, path: &str) {
        debug!("Navigating to {}", path);
        *self.lock() = path.to_string();
    }
}

//=========================================================================================
// ViewRouter
//=========================================================================================

pub struct ViewRouter {
    session: Arc<SessionContext>,
    history: Arc<History>,
}

impl ViewRouter {
    pub fn new(session: Arc<SessionContext>, history: Arc<History>) -> Self {
        Self { session, history }
    }

    /// Resolves the current location, following redirects.
    pub async fn render(&self) -> PortResult<Page> {
        for _ in 0..=MAX_REDIRECTS {
            let location = self.history.location();
            let state = self.session.auth_state().await?;
            match resolve(Route::parse(&location), self.session.is_loading(), state) {
                Resolution::Render(page) => return Ok(page),
                Resolution::Redirect(to) => {
                    debug!("Redirecting {} -> {}", location, to);
                    self.history.navigate(to);
                }
            }
        }
        Err(PortError::Unexpected(format!(
            "Too many redirects ending at {}",
            self.history.location()
        )))
    }

    /// Navigates to `path` and renders whatever it resolves to.
    pub async fn open(&self, path: &str) -> PortResult<Page> {
        self.history.navigate(path);
        self.render().await
    }

    pub fn location(&self) -> String {
        self.history.location()
    }
}
