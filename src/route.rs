//! Route Gate: navigation policy over a session snapshot.
//!
//! DESIGN
//! ======
//! Pure functions of `(route, &Session)`. The routing layer calls
//! [`can_enter`] on every navigation and again on every session transition
//! it observes through [`SessionController::subscribe`], so a logout while
//! an admin view is open revokes access immediately.
//!
//! [`SessionController::subscribe`]: crate::session::SessionController::subscribe

#[cfg(test)]
#[path = "route_test.rs"]
mod tests;

use crate::session::Session;
use crate::types::Role;

pub const HOME_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Signup,
    Profile,
    Admin,
}

/// Who may enter a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    /// Only signed-out visitors; signed-in users are sent home.
    GuestOnly,
    /// Any signed-in identity.
    Authenticated,
    /// Signed-in identities with the given role.
    Role(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Allow,
    RedirectTo(&'static str),
}

impl Route {
    pub const ALL: [Route; 5] = [Route::Home, Route::Login, Route::Signup, Route::Profile, Route::Admin];

    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Home => HOME_PATH,
            Self::Login => LOGIN_PATH,
            Self::Signup => "/signup",
            Self::Profile => "/profile",
            Self::Admin => "/admin",
        }
    }

    /// Match a path, ignoring a trailing slash.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let trimmed = path.trim_end_matches('/');
        let normalized = if trimmed.is_empty() { HOME_PATH } else { trimmed };
        Self::ALL.into_iter().find(|route| route.path() == normalized)
    }

    #[must_use]
    pub fn access(self) -> RouteAccess {
        match self {
            Self::Login | Self::Signup => RouteAccess::GuestOnly,
            Self::Home | Self::Profile => RouteAccess::Authenticated,
            Self::Admin => RouteAccess::Role(Role::Admin),
        }
    }
}

/// Decide whether `session` may enter `route`.
#[must_use]
pub fn can_enter(route: Route, session: &Session) -> Gate {
    let identity = session.identity().filter(|_| session.is_authenticated());
    match (route.access(), identity) {
        (RouteAccess::GuestOnly, None) => Gate::Allow,
        (RouteAccess::GuestOnly, Some(_)) => Gate::RedirectTo(HOME_PATH),
        (RouteAccess::Authenticated | RouteAccess::Role(_), None) => Gate::RedirectTo(LOGIN_PATH),
        (RouteAccess::Authenticated, Some(_)) => Gate::Allow,
        (RouteAccess::Role(role), Some(identity)) if identity.role == role => Gate::Allow,
        (RouteAccess::Role(_), Some(_)) => Gate::RedirectTo(HOME_PATH),
    }
}

/// [`can_enter`] for a raw path. Unknown paths are not gated.
#[must_use]
pub fn can_enter_path(path: &str, session: &Session) -> Gate {
    Route::from_path(path).map_or(Gate::Allow, |route| can_enter(route, session))
}

// =============================================================================
// NAVIGATION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavLink {
    Route(Route),
    Logout,
}

impl NavLink {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Route(Route::Home) => "Home",
            Self::Route(Route::Login) => "Login",
            Self::Route(Route::Signup) => "Signup",
            Self::Route(Route::Profile) => "Profile",
            Self::Route(Route::Admin) => "Admin",
            Self::Logout => "Logout",
        }
    }
}

/// Links the navigation bar shows for this session.
#[must_use]
pub fn nav_links(session: &Session) -> Vec<NavLink> {
    if !session.is_authenticated() {
        return vec![NavLink::Route(Route::Login), NavLink::Route(Route::Signup)];
    }
    let mut links = vec![NavLink::Route(Route::Home), NavLink::Route(Route::Profile)];
    if session.is_admin() {
        links.push(NavLink::Route(Route::Admin));
    }
    links.push(NavLink::Logout);
    links
}
