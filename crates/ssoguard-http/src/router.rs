//! Route resolution.
//!
//! Paths are matched exactly, trailing slash included.

use std::fmt;

/// Health-check path, served before any authentication.
pub const HEALTH_CHECK_PATH: &str = "/healthcheck/";
/// Session-authenticated user endpoint.
pub const SESSION_USER_PATH: &str = "/api/v1/session-user/";
/// Redirect target check.
pub const VALIDATE_REDIRECT_PATH: &str = "/api/v1/validate-redirect/";
/// Hawk-authenticated activity stream.
pub const ACTIVITY_STREAM_PATH: &str = "/activity-stream/";
/// Hawk-authenticated activity stream of users.
pub const ACTIVITY_STREAM_USERS_PATH: &str = "/activity-stream/users/";

/// An endpoint served by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `GET /healthcheck/`
    HealthCheck,
    /// `GET /api/v1/session-user/`
    SessionUser,
    /// `GET /api/v1/validate-redirect/`
    ValidateRedirect,
    /// `GET /activity-stream/`
    ActivityStream,
    /// `GET /activity-stream/users/`
    ActivityStreamUsers,
}

impl Route {
    /// The route's path.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::HealthCheck => HEALTH_CHECK_PATH,
            Self::SessionUser => SESSION_USER_PATH,
            Self::ValidateRedirect => VALIDATE_REDIRECT_PATH,
            Self::ActivityStream => ACTIVITY_STREAM_PATH,
            Self::ActivityStreamUsers => ACTIVITY_STREAM_USERS_PATH,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Outcome of routing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A known route with an allowed method.
    Found(Route),
    /// A known path with a method it does not serve.
    MethodNotAllowed(Route),
    /// No route.
    NotFound,
}

/// Resolve a method and path to a route.
#[must_use]
pub fn resolve(method: &http::Method, path: &str) -> Resolution {
    let route = match path {
        HEALTH_CHECK_PATH => Route::HealthCheck,
        SESSION_USER_PATH => Route::SessionUser,
        VALIDATE_REDIRECT_PATH => Route::ValidateRedirect,
        ACTIVITY_STREAM_PATH => Route::ActivityStream,
        ACTIVITY_STREAM_USERS_PATH => Route::ActivityStreamUsers,
        _ => return Resolution::NotFound,
    };
    if *method == http::Method::GET || *method == http::Method::HEAD {
        Resolution::Found(route)
    } else {
        Resolution::MethodNotAllowed(route)
    }
}
