//! View selection by session presence.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Signup,
    Dashboard,
    NewTask,
    TaskDetail(i64),
    /// `/` or anything unrecognised.
    Root,
}

impl Route {
    pub fn parse(path: &str) -> Route {
        let trimmed = path.trim().trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            ["login"] => Route::Login,
            ["signup"] => Route::Signup,
            ["dashboard"] => Route::Dashboard,
            ["tasks", "new"] => Route::NewTask,
            ["tasks", id] => id.parse().map(Route::TaskDetail).unwrap_or(Route::Root),
            _ => Route::Root,
        }
    }

    pub fn requires_session(&self) -> bool {
        matches!(self, Route::Dashboard | Route::NewTask | Route::TaskDetail(_))
    }

    /// Apply the shell's redirects: anonymous users go to login, logged-in
    /// users skip the login and signup pages.
    pub fn resolve(self, authenticated: bool) -> Route {
        match self {
            Route::Root if authenticated => Route::Dashboard,
            Route::Root => Route::Login,
            Route::Login | Route::Signup if authenticated => Route::Dashboard,
            route if route.requires_session() && !authenticated => Route::Login,
            route => route,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Login => f.write_str("/login"),
            Route::Signup => f.write_str("/signup"),
            Route::Dashboard => f.write_str("/dashboard"),
            Route::NewTask => f.write_str("/tasks/new"),
            Route::TaskDetail(id) => write!(f, "/tasks/{id}"),
            Route::Root => f.write_str("/"),
        }
    }
}
