// Navigation boundary
//
// When a session cannot be recovered the client asks the host to send the
// user back to the login entry point. Headless hosts can ignore the request.

/// Host hook invoked when the session has expired for good
pub trait Navigator: Send + Sync {
    fn redirect_to_login(&self, route: &str);
}

/// Ignores redirects (library default)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn redirect_to_login(&self, _route: &str) {}
}

/// Logs the redirect target; used by the CLI, where "navigating" means
/// telling the user to sign in again
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect_to_login(&self, route: &str) {
        tracing::warn!(route = %route, "Session expired, redirecting to login");
    }
}
