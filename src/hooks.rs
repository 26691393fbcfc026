use std::sync::Arc;

/// Callback showing a user-visible notification
pub type NotifyFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback invoked when the session is dropped, with the login route
pub type SessionExpiredFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Notification shown when a refresh fails and the user is logged out
pub const SESSION_EXPIRED_NOTICE: &str = "Your session has expired. Please log in again.";

/// Side effects the hosting application wires into the client.
///
/// Both callbacks are optional; an unset callback is a no-op.
#[derive(Clone, Default)]
pub struct SessionHooks {
    notify: Option<NotifyFn>,
    on_session_expired: Option<SessionExpiredFn>,
}

impl std::fmt::Debug for SessionHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHooks")
            .field("notify", &self.notify.is_some())
            .field("on_session_expired", &self.on_session_expired.is_some())
            .finish()
    }
}

impl SessionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the notification callback
    pub fn with_notify<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.notify = Some(Arc::new(f));
        self
    }

    /// Set the session-expired callback
    pub fn with_session_expired<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_session_expired = Some(Arc::new(f));
        self
    }

    pub(crate) fn notify(&self, message: &str) {
        if let Some(notify) = &self.notify {
            notify(message);
        }
    }

    pub(crate) fn session_expired(&self, login_route: &str) {
        if let Some(callback) = &self.on_session_expired {
            callback(login_route);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_hooks_fire() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let notes = seen.clone();
        let routes = seen.clone();
        let hooks = SessionHooks::new()
            .with_notify(move |m| notes.lock().unwrap().push(format!("notify:{}", m)))
            .with_session_expired(move |r| routes.lock().unwrap().push(format!("route:{}", r)));

        hooks.notify(SESSION_EXPIRED_NOTICE);
        hooks.session_expired("/login");

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                format!("notify:{}", SESSION_EXPIRED_NOTICE),
                "route:/login".to_string()
            ]
        );
    }

    #[test]
    fn test_unset_hooks_are_noops() {
        let hooks = SessionHooks::default();
        hooks.notify("ignored");
        hooks.session_expired("/login");
        assert_eq!(format!("{:?}", hooks), "SessionHooks { notify: false, on_session_expired: false }");
    }
}
