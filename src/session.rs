use std::rc::Rc;

use crate::auth::{AuthEvent, AuthProvider, Subscription};
use crate::error::{FinwiseError, Result};
use crate::models::AuthUser;
use crate::services::{BackendApp, ServiceHandles};
use crate::store::DocumentStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAuthState {
    pub user: Option<AuthUser>,
    pub is_user_loading: bool,
    pub user_error: Option<String>,
}

impl UserAuthState {
    pub fn loading() -> Self {
        Self {
            user: None,
            is_user_loading: true,
            user_error: None,
        }
    }

    fn resolved(user: Option<AuthUser>) -> Self {
        Self {
            user,
            is_user_loading: false,
            user_error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            user: None,
            is_user_loading: false,
            user_error: Some(error),
        }
    }
}

impl Default for UserAuthState {
    fn default() -> Self {
        Self::loading()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Loading,
    Authenticated(AuthUser),
    Anonymous,
    Error(String),
}

pub struct SessionContext {
    services: Option<ServiceHandles>,
    state: UserAuthState,
    subscription: Option<Subscription>,
}

impl SessionContext {
    /// Subscribe to auth state. Without an auth handle the session resolves
    /// to anonymous straight away.
    pub fn mount(services: Option<ServiceHandles>) -> Self {
        match services {
            Some(handles) => {
                let subscription = handles.auth.on_auth_state_changed();
                Self {
                    services: Some(handles),
                    state: UserAuthState::loading(),
                    subscription: Some(subscription),
                }
            }
            None => Self {
                services: None,
                state: UserAuthState::resolved(None),
                subscription: None,
            },
        }
    }

    /// Apply every queued auth event. Returns whether the state changed.
    pub fn sync(&mut self) -> bool {
        if !self.is_mounted() {
            return false;
        }
        let Some(subscription) = &self.subscription else {
            return false;
        };
        let mut changed = false;
        while let Some(event) = subscription.try_next() {
            let next = match event {
                AuthEvent::SignedIn(user) => UserAuthState::resolved(Some(user)),
                AuthEvent::SignedOut => UserAuthState::resolved(None),
                AuthEvent::Failed(error) => {
                    log::error!("Auth state error: {error}");
                    UserAuthState::failed(error)
                }
            };
            if next != self.state {
                log::debug!("session state -> {:?}", status_of(&next));
                self.state = next;
                changed = true;
            }
        }
        changed
    }

    /// Release the auth subscription. Safe to call more than once.
    pub fn unmount(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_active)
    }

    pub fn state(&self) -> &UserAuthState {
        &self.state
    }

    pub fn status(&self) -> SessionStatus {
        status_of(&self.state)
    }

    pub fn are_services_available(&self) -> bool {
        self.services.is_some()
    }

    pub fn services(&self) -> Option<&ServiceHandles> {
        self.services.as_ref()
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.state.user.as_ref()
    }

    pub fn require_user(&self) -> Result<&AuthUser> {
        self.user().ok_or(FinwiseError::NotSignedIn)
    }

    pub fn require_services(&self) -> Result<&ServiceHandles> {
        self.services().ok_or(FinwiseError::ServicesUnavailable)
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        self.unmount();
    }
}

fn status_of(state: &UserAuthState) -> SessionStatus {
    if state.is_user_loading {
        return SessionStatus::Loading;
    }
    if let Some(error) = &state.user_error {
        return SessionStatus::Error(error.clone());
    }
    match &state.user {
        Some(user) => SessionStatus::Authenticated(user.clone()),
        None => SessionStatus::Anonymous,
    }
}

// ---------------------------------------------------------------------------
// Accessors. These never fail: a missing session reads as "not available".
// ---------------------------------------------------------------------------

pub fn app(ctx: Option<&SessionContext>) -> Option<Rc<BackendApp>> {
    ctx?.services().map(|s| Rc::clone(&s.app))
}

pub fn auth(ctx: Option<&SessionContext>) -> Option<Rc<dyn AuthProvider>> {
    ctx?.services().map(|s| Rc::clone(&s.auth))
}

pub fn store(ctx: Option<&SessionContext>) -> Option<Rc<dyn DocumentStore>> {
    ctx?.services().map(|s| Rc::clone(&s.store))
}

/// The session's user state, or the loading default when there is no session.
pub fn user(ctx: Option<&SessionContext>) -> UserAuthState {
    ctx.map(|c| c.state().clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::services::{ExecutionContext, ServiceInitializer};

    fn handles() -> (tempfile::TempDir, ServiceHandles) {
        let dir = tempfile::tempdir().unwrap();
        let config = BackendConfig {
            api_key: Some("key".into()),
            project_id: Some("session-test".into()),
            ..Default::default()
        };
        let init = ServiceInitializer::new(config, ExecutionContext::Client, dir.path().join("data"));
        let handles = init.initialize().unwrap();
        (dir, handles)
    }

    #[test]
    fn test_loading_until_first_callback_applied() {
        let (_dir, handles) = handles();
        let mut session = SessionContext::mount(Some(handles));
        assert_eq!(session.status(), SessionStatus::Loading);
        assert!(session.state().is_user_loading);
        assert!(session.user().is_none());

        assert!(session.sync());
        assert!(!session.state().is_user_loading);
        assert_eq!(session.status(), SessionStatus::Anonymous);
    }

    #[test]
    fn test_sign_in_moves_to_authenticated() {
        let (_dir, handles) = handles();
        let auth = Rc::clone(&handles.auth);
        let mut session = SessionContext::mount(Some(handles));
        session.sync();

        let user = auth.create_user_with_email_and_password("ada@example.com", "secret123").unwrap();
        assert!(session.sync());
        assert_eq!(session.status(), SessionStatus::Authenticated(user.clone()));
        assert_eq!(session.require_user().unwrap().uid, user.uid);

        auth.sign_out().unwrap();
        session.sync();
        assert_eq!(session.status(), SessionStatus::Anonymous);
        assert!(matches!(session.require_user(), Err(FinwiseError::NotSignedIn)));
    }

    #[test]
    fn test_existing_session_is_restored_on_mount() {
        let (_dir, handles) = handles();
        let user = handles
            .auth
            .create_user_with_email_and_password("ada@example.com", "secret123")
            .unwrap();
        let mut session = SessionContext::mount(Some(handles));
        session.sync();
        assert_eq!(session.user().map(|u| u.uid.as_str()), Some(user.uid.as_str()));
    }

    #[test]
    fn test_auth_error_stops_loading() {
        let (_dir, handles) = handles();
        let conn = handles.app.connection();
        conn.execute_batch("PRAGMA foreign_keys=OFF;").unwrap();
        conn.execute(
            "INSERT INTO auth_state (id, uid, id_token, issued_at) VALUES (1, 'gone', 't', 0)",
            [],
        )
        .unwrap();
        let mut session = SessionContext::mount(Some(handles));
        session.sync();
        assert!(!session.state().is_user_loading);
        assert!(session.state().user_error.is_some());
        assert!(matches!(session.status(), SessionStatus::Error(_)));
    }

    #[test]
    fn test_without_services_resolves_anonymous() {
        let mut session = SessionContext::mount(None);
        assert!(!session.state().is_user_loading);
        assert!(!session.are_services_available());
        assert!(!session.sync());
        assert!(auth(Some(&session)).is_none());
        assert!(store(Some(&session)).is_none());
        assert!(app(Some(&session)).is_none());
        assert!(matches!(session.require_services(), Err(FinwiseError::ServicesUnavailable)));
    }

    #[test]
    fn test_accessors_without_context_use_defaults() {
        assert!(auth(None).is_none());
        assert!(store(None).is_none());
        assert!(app(None).is_none());
        let state = user(None);
        assert!(state.is_user_loading);
        assert!(state.user.is_none());
        assert!(state.user_error.is_none());
    }

    #[test]
    fn test_accessors_share_handles() {
        let (_dir, handles) = handles();
        let session = SessionContext::mount(Some(handles.clone()));
        let a = auth(Some(&session)).unwrap();
        assert!(Rc::ptr_eq(&a, &handles.auth));
        assert_eq!(app(Some(&session)).unwrap().project_id(), "session-test");
    }

    #[test]
    fn test_unmount_releases_subscription_once() {
        let (_dir, handles) = handles();
        let auth = Rc::clone(&handles.auth);
        let mut session = SessionContext::mount(Some(handles));
        session.sync();
        assert!(session.is_mounted());

        session.unmount();
        session.unmount();
        assert!(!session.is_mounted());

        auth.create_user_with_email_and_password("ada@example.com", "secret123").unwrap();
        assert!(!session.sync());
        assert_eq!(session.status(), SessionStatus::Anonymous);
    }
}
