use std::cell::Cell;
use std::rc::Rc;

use chrono::{SecondsFormat, Utc};
use serde_json::json;
use zeroize::Zeroizing;

use crate::auth::{AuthProvider, FederatedCredential};
use crate::error::{FinwiseError, Result};
use crate::models::AuthUser;
use crate::services::ServiceHandles;
use crate::store::{doc_path, DocumentStore, SetOptions};

pub struct RegisterInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: Zeroizing<String>,
}

pub fn profile_path(uid: &str) -> String {
    doc_path(&["users", uid])
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Runs one submission at a time against the auth provider.
pub struct AuthFlow {
    auth: Rc<dyn AuthProvider>,
    store: Rc<dyn DocumentStore>,
    is_submitting: Cell<bool>,
}

struct Submitting<'a>(&'a Cell<bool>);

impl Drop for Submitting<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl AuthFlow {
    pub fn new(services: &ServiceHandles) -> Self {
        Self {
            auth: Rc::clone(&services.auth),
            store: Rc::clone(&services.store),
            is_submitting: Cell::new(false),
        }
    }

    #[cfg(test)]
    pub fn is_submitting(&self) -> bool {
        self.is_submitting.get()
    }

    fn begin(&self) -> Result<Submitting<'_>> {
        if self.is_submitting.replace(true) {
            return Err(FinwiseError::Other("A submission is already in progress".into()));
        }
        Ok(Submitting(&self.is_submitting))
    }

    pub fn register(&self, input: &RegisterInput) -> Result<AuthUser> {
        let _guard = self.begin()?;
        self.try_register(input)
            .inspect_err(|e| log::error!("Registration failed: {e}"))
    }

    fn try_register(&self, input: &RegisterInput) -> Result<AuthUser> {
        let first = input.first_name.trim();
        let last = input.last_name.trim();
        if first.is_empty() || last.is_empty() {
            return Err(FinwiseError::Other("First and last name are required".into()));
        }
        let mut user = self
            .auth
            .create_user_with_email_and_password(&input.email, &input.password)?;
        let display_name = format!("{first} {last}");
        self.auth.update_profile(&user.uid, &display_name)?;
        user.display_name = Some(display_name);

        self.store.set(
            &profile_path(&user.uid),
            json!({
                "id": user.uid,
                "firstName": first,
                "lastName": last,
                "email": user.email,
                "registrationDate": now_rfc3339(),
            }),
            SetOptions::merge(),
        )?;
        log::info!("Registered {}", user.uid);
        Ok(user)
    }

    pub fn login_email(&self, email: &str, password: &str) -> Result<AuthUser> {
        let _guard = self.begin()?;
        self.auth
            .sign_in_with_email_and_password(email, password)
            .inspect_err(|e| log::error!("Sign-in failed: {e}"))
    }

    /// Google sign-in. The profile document is merge-written so an existing
    /// profile keeps its other fields.
    pub fn login_google(&self, credential: &FederatedCredential) -> Result<AuthUser> {
        let _guard = self.begin()?;
        self.try_login_google(credential)
            .inspect_err(|e| log::error!("Google sign-in failed: {e}"))
    }

    fn try_login_google(&self, credential: &FederatedCredential) -> Result<AuthUser> {
        let user = self.auth.sign_in_with_federated(credential)?;
        self.store.set(
            &profile_path(&user.uid),
            json!({
                "id": user.uid,
                "email": user.email,
                "registrationDate": now_rfc3339(),
            }),
            SetOptions::merge(),
        )?;
        Ok(user)
    }

    pub fn logout(&self) -> Result<()> {
        match self.auth.current_user() {
            Some(user) => log::info!("Signing out {}", user.uid),
            None => log::debug!("Sign-out requested with no signed-in user"),
        }
        self.auth.sign_out()
    }
}
