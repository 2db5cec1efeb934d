use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::sync::mpsc::{self, Receiver, Sender};

use rand::RngCore;
use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::error::{FinwiseError, Result};
use crate::models::AuthUser;

pub const PASSWORD_PROVIDER: &str = "password";
pub const GOOGLE_PROVIDER: &str = "google.com";

const PASSWORD_ROUNDS: u32 = 10_000;
const MIN_PASSWORD_LEN: usize = 6;
pub const TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(AuthUser),
    SignedOut,
    Failed(String),
}

/// An identity asserted by an external provider (e.g. Google).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedCredential {
    pub provider_id: String,
    pub subject: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl FederatedCredential {
    pub fn google(subject: &str, email: &str) -> Self {
        Self {
            provider_id: GOOGLE_PROVIDER.to_string(),
            subject: subject.to_string(),
            email: Some(email.to_string()),
            display_name: None,
        }
    }
}

pub trait AuthProvider {
    fn sign_in_with_email_and_password(&self, email: &str, password: &str) -> Result<AuthUser>;
    fn sign_in_with_federated(&self, credential: &FederatedCredential) -> Result<AuthUser>;
    /// Creates the account and signs it in.
    fn create_user_with_email_and_password(&self, email: &str, password: &str) -> Result<AuthUser>;
    fn update_profile(&self, uid: &str, display_name: &str) -> Result<()>;
    fn sign_out(&self) -> Result<()>;
    fn current_user(&self) -> Option<AuthUser>;
    /// Token for the current user, refreshed when stale. `None` when signed out.
    fn id_token(&self) -> Result<Option<String>>;
    /// The current state is queued on the returned subscription immediately.
    fn on_auth_state_changed(&self) -> Subscription;
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

type ListenerMap = BTreeMap<u64, Sender<AuthEvent>>;

/// Fan-out of auth events to live subscriptions.
#[derive(Default)]
pub struct AuthListeners {
    next_id: Cell<u64>,
    senders: Rc<RefCell<ListenerMap>>,
}

impl AuthListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, initial: AuthEvent) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let (tx, rx) = mpsc::channel();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(initial);
        self.senders.borrow_mut().insert(id, tx);
        Subscription {
            id,
            listeners: Rc::downgrade(&self.senders),
            receiver: rx,
            released: false,
        }
    }

    pub fn broadcast(&self, event: AuthEvent) {
        self.senders
            .borrow_mut()
            .retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.senders.borrow().len()
    }
}

/// A live auth-state subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    listeners: Weak<RefCell<ListenerMap>>,
    receiver: Receiver<AuthEvent>,
    released: bool,
}

impl Subscription {
    /// Next queued event, if any. Always `None` once released.
    pub fn try_next(&self) -> Option<AuthEvent> {
        if self.released {
            return None;
        }
        self.receiver.try_recv().ok()
    }

    /// Returns `false` if this subscription was already released.
    pub fn unsubscribe(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.borrow_mut().remove(&self.id);
        }
        true
    }

    pub fn is_active(&self) -> bool {
        !self.released
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .map_or(false, |(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(FinwiseError::Auth(format!("invalid email: {email}")));
    }
    Ok(email)
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

pub fn hash_password(password: &str, salt: &str) -> String {
    let mut digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();
    for _ in 1..PASSWORD_ROUNDS {
        digest = Sha256::new()
            .chain_update(salt.as_bytes())
            .chain_update(digest)
            .finalize();
    }
    hex::encode(digest)
}

/// Compares two digests in time independent of where they first differ.
fn digests_match(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

// ---------------------------------------------------------------------------
// LocalAuth
// ---------------------------------------------------------------------------

pub struct LocalAuth {
    conn: Rc<Connection>,
    listeners: AuthListeners,
}

impl LocalAuth {
    pub fn new(conn: Rc<Connection>) -> Self {
        Self {
            conn,
            listeners: AuthListeners::new(),
        }
    }

    #[cfg(test)]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn load_user(&self, uid: &str) -> Result<Option<AuthUser>> {
        let user = self
            .conn
            .query_row(
                "SELECT uid, email, display_name, provider_id FROM users WHERE uid = ?1",
                [uid],
                |row| {
                    Ok(AuthUser {
                        uid: row.get(0)?,
                        email: row.get(1)?,
                        display_name: row.get(2)?,
                        provider_id: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn persisted_user(&self) -> Result<Option<AuthUser>> {
        let uid: Option<String> = self
            .conn
            .query_row("SELECT uid FROM auth_state WHERE id = 1", [], |r| r.get(0))
            .optional()?;
        match uid {
            Some(uid) => match self.load_user(&uid)? {
                Some(user) => Ok(Some(user)),
                None => Err(FinwiseError::Auth(format!(
                    "persisted session refers to unknown user {uid}"
                ))),
            },
            None => Ok(None),
        }
    }

    fn start_session(&self, user: &AuthUser) -> Result<()> {
        self.conn.execute(
            "INSERT INTO auth_state (id, uid, id_token, issued_at) VALUES (1, ?1, ?2, ?3) \
             ON CONFLICT(id) DO UPDATE SET uid = excluded.uid, id_token = excluded.id_token, issued_at = excluded.issued_at",
            rusqlite::params![user.uid, random_hex(32), now_secs()],
        )?;
        log::info!("signed in {} via {}", user.uid, user.provider_id);
        self.listeners.broadcast(AuthEvent::SignedIn(user.clone()));
        Ok(())
    }

    fn insert_user(
        &self,
        email: Option<&str>,
        password: Option<&str>,
        provider_id: &str,
        subject: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<AuthUser> {
        let uid = uuid::Uuid::new_v4().simple().to_string();
        let (hash, salt) = match password {
            Some(pw) => {
                let salt = random_hex(16);
                (Some(hash_password(pw, &salt)), Some(salt))
            }
            None => (None, None),
        };
        self.conn.execute(
            "INSERT INTO users (uid, email, password_hash, salt, display_name, provider_id, provider_subject) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![uid, email, hash, salt, display_name, provider_id, subject],
        )?;
        Ok(AuthUser {
            uid,
            email: email.map(str::to_string),
            display_name: display_name.map(str::to_string),
            provider_id: provider_id.to_string(),
        })
    }

    fn email_taken(&self, email: &str) -> Result<bool> {
        let mut stmt = self.conn.prepare("SELECT 1 FROM users WHERE email = ?1")?;
        Ok(stmt.exists([email])?)
    }
}

impl AuthProvider for LocalAuth {
    fn sign_in_with_email_and_password(&self, email: &str, password: &str) -> Result<AuthUser> {
        let email = normalize_email(email)?;
        let row: Option<(String, Option<String>, Option<String>)> = self
            .conn
            .query_row(
                "SELECT uid, password_hash, salt FROM users WHERE email = ?1",
                [&email],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?;

        let Some((uid, Some(hash), Some(salt))) = row else {
            return Err(FinwiseError::Auth("invalid email or password".into()));
        };
        if !digests_match(&hash_password(password, &salt), &hash) {
            return Err(FinwiseError::Auth("invalid email or password".into()));
        }
        let user = self
            .load_user(&uid)?
            .ok_or_else(|| FinwiseError::Auth("invalid email or password".into()))?;
        self.start_session(&user)?;
        Ok(user)
    }

    fn sign_in_with_federated(&self, credential: &FederatedCredential) -> Result<AuthUser> {
        if credential.subject.trim().is_empty() {
            return Err(FinwiseError::Auth("federated credential has no subject".into()));
        }
        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT uid FROM users WHERE provider_id = ?1 AND provider_subject = ?2",
                [&credential.provider_id, &credential.subject],
                |r| r.get(0),
            )
            .optional()?;

        let user = match existing {
            Some(uid) => self
                .load_user(&uid)?
                .ok_or_else(|| FinwiseError::Auth(format!("unknown user {uid}")))?,
            None => {
                let email = credential.email.as_deref().map(normalize_email).transpose()?;
                if let Some(email) = &email {
                    if self.email_taken(email)? {
                        return Err(FinwiseError::Auth(format!(
                            "an account already exists for {email} with a different sign-in method"
                        )));
                    }
                }
                self.insert_user(
                    email.as_deref(),
                    None,
                    &credential.provider_id,
                    Some(&credential.subject),
                    credential.display_name.as_deref(),
                )?
            }
        };
        self.start_session(&user)?;
        Ok(user)
    }

    fn create_user_with_email_and_password(&self, email: &str, password: &str) -> Result<AuthUser> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(FinwiseError::Auth(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.email_taken(&email)? {
            return Err(FinwiseError::Auth(format!("email already in use: {email}")));
        }
        let user = self.insert_user(Some(&email), Some(password), PASSWORD_PROVIDER, None, None)?;
        self.start_session(&user)?;
        Ok(user)
    }

    fn update_profile(&self, uid: &str, display_name: &str) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE users SET display_name = ?1 WHERE uid = ?2",
            rusqlite::params![display_name, uid],
        )?;
        if changed == 0 {
            return Err(FinwiseError::NotFound(format!("user {uid}")));
        }
        Ok(())
    }

    fn sign_out(&self) -> Result<()> {
        let removed = self.conn.execute("DELETE FROM auth_state WHERE id = 1", [])?;
        if removed > 0 {
            log::info!("signed out");
            self.listeners.broadcast(AuthEvent::SignedOut);
        }
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        match self.persisted_user() {
            Ok(user) => user,
            Err(e) => {
                log::error!("Could not read auth state: {e}");
                None
            }
        }
    }

    fn id_token(&self) -> Result<Option<String>> {
        let row: Option<(String, i64)> = self
            .conn
            .query_row(
                "SELECT id_token, issued_at FROM auth_state WHERE id = 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        let Some((token, issued_at)) = row else {
            return Ok(None);
        };
        if now_secs() - issued_at < TOKEN_TTL_SECS {
            return Ok(Some(token));
        }
        let fresh = random_hex(32);
        self.conn.execute(
            "UPDATE auth_state SET id_token = ?1, issued_at = ?2 WHERE id = 1",
            rusqlite::params![fresh, now_secs()],
        )?;
        log::debug!("refreshed id token");
        Ok(Some(fresh))
    }

    fn on_auth_state_changed(&self) -> Subscription {
        let initial = match self.persisted_user() {
            Ok(Some(user)) => AuthEvent::SignedIn(user),
            Ok(None) => AuthEvent::SignedOut,
            Err(e) => AuthEvent::Failed(e.to_string()),
        };
        self.listeners.subscribe(initial)
    }
}
