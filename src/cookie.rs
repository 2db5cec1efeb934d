use std::path::{Path, PathBuf};

use crate::auth::{AuthProvider, TOKEN_TTL_SECS};
use crate::error::Result;

pub const COOKIE_NAME: &str = "token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCookie {
    pub value: String,
    pub max_age: i64,
}

impl TokenCookie {
    pub fn new(value: String) -> Self {
        Self {
            value,
            max_age: TOKEN_TTL_SECS,
        }
    }

    pub fn to_header_value(&self) -> String {
        format!(
            "{COOKIE_NAME}={}; Path=/; Max-Age={}; Secure; HttpOnly; SameSite=Strict",
            self.value, self.max_age
        )
    }
}

pub fn cookie_path(data_dir: &Path) -> PathBuf {
    data_dir.join("cookies").join(COOKIE_NAME)
}

/// Refresh the cookie from the provider. Signed out removes it. Failures are
/// logged and otherwise ignored.
pub fn mirror_token(auth: &dyn AuthProvider, data_dir: &Path) {
    let token = match auth.id_token() {
        Ok(token) => token,
        Err(e) => {
            log::error!("Could not obtain id token: {e}");
            return;
        }
    };
    let result = match token {
        Some(value) => write_cookie(&cookie_path(data_dir), &TokenCookie::new(value)),
        None => clear_cookie(&cookie_path(data_dir)),
    };
    if let Err(e) = result {
        log::error!("Could not update token cookie: {e}");
    }
}

fn write_cookie(path: &Path, cookie: &TokenCookie) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, cookie.to_header_value())?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    log::debug!("wrote token cookie {}", path.display());
    Ok(())
}

fn clear_cookie(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::LocalAuth;
    use crate::db::{get_connection, init_db};
    use std::rc::Rc;

    #[test]
    fn test_header_value_flags() {
        let cookie = TokenCookie::new("abc".into());
        assert_eq!(
            cookie.to_header_value(),
            "token=abc; Path=/; Max-Age=3600; Secure; HttpOnly; SameSite=Strict"
        );
    }

    #[test]
    fn test_mirror_follows_sign_in_state() {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        let auth = LocalAuth::new(Rc::new(conn));
        let data_dir = dir.path().join("data");
        let path = cookie_path(&data_dir);

        mirror_token(&auth, &data_dir);
        assert!(!path.exists());

        auth.create_user_with_email_and_password("ada@example.com", "secret123")
            .unwrap();
        mirror_token(&auth, &data_dir);
        let content = std::fs::read_to_string(&path).unwrap();
        let token = auth.id_token().unwrap().unwrap();
        assert!(content.starts_with(&format!("token={token};")));

        auth.sign_out().unwrap();
        mirror_token(&auth, &data_dir);
        assert!(!path.exists());
    }
}
