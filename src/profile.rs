use chrono::{SecondsFormat, Utc};
use serde_json::json;

use crate::account::profile_path;
use crate::error::Result;
use crate::models::UserProfile;
use crate::store::DocumentStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub dob: String,
    pub bio: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl From<UserProfile> for ProfileForm {
    fn from(p: UserProfile) -> Self {
        let address = p.address.unwrap_or_default();
        Self {
            first_name: p.first_name,
            last_name: p.last_name,
            email: p.email,
            phone: p.phone.unwrap_or_default(),
            dob: p.dob.unwrap_or_default(),
            bio: p.bio.unwrap_or_default(),
            street: address.street.unwrap_or_default(),
            city: address.city.unwrap_or_default(),
            state: address.state.unwrap_or_default(),
            zip: address.zip.unwrap_or_default(),
        }
    }
}

/// Field overrides from the command line; `None` leaves a field as loaded.
#[derive(Debug, Clone, Default)]
pub struct ProfileEdit {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub dob: Option<String>,
    pub bio: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

impl ProfileEdit {
    pub fn is_empty(&self) -> bool {
        [
            &self.first_name,
            &self.last_name,
            &self.phone,
            &self.dob,
            &self.bio,
            &self.street,
            &self.city,
            &self.state,
            &self.zip,
        ]
        .iter()
        .all(|f| f.is_none())
    }

    pub fn apply(self, form: &mut ProfileForm) {
        let pairs = [
            (self.first_name, &mut form.first_name),
            (self.last_name, &mut form.last_name),
            (self.phone, &mut form.phone),
            (self.dob, &mut form.dob),
            (self.bio, &mut form.bio),
            (self.street, &mut form.street),
            (self.city, &mut form.city),
            (self.state, &mut form.state),
            (self.zip, &mut form.zip),
        ];
        for (value, field) in pairs {
            if let Some(value) = value {
                *field = value.trim().to_string();
            }
        }
    }
}

/// Load the profile into a form. A missing document gives an empty form.
pub fn load_profile(store: &dyn DocumentStore, uid: &str) -> Result<ProfileForm> {
    let Some(data) = store.get(&profile_path(uid))? else {
        log::debug!("no profile document for {uid}");
        return Ok(ProfileForm::default());
    };
    let profile: UserProfile = serde_json::from_value(data)?;
    Ok(profile.into())
}

/// Write the editable fields back. The profile document must already exist.
pub fn save_profile(store: &dyn DocumentStore, uid: &str, form: &ProfileForm) -> Result<()> {
    let data = json!({
        "firstName": form.first_name,
        "lastName": form.last_name,
        "phone": form.phone,
        "dob": form.dob,
        "bio": form.bio,
        "address": {
            "street": form.street,
            "city": form.city,
            "state": form.state,
            "zip": form.zip,
        },
        "updatedAt": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    });
    store
        .update(&profile_path(uid), data)
        .inspect_err(|e| log::error!("Could not save profile for {uid}: {e}"))?;
    log::info!("Saved profile for {uid}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use crate::error::FinwiseError;
    use crate::store::{LocalStore, SetOptions};
    use std::rc::Rc;

    fn test_store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, LocalStore::new(Rc::new(conn)))
    }

    #[test]
    fn test_missing_profile_loads_empty_form() {
        let (_dir, store) = test_store();
        assert_eq!(load_profile(&store, "nobody").unwrap(), ProfileForm::default());
    }

    #[test]
    fn test_load_flattens_address_with_defaults() {
        let (_dir, store) = test_store();
        store
            .set(
                "users/u1",
                json!({
                    "id": "u1",
                    "firstName": "Ada",
                    "lastName": "Lovelace",
                    "email": "ada@example.com",
                    "registrationDate": "2025-01-01T00:00:00.000Z",
                    "address": {"city": "London"}
                }),
                SetOptions::default(),
            )
            .unwrap();
        let form = load_profile(&store, "u1").unwrap();
        assert_eq!(form.first_name, "Ada");
        assert_eq!(form.city, "London");
        assert_eq!(form.street, "");
        assert_eq!(form.phone, "");
    }

    #[test]
    fn test_save_updates_existing_document() {
        let (_dir, store) = test_store();
        store
            .set(
                "users/u1",
                json!({"id": "u1", "firstName": "Ada", "email": "ada@example.com"}),
                SetOptions::default(),
            )
            .unwrap();
        let mut form = load_profile(&store, "u1").unwrap();
        ProfileEdit {
            phone: Some(" 555-0100 ".into()),
            city: Some("London".into()),
            ..Default::default()
        }
        .apply(&mut form);
        save_profile(&store, "u1", &form).unwrap();

        let doc = store.get("users/u1").unwrap().unwrap();
        assert_eq!(doc["phone"], "555-0100");
        assert_eq!(doc["address"]["city"], "London");
        assert_eq!(doc["email"], "ada@example.com");
        assert!(doc["updatedAt"].is_string());
        assert_eq!(load_profile(&store, "u1").unwrap().phone, "555-0100");
    }

    #[test]
    fn test_save_without_document_fails() {
        let (_dir, store) = test_store();
        let err = save_profile(&store, "ghost", &ProfileForm::default()).unwrap_err();
        assert!(matches!(err, FinwiseError::NotFound(_)));
    }

    #[test]
    fn test_empty_edit() {
        assert!(ProfileEdit::default().is_empty());
        assert!(!ProfileEdit {
            bio: Some("hi".into()),
            ..Default::default()
        }
        .is_empty());
    }
}
