use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::profile::{load_profile, save_profile, ProfileEdit, ProfileForm};
use crate::session::SessionContext;

fn format_profile(form: &ProfileForm) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);
    let address = [&form.street, &form.city, &form.state, &form.zip]
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    for (label, value) in [
        ("First name", form.first_name.as_str()),
        ("Last name", form.last_name.as_str()),
        ("Email", form.email.as_str()),
        ("Phone", form.phone.as_str()),
        ("Date of birth", form.dob.as_str()),
        ("Address", address.as_str()),
        ("Bio", form.bio.as_str()),
    ] {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    format!("Profile\n{table}")
}

pub fn show(session: &SessionContext) -> Result<()> {
    let store = &session.require_services()?.store;
    let user = session.require_user()?;
    let form = load_profile(store.as_ref(), &user.uid)?;
    println!("{}", format_profile(&form));
    Ok(())
}

pub fn edit(session: &SessionContext, edit: ProfileEdit) -> Result<()> {
    let store = &session.require_services()?.store;
    let user = session.require_user()?;
    if edit.is_empty() {
        println!("Nothing to change. See `finwise profile edit --help`.");
        return Ok(());
    }
    let mut form = load_profile(store.as_ref(), &user.uid)?;
    edit.apply(&mut form);
    save_profile(store.as_ref(), &user.uid, &form)?;
    println!("Profile updated.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_profile_joins_address() {
        let form = ProfileForm {
            first_name: "Ada".into(),
            city: "London".into(),
            zip: "N1".into(),
            ..Default::default()
        };
        let out = format_profile(&form);
        assert!(out.starts_with("Profile"));
        assert!(out.contains("London, N1"));
        assert!(out.contains("Ada"));
    }
}
