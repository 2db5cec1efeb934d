use colored::Colorize;

use crate::account::{AuthFlow, RegisterInput};
use crate::auth::FederatedCredential;
use crate::cli::read_password;
use crate::error::Result;
use crate::models::AuthUser;
use crate::session::{self, SessionContext};

fn describe(user: &AuthUser) -> String {
    match (&user.display_name, &user.email) {
        (Some(name), Some(email)) => format!("{name} <{email}>"),
        (None, Some(email)) => email.clone(),
        (Some(name), None) => name.clone(),
        (None, None) => user.uid.clone(),
    }
}

pub fn register(
    session: &SessionContext,
    first_name: String,
    last_name: String,
    email: String,
    password_stdin: bool,
) -> Result<()> {
    let flow = AuthFlow::new(session.require_services()?);
    let input = RegisterInput {
        first_name,
        last_name,
        email,
        password: read_password(password_stdin)?,
    };
    let user = flow.register(&input)?;
    println!("Welcome, {}. You're signed in.", describe(&user));
    Ok(())
}

pub fn login(
    session: &SessionContext,
    email: &str,
    google: bool,
    google_id: Option<&str>,
    password_stdin: bool,
) -> Result<()> {
    let flow = AuthFlow::new(session.require_services()?);
    let user = if google {
        let subject = google_id.unwrap_or(email).trim().to_ascii_lowercase();
        flow.login_google(&FederatedCredential::google(&subject, email))?
    } else {
        let password = read_password(password_stdin)?;
        flow.login_email(email, &password)?
    };
    println!("Signed in as {}", describe(&user));
    Ok(())
}

pub fn logout(session: &SessionContext) -> Result<()> {
    let flow = AuthFlow::new(session.require_services()?);
    flow.logout()?;
    println!("Signed out.");
    Ok(())
}

pub fn status(session: &SessionContext, data_dir: &std::path::Path) -> Result<()> {
    println!("Data dir:   {}", data_dir.display());
    let Some(app) = session::app(Some(session)) else {
        println!("Backend:    {}", "services unavailable".yellow());
        println!();
        println!("Set FINWISE_API_KEY and FINWISE_PROJECT_ID (or add them to .env) to enable sign-in and uploads.");
        return Ok(());
    };
    println!("Project:    {}", app.project_id());
    println!("Database:   {}", app.db_path().display());

    let state = session::user(Some(session));
    let line = match (state.is_user_loading, state.user_error, state.user) {
        (true, _, _) => "loading".normal(),
        (false, Some(e), _) => format!("error: {e}").red(),
        (false, None, Some(user)) => format!("signed in as {}", describe(&user)).green(),
        (false, None, None) => "not signed in".yellow(),
    };
    println!("Session:    {line}");
    Ok(())
}
