mod account;
mod analysis;
mod auth;
mod categorizer;
mod cli;
mod config;
mod cookie;
mod db;
mod entries;
mod error;
mod extractor;
mod fmt;
mod logging;
mod models;
mod profile;
mod services;
mod session;
mod settings;
mod store;
mod tui;
mod upload;

use std::path::PathBuf;

use clap::Parser;

use cli::{Cli, Commands, ProfileCommands, SessionCommand, TransactionCommands};
use config::{BackendConfig, ENV_LOG};
use error::Result;
use profile::ProfileEdit;
use services::{ExecutionContext, ServiceInitializer};
use session::SessionContext;
use settings::{load_settings, Settings};

fn main() {
    let cli = Cli::parse();
    let settings = load_settings();

    let env_level = std::env::var(ENV_LOG).ok();
    let level = logging::resolve_level(cli.verbose, env_level.as_deref(), &settings.log_level);
    if let Err(e) = logging::init(level) {
        eprintln!("Warning: could not initialize logging: {e}");
    }

    let result = match cli.command {
        Commands::Init {
            data_dir,
            extractor_url,
        } => cli::init::run(data_dir, extractor_url),
        Commands::Session(command) => run_with_session(command, &settings),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run_with_session(command: SessionCommand, settings: &Settings) -> Result<()> {
    let config = BackendConfig::from_env();
    let extractor_url = config
        .extractor_url
        .clone()
        .or_else(|| settings.extractor_url.clone());
    let data_dir = PathBuf::from(&settings.data_dir);

    let initializer = ServiceInitializer::new(config, ExecutionContext::Client, data_dir.clone());
    let mut session = SessionContext::mount(initializer.initialize());
    session.sync();

    if !session.are_services_available() && !matches!(command, SessionCommand::Status) {
        println!("Backend services unavailable: set FINWISE_API_KEY and FINWISE_PROJECT_ID (or add them to .env).");
        return Ok(());
    }

    let result = dispatch(command, &mut session, &data_dir, extractor_url.as_deref());

    session.sync();
    if let Some(auth) = session::auth(Some(&session)) {
        cookie::mirror_token(auth.as_ref(), &data_dir);
    }
    session.unmount();
    result
}

fn dispatch(
    command: SessionCommand,
    session: &mut SessionContext,
    data_dir: &std::path::Path,
    extractor_url: Option<&str>,
) -> Result<()> {
    match command {
        SessionCommand::Register {
            first_name,
            last_name,
            email,
            password_stdin,
        } => cli::account::register(session, first_name, last_name, email, password_stdin),
        SessionCommand::Login {
            email,
            google,
            google_id,
            password_stdin,
        } => cli::account::login(session, &email, google, google_id.as_deref(), password_stdin),
        SessionCommand::Logout => cli::account::logout(session),
        SessionCommand::Status => cli::account::status(session, data_dir),
        SessionCommand::Profile { command } => match command {
            ProfileCommands::Show => cli::profile::show(session),
            ProfileCommands::Edit {
                first_name,
                last_name,
                phone,
                dob,
                bio,
                street,
                city,
                state,
                zip,
            } => cli::profile::edit(
                session,
                ProfileEdit {
                    first_name,
                    last_name,
                    phone,
                    dob,
                    bio,
                    street,
                    city,
                    state,
                    zip,
                },
            ),
        },
        SessionCommand::Upload { file } => cli::upload::upload(session, &file, extractor_url),
        SessionCommand::History => cli::upload::history(session),
        SessionCommand::Analysis { id } => cli::upload::analysis(session, &id),
        SessionCommand::Transactions { command } => match command {
            TransactionCommands::Add {
                kind,
                amount,
                category,
                date,
                description,
            } => cli::transactions::add(session, &kind, amount, &category, date, description),
            TransactionCommands::List { limit } => cli::transactions::list(session, limit),
        },
        SessionCommand::Dashboard => cli::dashboard::run(session, extractor_url),
    }
}
