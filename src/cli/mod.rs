pub mod account;
pub mod dashboard;
pub mod init;
pub mod profile;
pub mod transactions;
pub mod upload;

use std::io::{BufRead, Write};

use clap::{Parser, Subcommand};
use zeroize::Zeroizing;

use crate::error::{FinwiseError, Result};

#[derive(Parser)]
#[command(
    name = "finwise",
    version,
    about = "Personal finance dashboard: upload statements, see where the money went."
)]
pub struct Cli {
    /// Log at debug level.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and extraction service, and open the backend.
    Init {
        /// Path for finwise data (default: ~/.local/share/finwise)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Statement extraction service URL (needed for PDF statements)
        #[arg(long = "extractor-url")]
        extractor_url: Option<String>,
    },
    #[command(flatten)]
    Session(SessionCommand),
}

/// Commands that run against a mounted session.
#[derive(Subcommand)]
pub enum SessionCommand {
    /// Create an account and sign in.
    Register {
        #[arg(long = "first-name")]
        first_name: String,
        #[arg(long = "last-name")]
        last_name: String,
        #[arg(long)]
        email: String,
        /// Read the password from the first line of stdin.
        #[arg(long = "password-stdin")]
        password_stdin: bool,
    },
    /// Sign in with email and password, or with Google.
    Login {
        #[arg(long)]
        email: String,
        /// Sign in with a Google account instead of a password.
        #[arg(long)]
        google: bool,
        /// Google account id (defaults to the email address).
        #[arg(long = "google-id", requires = "google")]
        google_id: Option<String>,
        #[arg(long = "password-stdin", conflicts_with = "google")]
        password_stdin: bool,
    },
    /// Sign out.
    Logout,
    /// Show backend and session status.
    Status,
    /// Show or edit your profile.
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Upload a PDF or CSV bank statement and analyze it.
    Upload {
        /// Path to the statement
        file: String,
    },
    /// List past uploads, newest first.
    History,
    /// Show the analysis for a past upload.
    Analysis {
        /// Upload id (see `finwise history`)
        id: String,
    },
    /// Record or list manual incomes and expenses.
    Transactions {
        #[command(subcommand)]
        command: TransactionCommands,
    },
    /// Interactive upload/history/analysis dashboard.
    Dashboard,
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Print the profile.
    Show,
    /// Change profile fields. Fields not given are left as they are.
    Edit {
        #[arg(long = "first-name")]
        first_name: Option<String>,
        #[arg(long = "last-name")]
        last_name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        /// Date of birth: YYYY-MM-DD
        #[arg(long)]
        dob: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        street: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        zip: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum TransactionCommands {
    /// Add an income or expense.
    Add {
        /// income or expense
        kind: String,
        amount: f64,
        /// Category name (e.g. Food, "Bills & Utilities")
        #[arg(long, default_value = "Other")]
        category: String,
        /// Date: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Description (expense) or source (income)
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List recorded incomes and expenses.
    List {
        /// Show at most this many rows
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

pub(crate) fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

pub(crate) fn read_password(from_stdin: bool) -> Result<Zeroizing<String>> {
    let password = if from_stdin {
        let mut line = Zeroizing::new(String::new());
        std::io::stdin().lock().read_line(&mut line)?;
        Zeroizing::new(line.trim_end_matches(['\r', '\n']).to_string())
    } else {
        Zeroizing::new(rpassword::prompt_password("Password: ")?)
    };
    if password.is_empty() {
        return Err(FinwiseError::Auth("password is required".into()));
    }
    Ok(password)
}
