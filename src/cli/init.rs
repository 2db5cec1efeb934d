use std::path::PathBuf;

use crate::cli::prompt;
use crate::config::BackendConfig;
use crate::error::Result;
use crate::services::{ExecutionContext, ServiceInitializer};
use crate::settings::{load_settings, save_settings, settings_file_exists, shellexpand_path};

pub fn run(data_dir: Option<String>, extractor_url: Option<String>) -> Result<()> {
    let mut settings = load_settings();

    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    } else if !settings_file_exists() {
        let chosen = prompt(&format!("Data directory [{}]: ", settings.data_dir))?;
        if !chosen.is_empty() {
            settings.data_dir = shellexpand_path(&chosen);
        }
    }
    if let Some(url) = extractor_url {
        let url = url.trim().to_string();
        settings.extractor_url = (!url.is_empty()).then_some(url);
    }

    save_settings(&settings)?;
    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;
    println!("Initialized finwise at {}", resolved.display());

    let config = BackendConfig::from_env();
    if !config.is_complete() {
        println!("Backend not configured: set FINWISE_API_KEY and FINWISE_PROJECT_ID (or add them to .env).");
        return Ok(());
    }
    match ServiceInitializer::new(config, ExecutionContext::Client, resolved).initialize() {
        Some(services) => println!("Backend ready: {}", services.app.db_path().display()),
        None => println!("Backend could not be opened; see the log for details."),
    }
    Ok(())
}
