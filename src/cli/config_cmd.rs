use anyhow::Result;

use crate::cli::output::OutputOptions;
use crate::core::config::{AppConfig, DayBoundary};

pub fn init(_opts: &OutputOptions) -> Result<()> {
    let path = AppConfig::config_path();
    if path.exists() {
        eprintln!("Config file already exists at {}", path.display());
        eprintln!("Remove it first if you want to regenerate.");
        return Ok(());
    }

    match AppConfig::default().save() {
        Ok(path) => {
            println!("Generated config at {}", path.display());
            println!(
                "  Sessions root: {}",
                AppConfig::default().sessions.resolve_root(None).display()
            );
        }
        Err(e) => {
            eprintln!("Failed to generate config: {}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}

pub fn check(_opts: &OutputOptions) -> Result<()> {
    let path = AppConfig::config_path();
    if !path.exists() {
        eprintln!("No config file found at {}", path.display());
        eprintln!("Run `ctally config init` to create one.");
        return Ok(());
    }

    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let issues = config.validate();
    if issues.is_empty() {
        println!("Config is valid: {}", path.display());
        let root = config.sessions.resolve_root(None);
        println!(
            "  Sessions root: {}{}",
            root.display(),
            if root.is_dir() { "" } else { " (missing)" }
        );
        println!(
            "  Refresh interval: {}s",
            config.sessions.refresh_interval().as_secs()
        );
        println!(
            "  Day boundary: {}",
            match config.sessions.day_boundary {
                DayBoundary::Local => "local",
                DayBoundary::Utc => "utc",
            }
        );
    } else {
        eprintln!("Config issues found in {}:", path.display());
        for issue in &issues {
            eprintln!("  - {}", issue);
        }
        std::process::exit(1);
    }
    Ok(())
}
