//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::{print_error, print_info, print_success};
use tsl_core::config::{self, LauncherConfig};

/// Resolve the config file path, falling back to the default location
pub fn config_file_path(config_path: Option<&PathBuf>) -> PathBuf {
    config_path.cloned().unwrap_or_else(config::default_config_path)
}

/// Load the effective launcher configuration
///
/// An explicit path must exist and parse. The default path is optional: if
/// it is missing the built-in defaults apply, and if it is broken a warning
/// is logged and the defaults apply as well.
pub fn load_launcher_config(config_path: Option<&PathBuf>) -> Result<LauncherConfig> {
    if let Some(path) = config_path {
        return config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path));
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        Ok(config::load_config(&default_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
            LauncherConfig::default()
        }))
    } else {
        tracing::info!("Using default configuration");
        Ok(LauncherConfig::default())
    }
}

/// Show the effective configuration as TOML
pub fn config_show(config_path: Option<&PathBuf>) -> Result<()> {
    let path = config_file_path(config_path);
    let config = load_launcher_config(config_path)?;

    if path.exists() {
        print_info(&format!("Configuration file: {:?}", path));
    } else {
        print_info(&format!("No configuration file at {:?}, showing defaults", path));
    }
    println!();

    let rendered =
        toml::to_string_pretty(&config).context("Failed to render configuration")?;
    println!("{}", rendered);

    Ok(())
}

/// Print the config file path
pub fn config_path(config_path: Option<&PathBuf>) {
    println!("{}", config_file_path(config_path).display());
}

/// Write the default configuration
pub fn config_init(config_path: Option<&PathBuf>, force: bool) -> Result<()> {
    let path = config_file_path(config_path);

    if path.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", path));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    write_default_config(&path)?;
    print_success(&format!("Created configuration file: {:?}", path));
    Ok(())
}

fn write_default_config(path: &Path) -> Result<()> {
    config::save_config(path, &LauncherConfig::default())
        .with_context(|| format!("Failed to write config file: {:?}", path))
}
