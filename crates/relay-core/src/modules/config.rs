//! Config file location, loading and atomic saving.

use std::fs;
use std::path::{Path, PathBuf};

use gemini_relay_types::{ConfigError, RelayConfig};
use tracing::{debug, info};

pub const CONFIG_FILE: &str = "relay_config.json";
pub const CONFIG_DIR: &str = "gemini-relay";
pub const CONFIG_PATH_ENV: &str = "GEMINI_RELAY_CONFIG";
pub const API_KEYS_ENV: &str = "GEMINI_API_KEYS";
pub const PREMIUM_API_KEYS_ENV: &str = "GEMINI_PREMIUM_API_KEYS";
pub const BASE_URL_ENV: &str = "GEMINI_BASE_URL";

/// `--config` wins, then `GEMINI_RELAY_CONFIG`, then the per-user config dir.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    resolve_config_path_with(explicit, std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from), dirs::config_dir())
}

fn resolve_config_path_with(
    explicit: Option<&Path>,
    from_env: Option<PathBuf>,
    config_dir: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = from_env.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(path);
    }
    config_dir
        .map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
        .ok_or_else(|| ConfigError::NotFound { path: format!("<config dir>/{CONFIG_DIR}/{CONFIG_FILE}") })
}

/// Read, apply environment overrides, validate.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound { path: path.display().to_string() });
    }

    let content = fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
        message: format!("cannot read {}: {}", path.display(), e),
    })?;
    let mut config: RelayConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::from_json_error(&e))?;

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    config.validate_all()?;

    info!(
        path = %path.display(),
        premium_keys = config.gemini.premium_api_keys.len(),
        regular_keys = config.gemini.api_keys.len(),
        models = config.gemini.models.len(),
        "Loaded relay config"
    );
    Ok(config)
}

/// Comma-separated key lists and the base URL may come from the environment.
pub fn apply_env_overrides<F>(config: &mut RelayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(keys) = lookup(API_KEYS_ENV).map(|v| split_keys(&v)).filter(|k| !k.is_empty()) {
        debug!(count = keys.len(), "Regular keys overridden from environment");
        config.gemini.api_keys = keys;
    }
    if let Some(keys) = lookup(PREMIUM_API_KEYS_ENV).map(|v| split_keys(&v)).filter(|k| !k.is_empty()) {
        debug!(count = keys.len(), "Premium keys overridden from environment");
        config.gemini.premium_api_keys = keys;
    }
    if let Some(url) = lookup(BASE_URL_ENV).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        debug!(base_url = %url, "Base URL overridden from environment");
        config.gemini.base_url = url;
    }
}

fn split_keys(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|k| !k.is_empty()).map(str::to_string).collect()
}

/// Write to a sibling temp file, then rename over the target.
pub fn save_config(path: &Path, config: &RelayConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ConfigError::from_io_error(&e))?;
    }
    let file_name = path.file_name().map_or_else(|| CONFIG_FILE.into(), |n| n.to_string_lossy().into_owned());
    let temp_path = path.with_file_name(format!("{file_name}.tmp"));

    let content = serde_json::to_string_pretty(config).map_err(|e| ConfigError::WriteError {
        message: format!("cannot serialize config: {e}"),
    })?;

    fs::write(&temp_path, content).map_err(|e| ConfigError::from_io_error(&e))?;
    fs::rename(&temp_path, path).map_err(|e| ConfigError::from_io_error(&e))?;
    debug!(path = %path.display(), "Saved relay config");
    Ok(())
}
