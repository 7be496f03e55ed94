//! Environment configuration helpers for loading credentials from .env files.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use crate::config::PurchasesConfig;

pub const API_KEY_VAR: &str = "PURCHASES_API_KEY";
pub const APP_USER_ID_VAR: &str = "PURCHASES_APP_USER_ID";
pub const PROXY_URL_VAR: &str = "PURCHASES_PROXY_URL";
pub const OBSERVER_MODE_VAR: &str = "PURCHASES_OBSERVER_MODE";
pub const PRODUCT_IDENTIFIERS_VAR: &str = "PURCHASES_PRODUCT_IDENTIFIERS";

const KNOWN_VARS: [&str; 5] = [
    API_KEY_VAR,
    APP_USER_ID_VAR,
    PROXY_URL_VAR,
    OBSERVER_MODE_VAR,
    PRODUCT_IDENTIFIERS_VAR,
];

/// Loads environment variables from a .env file in the specified directory.
/// Falls back to the current directory if no path is provided.
///
/// Variables already present in the process environment are not overridden.
///
/// # Example
/// ```no_run
/// use sdk_purchases_rust::env::load_env;
///
/// let vars = load_env(None).unwrap();
/// let vars = load_env(Some(std::path::Path::new("/path/to/app"))).unwrap();
/// ```
pub fn load_env(dir: Option<&Path>) -> Result<HashMap<String, String>, EnvError> {
    let env_path = match dir {
        Some(d) => d.join(".env"),
        None => std::env::current_dir()
            .map_err(|e| EnvError::Io(e.to_string()))?
            .join(".env"),
    };

    if env_path.exists() {
        dotenvy::from_path(&env_path).map_err(|e| EnvError::Parse(e.to_string()))?;
    }

    Ok(get_purchases_env())
}

/// Returns the `PURCHASES_*` variables currently set in the process environment.
pub fn get_purchases_env() -> HashMap<String, String> {
    KNOWN_VARS
        .iter()
        .filter_map(|name| {
            std::env::var(name)
                .ok()
                .map(|value| (name.to_string(), value))
        })
        .collect()
}

/// Builds a [`PurchasesConfig`] from variables loaded with [`load_env`].
pub fn config_from_env(dir: Option<&Path>) -> Result<PurchasesConfig, EnvError> {
    let vars = load_env(dir)?;
    config_from_vars(&vars)
}

fn config_from_vars(vars: &HashMap<String, String>) -> Result<PurchasesConfig, EnvError> {
    let api_key = vars
        .get(API_KEY_VAR)
        .filter(|key| !key.is_empty())
        .ok_or(EnvError::Missing(API_KEY_VAR))?;

    let mut config = PurchasesConfig::new(api_key.clone());
    config.app_user_id = vars.get(APP_USER_ID_VAR).cloned();
    config.proxy_url = vars.get(PROXY_URL_VAR).cloned();

    if let Some(raw) = vars.get(OBSERVER_MODE_VAR) {
        config.observer_mode = parse_flag(raw).ok_or_else(|| {
            EnvError::Parse(format!("{OBSERVER_MODE_VAR} must be a boolean, got '{raw}'"))
        })?;
    }

    if let Some(raw) = vars.get(PRODUCT_IDENTIFIERS_VAR) {
        config.product_identifiers = raw
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
    }

    Ok(config)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Errors that can occur when loading environment configuration.
#[derive(Debug, Clone, Error)]
pub enum EnvError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("missing required variable {0}")]
    Missing(&'static str),
}
