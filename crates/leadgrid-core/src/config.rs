use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files — useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup — no `set_var`/`remove_var` needed.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let places_api_key = require("LEADGRID_PLACES_API_KEY")?;

    let env = parse_environment(&or_default("LEADGRID_ENV", "development"));
    let log_level = or_default("LEADGRID_LOG_LEVEL", "info");

    let checkpoint_dir = PathBuf::from(or_default("LEADGRID_CHECKPOINT_DIR", "./checkpoints"));
    let export_dir = PathBuf::from(or_default("LEADGRID_EXPORT_DIR", "./exports"));

    let request_timeout_secs = parse_u64("LEADGRID_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("LEADGRID_USER_AGENT", "leadgrid/0.1 (lead-harvest)");
    let min_call_interval_ms = parse_u64("LEADGRID_MIN_CALL_INTERVAL_MS", "2000")?;
    let inter_point_delay_ms = parse_u64("LEADGRID_INTER_POINT_DELAY_MS", "5000")?;
    let max_results_per_point = parse_usize("LEADGRID_MAX_RESULTS_PER_POINT", "60")?;

    Ok(AppConfig {
        env,
        log_level,
        places_api_key,
        checkpoint_dir,
        export_dir,
        request_timeout_secs,
        user_agent,
        min_call_interval_ms,
        inter_point_delay_ms,
        max_results_per_point,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}
