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
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
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

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_i64 = |var: &str, default: &str| -> Result<i64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<i64>().map_err(|e| ConfigError::InvalidEnvVar {
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

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("REELWALK_ENV", "development"));
    let log_level = or_default("REELWALK_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("REELWALK_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("REELWALK_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("REELWALK_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let webdriver_url = or_default("REELWALK_WEBDRIVER_URL", "http://127.0.0.1:9515");
    let feed_origin = or_default("REELWALK_FEED_ORIGIN", "https://www.instagram.com");
    let api_base_url = or_default("REELWALK_API_BASE_URL", "https://i.instagram.com");
    let api_app_id = or_default("REELWALK_API_APP_ID", "936619743392459");
    let api_timeout_secs = parse_u64("REELWALK_API_TIMEOUT_SECS", "20")?;
    let api_max_retries = parse_u32("REELWALK_API_MAX_RETRIES", "2")?;
    let api_backoff_base_ms = parse_u64("REELWALK_API_BACKOFF_BASE_MS", "1000")?;
    let user_agent = or_default(
        "REELWALK_USER_AGENT",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    );

    let analysis_url = optional("REELWALK_ANALYSIS_URL");
    let comment_url = optional("REELWALK_COMMENT_URL");

    let story_limit = crate::clamp_story_limit(parse_i64("REELWALK_STORY_LIMIT", "10")?);
    let reply_retry_days = parse_u32("REELWALK_REPLY_RETRY_DAYS", "3")?;
    let blocked_tags = parse_tag_list(&or_default(
        "REELWALK_BLOCKED_TAGS",
        "text,screenshot,document",
    ));
    let diagnostics_dir = optional("REELWALK_DIAGNOSTICS_DIR").map(PathBuf::from);
    let max_concurrent_runs = parse_usize("REELWALK_MAX_CONCURRENT_RUNS", "1")?;
    let open_deadline_secs = parse_u64("REELWALK_OPEN_DEADLINE_SECS", "45")?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        webdriver_url,
        feed_origin,
        api_base_url,
        api_app_id,
        api_timeout_secs,
        api_max_retries,
        api_backoff_base_ms,
        user_agent,
        analysis_url,
        comment_url,
        story_limit,
        reply_retry_days,
        blocked_tags,
        diagnostics_dir,
        max_concurrent_runs,
        open_deadline_secs,
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

/// Split a comma-separated label list, lower-casing and dropping blanks.
fn parse_tag_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
