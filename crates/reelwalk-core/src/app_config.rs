use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Base URL of the WebDriver endpoint driving the browser session.
    pub webdriver_url: String,
    /// Origin of the feed whose story tray is traversed.
    pub feed_origin: String,
    pub api_base_url: String,
    pub api_app_id: String,
    pub api_timeout_secs: u64,
    pub api_max_retries: u32,
    pub api_backoff_base_ms: u64,
    pub user_agent: String,
    pub analysis_url: Option<String>,
    pub comment_url: Option<String>,
    /// Default per-run story limit, already clamped into `[1, 50]`.
    pub story_limit: u32,
    pub reply_retry_days: u32,
    /// Lower-cased analysis labels that suppress comment generation.
    pub blocked_tags: Vec<String>,
    pub diagnostics_dir: Option<PathBuf>,
    pub max_concurrent_runs: usize,
    pub open_deadline_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("webdriver_url", &self.webdriver_url)
            .field("feed_origin", &self.feed_origin)
            .field("api_base_url", &self.api_base_url)
            .field("api_app_id", &"[redacted]")
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("api_max_retries", &self.api_max_retries)
            .field("api_backoff_base_ms", &self.api_backoff_base_ms)
            .field("user_agent", &self.user_agent)
            .field("analysis_url", &self.analysis_url)
            .field("comment_url", &self.comment_url)
            .field("story_limit", &self.story_limit)
            .field("reply_retry_days", &self.reply_retry_days)
            .field("blocked_tags", &self.blocked_tags)
            .field("diagnostics_dir", &self.diagnostics_dir)
            .field("max_concurrent_runs", &self.max_concurrent_runs)
            .field("open_deadline_secs", &self.open_deadline_secs)
            .finish()
    }
}
