//! Process configuration, read once from the environment at startup.
//!
//! Every integration is optional except the HTTP listener: a missing LLM key
//! disables the conversational path, a missing database URL switches the
//! service into the email-only degraded mode, and so on. `summarize` logs
//! what is live so operators can see the degradations at boot.

use serde::Serialize;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Listening port.
    pub port: u16,
    /// External base URL used when rendering links (approval page, pixel).
    pub base_url: String,
    /// LLM API key. `None` disables the chat and LLM-recommend paths.
    pub llm_api_key: Option<String>,
    /// LLM model id.
    pub llm_model: String,
    /// Web-search API key. `None` makes `research_venue` degrade politely.
    pub search_api_key: Option<String>,
    /// SQLite database path. `None` skips all persistence (email-only mode).
    pub database_url: Option<String>,
    /// Music-platform API token (pre-shared, sent as Basic credential).
    pub platform_api_token: Option<String>,
    /// SMTP credentials; both must be present for mail to be live.
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    /// Recipient of internal submission emails.
    pub notify_email: String,
    /// Path of the read-only playlist catalog file.
    pub catalog_path: String,
}

impl Config {
    /// Read the full configuration from the environment. Called exactly
    /// once, from `main`.
    pub fn from_env() -> Self {
        Self {
            port: env_parsed("PORT", d_port()),
            base_url: env_or("BASE_URL", &d_base_url()),
            llm_api_key: env_nonempty("ANTHROPIC_API_KEY"),
            llm_model: env_or("LLM_MODEL", &d_llm_model()),
            search_api_key: env_nonempty("SEARCH_API_KEY"),
            database_url: env_nonempty("DATABASE_URL"),
            platform_api_token: env_nonempty("SYB_API_TOKEN"),
            smtp_user: env_nonempty("SMTP_USER"),
            smtp_password: env_nonempty("SMTP_PASSWORD"),
            notify_email: env_or("NOTIFY_EMAIL", &d_notify_email()),
            catalog_path: env_or("CATALOG_PATH", &d_catalog_path()),
        }
    }

    pub fn smtp_configured(&self) -> bool {
        self.smtp_user.is_some() && self.smtp_password.is_some()
    }

    /// One line per integration, logged at startup.
    pub fn summarize(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("llm", self.llm_api_key.is_some()),
            ("search", self.search_api_key.is_some()),
            ("database", self.database_url.is_some()),
            ("platform", self.platform_api_token.is_some()),
            ("smtp", self.smtp_configured()),
        ]
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: d_port(),
            base_url: d_base_url(),
            llm_api_key: None,
            llm_model: d_llm_model(),
            search_api_key: None,
            database_url: None,
            platform_api_token: None,
            smtp_user: None,
            smtp_password: None,
            notify_email: d_notify_email(),
            catalog_path: d_catalog_path(),
        }
    }
}

// ── env helpers ─────────────────────────────────────────────────────

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(name: &str, default: &str) -> String {
    env_nonempty(name).unwrap_or_else(|| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── defaults ────────────────────────────────────────────────────────

fn d_port() -> u16 {
    3000
}
fn d_base_url() -> String {
    "http://localhost:3000".into()
}
fn d_llm_model() -> String {
    "claude-sonnet-4-6".into()
}
fn d_notify_email() -> String {
    "production@bmasiamusic.com".into()
}
fn d_catalog_path() -> String {
    "./syb_playlists.json".into()
}
