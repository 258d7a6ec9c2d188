use std::sync::Arc;

use mb_catalog::Catalog;
use mb_domain::config::Config;
use mb_providers::{AccountCache, LlmClient, Mailer, PlatformClient, SearchClient};
use mb_store::Database;

/// Shared application state passed to all handlers and the executor.
///
/// Every external integration is optional; handlers degrade per the error
/// policy when one is absent. A missing `db` is the email-only mode.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Arc<Catalog>,
    pub llm: Option<Arc<LlmClient>>,
    pub search: Option<Arc<SearchClient>>,
    pub platform: Option<Arc<PlatformClient>>,
    pub accounts: Option<Arc<AccountCache>>,
    pub mailer: Option<Arc<Mailer>>,
    pub db: Option<Database>,
}

impl AppState {
    /// External URL for a path, using the configured base.
    pub fn external_url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}
