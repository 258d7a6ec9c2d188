use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use mb_catalog::Catalog;
use mb_domain::config::Config;
use mb_gateway::api;
use mb_gateway::executor;
use mb_gateway::state::AppState;
use mb_providers::{AccountCache, LlmClient, Mailer, PlatformClient, SearchClient};
use mb_store::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    tracing::info!("music-brief gateway starting");

    let config = Arc::new(Config::from_env());
    for (integration, live) in config.summarize() {
        if live {
            tracing::info!(integration, "configured");
        } else {
            tracing::warn!(integration, "not configured — running degraded");
        }
    }

    // ── Playlist catalog (read-only, required) ──────────────────────
    let catalog = Arc::new(
        Catalog::load(&config.catalog_path)
            .with_context(|| format!("loading playlist catalog {}", config.catalog_path))?,
    );

    // ── External adapters ───────────────────────────────────────────
    let llm = match &config.llm_api_key {
        Some(key) => Some(Arc::new(
            LlmClient::new(key.clone(), config.llm_model.clone())
                .context("initializing LLM client")?,
        )),
        None => None,
    };
    let search = match &config.search_api_key {
        Some(key) => Some(Arc::new(
            SearchClient::new(key.clone()).context("initializing search client")?,
        )),
        None => None,
    };
    let platform = match &config.platform_api_token {
        Some(token) => Some(Arc::new(
            PlatformClient::new(token.clone()).context("initializing platform client")?,
        )),
        None => None,
    };
    let accounts = platform
        .as_ref()
        .map(|p| Arc::new(AccountCache::new(p.clone())));
    let mailer = match (&config.smtp_user, &config.smtp_password) {
        (Some(user), Some(password)) => Some(Arc::new(
            Mailer::new(user.clone(), password.clone()).context("initializing mailer")?,
        )),
        _ => None,
    };

    // ── Persistence (optional: absent means email-only mode) ────────
    let db = match &config.database_url {
        Some(url) => Some(Database::open(url).context("opening database")?),
        None => None,
    };

    let state = AppState {
        config: config.clone(),
        catalog,
        llm,
        search,
        platform,
        accounts,
        mailer,
        db,
    };

    // ── Schedule executor (singleton, 60s tick) ─────────────────────
    tokio::spawn(executor::run(state.clone()));

    // ── HTTP server ─────────────────────────────────────────────────
    let app = api::router()
        .layer(tower::limit::ConcurrencyLimitLayer::new(256))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "music-brief gateway listening");

    axum::serve(listener, app).await.context("axum server error")?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mb_gateway=debug")),
        )
        .init();
}
