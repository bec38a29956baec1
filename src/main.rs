use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, EnvFilter};

use detail_page_studio::blob::HttpBlobStore;
use detail_page_studio::config::Config;
use detail_page_studio::cooldown::MemoryCooldown;
use detail_page_studio::llm::AnthropicCopyClient;
use detail_page_studio::pipeline::{Collaborators, Orchestrator};
use detail_page_studio::quota::{HeaderAuth, MemoryQuota, QuotaGate};
use detail_page_studio::render::HttpRenderClient;
use detail_page_studio::routes::AppState;
use detail_page_studio::store::MemoryRecordStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env();
    for (name, present) in [
        ("ANTHROPIC_API_KEY", config.llm.api_key.is_some()),
        ("RENDER_SERVER_URL", config.render.endpoint.is_some()),
        ("STORAGE_BASE_URL", config.storage.base_url.is_some()),
        ("STORAGE_BUCKET", config.storage.bucket.is_some()),
    ] {
        if !present {
            tracing::warn!("⚠️ {} is not set; generation requests will be rejected", name);
        }
    }

    let quota = config
        .quota
        .as_ref()
        .map(|q| Arc::new(MemoryQuota::from_config(q)) as Arc<dyn QuotaGate>);
    let deps = Collaborators {
        copy: Arc::new(AnthropicCopyClient::new(&config.llm).context("building LLM client")?),
        renderer: Arc::new(HttpRenderClient::new(&config.render).context("building render client")?),
        blob: Arc::new(HttpBlobStore::new(&config.storage).context("building storage client")?),
        store: Arc::new(MemoryRecordStore::new()),
        cooldown: Arc::new(MemoryCooldown::for_window(config.pipeline.edit_cooldown)),
        quota,
    };

    let state = AppState {
        orchestrator: Arc::new(Orchestrator::new(deps, config.pipeline.clone())),
        auth: Arc::new(HeaderAuth),
    };
    let app = detail_page_studio::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}
