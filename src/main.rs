use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coursework::{
    config::{Config, StoreKind},
    db, routes,
    state::AppState,
    store::{MemoryStore, PgStore, ProgressStore, Seed},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coursework=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn ProgressStore> = match config.store {
        StoreKind::Postgres => Arc::new(PgStore::new(db::connect(&config).await?)),
        StoreKind::Memory => {
            tracing::warn!("using in-memory store; data is lost on exit");
            let store = MemoryStore::new();
            if let Some(path) = &config.seed_file {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("reading seed file {}", path.display()))?;
                let seed: Seed = serde_json::from_str(&raw).context("parsing seed file")?;
                tracing::info!(
                    courses = seed.courses.len(),
                    lessons = seed.lessons.len(),
                    "seeded memory store"
                );
                store.seed(seed).await?;
            }
            Arc::new(store)
        }
    };

    let app = routes::app(AppState::new(store), &config);

    let listener = TcpListener::bind(config.bind_addr()).await?;
    tracing::info!("listening on http://{}", config.bind_addr());

    axum::serve(listener, app).await?;
    Ok(())
}
