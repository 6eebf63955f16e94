use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use share_gate::clock::{Clock, SystemClock};
use share_gate::config::{Config, LinkStoreKind, StorageProvider};
use share_gate::links::{LinkResolver, LinkStore, MemoryLinkStore, PgLinkStore};
use share_gate::rate_limit::RateLimiter;
use share_gate::storage::{S3UrlSigner, StaticSigner, UrlSigner};
use share_gate::{create_router, db, utils, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    utils::init_tracing();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.server);

    let store: Arc<dyn LinkStore> = match config.database.link_store {
        LinkStoreKind::Postgres => {
            let pool = db::create_pool(&config.database).await?;
            db::run_migrations(&pool).await?;
            Arc::new(PgLinkStore::new(pool))
        }
        LinkStoreKind::Memory => {
            warn!("Using in-memory link store; share entries are not persisted");
            match &config.database.seed_file {
                Some(path) => Arc::new(MemoryLinkStore::from_seed_file(path).await?),
                None => {
                    warn!("LINK_SEED_FILE is not set; every share lookup will miss");
                    Arc::new(MemoryLinkStore::new())
                }
            }
        }
    };

    let signer: Arc<dyn UrlSigner> = match config.storage.provider {
        StorageProvider::S3 => Arc::new(S3UrlSigner::from_config(&config.storage)?),
        StorageProvider::Local => {
            warn!(base = %config.storage.local_base_url, "Using unsigned local storage URLs");
            Arc::new(StaticSigner::new(config.storage.local_base_url.clone()))
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let resolver = LinkResolver::new(store, signer, clock.clone())
        .with_url_ttl(config.share.signed_url_ttl_secs);
    let share_policy = config.share.rate_policy()?;

    info!(
        limit = share_policy.limit(),
        window_ms = share_policy.window_ms(),
        url_ttl_secs = resolver.url_ttl_secs(),
        "Share routes configured"
    );

    // Create shared state
    let state = AppState {
        config: config.clone(),
        rate_limiter: Arc::new(RateLimiter::new(clock)),
        resolver: Arc::new(resolver),
        share_policy,
    };

    let app = create_router(state);

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid HOST {}", config.server.host))?;
    let addr = SocketAddr::from((host, config.server.port));
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
