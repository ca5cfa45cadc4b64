use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use paseo::{
    AppState,
    config::{Config, StoreBackend},
    middleware::{RateLimiter, rate_limit},
    router::create_router,
    store::{MemoryDocumentStore, RedisDocumentStore, SharedDocumentStore},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 空闲会话清理周期
const REAPER_PERIOD: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // Redis 客户端：限流总是用它，文档存储按配置选择
    let redis_client = Arc::new(
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client"),
    );

    let store: Arc<dyn SharedDocumentStore> = match config.store_backend {
        StoreBackend::Redis => {
            tracing::info!("Using Redis document store");
            Arc::new(RedisDocumentStore::new(Arc::clone(&redis_client)))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory document store, data is lost on restart");
            Arc::new(MemoryDocumentStore::new())
        }
    };

    let state = AppState::new(config.clone(), store);
    let reaper = state.sessions.spawn_reaper(REAPER_PERIOD);

    let rate_limiter = Arc::new(RateLimiter::new(Arc::clone(&redis_client), &config));
    let router = create_router(state.clone()).layer(axum::middleware::from_fn_with_state(
        rate_limiter,
        rate_limit,
    ));

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    reaper.abort();
    state.sessions.close_all().await;
    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
