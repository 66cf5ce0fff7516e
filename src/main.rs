use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::Executor;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vibebot::{
    AppState,
    cleanup::CleanupScheduler,
    config::Config,
    database::{MemoryStore, PgStore, Store},
    dispatch::QueryDispatcher,
    generator::GeminiGenerator,
    pipeline::{ContentFilter, QueryLimits, QueryPipeline},
    rate_limit::RateLimiter,
    router::create_admin_router,
    transport::TelegramTransport,
    usage::UsageRecorder,
    whitelist::{JsonFileWhitelistStore, MemoryWhitelistStore, WhitelistGate, WhitelistStore},
};

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

    // 设置存储
    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .after_connect(|conn, _meta| {
                    Box::pin(async move {
                        conn.execute("SET application_name = 'vibebot';").await?;
                        Ok(())
                    })
                })
                .connect(url)
                .await
                .expect("Failed to connect to Postgres");
            let pg = PgStore::new(Arc::new(pool));
            pg.migrate().await.expect("Failed to prepare database schema");
            Arc::new(pg)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, rate-limit counters will not survive restarts");
            Arc::new(MemoryStore::new())
        }
    };

    // 加载白名单
    let whitelist_store: Arc<dyn WhitelistStore> = if config.whitelist_enabled {
        Arc::new(JsonFileWhitelistStore::new(&config.whitelist_path))
    } else {
        tracing::info!("Whitelist disabled, all users are authorized");
        Arc::new(MemoryWhitelistStore::default())
    };
    let whitelist = Arc::new(
        WhitelistGate::load(config.whitelist_enabled, whitelist_store)
            .await
            .expect("Failed to load whitelist"),
    );

    let generator = Arc::new(
        GeminiGenerator::new(
            &config.google_ai_endpoint,
            &config.google_ai_model,
            &config.google_ai_key,
            config.generation_timeout(),
        )
        .expect("Failed to build content generator"),
    );

    let (usage, usage_worker) = UsageRecorder::spawn(store.clone());

    let pipeline = Arc::new(QueryPipeline::new(
        whitelist.clone(),
        ContentFilter::new(&config.content_denylist),
        Arc::new(RateLimiter::new(store.clone())),
        generator,
        usage,
        QueryLimits {
            per_minute: config.api_requests_per_minute,
            per_day: config.api_requests_per_day,
            min_length: config.min_message_length,
            max_length: config.max_message_length,
        },
    ));

    let transport = Arc::new(
        TelegramTransport::new(&config.telegram_api_base, &config.telegram_bot_token)
            .expect("Failed to build Telegram client"),
    );

    let dispatcher = QueryDispatcher::new(
        pipeline,
        transport.clone(),
        config.bot_username.clone(),
        config.debounce_delay(),
    );

    // 定期清理
    let cleanup = CleanupScheduler::new(
        store.clone(),
        config.rate_record_retention(),
        config.usage_log_retention(),
    )
    .run_periodic(config.cleanup_first_delay(), config.cleanup_interval());

    // 管理接口（仅在配置了管理令牌时启动）
    let admin = match &config.admin_token {
        Some(_) => {
            let addr = SocketAddr::new(
                config.admin_host.parse().unwrap_or_else(|_| {
                    tracing::warn!("Invalid admin_host, falling back to localhost");
                    IpAddr::V4(Ipv4Addr::LOCALHOST)
                }),
                config.admin_port,
            );
            let app = create_admin_router(AppState {
                config: config.clone(),
                whitelist: whitelist.clone(),
            });
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .expect("Failed to bind admin listener");
            tracing::info!("Admin API listening on {}", addr);
            Some(tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, app).await {
                    tracing::error!("Admin API stopped: {}", e);
                }
            }))
        }
        None => {
            tracing::info!("ADMIN_TOKEN not set, admin API disabled");
            None
        }
    };

    tracing::info!(
        "Bot @{} started (debounce {:?}, {} req/min, {} req/day)",
        config.bot_username,
        config.debounce_delay(),
        config.api_requests_per_minute,
        config.api_requests_per_day
    );

    tokio::select! {
        _ = transport.run(&dispatcher) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    cleanup.abort();
    if let Some(admin) = admin {
        admin.abort();
    }
    // 释放分发器后，使用日志写完队列中剩余的记录
    drop(dispatcher);
    if let Err(e) = usage_worker.await {
        tracing::error!("Usage recorder terminated abnormally: {}", e);
    }
    tracing::info!("Bot stopped");
}
