//! lunchsync server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::middleware;
use lunchsync_api::{AppState, RedisRelay, StreamingState, router as api_router};
use lunchsync_common::{Config, LocalClock};
use lunchsync_core::{
    ChatService, ChatSettings, EventPublisherService, PollService, PollSettings,
    WeekBoardService, WeekStatusService,
};
use lunchsync_db::repositories::{
    ChatMessageRepository, DayStatusRepository, PollRepository, UserRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Push hub, relayed through Redis when configured.
async fn streaming_state(config: &Config) -> anyhow::Result<StreamingState> {
    let Some(redis) = &config.redis else {
        info!("Redis not configured, broadcasting in-process only");
        return Ok(StreamingState::new());
    };

    info!("Connecting to Redis...");
    let relay = RedisRelay::connect(&redis.url, &redis.prefix)
        .await
        .context("Failed to connect to Redis")?;
    let streaming = StreamingState::with_relay(relay.clone());
    relay
        .start(streaming.sender())
        .await
        .context("Failed to subscribe to Redis week channels")?;
    Ok(streaming)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lunchsync=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting lunchsync server...");

    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;
    let tz = config.lunch.tz()?;
    let clock = LocalClock::system(tz);
    info!(
        environment = %config.lunch.environment,
        timezone = %tz,
        enforce_poll_deadline = config.lunch.enforces_poll_deadline(),
        "Configuration loaded"
    );

    // Connect to database
    let db = Arc::new(lunchsync_db::init(&config).await?);
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    lunchsync_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let user_repo = UserRepository::new(Arc::clone(&db));
    let status_repo = DayStatusRepository::new(Arc::clone(&db));
    let poll_repo = PollRepository::new(Arc::clone(&db));
    let chat_repo = ChatMessageRepository::new(Arc::clone(&db));

    // Initialize streaming state
    let streaming = streaming_state(&config).await?;
    let publisher: EventPublisherService = Arc::new(streaming.clone());

    // Initialize services
    let mut week_status_service = WeekStatusService::new(status_repo, clock.clone());
    week_status_service.set_event_publisher(publisher.clone());

    let mut chat_service = ChatService::new(
        chat_repo,
        poll_repo.clone(),
        clock.clone(),
        ChatSettings::from_config(&config.lunch)?,
    );
    chat_service.set_event_publisher(publisher.clone());

    let mut poll_service = PollService::new(
        poll_repo,
        clock.clone(),
        PollSettings::from_config(&config.lunch)?,
    );
    poll_service.set_event_publisher(publisher);

    let week_board_service = WeekBoardService::new(
        user_repo.clone(),
        week_status_service.clone(),
        chat_service.clone(),
        poll_service.clone(),
        clock,
    );

    // Create app state
    let state = AppState {
        user_repo,
        week_status_service,
        chat_service,
        poll_service,
        week_board_service,
        streaming,
    };

    // Build router
    let app = api_router()
        .layer(middleware::from_fn_with_state(
            state.clone(),
            lunchsync_api::middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host / server.port")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
