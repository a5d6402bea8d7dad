//! Serve command implementation

use crate::api::{create_router, AppState};
use crate::cli::ServeArgs;
use crate::config::BrokerConfig;
use crate::logging::init_tracing;
use crate::rate_limit::{FixedWindowLimiter, RateLimiter};
use crate::upstream::{build_caller, UpstreamCaller};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(
    args: &ServeArgs,
) -> Result<BrokerConfig, Box<dyn std::error::Error>> {
    // Load from file if it exists, otherwise use defaults
    let mut config = if args.config.exists() {
        BrokerConfig::load(Some(&args.config))?
    } else {
        tracing::debug!("Config file not found, using defaults");
        BrokerConfig::default()
    };

    config = config.with_env_overrides();

    // CLI overrides (highest priority)
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }
    if let Some(ref backend_url) = args.backend_url {
        config.upstream.backend_url = Some(backend_url.clone());
    }
    if args.allow_missing_credential {
        config.upstream.require_credential = false;
    }

    Ok(config)
}

/// Build the limiter configured for this process, if any.
pub fn build_rate_limiter(config: &BrokerConfig) -> Option<Arc<FixedWindowLimiter>> {
    if config.rate_limit.enabled {
        Some(Arc::new(FixedWindowLimiter::new(&config.rate_limit)))
    } else {
        tracing::warn!("Rate limiting disabled");
        None
    }
}

/// Build API router with all endpoints
pub fn build_api_router(
    config: Arc<BrokerConfig>,
    upstream: UpstreamCaller,
    rate_limiter: Option<Arc<FixedWindowLimiter>>,
) -> (axum::Router, Arc<AppState>) {
    let rate_limiter = rate_limiter.map(|l| l as Arc<dyn RateLimiter>);
    let app_state = Arc::new(AppState::new(config, upstream, rate_limiter));
    let router = create_router(Arc::clone(&app_state));
    (router, app_state)
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
        _ = cancel_token.cancelled() => {}
    }

    cancel_token.cancel();
}

/// Main serve command handler
pub async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load and merge configuration
    let config = load_config_with_overrides(&args)?;
    config.validate()?;

    // 2. Initialize tracing
    init_tracing(&config.logging)?;

    tracing::info!(
        mode = %config.upstream.mode(),
        dev_mode = config.server.dev_mode,
        "Starting keybroker"
    );

    // 3. Resolve the upstream; credential values never leave this call
    let upstream = build_caller(&config, |name| std::env::var(name).ok())?;

    // 4. Rate limiter and its sweeper
    let cancel_token = CancellationToken::new();
    let rate_limiter = build_rate_limiter(&config);
    let sweeper_handle = rate_limiter.as_ref().map(|limiter| {
        limiter.spawn_sweeper(config.rate_limit.sweep_interval(), cancel_token.clone())
    });

    // 5. Bind and serve
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let (app, _state) = build_api_router(Arc::new(config), upstream, rate_limiter);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "keybroker listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(cancel_token.clone()))
    .await?;

    // 6. Cleanup
    cancel_token.cancel();
    if let Some(handle) = sweeper_handle {
        tracing::debug!("Waiting for rate limit sweeper to stop");
        handle.await?;
    }

    tracing::info!("keybroker stopped");
    Ok(())
}
