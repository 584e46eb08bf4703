//! `gangway run` — start the proxy server.
//!
//! Loads and validates the configuration (fatal on error, the proxy never
//! accepts traffic on a bad config), wires the registry, route locator,
//! and refresh controller together, builds the initial route table, and
//! starts the Axum HTTP server with graceful shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::cli::RunArgs;
use crate::config;
use crate::error::GangwayError;
use crate::logging;
use crate::proxy::headers::{ApplicationHeaderProvider, ProxyRequestHelper};
use crate::proxy::trace::{LogTraceSink, TraceSink};
use crate::registry::file::FileRegistry;
use crate::route::{refresh, RefreshController, RouteLocator};
use crate::server::{self, AppState, Stats};

pub async fn execute(args: RunArgs) -> Result<(), GangwayError> {
    logging::init(&args.log_level, args.pretty, args.json);

    let path = resolve_config_path(args.config.clone()).await?;
    let (mut cfg, version) = config::load_file(&path).await?;

    // CLI overrides
    if let Some(timeout) = args.timeout {
        cfg.proxy.timeout = timeout;
    }
    if let Some(interval) = args.poll_interval {
        cfg.refresh.poll_interval = interval;
    }
    if args.eager_refresh {
        cfg.refresh.eager = true;
    }

    let registry = Arc::new(FileRegistry::new(path.clone(), &cfg, version)?);
    let locator = Arc::new(RouteLocator::new(
        Arc::clone(&registry) as Arc<dyn crate::registry::Registry>,
        cfg.server.base_path.clone(),
        cfg.server.api_prefix.clone(),
        cfg.server.endpoints.clone(),
    ));

    // Build the initial table before the listener binds; a registry that
    // cannot be listed at startup is a configuration error.
    locator.try_rebuild().await?;
    let route_count = locator.snapshot().await.len();

    let (refresh_tx, refresh_rx) = refresh::channel();
    let refresh_handle =
        RefreshController::new(Arc::clone(&locator), cfg.refresh.eager).spawn(refresh_rx);

    // Shutdown signal: dropping shutdown_tx closes the channel and stops
    // the poll loop, which in turn drops refresh_tx and ends the controller.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let poll_handle = tokio::spawn(Arc::clone(&registry).poll_loop(
        cfg.refresh.poll_interval,
        refresh_tx,
        shutdown_rx,
    ));

    let traces: Option<Arc<dyn TraceSink>> = Some(Arc::new(LogTraceSink));
    let state = Arc::new(AppState {
        locator,
        registry: registry as Arc<dyn crate::registry::Registry>,
        helper: ProxyRequestHelper::new(&cfg.proxy.ignored_headers, cfg.proxy.trace_body),
        header_provider: Arc::new(ApplicationHeaderProvider::new(&cfg.proxy.add_headers)),
        traces,
        http_client: server::build_http_client(),
        start_time: Instant::now(),
        stats: Stats::new(),
        timeout_ms: cfg.proxy.timeout,
    });

    let router = server::build_router(state, args.max_body);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        config = %path.display(),
        routes = route_count,
        api_prefix = %cfg.server.api_prefix,
        eager_refresh = cfg.refresh.eager,
        "gangway started"
    );

    let graceful_shutdown = async move {
        server::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    };

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(graceful_shutdown)
    .await?;

    // Wait for the background tasks to finish (catches panics)
    if let Err(e) = poll_handle.await {
        tracing::error!(error = %e, "registry poll task failed");
    }
    if let Err(e) = refresh_handle.await {
        tracing::error!(error = %e, "refresh controller task failed");
    }

    tracing::info!("gangway stopped");
    Ok(())
}

async fn resolve_config_path(explicit: Option<PathBuf>) -> Result<PathBuf, GangwayError> {
    if let Some(path) = explicit {
        return Ok(path);
    }

    // Auto-detect in current directory
    let candidates = ["gangway.yaml", "gangway.yml", "gangway.json", "gangway.toml"];

    for name in &candidates {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            return Ok(path);
        }
    }

    Err(GangwayError::ConfigFileNotFound {
        path: PathBuf::from("gangway.yaml"),
    })
}
