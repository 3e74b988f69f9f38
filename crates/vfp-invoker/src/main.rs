use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vfp_core::JobTemplate;
use vfp_engine::{
    CapacityProvider, ContainerExecutor, ElasticProvider, JobDispatcher, JobExecutor, JobQueue,
    ResourcePoolManager, Scheduler, TemplateRegistry,
};
use vfp_events::EventBus;
use vfp_invoker::config::InvokerConfig;
use vfp_invoker::{routes, state::AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vfp_invoker=debug,vfp_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = InvokerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        job_queue = %config.job_queue_name,
        min_vcpus = config.min_vcpus,
        max_vcpus = config.max_vcpus,
        "Loaded invoker configuration",
    );

    // --- Job template (write-once) ---
    let registry = Arc::new(TemplateRegistry::new());
    let template_id = registry.register(JobTemplate::new(
        config.container_image.clone(),
        config.job_vcpus,
        config.job_memory_mib,
        JobTemplate::vendor_feed_argument_schema(),
        BTreeMap::new(),
    ));
    tracing::info!(%template_id, image = %config.container_image, "Job template registered");

    // --- Queue, pool, executor ---
    let queue = Arc::new(JobQueue::new(Arc::new(EventBus::default())));
    let provider = Arc::new(ElasticProvider::default()) as Arc<dyn CapacityProvider>;
    let pool = Arc::new(ResourcePoolManager::new(config.pool_config(), provider));
    pool.bootstrap()
        .await
        .expect("Failed to provision initial worker capacity");

    let executor =
        Arc::new(ContainerExecutor::new(config.container_runtime.clone())) as Arc<dyn JobExecutor>;

    // --- Scheduler loop ---
    let scheduler = Arc::new(Scheduler::with_poll_interval(
        Arc::clone(&queue),
        Arc::clone(&pool),
        executor,
        Duration::from_millis(config.poll_interval_ms),
    ));
    let scheduler_cancel = tokio_util::sync::CancellationToken::new();
    let scheduler_handle = tokio::spawn(Arc::clone(&scheduler).run(scheduler_cancel.clone()));

    // --- Dispatcher ---
    let dispatcher = Arc::new(JobDispatcher::new(
        Arc::clone(&registry),
        Arc::clone(&queue),
        template_id,
        config.process_context(),
    ));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        dispatcher,
        queue,
        pool,
        scheduler,
    };

    // --- Request ID header name ---
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let app = Router::new()
        // Health check at root level (not under /api/v1).
        .merge(routes::health_router())
        // API v1 routes.
        .nest("/api/v1", routes::api_routes())
        // -- Middleware stack (applied bottom-up) --
        // Panic recovery: catch panics and return 500 JSON.
        .layer(CatchPanicLayer::new())
        // Request timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        // Propagate request ID to response.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Set request ID on incoming requests.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        // CORS.
        .layer(build_cors_layer(&config))
        // Shared state.
        .with_state(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting invoker");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Invoker stopped accepting connections, cleaning up");

    // Stop the scheduler loop; in-flight executions hold their own handles.
    scheduler_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), scheduler_handle).await;
    tracing::info!("Scheduler stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(config: &InvokerConfig) -> CorsLayer {
    let origins: Vec<axum::http::HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the service shuts
/// down cleanly whether stopped interactively or by a process manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
