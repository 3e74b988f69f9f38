use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use vfp_core::JobTemplate;
use vfp_engine::{
    CapacityProvider, ElasticProvider, ExecError, ExecOutcome, ExecSpec, ExecStatus,
    JobDispatcher, JobExecutor, JobQueue, ResourcePoolManager, Scheduler, TemplateRegistry,
};
use vfp_events::EventBus;
use vfp_invoker::config::InvokerConfig;
use vfp_invoker::routes;
use vfp_invoker::state::AppState;

/// Build a test `InvokerConfig` with safe defaults.
pub fn test_config() -> InvokerConfig {
    InvokerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        request_timeout_secs: 30,
        cors_origins: vec![],
        region: "us-east-1".to_string(),
        domain: "test".to_string(),
        realm: "USAmazon".to_string(),
        stage: "Beta".to_string(),
        job_queue_name: "VendorFeedProcessorJobQueue".to_string(),
        container_image: "vendor-feed-processor:1.0".to_string(),
        container_runtime: "docker".to_string(),
        job_vcpus: 1,
        job_memory_mib: 512,
        min_vcpus: 1,
        max_vcpus: 8,
        desired_vcpus: 0,
        idle_grace_secs: 60,
        poll_interval_ms: 250,
    }
}

/// Executor that parks until cancelled. The test app never starts the
/// scheduler loop, so jobs stay observable in their queued state.
struct ParkedExecutor;

#[async_trait]
impl JobExecutor for ParkedExecutor {
    async fn run(
        &self,
        _spec: ExecSpec,
        cancel: CancellationToken,
    ) -> Result<ExecOutcome, ExecError> {
        cancel.cancelled().await;
        Ok(ExecOutcome {
            status: ExecStatus::Cancelled,
            exit_code: -1,
            output_location: None,
            stderr_tail: String::new(),
        })
    }
}

/// Build the full application router with the same middleware stack
/// `main.rs` uses, wired to in-memory engine components.
///
/// The scheduler loop is NOT spawned: dispatched jobs stay `QUEUED`, which
/// keeps the HTTP tests deterministic.
pub fn build_test_app() -> (Router, AppState) {
    let config = test_config();

    let registry = Arc::new(TemplateRegistry::new());
    let template_id = registry.register(JobTemplate::new(
        config.container_image.clone(),
        config.job_vcpus,
        config.job_memory_mib,
        JobTemplate::vendor_feed_argument_schema(),
        BTreeMap::new(),
    ));

    let queue = Arc::new(JobQueue::new(Arc::new(EventBus::default())));
    let provider = Arc::new(ElasticProvider::default()) as Arc<dyn CapacityProvider>;
    let pool = Arc::new(ResourcePoolManager::new(config.pool_config(), provider));
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&queue),
        Arc::clone(&pool),
        Arc::new(ParkedExecutor) as Arc<dyn JobExecutor>,
    ));
    let dispatcher = Arc::new(JobDispatcher::new(
        registry,
        Arc::clone(&queue),
        template_id,
        config.process_context(),
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        dispatcher,
        queue,
        pool,
        scheduler,
    };

    let request_id_header = HeaderName::from_static("x-request-id");
    let app = Router::new()
        .merge(routes::health_router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state.clone());

    (app, state)
}

/// Issue a GET request against the app.
pub async fn get(app: Router, path: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .uri(path)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Issue a POST request with a JSON body against the app.
pub async fn post_json(app: Router, path: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(path)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
