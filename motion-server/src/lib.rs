//! # MotionEdit Server Library
//!
//! HTTP service around the animation edit pipeline.
//! This library is used by both the binary and integration tests.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod routes;
pub mod validation;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

pub use config::{EditorConfig, PipelineConfig, Provider, ServerConfig};
pub use model::{EditModel, HttpEditModel, ModelClient, ModelError};
pub use pipeline::{Applier, EditOutcome, EditPipeline, EditRequest, EditResult};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The edit pipeline.
    pub pipeline: EditPipeline,
    /// Prometheus handle; `/metrics` is only served when present.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create state around a pipeline, without a metrics endpoint.
    #[must_use]
    pub fn new(pipeline: EditPipeline) -> Self {
        Self {
            pipeline,
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Build a CORS layer from the configured origins.
///
/// `*` anywhere in the list allows any origin (without credentials).
#[must_use]
pub fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_credentials(true)
}

/// Build the application router.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let mut router: Router<AppState> = Router::new();
    if state.metrics.is_some() {
        router = router.route("/metrics", get(metrics::metrics_handler));
    }

    router
        .route("/api", get(routes::root))
        .route("/api/", get(routes::root))
        .route("/api/animations/edit", post(routes::edit_animation))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/health", get(health::readiness))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(build_cors_layer(&config.cors_origins))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
